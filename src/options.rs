//! Cluster configuration: environment, credentials, and TLS settings.

use std::time::Duration;

/// Default connection timeout
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default request timeout
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of pooled connections
pub(crate) const DEFAULT_NUM_CONNECTIONS: usize = 1;

/// TLS configuration for cluster connections
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Enable TLS encryption
    pub enabled: bool,
    /// Server name for SNI (Server Name Indication)
    pub server_name: Option<String>,
    /// Path to CA certificate file for server verification
    pub ca_cert_path: Option<String>,
    /// Accept invalid certificates (for testing only)
    pub accept_invalid_certs: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_name: None,
            ca_cert_path: None,
            accept_invalid_certs: false,
        }
    }
}

impl TlsConfig {
    /// Create a new TLS config with server name
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            server_name: Some(server_name.into()),
            ..Default::default()
        }
    }

    /// Enable TLS with custom CA certificate
    pub fn with_ca_cert(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(ca_cert_path.into());
        self
    }

    /// Accept invalid certificates (for testing only)
    pub fn accept_invalid_certs(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }
}

/// Username/password credentials for cluster authentication
#[derive(Debug, Clone)]
pub struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl Credentials {
    /// Create credentials from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Tunables shared by every connection a cluster opens.
///
/// Build one with [`ClusterEnvironment::builder`], attach it to
/// [`ClusterOptions`], and pass it at connect time. The environment is
/// immutable once built.
#[derive(Debug, Clone)]
pub struct ClusterEnvironment {
    connect_timeout: Duration,
    request_timeout: Duration,
    num_connections: usize,
    tls: Option<TlsConfig>,
}

impl ClusterEnvironment {
    /// Create a builder with default settings
    pub fn builder() -> ClusterEnvironmentBuilder {
        ClusterEnvironmentBuilder::new()
    }

    /// Timeout for establishing a TCP connection
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Timeout for a single request/response exchange
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Number of pooled connections
    pub fn num_connections(&self) -> usize {
        self.num_connections
    }

    /// TLS configuration, if any
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    /// Whether TLS is enabled
    pub fn tls_enabled(&self) -> bool {
        self.tls.as_ref().map(|t| t.enabled).unwrap_or(false)
    }
}

impl Default for ClusterEnvironment {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A builder for configuring a [`ClusterEnvironment`]
#[derive(Debug, Clone)]
pub struct ClusterEnvironmentBuilder {
    connect_timeout: Duration,
    request_timeout: Duration,
    num_connections: usize,
    tls: Option<TlsConfig>,
}

impl Default for ClusterEnvironmentBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            num_connections: DEFAULT_NUM_CONNECTIONS,
            tls: None,
        }
    }
}

impl ClusterEnvironmentBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the number of pooled connections
    pub fn num_connections(mut self, num: usize) -> Self {
        self.num_connections = num;
        self
    }

    /// Set the TLS configuration
    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Build the environment
    pub fn build(self) -> ClusterEnvironment {
        ClusterEnvironment {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            num_connections: self.num_connections,
            tls: self.tls,
        }
    }
}

/// Options passed when connecting to a cluster: credentials plus an
/// optional environment
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub(crate) credentials: Credentials,
    pub(crate) environment: Option<ClusterEnvironment>,
}

impl ClusterOptions {
    /// Create options from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            environment: None,
        }
    }

    /// Attach a shared environment
    pub fn environment(mut self, environment: ClusterEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let env = ClusterEnvironment::builder().build();
        assert_eq!(env.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(env.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(env.num_connections(), DEFAULT_NUM_CONNECTIONS);
        assert!(env.tls().is_none());
        assert!(!env.tls_enabled());
    }

    #[test]
    fn builder_overrides() {
        let env = ClusterEnvironment::builder()
            .connect_timeout(Duration::from_secs(1))
            .request_timeout(Duration::from_secs(2))
            .num_connections(4)
            .tls_config(TlsConfig::new("db.example.com"))
            .build();
        assert_eq!(env.connect_timeout(), Duration::from_secs(1));
        assert_eq!(env.request_timeout(), Duration::from_secs(2));
        assert_eq!(env.num_connections(), 4);
        assert!(env.tls_enabled());
    }

    #[test]
    fn options_carry_credentials_and_environment() {
        let options = ClusterOptions::new("Administrator", "password")
            .environment(ClusterEnvironment::builder().num_connections(2).build());
        assert_eq!(options.credentials.username(), "Administrator");
        assert_eq!(options.environment.unwrap().num_connections(), 2);
    }
}
