//! Connection string parsing and formatting.
//!
//! A connection string is one or more comma-separated seed entries of the
//! form `host`, `host:port`, or `host:port=manager`. Entries without a
//! suffix address the data service; the `=manager` suffix addresses the
//! cluster manager service instead.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Default data service port
pub const DEFAULT_DATA_PORT: u16 = 11210;
/// Default data service port when TLS is enabled
pub const DEFAULT_DATA_TLS_PORT: u16 = 11207;
/// Default cluster manager port
pub const DEFAULT_MANAGER_PORT: u16 = 8091;
/// Default cluster manager port when TLS is enabled
pub const DEFAULT_MANAGER_TLS_PORT: u16 = 18091;

/// Service endpoint a seed entry addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The data (key-value) service
    Data,
    /// The cluster manager service
    Manager,
}

/// A single seed entry parsed from a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedNode {
    /// Hostname or IP address
    pub host: String,
    /// Explicit port, if the entry carried one
    pub port: Option<u16>,
    /// Which service endpoint the entry addresses
    pub endpoint: Endpoint,
}

impl SeedNode {
    /// Create a data service seed
    pub fn data(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
            endpoint: Endpoint::Data,
        }
    }

    /// Create a cluster manager seed
    pub fn manager(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
            endpoint: Endpoint::Manager,
        }
    }

    /// The port this seed dials, falling back to the service default
    pub fn effective_port(&self, tls: bool) -> u16 {
        if let Some(port) = self.port {
            return port;
        }
        match (self.endpoint, tls) {
            (Endpoint::Data, false) => DEFAULT_DATA_PORT,
            (Endpoint::Data, true) => DEFAULT_DATA_TLS_PORT,
            (Endpoint::Manager, false) => DEFAULT_MANAGER_PORT,
            (Endpoint::Manager, true) => DEFAULT_MANAGER_TLS_PORT,
        }
    }

    /// Resolve this seed to a dialable address
    pub fn address(&self, tls: bool) -> Address {
        Address {
            host: self.host.clone(),
            port: self.effective_port(tls),
        }
    }
}

impl fmt::Display for SeedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if self.endpoint == Endpoint::Manager {
            write!(f, "=manager")?;
        }
        Ok(())
    }
}

/// A host and resolved port pair handed to the dialer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Hostname or IP address
    pub host: String,
    /// Resolved port
    pub port: u16,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    seeds: Vec<SeedNode>,
}

impl ConnectionString {
    /// Parse a connection string into its seed entries
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_connection_string("empty connection string"));
        }

        let mut seeds = Vec::new();
        for entry in s.split(',') {
            seeds.push(Self::parse_entry(entry.trim())?);
        }

        Ok(Self { seeds })
    }

    fn parse_entry(entry: &str) -> Result<SeedNode> {
        if entry.is_empty() {
            return Err(Error::invalid_connection_string("empty seed entry"));
        }

        let (addr, endpoint) = match entry.split_once('=') {
            Some((addr, "manager")) => (addr, Endpoint::Manager),
            Some((_, suffix)) => {
                return Err(Error::invalid_connection_string(format!(
                    "unknown endpoint suffix '={}' in '{}'",
                    suffix, entry
                )));
            }
            None => (entry, Endpoint::Data),
        };

        let (host, port) = match addr.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    Error::invalid_connection_string(format!("invalid port in '{}'", entry))
                })?;
                (host, Some(port))
            }
            None => (addr, None),
        };

        if host.is_empty() {
            return Err(Error::invalid_connection_string(format!(
                "missing host in '{}'",
                entry
            )));
        }

        Ok(SeedNode {
            host: host.to_string(),
            port,
            endpoint,
        })
    }

    /// The seed entries, in connection string order
    pub fn seeds(&self) -> &[SeedNode] {
        &self.seeds
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seed) in self.seeds.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", seed)?;
        }
        Ok(())
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_host() {
        let cs = ConnectionString::parse("localhost").unwrap();
        assert_eq!(cs.seeds(), &[SeedNode::data("localhost", None)]);
        assert_eq!(cs.to_string(), "localhost");
    }

    #[test]
    fn formats_custom_data_port() {
        let custom_data_port = 1234;
        let connection_string = format!("{}:{}", "127.0.0.1", custom_data_port);
        assert_eq!(connection_string, "127.0.0.1:1234");

        let cs = ConnectionString::parse(&connection_string).unwrap();
        assert_eq!(cs.seeds(), &[SeedNode::data("127.0.0.1", Some(1234))]);
        assert_eq!(cs.to_string(), "127.0.0.1:1234");
    }

    #[test]
    fn formats_custom_manager_port() {
        let custom_manager_port = 2345;
        let connection_string = format!("{}:{}=manager", "127.0.0.1", custom_manager_port);
        assert_eq!(connection_string, "127.0.0.1:2345=manager");

        let cs = ConnectionString::parse(&connection_string).unwrap();
        assert_eq!(cs.seeds(), &[SeedNode::manager("127.0.0.1", Some(2345))]);
        assert_eq!(cs.to_string(), "127.0.0.1:2345=manager");
    }

    #[test]
    fn parses_multiple_seeds() {
        let cs = ConnectionString::parse("node1,node2:9999,node3:8091=manager").unwrap();
        assert_eq!(
            cs.seeds(),
            &[
                SeedNode::data("node1", None),
                SeedNode::data("node2", Some(9999)),
                SeedNode::manager("node3", Some(8091)),
            ]
        );
    }

    #[test]
    fn falls_back_to_service_defaults() {
        let data = SeedNode::data("localhost", None);
        assert_eq!(data.effective_port(false), DEFAULT_DATA_PORT);
        assert_eq!(data.effective_port(true), DEFAULT_DATA_TLS_PORT);

        let manager = SeedNode::manager("localhost", None);
        assert_eq!(manager.effective_port(false), DEFAULT_MANAGER_PORT);
        assert_eq!(manager.effective_port(true), DEFAULT_MANAGER_TLS_PORT);

        let explicit = SeedNode::data("localhost", Some(1234));
        assert_eq!(explicit.effective_port(true), 1234);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(ConnectionString::parse("").is_err());
        assert!(ConnectionString::parse("host:notaport").is_err());
        assert!(ConnectionString::parse("host:1234=query").is_err());
        assert!(ConnectionString::parse(":1234").is_err());
        assert!(ConnectionString::parse("node1,,node2").is_err());
    }

    #[test]
    fn address_formats_host_and_port() {
        let addr = SeedNode::data("127.0.0.1", Some(1234)).address(false);
        assert_eq!(addr.to_string(), "127.0.0.1:1234");
    }
}
