//! Connection handling for the CoralDB client with TLS support.
//!
//! A [`Connection`] dials one node, performs the HELLO and AUTH exchange,
//! and then runs framed request/response rounds. The [`ConnectionPool`]
//! holds a fixed number of connections established at cluster bootstrap.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rustls::{ClientConfig, RootCertStore, ServerName};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tracing::{debug, info, warn};

use crate::connstr::Address;
use crate::options::{ClusterEnvironment, Credentials, TlsConfig};
use crate::types::{
    AuthRequest, AuthResponse, ClusterConfig, Command, HelloRequest, HelloResponse, Response,
    StatusCode, PROTOCOL_VERSION, RESPONSE_HEADER_SIZE,
};
use crate::{Error, Result};

/// Maximum response frame size (16MB)
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Agent string announced in the HELLO exchange
const CLIENT_AGENT: &str = concat!("coraldb-rust/", env!("CARGO_PKG_VERSION"));

/// Connection stream type (plain TCP or TLS)
#[derive(Debug)]
enum ConnectionStream {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl ConnectionStream {
    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            ConnectionStream::Plain(stream) => {
                stream.read_exact(buf).await?;
                Ok(())
            }
            ConnectionStream::Tls(stream) => {
                stream.read_exact(buf).await?;
                Ok(())
            }
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            ConnectionStream::Plain(stream) => stream.write_all(buf).await,
            ConnectionStream::Tls(stream) => stream.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            ConnectionStream::Plain(stream) => stream.flush().await,
            ConnectionStream::Tls(stream) => stream.flush().await,
        }
    }
}

/// A connection to a single CoralDB node
#[derive(Debug)]
pub struct Connection {
    /// The underlying stream (TCP or TLS)
    stream: Mutex<ConnectionStream>,
    /// Node address
    addr: Address,
    /// Next sequence number
    next_seq: AtomicU32,
    /// Request timeout
    request_timeout: Duration,
    /// Server version reported in the HELLO exchange
    server_version: Option<String>,
}

impl Connection {
    /// Dial a node and perform the HELLO and AUTH exchange
    pub async fn connect(
        addr: &Address,
        environment: &ClusterEnvironment,
        credentials: &Credentials,
    ) -> Result<Self> {
        info!("Connecting to CoralDB node at {}", addr);

        let tcp_stream = timeout(
            environment.connect_timeout(),
            TcpStream::connect((addr.host.as_str(), addr.port)),
        )
        .await
        .map_err(Error::Timeout)??;

        let stream = match environment.tls() {
            Some(tls_cfg) if tls_cfg.enabled => {
                let tls_connector = Self::create_tls_connector(tls_cfg)?;
                let server_name = tls_cfg.server_name.as_deref().unwrap_or(addr.host.as_str());
                let server_name = ServerName::try_from(server_name)
                    .map_err(|e| Error::connection(format!("Invalid server name: {}", e)))?;

                let tls_stream = tls_connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| Error::connection(format!("TLS handshake failed: {}", e)))?;

                info!("TLS connection established to {}", addr);
                ConnectionStream::Tls(tls_stream)
            }
            _ => ConnectionStream::Plain(tcp_stream),
        };

        let mut connection = Self {
            stream: Mutex::new(stream),
            addr: addr.clone(),
            next_seq: AtomicU32::new(1),
            request_timeout: environment.request_timeout(),
            server_version: None,
        };

        connection.hello().await?;
        connection.authenticate(credentials).await?;

        info!("Connected to CoralDB node at {}", addr);
        Ok(connection)
    }

    /// Create TLS connector from configuration
    fn create_tls_connector(tls_config: &TlsConfig) -> Result<TlsConnector> {
        let config = if tls_config.accept_invalid_certs {
            warn!("Accepting invalid certificates - this should only be used for testing!");
            ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(AcceptAllVerifier))
                .with_no_client_auth()
        } else {
            let mut root_store = RootCertStore::empty();
            if let Some(path) = &tls_config.ca_cert_path {
                let file = File::open(path)?;
                let mut reader = BufReader::new(file);
                let certs = rustls_pemfile::certs(&mut reader).map_err(|e| {
                    Error::connection(format!("Failed to read CA file {}: {}", path, e))
                })?;
                if certs.is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "no certificates found in CA file {}",
                        path
                    )));
                }
                let (added, _) = root_store.add_parsable_certificates(&certs);
                if added == 0 {
                    return Err(Error::invalid_argument(format!(
                        "no usable certificates in CA file {}",
                        path
                    )));
                }
            }
            ClientConfig::builder()
                .with_safe_defaults()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        Ok(TlsConnector::from(Arc::new(config)))
    }

    /// Exchange agent and version strings with the node
    async fn hello(&mut self) -> Result<()> {
        let seq = self.next_seq();
        let hello = HelloRequest {
            agent: CLIENT_AGENT.to_string(),
            protocol: PROTOCOL_VERSION,
        };
        let payload = serde_json::to_vec(&hello)
            .map_err(|e| Error::Serialization(format!("Failed to serialize hello request: {}", e)))?;

        let response = self.execute(Command::hello(seq, Bytes::from(payload))).await?;

        let hello_response: HelloResponse = serde_json::from_slice(&response.payload)
            .map_err(|e| Error::Serialization(format!("Failed to parse hello response: {}", e)))?;

        debug!(
            "Node {} ({}) is running CoralDB {}",
            self.addr, hello_response.node, hello_response.version
        );
        self.server_version = Some(hello_response.version);
        Ok(())
    }

    /// Authenticate with the node
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let seq = self.next_seq();
        let auth_request = AuthRequest {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        };
        let payload = serde_json::to_vec(&auth_request)
            .map_err(|e| Error::Serialization(format!("Failed to serialize auth request: {}", e)))?;

        let response = self.execute(Command::auth(seq, Bytes::from(payload))).await?;

        let auth_response: AuthResponse = serde_json::from_slice(&response.payload)
            .map_err(|e| Error::Serialization(format!("Failed to parse auth response: {}", e)))?;

        if !auth_response.success {
            return Err(Error::AuthenticationFailed);
        }

        debug!("Authenticated against {}", self.addr);
        Ok(())
    }

    /// Get the next sequence number
    fn next_seq(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Server version reported in the HELLO exchange
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Address of the node this connection is dialed to
    pub fn addr(&self) -> &Address {
        &self.addr
    }

    /// Execute a command and return the response
    pub async fn execute(&self, cmd: Command) -> Result<Response> {
        let seq = cmd.header.seq;
        debug!("Executing command: 0x{:02x} (seq={})", cmd.header.opcode, seq);

        let mut stream = self.stream.lock().await;

        let cmd_bytes = cmd.to_bytes();
        timeout(self.request_timeout, stream.write_all(&cmd_bytes))
            .await
            .map_err(Error::Timeout)??;
        timeout(self.request_timeout, stream.flush())
            .await
            .map_err(Error::Timeout)??;

        let mut header_buf = [0u8; RESPONSE_HEADER_SIZE];
        timeout(self.request_timeout, stream.read_exact(&mut header_buf))
            .await
            .map_err(Error::Timeout)??;

        let payload_len =
            u32::from_le_bytes([header_buf[8], header_buf[9], header_buf[10], header_buf[11]])
                as usize;
        if payload_len > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!(
                "Response too large: {} bytes (max: {})",
                payload_len, MAX_FRAME_SIZE
            )));
        }

        let mut payload = vec![0u8; payload_len];
        if payload_len > 0 {
            timeout(self.request_timeout, stream.read_exact(&mut payload))
                .await
                .map_err(Error::Timeout)??;
        }

        let mut response_bytes = Vec::with_capacity(RESPONSE_HEADER_SIZE + payload_len);
        response_bytes.extend_from_slice(&header_buf);
        response_bytes.extend_from_slice(&payload);

        let response = Response::from_bytes(&response_bytes)
            .map_err(|e| Error::Protocol(format!("Invalid response: {}", e)))?;

        if response.header.seq != seq {
            return Err(Error::Protocol(format!(
                "Sequence number mismatch: expected {}, got {}",
                seq, response.header.seq
            )));
        }

        match response.status() {
            StatusCode::Ok => Ok(response),
            StatusCode::AuthRequired | StatusCode::AuthFailed => Err(Error::AuthenticationFailed),
            StatusCode::PermissionDenied => Err(Error::server("permission denied")),
            StatusCode::NotReady => Err(Error::server(format!("node {} is not ready", self.addr))),
            StatusCode::Error => {
                let error_msg = String::from_utf8_lossy(&response.payload).into_owned();
                Err(Error::Server(error_msg))
            }
        }
    }

    /// Ping the node
    pub async fn ping(&self) -> Result<()> {
        let seq = self.next_seq();
        self.execute(Command::ping(seq)).await?;
        Ok(())
    }

    /// Fetch the cluster topology from this node
    pub async fn get_config(&self) -> Result<ClusterConfig> {
        let seq = self.next_seq();
        let response = self.execute(Command::get_config(seq)).await?;

        serde_json::from_slice(&response.payload)
            .map_err(|e| Error::Serialization(format!("Failed to parse cluster config: {}", e)))
    }
}

/// A pool of connections established at cluster bootstrap
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    /// The connection pool receiver
    pool: async_channel::Receiver<Connection>,
    /// The connection pool sender
    pool_sender: async_channel::Sender<Connection>,
    /// The number of connections in the pool
    size: usize,
}

impl ConnectionPool {
    /// Establish a pool over the given addresses, distributing connections
    /// round-robin when more than one address is available
    pub async fn establish(
        addresses: &[Address],
        environment: &ClusterEnvironment,
        credentials: &Credentials,
    ) -> Result<Self> {
        if addresses.is_empty() {
            return Err(Error::connection("no addresses to connect to"));
        }

        let size = environment.num_connections();
        let (tx, rx) = async_channel::bounded(size);

        for i in 0..size {
            let addr = &addresses[i % addresses.len()];
            let conn = Connection::connect(addr, environment, credentials).await?;
            tx.send(conn)
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
        }

        Ok(Self {
            pool: rx,
            pool_sender: tx,
            size,
        })
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> Result<ConnectionGuard> {
        let conn = self
            .pool
            .recv()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(ConnectionGuard {
            conn: Some(conn),
            pool: self.pool_sender.clone(),
        })
    }

    /// Get the number of connections in the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Close the pool and drop its connections
    pub fn close(&self) {
        self.pool_sender.close();
        while let Ok(conn) = self.pool.try_recv() {
            drop(conn);
        }
    }
}

/// A guard that returns a connection to the pool when dropped
pub struct ConnectionGuard {
    /// The connection
    conn: Option<Connection>,
    /// The connection pool
    pool: async_channel::Sender<Connection>,
}

impl ConnectionGuard {
    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        self.conn.as_ref().unwrap()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                if pool.send(conn).await.is_err() {
                    debug!("Connection pool closed, dropping connection");
                }
            });
        }
    }
}

impl std::ops::Deref for ConnectionGuard {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

/// TLS certificate verifier that accepts all certificates (for testing only)
struct AcceptAllVerifier;

impl rustls::client::ServerCertVerifier for AcceptAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_invalid_certs_when_asked() {
        let tls = TlsConfig::new("db.example.com").accept_invalid_certs();
        assert!(Connection::create_tls_connector(&tls).is_ok());
    }

    #[test]
    fn rejects_ca_file_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a pem file").unwrap();

        let tls = TlsConfig::new("db.example.com")
            .with_ca_cert(file.path().to_string_lossy().to_string());
        let err = Connection::create_tls_connector(&tls).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn rejects_missing_ca_file() {
        let tls = TlsConfig::new("db.example.com").with_ca_cert("/nonexistent/ca.pem");
        let err = Connection::create_tls_connector(&tls).err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
