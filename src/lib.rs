//! # CoralDB Client
//!
//! Official Rust client for CoralDB - a clustered document database that
//! addresses stored data as bucket → scope → collection.
//!
//! This crate covers the connection-management surface: connection strings,
//! credential passing, readiness waiting, and navigation to buckets, scopes
//! and collections.
//!
//! ## Features
//!
//! - **Connection strings** - `host`, `host:port`, and `host:port=manager`
//!   seed entries, with TLS-aware default ports
//! - **Cluster bootstrap** - dial data seeds directly, or fetch the topology
//!   through a manager seed
//! - **Readiness waiting** - block until the cluster can serve traffic,
//!   bounded by a caller-supplied timeout
//! - **Connection pooling** - a fixed set of authenticated connections
//!   established at bootstrap
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use coraldb_client::{Cluster, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to a CoralDB cluster
//!     let cluster = Cluster::connect("127.0.0.1", "Administrator", "password").await?;
//!     cluster.wait_until_ready(Duration::from_secs(10)).await?;
//!
//!     // Navigate to a collection
//!     let bucket = cluster.bucket("travel-sample");
//!     let collection = bucket.scope("inventory").collection("airport");
//!     println!("Opened {}", collection.name());
//!
//!     cluster.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

mod cluster;
mod connection;
mod connstr;
mod error;
mod options;
pub mod types;

pub use cluster::{Bucket, Cluster, Collection, Scope, DEFAULT_COLLECTION, DEFAULT_SCOPE};
pub use connection::{Connection, ConnectionGuard, ConnectionPool};
pub use connstr::{
    Address, ConnectionString, Endpoint, SeedNode, DEFAULT_DATA_PORT, DEFAULT_DATA_TLS_PORT,
    DEFAULT_MANAGER_PORT, DEFAULT_MANAGER_TLS_PORT,
};
pub use error::Error;
pub use options::{
    ClusterEnvironment, ClusterEnvironmentBuilder, ClusterOptions, Credentials, TlsConfig,
};

/// Custom result type for CoralDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Re-export of the `bytes` crate for convenience
pub use bytes;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_conversions() {
        // Test that we can convert from io::Error
        let io_error = std::io::Error::new(std::io::ErrorKind::Other, "test");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));

        // Test that we can convert from string
        let error: Error = "test error".into();
        assert!(matches!(error, Error::Other(_)));
    }
}
