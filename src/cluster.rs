//! Cluster handle, bootstrap, and the bucket/scope/collection hierarchy.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionPool};
use crate::connstr::{Address, ConnectionString, Endpoint, SeedNode};
use crate::options::{ClusterEnvironment, ClusterOptions, Credentials};
use crate::{Error, Result};

/// Name of the default scope
pub const DEFAULT_SCOPE: &str = "_default";
/// Name of the default collection
pub const DEFAULT_COLLECTION: &str = "_default";

/// Initial delay between readiness probes
const READINESS_PROBE_DELAY: Duration = Duration::from_millis(100);
/// Cap on the delay between readiness probes
const READINESS_PROBE_DELAY_MAX: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct ClusterCore {
    pool: ConnectionPool,
}

/// A handle to a CoralDB cluster.
///
/// Opened with [`Cluster::connect`] or [`Cluster::connect_with_options`].
/// Buckets, scopes and collections are navigated from here by name; the
/// handles share this cluster's connections.
#[derive(Debug, Clone)]
pub struct Cluster {
    core: Arc<ClusterCore>,
}

impl Cluster {
    /// Connect to a cluster with username/password credentials
    pub async fn connect(
        connection_string: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Self::connect_with_options(connection_string, ClusterOptions::new(username, password)).await
    }

    /// Connect to a cluster with full options
    pub async fn connect_with_options(
        connection_string: impl AsRef<str>,
        options: ClusterOptions,
    ) -> Result<Self> {
        let conn_str = ConnectionString::parse(connection_string.as_ref())?;
        let environment = options.environment.unwrap_or_default();
        let credentials = options.credentials;

        let mut last_err = None;
        for seed in conn_str.seeds() {
            match Self::bootstrap(seed, &environment, &credentials).await {
                Ok(pool) => {
                    info!("Cluster bootstrap via seed {} complete", seed);
                    return Ok(Self {
                        core: Arc::new(ClusterCore { pool }),
                    });
                }
                Err(e) => {
                    warn!("Bootstrap via seed {} failed: {}", seed, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::connection("connection string contains no seeds")))
    }

    /// Establish the connection pool through one seed entry
    async fn bootstrap(
        seed: &SeedNode,
        environment: &ClusterEnvironment,
        credentials: &Credentials,
    ) -> Result<ConnectionPool> {
        let tls = environment.tls_enabled();
        match seed.endpoint {
            Endpoint::Data => {
                let addr = seed.address(tls);
                ConnectionPool::establish(&[addr], environment, credentials).await
            }
            Endpoint::Manager => {
                // The manager seed only serves the topology fetch; the pool
                // is built against the data addresses it reports.
                let addr = seed.address(tls);
                let manager = Connection::connect(&addr, environment, credentials).await?;
                let config = manager.get_config().await?;
                drop(manager);

                let addresses: Vec<Address> = config
                    .nodes
                    .iter()
                    .map(|node| Address {
                        host: node.host.clone(),
                        port: node.data_port,
                    })
                    .collect();
                if addresses.is_empty() {
                    return Err(Error::protocol("cluster config contains no nodes"));
                }

                debug!(
                    "Cluster '{}' reported {} data node(s)",
                    config.name,
                    addresses.len()
                );
                ConnectionPool::establish(&addresses, environment, credentials).await
            }
        }
    }

    /// Ping the cluster over a pooled connection
    pub async fn ping(&self) -> Result<()> {
        self.core.pool.get().await?.ping().await
    }

    /// Block until the cluster reports ready or the timeout elapses.
    ///
    /// A node that is still warming up answers probes with a not-ready
    /// status; probing continues until a ping succeeds. The caller-supplied
    /// timeout bounds the whole wait.
    pub async fn wait_until_ready(&self, wait_timeout: Duration) -> Result<()> {
        timeout(wait_timeout, async {
            let mut delay = READINESS_PROBE_DELAY;
            loop {
                match self.ping().await {
                    Ok(()) => return,
                    Err(e) => debug!("Cluster not ready yet: {}", e),
                }
                sleep(delay).await;
                delay = (delay * 2).min(READINESS_PROBE_DELAY_MAX);
            }
        })
        .await
        .map_err(Error::Timeout)
    }

    /// Open a bucket handle by name
    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket {
            name: name.into(),
            core: Arc::clone(&self.core),
        }
    }

    /// Close the connection pool and drop its connections
    pub async fn disconnect(self) -> Result<()> {
        info!("Disconnecting from cluster");
        self.core.pool.close();
        Ok(())
    }
}

/// A handle to a bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    name: String,
    core: Arc<ClusterCore>,
}

impl Bucket {
    /// The bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open a scope handle by name
    pub fn scope(&self, name: impl Into<String>) -> Scope {
        Scope {
            bucket_name: self.name.clone(),
            name: name.into(),
        }
    }

    /// Open the default scope
    pub fn default_scope(&self) -> Scope {
        self.scope(DEFAULT_SCOPE)
    }

    /// Open a collection in the default scope
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        self.default_scope().collection(name)
    }

    /// Open the default collection in the default scope
    pub fn default_collection(&self) -> Collection {
        self.collection(DEFAULT_COLLECTION)
    }

    /// Ping the cluster over a pooled connection
    pub async fn ping(&self) -> Result<()> {
        self.core.pool.get().await?.ping().await
    }
}

/// A handle to a scope within a bucket
#[derive(Debug, Clone)]
pub struct Scope {
    bucket_name: String,
    name: String,
}

impl Scope {
    /// The scope name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the bucket this scope belongs to
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Open a collection handle by name
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            bucket_name: self.bucket_name.clone(),
            scope_name: self.name.clone(),
            name: name.into(),
        }
    }
}

/// A handle to a collection within a scope
#[derive(Debug, Clone)]
pub struct Collection {
    bucket_name: String,
    scope_name: String,
    name: String,
}

impl Collection {
    /// The collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the scope this collection belongs to
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    /// Name of the bucket this collection belongs to
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}
