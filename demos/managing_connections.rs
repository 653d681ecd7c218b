//! Connection management call patterns for the CoralDB client.
//!
//! Each function is an independent snippet showing one way to open a
//! connection; run against a local cluster with the travel-sample bucket
//! loaded.

use std::time::Duration;

use coraldb_client::{Bucket, Cluster, ClusterEnvironment, ClusterOptions, Collection, Result, Scope};

const CONNECTION_STRING: &str = "localhost";
const USERNAME: &str = "Administrator";
const PASSWORD: &str = "password";

/// Handles opened once at startup and shared from then on
struct Handles {
    cluster: Cluster,
    bucket: Bucket,
    scope: Scope,
    collection: Collection,
}

async fn init() -> Result<Handles> {
    let environment = ClusterEnvironment::builder().build();
    let cluster = Cluster::connect_with_options(
        CONNECTION_STRING,
        ClusterOptions::new(USERNAME, PASSWORD).environment(environment),
    )
    .await?;
    let bucket = cluster.bucket("travel-sample");
    let scope = bucket.scope("inventory");
    let collection = scope.collection("airport");
    Ok(Handles {
        cluster,
        bucket,
        scope,
        collection,
    })
}

async fn connect_custom_data_port() -> Result<()> {
    let custom_data_port = 1234; // default is 11210 (or 11207 for TLS)
    let connection_string = format!("{}:{}", "127.0.0.1", custom_data_port);
    let cluster = Cluster::connect(connection_string, USERNAME, PASSWORD).await?;
    cluster.disconnect().await
}

async fn connect_custom_manager_port() -> Result<()> {
    let custom_manager_port = 2345; // default is 8091 (or 18091 for TLS)
    let connection_string = format!("{}:{}=manager", "127.0.0.1", custom_manager_port);
    let cluster = Cluster::connect(connection_string, USERNAME, PASSWORD).await?;
    cluster.disconnect().await
}

async fn connect_and_wait_until_ready() -> Result<()> {
    let cluster = Cluster::connect("127.0.0.1", "Administrator", "password").await?;
    cluster.wait_until_ready(Duration::from_secs(10)).await?;
    let bucket = cluster.bucket("travel-sample");
    let collection = bucket.default_collection();
    println!("Opened {}/{}", bucket.name(), collection.name());
    cluster.disconnect().await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let handles = init().await?;
    println!(
        "Connected to {}.{}.{}",
        handles.bucket.name(),
        handles.scope.name(),
        handles.collection.name()
    );

    connect_custom_data_port().await?;
    connect_custom_manager_port().await?;
    connect_and_wait_until_ready().await?;

    handles.cluster.disconnect().await?;
    Ok(())
}
