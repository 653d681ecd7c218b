//! Integration tests for cluster bootstrap against an in-process node.
//!
//! The mock node speaks just enough of the wire protocol for the connection
//! layer: HELLO, AUTH, PING, and GET_CONFIG.

#[macro_use]
extern crate tokio_test;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use coraldb_client::types::{
    AuthRequest, AuthResponse, ClusterConfig, CommandHeader, HelloResponse, NodeConfig, OpCode,
    Response, StatusCode, COMMAND_HEADER_SIZE,
};
use coraldb_client::{Cluster, ClusterEnvironment, ClusterOptions, Error, Result};

#[derive(Clone)]
struct NodeBehavior {
    password: &'static str,
    /// Number of pings answered not-ready before the node reports ok
    warmup_pings: u32,
    /// Topology returned for GET_CONFIG, if any
    config: Option<ClusterConfig>,
}

impl Default for NodeBehavior {
    fn default() -> Self {
        Self {
            password: "password",
            warmup_pings: 0,
            config: None,
        }
    }
}

async fn spawn_node(behavior: NodeBehavior) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let pings = Arc::new(AtomicU32::new(0));

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let pings = pings.clone();
            tokio::spawn(async move {
                let _ = serve_connection(stream, behavior, pings).await;
            });
        }
    });

    Ok(addr)
}

async fn serve_connection(
    mut stream: TcpStream,
    behavior: NodeBehavior,
    pings: Arc<AtomicU32>,
) -> std::io::Result<()> {
    loop {
        let mut header_buf = [0u8; COMMAND_HEADER_SIZE];
        if stream.read_exact(&mut header_buf).await.is_err() {
            return Ok(());
        }
        let header = CommandHeader::from_bytes(&header_buf).expect("valid command header");
        let mut body = vec![0u8; (header.key_len + header.value_len) as usize];
        stream.read_exact(&mut body).await?;
        let value = &body[header.key_len as usize..];

        let response = match OpCode::try_from(header.opcode).expect("known opcode") {
            OpCode::Hello => {
                let payload = serde_json::to_vec(&HelloResponse {
                    version: "7.0.0".to_string(),
                    node: "node-1".to_string(),
                })
                .unwrap();
                Response::ok(header.seq, payload)
            }
            OpCode::Auth => {
                let request: AuthRequest = serde_json::from_slice(value).unwrap();
                if request.password == behavior.password {
                    let payload = serde_json::to_vec(&AuthResponse {
                        success: true,
                        error: None,
                    })
                    .unwrap();
                    Response::ok(header.seq, payload)
                } else {
                    Response::status_only(StatusCode::AuthFailed, header.seq)
                }
            }
            OpCode::Ping => {
                let seen = pings.fetch_add(1, Ordering::SeqCst);
                if seen < behavior.warmup_pings {
                    Response::status_only(StatusCode::NotReady, header.seq)
                } else {
                    Response::ok(header.seq, Vec::<u8>::new())
                }
            }
            OpCode::GetConfig => match &behavior.config {
                Some(config) => Response::ok(header.seq, serde_json::to_vec(config).unwrap()),
                None => Response::status_only(StatusCode::Error, header.seq),
            },
        };

        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;
    }
}

#[tokio::test]
async fn connect_ping_and_navigate() -> Result<()> {
    let addr = spawn_node(NodeBehavior::default()).await?;
    let cluster = Cluster::connect(
        format!("127.0.0.1:{}", addr.port()),
        "Administrator",
        "password",
    )
    .await?;
    tokio_test::assert_ok!(cluster.ping().await);

    let bucket = cluster.bucket("travel-sample");
    let scope = bucket.scope("inventory");
    let collection = scope.collection("airport");
    assert_eq!(bucket.name(), "travel-sample");
    assert_eq!(scope.name(), "inventory");
    assert_eq!(collection.name(), "airport");
    assert_eq!(collection.bucket_name(), "travel-sample");
    assert_eq!(collection.scope_name(), "inventory");

    let fallback = bucket.default_collection();
    assert_eq!(fallback.scope_name(), "_default");
    assert_eq!(fallback.name(), "_default");

    cluster.disconnect().await
}

#[tokio::test]
async fn rejects_bad_credentials() -> Result<()> {
    let addr = spawn_node(NodeBehavior::default()).await?;
    let err = Cluster::connect(
        format!("127.0.0.1:{}", addr.port()),
        "Administrator",
        "wrong",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed));
    Ok(())
}

#[tokio::test]
async fn wait_until_ready_outlasts_warmup() -> Result<()> {
    let addr = spawn_node(NodeBehavior {
        warmup_pings: 2,
        ..Default::default()
    })
    .await?;
    let cluster = Cluster::connect(
        format!("127.0.0.1:{}", addr.port()),
        "Administrator",
        "password",
    )
    .await?;

    cluster.wait_until_ready(Duration::from_secs(5)).await?;
    tokio_test::assert_ok!(cluster.ping().await);
    cluster.disconnect().await
}

#[tokio::test]
async fn wait_until_ready_times_out() -> Result<()> {
    let addr = spawn_node(NodeBehavior {
        warmup_pings: u32::MAX,
        ..Default::default()
    })
    .await?;
    let cluster = Cluster::connect(
        format!("127.0.0.1:{}", addr.port()),
        "Administrator",
        "password",
    )
    .await?;

    let err = cluster
        .wait_until_ready(Duration::from_millis(400))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    cluster.disconnect().await
}

#[tokio::test]
async fn bootstraps_through_manager_seed() -> Result<()> {
    let data_addr = spawn_node(NodeBehavior::default()).await?;
    let config = ClusterConfig {
        name: "coral-test".to_string(),
        nodes: vec![NodeConfig {
            host: "127.0.0.1".to_string(),
            data_port: data_addr.port(),
            manager_port: 8091,
        }],
    };
    let manager_addr = spawn_node(NodeBehavior {
        config: Some(config),
        ..Default::default()
    })
    .await?;

    let cluster = Cluster::connect(
        format!("127.0.0.1:{}=manager", manager_addr.port()),
        "Administrator",
        "password",
    )
    .await?;
    cluster.ping().await?;
    cluster.disconnect().await
}

#[tokio::test]
async fn falls_back_to_a_later_seed() -> Result<()> {
    let addr = spawn_node(NodeBehavior::default()).await?;
    let connection_string = format!("127.0.0.1:1,127.0.0.1:{}", addr.port());

    let cluster = Cluster::connect(connection_string, "Administrator", "password").await?;
    cluster.ping().await?;
    cluster.disconnect().await
}

#[tokio::test]
async fn connect_with_environment_options() -> Result<()> {
    let addr = spawn_node(NodeBehavior::default()).await?;
    let environment = ClusterEnvironment::builder()
        .connect_timeout(Duration::from_secs(2))
        .num_connections(2)
        .build();

    let cluster = Cluster::connect_with_options(
        format!("127.0.0.1:{}", addr.port()),
        ClusterOptions::new("Administrator", "password").environment(environment),
    )
    .await?;
    cluster.ping().await?;
    cluster.ping().await?;
    cluster.disconnect().await
}
