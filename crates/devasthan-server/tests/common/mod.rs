#![allow(dead_code)]

use devasthan_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use devasthan_server::{app, AppState, BroadcastHub, HubSettings};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A migrated file-backed pool. The directory must outlive the pool.
pub fn file_pool() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devasthan.db");
    let pool = create_pool(
        path.to_str().unwrap(),
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        },
    )
    .unwrap();
    run_migrations(&pool.get().unwrap()).unwrap();
    (pool, dir)
}

pub fn test_state(pool: DbPool) -> AppState {
    let hub = BroadcastHub::new(HubSettings {
        send_timeout: Duration::from_millis(500),
        queue_capacity: 64,
    });
    AppState::new(pool, hub, Vec::new())
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/live", self.addr)
    }
}

/// Serves the full router on an ephemeral port.
pub async fn spawn_server() -> TestServer {
    let (pool, dir) = file_pool();
    let state = test_state(pool);

    let router = app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        _dir: dir,
    }
}

/// Polls until the hub reports `expected` connected observers.
pub async fn wait_for_observers(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.hub.connected_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} observers, found {}",
        state.hub.connected_count().await
    );
}
