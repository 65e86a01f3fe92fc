#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use worktrack::auth::password::hash_password;
use worktrack::cli::commands::serve::serve_with_shutdown;
use worktrack::config::Config;
use worktrack::db::DbPool;
use worktrack::db::migrate::run_pending_migrations;
use worktrack::db::queries::users;
use worktrack::errors::AppResult;
use worktrack::http::AppState;
use worktrack::models::role::Role;

pub const TEST_SECRET: &str = "integration-secret";

pub fn wt() -> Command {
    cargo_bin_cmd!("worktrack")
}

/// Fresh temp dir used as HOME plus a database path inside it.
pub fn setup_test_home() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("worktrack.sqlite");
    (dir, db.to_string_lossy().to_string())
}

/// CLI command isolated from the real user profile.
pub fn wt_in(home: &TempDir) -> Command {
    let mut cmd = wt();
    let cfg: PathBuf = home.path().join("worktrack.conf");
    cmd.env("HOME", home.path())
        .env("WORKTRACK_CONFIG", cfg)
        .env_remove("WORKTRACK_DB")
        .env_remove("WORKTRACK_AUTH");
    cmd
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<AppResult<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seed a user straight through the executor; returns its id.
    pub async fn add_user(&self, login: &str, password: &str, role: Role) -> i64 {
        let login = login.to_string();
        let hash = hash_password(password);
        self.state
            .db
            .run(move |conn| users::insert(conn, &login, &login, &hash, role))
            .await
            .expect("insert user")
    }

    pub async fn stop(mut self) -> AppResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("server task")
    }
}

pub async fn spawn_server(auth_enabled: bool) -> TestServer {
    spawn_server_with(auth_enabled, |_| {}).await
}

/// Like `spawn_server`, with a hook to adjust the config first
/// (e.g. a short `heartbeat_secs`).
pub async fn spawn_server_with(auth_enabled: bool, tweak: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("server.sqlite").to_string_lossy().to_string();

    let mut cfg = Config {
        database: db,
        bind: "127.0.0.1:0".into(),
        pool_size: 2,
        auth_enabled,
        token_secret: TEST_SECRET.into(),
        debounce_ms: 20,
        shutdown_grace_ms: 500,
        ..Config::default()
    };
    tweak(&mut cfg);

    let pool = DbPool::open(&cfg.database, cfg.pool_size).expect("pool");
    pool.run(|conn| run_pending_migrations(&conn))
        .await
        .expect("migrate");
    let state = AppState::build(cfg, pool).await.expect("state");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve_with_shutdown(listener, state.clone(), async move {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        state,
        shutdown: Some(tx),
        handle,
        _dir: dir,
    }
}

pub async fn login(server: &TestServer, login: &str, password: &str) -> String {
    let res: serde_json::Value = reqwest::Client::new()
        .post(server.url("/api/auth/login"))
        .json(&serde_json::json!({ "login": login, "password": password }))
        .send()
        .await
        .expect("login request")
        .json()
        .await
        .expect("login body");
    res["token"].as_str().expect("token").to_string()
}

// ---------------------------------------------------------------------------
// WebSocket client for the desktop channel.
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping,
    Close(Option<u16>),
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsClient {
    socket: Socket,
}

/// Perform the upgrade handshake. Returns the HTTP status code and, on 101,
/// a connected client.
pub async fn ws_connect(addr: SocketAddr, path_and_query: &str) -> (u16, Option<WsClient>) {
    match connect_async(format!("ws://{addr}{path_and_query}")).await {
        Ok((socket, res)) => (res.status().as_u16(), Some(WsClient { socket })),
        Err(WsError::Http(res)) => (res.status().as_u16(), None),
        Err(e) => panic!("websocket handshake failed: {e}"),
    }
}

impl WsClient {
    pub async fn send_text(&mut self, text: &str) {
        self.socket
            .send(Message::text(text))
            .await
            .expect("frame write");
    }

    /// Next data or control frame; `None` once the socket is closed. Pings
    /// are answered by the client library while reading.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.socket.next().await?.ok()? {
                Message::Text(t) => return Some(Frame::Text(t.as_str().to_string())),
                Message::Ping(_) => return Some(Frame::Ping),
                Message::Close(frame) => return Some(Frame::Close(frame.map(|f| u16::from(f.code)))),
                _ => continue,
            }
        }
    }

    /// Next text frame parsed as JSON, skipping pings. Panics after `wait`.
    pub async fn next_json(&mut self, wait: Duration) -> serde_json::Value {
        let read = async {
            loop {
                match self.next_frame().await {
                    Some(Frame::Text(t)) => return serde_json::from_str(&t).expect("json frame"),
                    Some(Frame::Ping) => continue,
                    other => panic!("expected text frame, got {other:?}"),
                }
            }
        };
        tokio::time::timeout(wait, read).await.expect("frame in time")
    }

    /// Keep reading (and so answering pings) until the socket closes.
    pub fn read_until_closed(mut self) -> JoinHandle<()> {
        tokio::spawn(async move { while self.next_frame().await.is_some() {} })
    }
}

/// Poll `check` until it holds or `wait` elapses.
pub async fn eventually(wait: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}
