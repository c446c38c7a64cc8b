//! Shared helpers for integration tests.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use waypoint::{AppConfig, Engine, HttpServer, Shutdown};

/// Test-mode config; defaults elsewhere.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        app_name: "waypoint-test".into(),
        run_mode: waypoint::config::RunMode::Test,
        ..Default::default()
    }
}

/// Send one request through the engine's axum router without a socket.
#[allow(dead_code)]
pub async fn send(engine: &Engine, method: Method, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap();
    engine.clone().into_router().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A server running on an ephemeral local port.
#[allow(dead_code)]
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap();
    }
}

/// Start `engine` behind a real listener on `127.0.0.1:0`.
#[allow(dead_code)]
pub async fn start_server(engine: Engine) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        HttpServer::new(engine).run(listener, receiver).await.unwrap();
    });

    RunningServer { addr, shutdown, handle }
}
