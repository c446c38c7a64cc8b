//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap an [`Engine`] in an Axum router with timeout and trace layers
//! - Assign and echo a request ID for every request
//! - Buffer the request body under the configured limit
//! - Run the handler chain on a blocking worker
//! - Serve until the shutdown broadcast fires, then drain

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::engine::Engine;
use crate::http::request::{RequestParts, X_REQUEST_ID};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP front end for an engine.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(engine: Engine) -> Self {
        Self {
            router: build_router(engine),
        }
    }

    /// Bind a TCP listener on `address`.
    pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
        TcpListener::bind(address).await.map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
    }

    /// Serve on `listener` until `shutdown` receives a value (or its sender
    /// is dropped), then let in-flight requests finish.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub(crate) fn build_router(engine: Engine) -> Router {
    let timeout = Duration::from_secs(engine.config().timeouts.request_secs);
    Router::new()
        .fallback(dispatch)
        .with_state(engine)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(engine): State<Engine>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (mut parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(new_request_id);
    parts.headers.insert(X_REQUEST_ID, request_id.clone());

    let limit = engine.config().limits.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = ?request_id, limit, error = %e, "Rejected request body");
            let mut response = (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            response.headers_mut().insert(X_REQUEST_ID, request_id);
            return response;
        }
    };

    let method = parts.method.clone();
    let request = RequestParts::from_parts(parts.method, parts.uri, parts.headers, body, remote_addr);

    let worker = engine.clone();
    let mut response = match tokio::task::spawn_blocking(move || worker.handle_request(request)).await {
        Ok(writer) => writer.into_response(&method),
        Err(e) => {
            tracing::error!(request_id = ?request_id, error = %e, "Handler chain did not complete");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    };
    response.headers_mut().insert(X_REQUEST_ID, request_id);
    response
}

fn new_request_id() -> HeaderValue {
    HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
