//! Waypoint demo server.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ HttpServer (axum + tower layers, request ID, body limit)
//!                         │
//!                         ▼
//!                     Engine ── group prefixes ──▶ middlewares (logger, recovery, ...)
//!                         │
//!                         ▼
//!                     Router (per-method trie) ──▶ route handler or 404
//!                         │
//!     Client Response     ▼
//!     ◀────────────── ResponseWriter
//! ```

use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;

use waypoint::config::{load_config, AppConfig};
use waypoint::lifecycle::{signals, Shutdown};
use waypoint::observability::{logging, metrics};
use waypoint::{Context, Engine, HttpServer, RouteError};

#[derive(Parser, Debug)]
#[command(name = "waypoint", version, about = "Waypoint demo HTTP server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory served under `/static`.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waypoint starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        run_mode = %config.run_mode,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_bytes = config.limits.max_body_bytes,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let engine = Engine::with_defaults(config);
    register_routes(&engine, cli.static_dir.as_deref())?;
    for route in engine.routes() {
        tracing::info!(method = %route.method, pattern = %route.pattern, "Route registered");
    }

    let listener = HttpServer::bind(&bind_address).await?;
    let shutdown = Shutdown::new();
    let server = HttpServer::new(engine);
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));
    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(engine: &Engine, static_dir: Option<&std::path::Path>) -> Result<(), RouteError> {
    engine.get("/", |c: &mut Context| {
        c.html(StatusCode::OK, "<h1>Waypoint</h1>");
    })?;

    engine.get("/hello/:name", |c: &mut Context| {
        let greeting = format!("hello {}, you're at {}", c.param("name"), c.path());
        c.string(StatusCode::OK, greeting);
    })?;

    let api = engine.group("/api/v1");
    api.use_middleware(|c: &mut Context| {
        let Some(token) = c.request_header("authorization").map(str::to_string) else {
            c.fail(StatusCode::UNAUTHORIZED, "missing authorization header");
            return;
        };
        c.set("token", token);
    });
    api.get("/whoami", |c: &mut Context| {
        let body = serde_json::json!({ "token": c.get_string("token"), "client_ip": c.client_ip() });
        c.json(StatusCode::OK, &body);
    })?;
    api.post("/echo", |c: &mut Context| match c.bind_json::<serde_json::Value>() {
        Ok(value) => c.json(StatusCode::OK, &value),
        Err(e) => c.fail(StatusCode::BAD_REQUEST, e.to_string()),
    })?;

    if let Some(dir) = static_dir {
        engine.static_dir("/static", &dir.to_string_lossy())?;
    }
    Ok(())
}
