//! Waypoint: a small HTTP routing engine on Tokio and Axum.
//!
//! Routes are stored in one segment trie per method, grouped under shared
//! prefixes with ordered middleware, and dispatched through a per-request
//! [`Context`](http::Context) that walks the handler chain.

pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use config::AppConfig;
pub use engine::Engine;
pub use http::{Context, HandlerFunc, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{RouteError, RouterGroup};
