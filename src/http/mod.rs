//! HTTP request/response handling.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum fallback, request ID, body limit)
//!     → request.rs (RequestParts)
//!     → engine (middleware collection, route resolution)
//!     → context.rs (handler chain, accessors, response helpers)
//!     → response.rs (buffered writer → Axum response)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use context::{ChainState, Context, Cookie, HandlerFunc, SameSite};
pub use request::{RequestParts, X_REQUEST_ID};
pub use response::ResponseWriter;
pub use server::{HttpServer, ServerError};
