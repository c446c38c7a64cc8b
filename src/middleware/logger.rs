//! Access logging.
//!
//! Emits one `waypoint::access` event per request once the rest of the chain
//! has finished, and records the request metrics.

use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};

use crate::http::context::Context;
use crate::observability::metrics;

/// What the access line reports about one finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub status: StatusCode,
    pub latency: Duration,
    pub client_ip: String,
    pub method: Method,
    /// Path as received (still percent-encoded), with its query string.
    pub path: String,
    pub body_size: usize,
    pub keys: Vec<String>,
    pub errors: String,
}

impl AccessRecord {
    pub fn from_context(c: &Context, latency: Duration) -> Self {
        let raw_path = c.request().raw_path();
        let path = match c.uri().query() {
            Some(query) => format!("{}?{}", raw_path, query),
            None => raw_path.to_string(),
        };

        Self {
            status: c.status_code(),
            latency,
            client_ip: c.client_ip(),
            method: c.method().clone(),
            path,
            body_size: c.writer().size(),
            keys: c.keys_snapshot(),
            errors: c.errors().join("; "),
        }
    }
}

pub fn logger(c: &mut Context) {
    let start = Instant::now();
    c.next();

    let record = AccessRecord::from_context(c, start.elapsed());
    tracing::info!(
        target: "waypoint::access",
        status = record.status.as_u16(),
        latency = ?record.latency,
        client_ip = %record.client_ip,
        method = %record.method,
        path = %record.path,
        body_size = record.body_size,
        keys = ?record.keys,
        request_id = c.request_id().unwrap_or_default(),
        errors = %record.errors,
        "Request completed"
    );
    metrics::record_request(record.method.as_str(), record.status.as_u16(), start);
}
