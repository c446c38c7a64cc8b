//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine, server, config loader, middlewares
//!     → logging.rs (tracing subscriber: env filter + fmt/JSON output)
//!     → metrics.rs (request counter + latency histogram)
//!
//! Consumers:
//!     → stdout log lines
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Access lines use the `waypoint::access` target so they can be filtered
//!   independently of framework diagnostics
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
