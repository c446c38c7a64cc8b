//! Registration-time routing errors.
//!
//! Every variant is fatal: the caller is expected to abort startup rather
//! than serve traffic with a partially registered route table.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("HTTP method {0:?} is not allowed for route registration")]
    UnsupportedMethod(String),

    #[error("route pattern {pattern:?} has a parameter segment without a name")]
    EmptyParamName { pattern: String },

    #[error(
        "route pattern {pattern:?} declares {segment:?} where {existing:?} is already registered at the same depth"
    )]
    WildcardConflict {
        pattern: String,
        segment: String,
        existing: String,
    },

    #[error("URL parameters can not be used when serving a static folder: {0:?}")]
    StaticMountParams(String),
}
