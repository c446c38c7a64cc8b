//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (startup):
//!     RouterGroup::get/post/... (prefix + component)
//!     → router.rs (validate method and pattern)
//!     → trie.rs (one segment per level, per method)
//!
//! Lookup (per request):
//!     method + path
//!     → trie.rs (first matching child wins, with backtracking)
//!     → router.rs (bind `:name` / `*name` variables, pick handler)
//! ```
//!
//! # Design Decisions
//! - Sibling order is registration order; it decides precedence between
//!   overlapping literal and wildcard patterns at the same depth
//! - Registration errors are fatal and reported as `RouteError`

pub mod error;
pub mod group;
pub mod router;
pub mod trie;

pub use error::RouteError;
pub use group::RouterGroup;
pub use router::{RouteInfo, Router};
pub use trie::Node;
