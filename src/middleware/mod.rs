//! Built-in middlewares.
//!
//! Both are plain handler functions and can be installed on any group with
//! `use_middleware`. `Engine::with_defaults` installs them on the root group,
//! logger first so the access line reflects what recovery wrote.

pub mod logger;
pub mod recovery;

pub use logger::logger;
pub use recovery::recovery;
