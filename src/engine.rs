//! Dispatch engine.
//!
//! # Data Flow
//! ```text
//! RequestParts
//!     → collect middlewares of every group whose prefix matches the path
//!     → Router::resolve appends the route handler (or the 404 responder)
//!     → Context::next runs the chain
//!     → ResponseWriter
//! ```
//!
//! # Design Decisions
//! - Registration state sits behind one `RwLock`. Dispatch takes the read
//!   lock only to assemble the chain and releases it before any handler runs.
//! - The engine dereferences to its root group, so routes and middlewares can
//!   be registered on it directly.
//! - Config is owned by the engine and shared with every context; there is no
//!   process-wide state, so several engines can coexist in one process.

use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::config::AppConfig;
use crate::http::context::{Context, HandlerFunc};
use crate::http::request::RequestParts;
use crate::http::response::ResponseWriter;
use crate::http::server;
use crate::middleware;
use crate::routing::group::RouterGroup;
use crate::routing::router::{RouteInfo, Router};

/// One entry of the engine's flat group list.
pub(crate) struct GroupEntry {
    pub(crate) prefix: String,
    pub(crate) middlewares: Vec<HandlerFunc>,
}

impl GroupEntry {
    pub(crate) fn new(prefix: String) -> Self {
        Self {
            prefix,
            middlewares: Vec::new(),
        }
    }
}

/// Everything registration writes and dispatch reads.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) router: Router,
    pub(crate) groups: Vec<GroupEntry>,
}

impl Registry {
    /// Middlewares of every group whose prefix matches `path`, in group
    /// creation order, then registration order within a group.
    fn middlewares_for(&self, path: &str) -> Vec<HandlerFunc> {
        self.groups
            .iter()
            .filter(|group| path.starts_with(&group.prefix))
            .flat_map(|group| group.middlewares.iter().cloned())
            .collect()
    }
}

#[derive(Clone)]
pub struct Engine {
    root: RouterGroup,
    registry: Arc<RwLock<Registry>>,
    config: Arc<AppConfig>,
}

impl Engine {
    /// Create an engine with an empty root group and no middleware.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(RwLock::new(Registry {
            router: Router::new(),
            groups: vec![GroupEntry::new(String::new())],
        }));
        let root = RouterGroup::new(String::new(), 0, Arc::clone(&registry), Arc::clone(&config));

        tracing::debug!(app = %config.app_name, mode = %config.run_mode, "Engine created");
        Self { root, registry, config }
    }

    /// Create an engine with the access logger and panic recovery installed.
    pub fn with_defaults(config: AppConfig) -> Self {
        let engine = Self::new(config);
        engine
            .use_middleware(middleware::logger::logger)
            .use_middleware(middleware::recovery::recovery);
        engine
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Every registered route, grouped by method.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.read_registry().router.all_routes()
    }

    /// Run one request through its middleware and route handler.
    ///
    /// Handlers run on the calling thread; async callers should use
    /// [`HttpServer`](crate::http::HttpServer) or wrap this in
    /// `spawn_blocking`.
    pub fn handle_request(&self, request: RequestParts) -> ResponseWriter {
        let mut ctx = {
            let registry = self.read_registry();
            let middlewares = registry.middlewares_for(request.path());
            let mut ctx = Context::new(request, Arc::clone(&self.config)).with_handlers(middlewares);
            registry.router.resolve(&mut ctx);
            ctx
        };

        ctx.next();
        ctx.into_writer()
    }

    /// An axum router that sends every request through this engine.
    pub fn into_router(self) -> axum::Router {
        server::build_router(self)
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Deref for Engine {
    type Target = RouterGroup;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}
