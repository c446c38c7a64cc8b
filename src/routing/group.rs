//! Route groups.
//!
//! A group is a path prefix plus an ordered list of middlewares. Groups nest:
//! a child's prefix is its parent's prefix followed by its own suffix.
//!
//! # Design Decisions
//! - Every group lives in the engine's flat group list for the engine's
//!   lifetime. Dispatch applies the middlewares of *every* group whose prefix
//!   is a string prefix of the request path, not only the ancestors of the
//!   matched route.
//! - A `RouterGroup` is a cheap handle (prefix + index into that list), so it
//!   can be cloned and passed around freely during setup.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use axum::http::Method;

use crate::config::AppConfig;
use crate::engine::{GroupEntry, Registry};
use crate::http::context::{Context, HandlerFunc};
use crate::http::static_files::{self, FILEPATH_PARAM};
use crate::routing::error::RouteError;
use crate::routing::router::{self, HTTP_METHODS};

#[derive(Clone)]
pub struct RouterGroup {
    prefix: String,
    index: usize,
    registry: Arc<RwLock<Registry>>,
    config: Arc<AppConfig>,
}

impl RouterGroup {
    pub(crate) fn new(prefix: String, index: usize, registry: Arc<RwLock<Registry>>, config: Arc<AppConfig>) -> Self {
        Self {
            prefix,
            index,
            registry,
            config,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create a child group at `self.prefix + prefix`.
    pub fn group(&self, prefix: &str) -> RouterGroup {
        let prefix = format!("{}{}", self.prefix, prefix);
        let index = {
            let mut registry = self.write_registry();
            registry.groups.push(GroupEntry::new(prefix.clone()));
            registry.groups.len() - 1
        };
        tracing::debug!(prefix = %prefix, parent = %self.prefix, "Route group created");
        RouterGroup::new(prefix, index, Arc::clone(&self.registry), Arc::clone(&self.config))
    }

    /// Append a middleware to this group.
    ///
    /// It runs for every request whose path starts with the group prefix,
    /// ahead of middlewares registered later or on later-created groups.
    pub fn use_middleware<F>(&self, middleware: F) -> &Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.use_handler(Arc::new(middleware))
    }

    pub fn use_handler(&self, middleware: HandlerFunc) -> &Self {
        if let Some(group) = self.write_registry().groups.get_mut(self.index) {
            group.middlewares.push(middleware);
        }
        self
    }

    /// Register `handler` for a method given by name (case-insensitive).
    pub fn handle<F>(&self, method: &str, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let method = router::parse_method(method)?;
        self.add_route(method, pattern, Arc::new(handler))
    }

    pub fn get<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::GET, pattern, Arc::new(handler))
    }

    pub fn post<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::POST, pattern, Arc::new(handler))
    }

    pub fn put<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, pattern, Arc::new(handler))
    }

    pub fn delete<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, pattern, Arc::new(handler))
    }

    pub fn patch<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, pattern, Arc::new(handler))
    }

    pub fn options<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::OPTIONS, pattern, Arc::new(handler))
    }

    pub fn head<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::HEAD, pattern, Arc::new(handler))
    }

    /// Register the same handler under every supported method.
    pub fn any<F>(&self, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let handler: HandlerFunc = Arc::new(handler);
        for method in HTTP_METHODS {
            self.add_route(method, pattern, Arc::clone(&handler))?;
        }
        Ok(())
    }

    /// Serve the files below `root` at `self.prefix + relative`.
    pub fn static_dir(&self, relative: &str, root: &str) -> Result<(), RouteError> {
        if relative.contains(':') || relative.contains('*') {
            return Err(RouteError::StaticMountParams(relative.to_string()));
        }
        let pattern = format!("{}/*{}", relative.trim_end_matches('/'), FILEPATH_PARAM);
        let handler = static_files::serve_dir(root);

        self.add_route(Method::GET, &pattern, Arc::clone(&handler))?;
        self.add_route(Method::HEAD, &pattern, handler)
    }

    /// Register a route at `self.prefix + component`.
    pub fn add_route(&self, method: Method, component: &str, handler: HandlerFunc) -> Result<(), RouteError> {
        let pattern = format!("{}{}", self.prefix, component);
        if self.config.is_debugging() {
            tracing::debug!("Route {:>7} - {}", method, pattern);
        }
        self.write_registry().router.add_route(method, &pattern, handler)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::http::request::RequestParts;
    use axum::http::StatusCode;

    #[test]
    fn test_nested_prefixes() {
        let engine = Engine::new(AppConfig::default());
        let v1 = engine.group("/v1");
        let users = v1.group("/users");
        assert_eq!(v1.prefix(), "/v1");
        assert_eq!(users.prefix(), "/v1/users");

        users.get("/:id", |c: &mut Context| {
            let id = c.param("id").to_string();
            c.string(StatusCode::OK, id);
        })
        .unwrap();

        let routes = engine.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pattern, "/v1/users/:id");

        let writer = engine.handle_request(RequestParts::new(Method::GET, "/v1/users/42"));
        assert_eq!(writer.body(), b"42");
    }

    #[test]
    fn test_handle_by_method_name() {
        let engine = Engine::new(AppConfig::default());
        engine.handle("put", "/item", |c: &mut Context| c.status(StatusCode::NO_CONTENT)).unwrap();
        assert_eq!(
            engine.handle("TRACE", "/item", |_: &mut Context| {}).unwrap_err(),
            RouteError::UnsupportedMethod("TRACE".into())
        );

        let writer = engine.handle_request(RequestParts::new(Method::PUT, "/item"));
        assert_eq!(writer.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_any_registers_every_method() {
        let engine = Engine::new(AppConfig::default());
        engine.any("/ping", |c: &mut Context| c.string(StatusCode::OK, "pong")).unwrap();

        assert_eq!(engine.routes().len(), HTTP_METHODS.len());
        for method in HTTP_METHODS {
            let writer = engine.handle_request(RequestParts::new(method, "/ping"));
            assert_eq!(writer.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_static_dir_rejects_params() {
        let engine = Engine::new(AppConfig::default());
        assert_eq!(
            engine.static_dir("/assets/:kind", "/tmp").unwrap_err(),
            RouteError::StaticMountParams("/assets/:kind".into())
        );
        assert!(engine.static_dir("/files/*", "/tmp").is_err());

        engine.group("/ui").static_dir("/assets/", "/tmp").unwrap();
        let patterns: Vec<_> = engine.routes().into_iter().map(|r| (r.method, r.pattern)).collect();
        assert_eq!(
            patterns,
            vec![
                (Method::GET, "/ui/assets/*filepath".to_string()),
                (Method::HEAD, "/ui/assets/*filepath".to_string()),
            ]
        );
    }
}
