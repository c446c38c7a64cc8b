//! Per-method route table.
//!
//! # Responsibilities
//! - Keep one segment trie per HTTP method
//! - Map `METHOD-pattern` keys to terminal handlers
//! - Resolve a request to its handler and path-variable bindings
//!
//! # Design Decisions
//! - A routing miss is not an error; it resolves to a 404 handler
//! - Populated during startup, read-only while serving

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::http::context::{Context, HandlerFunc};
use crate::routing::error::RouteError;
use crate::routing::trie::Node;

/// Methods accepted for route registration.
pub const HTTP_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::HEAD,
];

/// Parse a method name for registration (case-insensitive).
pub fn parse_method(name: &str) -> Result<Method, RouteError> {
    let upper = name.to_ascii_uppercase();
    HTTP_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| RouteError::UnsupportedMethod(name.to_string()))
}

/// Split a pattern or path into non-empty segments.
///
/// The list is cut after the first `*` segment: a wildcard consumes the rest
/// of the path and is always the last recognised segment.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for item in pattern.split('/').filter(|s| !s.is_empty()) {
        parts.push(item);
        if item.starts_with('*') {
            break;
        }
    }
    parts
}

/// A registered route, as listed by [`Router::all_routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: String,
}

#[derive(Default)]
pub struct Router {
    roots: HashMap<Method, Node>,
    handlers: HashMap<String, HandlerFunc>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, method: Method, pattern: &str, handler: HandlerFunc) -> Result<(), RouteError> {
        if !HTTP_METHODS.contains(&method) {
            return Err(RouteError::UnsupportedMethod(method.to_string()));
        }

        let parts = parse_pattern(pattern);
        if parts.iter().any(|p| is_unnamed_param(p)) {
            return Err(RouteError::EmptyParamName {
                pattern: pattern.to_string(),
            });
        }
        let parts: Vec<String> = parts.into_iter().map(String::from).collect();

        self.roots
            .entry(method.clone())
            .or_default()
            .insert(pattern, &parts, 0)?;
        self.handlers.insert(handler_key(&method, pattern), handler);
        Ok(())
    }

    /// Look up `path` under `method`, returning the terminal node and the
    /// bound path variables.
    pub fn get_route(&self, method: &Method, path: &str) -> Option<(&Node, HashMap<String, String>)> {
        let search_parts = parse_pattern(path);
        let root = self.roots.get(method)?;
        let node = root.search(&search_parts, 0)?;

        let mut params = HashMap::new();
        for (index, part) in parse_pattern(node.pattern()).iter().enumerate() {
            if let Some(name) = part.strip_prefix(':') {
                let Some(value) = search_parts.get(index) else {
                    break;
                };
                // `:id.html` binds only what precedes the first `.`
                match name.find('.') {
                    Some(dot) => {
                        let value = value.find('.').map_or(*value, |v| &value[..v]);
                        params.insert(name[..dot].to_string(), value.to_string());
                    }
                    None => {
                        params.insert(name.to_string(), value.to_string());
                    }
                }
            }
            if let Some(name) = part.strip_prefix('*') {
                if !name.is_empty() {
                    let rest = search_parts.get(index..).unwrap_or_default();
                    params.insert(name.to_string(), rest.join("/"));
                }
                break;
            }
        }

        Some((node, params))
    }

    /// Every node terminating a pattern for `method`, in trie pre-order.
    pub fn routes(&self, method: &Method) -> Vec<&Node> {
        let mut nodes = Vec::new();
        if let Some(root) = self.roots.get(method) {
            root.travel(&mut nodes);
        }
        nodes
    }

    pub fn all_routes(&self) -> Vec<RouteInfo> {
        HTTP_METHODS
            .iter()
            .flat_map(|method| {
                self.routes(method).into_iter().map(move |node| RouteInfo {
                    method: method.clone(),
                    pattern: node.pattern().to_string(),
                })
            })
            .collect()
    }

    /// Append the terminal handler for the context's request to its chain:
    /// the registered handler with its path variables, or a 404 responder.
    /// Returns whether a route matched.
    pub fn resolve(&self, ctx: &mut Context) -> bool {
        let method = ctx.method().clone();
        let path = ctx.path().to_string();

        let matched = self.get_route(&method, &path).and_then(|(node, params)| {
            self.handlers
                .get(&handler_key(&method, node.pattern()))
                .map(|handler| (Arc::clone(handler), params))
        });

        match matched {
            Some((handler, params)) => {
                ctx.set_params(params);
                ctx.push_handler(handler);
                true
            }
            None => {
                ctx.push_handler(Arc::new(move |c: &mut Context| {
                    c.string(StatusCode::NOT_FOUND, format!("404 NOT FOUND: {} \n", path));
                }));
                false
            }
        }
    }

    /// Resolve the route and run the context's chain once.
    pub fn handle(&self, ctx: &mut Context) {
        self.resolve(ctx);
        ctx.next();
    }
}

/// `:` or `:.ext`: a parameter segment that would bind an empty key.
fn is_unnamed_param(part: &str) -> bool {
    part.strip_prefix(':')
        .is_some_and(|name| name.split('.').next().map_or(true, str::is_empty))
}

fn handler_key(method: &Method, pattern: &str) -> String {
    format!("{}-{}", method, pattern)
}
