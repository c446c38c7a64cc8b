//! Per-request context and handler chain execution.
//!
//! # Responsibilities
//! - Walk the resolved handler chain (`next`) and stop it (`abort`)
//! - Expose path variables, query/form/body accessors and request facts
//! - Buffer the response through the write helpers
//! - Carry a lock-guarded metadata bag for the lifetime of the request
//!
//! # Chain State
//! ```text
//! Pending ──next──▶ Running(i) ──▶ Exhausted   (every handler ran)
//!                        └──abort──▶ Aborted
//! ```
//! `next` is re-entrant: a handler may call it to run everything downstream
//! and then continue with its own post-processing. Exhausted and Aborted are
//! terminal; further `next` calls are no-ops.

use std::any::Any;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use axum::body::Bytes;
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AppConfig;
use crate::http::request::{self, FormValues, RequestParts, X_REQUEST_ID};
use crate::http::response::ResponseWriter;

/// A route handler or middleware.
pub type HandlerFunc = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Where a context's cursor stands in its handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Running(usize),
    Exhausted,
    Aborted,
}

/// SameSite attribute applied to cookies written by [`Context::set_cookie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Default,
    Lax,
    Strict,
    None,
}

/// Options for [`Context::set_cookie`].
#[derive(Debug, Clone, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// `Some(n)` with n > 0 sets Max-Age, n <= 0 expires the cookie.
    pub max_age: Option<i64>,
    /// Defaults to `/` when empty.
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
}

type MetadataValue = Arc<dyn Any + Send + Sync>;

pub struct Context {
    request: RequestParts,
    writer: ResponseWriter,
    config: Arc<AppConfig>,
    params: HashMap<String, String>,
    handlers: Vec<HandlerFunc>,
    state: ChainState,
    keys: RwLock<HashMap<String, MetadataValue>>,
    errors: Vec<String>,
    query_cache: OnceLock<FormValues>,
    post_form_cache: OnceLock<FormValues>,
    same_site: SameSite,
}

impl Context {
    pub fn new(request: RequestParts, config: Arc<AppConfig>) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            config,
            params: HashMap::new(),
            handlers: Vec::new(),
            state: ChainState::Pending,
            keys: RwLock::new(HashMap::new()),
            errors: Vec::new(),
            query_cache: OnceLock::new(),
            post_form_cache: OnceLock::new(),
            same_site: SameSite::Default,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(request: RequestParts) -> Self {
        Self::new(request, Arc::new(AppConfig::default()))
    }

    pub(crate) fn with_handlers(mut self, handlers: Vec<HandlerFunc>) -> Self {
        self.handlers = handlers;
        self
    }

    pub(crate) fn push_handler(&mut self, handler: HandlerFunc) {
        self.handlers.push(handler);
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    // ---------------------------------------------------------------------
    // Flow control
    // ---------------------------------------------------------------------

    /// Run the remaining handlers in order.
    ///
    /// Called by the engine once to start the chain, and by middleware that
    /// needs to act after everything downstream has finished.
    pub fn next(&mut self) {
        let mut index = match self.state {
            ChainState::Pending => 0,
            ChainState::Running(i) => i + 1,
            ChainState::Exhausted | ChainState::Aborted => return,
        };

        loop {
            let Some(handler) = self.handlers.get(index).cloned() else {
                self.state = ChainState::Exhausted;
                return;
            };
            self.state = ChainState::Running(index);
            handler(self);

            // a nested `next` or an `abort` has already settled the chain
            index = match self.state {
                ChainState::Running(i) => i + 1,
                _ => return,
            };
        }
    }

    /// Prevent pending handlers from running. The current handler is not
    /// interrupted.
    pub fn abort(&mut self) {
        self.state = ChainState::Aborted;
    }

    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.status(code);
        self.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.state == ChainState::Aborted
    }

    pub fn chain_state(&self) -> ChainState {
        self.state
    }

    /// Abort the chain and answer with `{"message": message}`.
    pub fn fail(&mut self, code: StatusCode, message: impl Into<String>) {
        let message: String = message.into();
        self.abort();
        self.json(code, &serde_json::json!({ "message": message }));
    }

    /// Record an error for this request; the logger reports them.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
    }

    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get::<String>(key)
            .or_else(|| self.get::<&'static str>(key).map(String::from))
            .unwrap_or_default()
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get::<i64>(key).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get::<bool>(key).unwrap_or_default()
    }

    /// Names of all metadata entries, sorted.
    pub fn keys_snapshot(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    pub fn request(&self) -> &RequestParts {
        &self.request
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Percent-decoded request path, as used for routing.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Path variable bound by the matched route, empty if absent.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map_or("", String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn query(&self, key: &str) -> String {
        self.get_query(key).unwrap_or_default()
    }

    pub fn default_query(&self, key: &str, default: &str) -> String {
        self.get_query(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_query(&self, key: &str) -> Option<String> {
        self.get_query_array(key).and_then(|v| v.first().cloned())
    }

    pub fn query_array(&self, key: &str) -> Vec<String> {
        self.get_query_array(key).unwrap_or_default()
    }

    pub fn get_query_array(&self, key: &str) -> Option<Vec<String>> {
        non_empty(self.query_values().get(key))
    }

    fn query_values(&self) -> &FormValues {
        self.query_cache
            .get_or_init(|| request::parse_values(self.request.uri().query().unwrap_or_default()))
    }

    pub fn post_form(&self, key: &str) -> String {
        self.get_post_form(key).unwrap_or_default()
    }

    pub fn default_post_form(&self, key: &str, default: &str) -> String {
        self.get_post_form(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_post_form(&self, key: &str) -> Option<String> {
        self.get_post_form_array(key).and_then(|v| v.first().cloned())
    }

    pub fn post_form_array(&self, key: &str) -> Vec<String> {
        self.get_post_form_array(key).unwrap_or_default()
    }

    pub fn get_post_form_array(&self, key: &str) -> Option<Vec<String>> {
        non_empty(self.post_form_values().get(key))
    }

    fn post_form_values(&self) -> &FormValues {
        self.post_form_cache.get_or_init(|| {
            let has_form_body = matches!(
                self.request.method,
                Method::POST | Method::PUT | Method::PATCH
            ) && self
                .request_header(header::CONTENT_TYPE.as_str())
                .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

            if !has_form_body {
                return FormValues::new();
            }
            match std::str::from_utf8(&self.request.body) {
                Ok(body) => request::parse_values(body),
                Err(e) => {
                    tracing::debug!(error = %e, "Form body is not valid UTF-8");
                    FormValues::new()
                }
            }
        })
    }

    pub fn body(&self) -> &Bytes {
        &self.request.body
    }

    /// Deserialize the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.request.body)
    }

    pub fn request_header(&self, key: &str) -> Option<&str> {
        self.request.header(key)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_header(X_REQUEST_ID)
    }

    pub fn is_ajax(&self) -> bool {
        self.request_header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn is_upload(&self) -> bool {
        self.request_header(header::CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.contains("multipart/form-data"))
    }

    /// Best-effort client address.
    ///
    /// Proxy headers are consulted only when enabled in the client-ip config;
    /// the transport peer address is the fallback.
    pub fn client_ip(&self) -> String {
        let settings = &self.config.client_ip;
        if settings.forwarded_by_client_ip {
            let forwarded = self
                .request_header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .or_else(|| {
                    self.request_header("x-real-ip")
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                });
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }

        if settings.app_engine {
            if let Some(addr) = self.request_header("x-appengine-remote-addr").filter(|v| !v.is_empty()) {
                return addr.to_string();
            }
        }

        self.request
            .remote_addr
            .as_ref()
            .map(SocketAddr::ip)
            .map(|ip: IpAddr| ip.to_string())
            .unwrap_or_default()
    }

    /// Named request cookie, percent-decoded.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.request
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| request::query_unescape(v))
    }

    // ---------------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------------

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    pub fn into_writer(self) -> ResponseWriter {
        self.writer
    }

    pub fn status_code(&self) -> StatusCode {
        self.writer.status()
    }

    pub fn status(&mut self, code: StatusCode) {
        self.writer.set_status(code);
    }

    /// Set a response header; an empty value removes it.
    pub fn header(&mut self, key: &str, value: &str) {
        let Ok(name) = HeaderName::try_from(key) else {
            tracing::warn!(header = %key, "Ignoring invalid response header name");
            return;
        };
        if value.is_empty() {
            self.writer.headers_mut().remove(&name);
            return;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.writer.headers_mut().insert(name, value);
            }
            Err(_) => tracing::warn!(header = %key, "Ignoring invalid response header value"),
        }
    }

    pub fn set_same_site(&mut self, same_site: SameSite) {
        self.same_site = same_site;
    }

    /// Append a `Set-Cookie` header. The value is percent-encoded.
    pub fn set_cookie(&mut self, cookie: Cookie) {
        let mut line = format!("{}={}", cookie.name, request::query_escape(&cookie.value));
        let path = if cookie.path.is_empty() { "/" } else { cookie.path.as_str() };
        line.push_str(&format!("; Path={}", path));
        if !cookie.domain.is_empty() {
            line.push_str(&format!("; Domain={}", cookie.domain));
        }
        match cookie.max_age {
            Some(age) if age > 0 => line.push_str(&format!("; Max-Age={}", age)),
            Some(_) => line.push_str("; Max-Age=0"),
            None => {}
        }
        if cookie.http_only {
            line.push_str("; HttpOnly");
        }
        if cookie.secure {
            line.push_str("; Secure");
        }
        match self.same_site {
            SameSite::Default => {}
            SameSite::Lax => line.push_str("; SameSite=Lax"),
            SameSite::Strict => line.push_str("; SameSite=Strict"),
            SameSite::None => line.push_str("; SameSite=None"),
        }

        match HeaderValue::from_str(&line) {
            Ok(value) => {
                self.writer.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %cookie.name, "Dropping invalid cookie"),
        }
    }

    pub fn data(&mut self, code: StatusCode, data: &[u8]) {
        self.status(code);
        self.writer.write(data);
    }

    pub fn string(&mut self, code: StatusCode, body: impl AsRef<str>) {
        self.header(header::CONTENT_TYPE.as_str(), "text/plain");
        self.data(code, body.as_ref().as_bytes());
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.header(header::CONTENT_TYPE.as_str(), "application/json");
                self.data(code, &body);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                self.error(e.to_string());
                self.writer.reset();
                self.status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    /// Write an already rendered HTML document.
    pub fn html(&mut self, code: StatusCode, html: impl AsRef<str>) {
        self.header(header::CONTENT_TYPE.as_str(), "text/html; charset=utf-8");
        self.data(code, html.as_ref().as_bytes());
    }

    pub fn redirect(&mut self, code: StatusCode, location: &str) {
        self.header(header::LOCATION.as_str(), location);
        self.status(code);
    }
}

fn non_empty(values: Option<&Vec<String>>) -> Option<Vec<String>> {
    values.filter(|v| !v.is_empty()).cloned()
}
