//! Request handling.
//!
//! # Responsibilities
//! - Hold the transport-neutral view of an inbound request
//! - Decode url-encoded query strings and form bodies
//!
//! # Design Decisions
//! - The body is buffered before routing, so handlers never block on the
//!   transport while the chain runs
//! - The path is percent-decoded once at construction; routing, groups and
//!   path variables all see the decoded form, the URI keeps the raw one
//! - Decoding errors yield empty value sets, never a failed request

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use percent_encoding::percent_decode_str;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Decoded url-encoded values, keyed by name, in order of appearance.
pub type FormValues = HashMap<String, Vec<String>>;

/// An inbound request as seen by the engine.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    uri: Uri,
    path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl RequestParts {
    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        let path = decode_path(uri.path());
        Self {
            method,
            uri,
            path,
            headers,
            body,
            remote_addr,
        }
    }

    /// Build a request with no headers and an empty body.
    ///
    /// An unparseable `uri` falls back to `/`.
    pub fn new(method: Method, uri: &str) -> Self {
        let uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self::from_parts(method, uri, HeaderMap::new(), Bytes::new(), None)
    }

    /// Append a header; invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Percent-decoded request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path exactly as received.
    pub fn raw_path(&self) -> &str {
        self.uri.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Percent-decode a URL path. `+` is kept literally; invalid UTF-8 is
/// replaced.
pub fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Decode an `application/x-www-form-urlencoded` string.
pub fn parse_values(input: &str) -> FormValues {
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(input) {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode url-encoded values");
            Vec::new()
        }
    };

    let mut values = FormValues::new();
    for (key, value) in pairs {
        values.entry(key).or_default().push(value);
    }
    values
}

/// Percent-encode a single value the way form fields are encoded.
pub fn query_escape(value: &str) -> String {
    serde_urlencoded::to_string([("", value)])
        .map(|s| s.trim_start_matches('=').to_string())
        .unwrap_or_default()
}

/// Inverse of [`query_escape`]; undecodable input is returned unchanged.
pub fn query_unescape(value: &str) -> String {
    serde_urlencoded::from_str::<Vec<(String, String)>>(&format!("v={}", value))
        .ok()
        .and_then(|mut pairs| pairs.pop())
        .map(|(_, v)| v)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_groups_repeated_keys() {
        let values = parse_values("a=1&b=two+words&a=3&empty=");
        assert_eq!(values["a"], vec!["1", "3"]);
        assert_eq!(values["b"], vec!["two words"]);
        assert_eq!(values["empty"], vec![""]);
    }

    #[test]
    fn test_escape_round_trip() {
        let raw = "a b&c=d/é";
        let escaped = query_escape(raw);
        assert!(!escaped.contains(' '));
        assert!(!escaped.contains('&'));
        assert_eq!(query_unescape(&escaped), raw);
    }

    #[test]
    fn test_path_is_decoded_once() {
        let req = RequestParts::new(Method::GET, "/hello/J%C3%BCrgen%20X/a+b?q=%20");
        assert_eq!(req.path(), "/hello/Jürgen X/a+b");
        assert_eq!(req.raw_path(), "/hello/J%C3%BCrgen%20X/a+b");
        assert_eq!(req.uri().query(), Some("q=%20"));

        assert_eq!(decode_path("/%25252e"), "/%252e");
        assert_eq!(decode_path("/100%"), "/100%");
    }

    #[test]
    fn test_with_header_normalizes_and_skips_invalid() {
        let req = RequestParts::new(Method::GET, "/")
            .with_header("X-Custom", "v")
            .with_header("bad name", "dropped")
            .with_header("x-ok", "bad\nvalue");

        assert_eq!(req.header("x-custom"), Some("v"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_request_builder() {
        let req = RequestParts::new(Method::POST, "/submit?x=1")
            .with_header("content-type", "text/plain")
            .with_body("hi");

        assert_eq!(req.path(), "/submit");
        assert_eq!(req.uri().query(), Some("x=1"));
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(&req.body[..], b"hi");
    }
}
