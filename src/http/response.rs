//! Response buffering.
//!
//! # Responsibilities
//! - Accumulate status, headers and body while the handler chain runs
//! - Convert the finished buffer into a transport response
//!
//! # Design Decisions
//! - Nothing reaches the wire until the chain completes, so recovery can
//!   discard a half-written response and replace it with a 500
//! - HEAD responses keep their headers and drop the body

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;

#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Number of body bytes written so far.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Discard everything written so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn into_response(self, method: &Method) -> Response {
        let length = self.body.len();
        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            Body::from(self.body)
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if !response.headers().contains_key(header::CONTENT_LENGTH) {
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }
        response
    }
}
