//! Panic recovery.
//!
//! A panic anywhere downstream is caught, logged at error level, and turned
//! into a plain 500 response. Body, status and headers written downstream of
//! recovery are discarded; headers set by earlier middlewares are kept. The
//! chain is aborted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use axum::http::StatusCode;

use crate::http::context::Context;

pub fn recovery(c: &mut Context) {
    let headers = c.writer().headers().clone();
    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| c.next())) else {
        return;
    };

    tracing::error!(
        method = %c.method(),
        path = %c.path(),
        panic = %panic_message(payload.as_ref()),
        "Recovered from handler panic"
    );
    c.error(format!("panic: {}", panic_message(payload.as_ref())));
    c.writer_mut().reset();
    *c.writer_mut().headers_mut() = headers;
    c.string(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    c.abort();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::HandlerFunc;
    use crate::http::request::RequestParts;
    use axum::http::{header, Method};
    use std::sync::Arc;

    #[test]
    fn test_panic_becomes_500() {
        let handlers: Vec<HandlerFunc> = vec![
            Arc::new(recovery),
            Arc::new(|c: &mut Context| {
                c.header("x-partial", "yes");
                c.string(StatusCode::OK, "half");
                panic!("boom");
            }),
        ];
        let mut c = Context::for_test(RequestParts::new(Method::GET, "/")).with_handlers(handlers);
        c.next();

        assert!(c.is_aborted());
        assert_eq!(c.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(c.writer().body(), b"Internal Server Error");
        assert!(!c.writer().headers().contains_key("x-partial"));
        assert_eq!(c.writer().headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(c.errors(), ["panic: boom"]);
    }

    #[test]
    fn test_panic_keeps_headers_set_before_recovery() {
        let handlers: Vec<HandlerFunc> = vec![
            Arc::new(|c: &mut Context| c.header("access-control-allow-origin", "*")),
            Arc::new(recovery),
            Arc::new(|c: &mut Context| {
                c.header("x-partial", "yes");
                panic!("late failure");
            }),
        ];
        let mut c = Context::for_test(RequestParts::new(Method::GET, "/")).with_handlers(handlers);
        c.next();

        let headers = c.writer().headers();
        assert_eq!(c.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(!headers.contains_key("x-partial"));
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_no_panic_passes_through() {
        let handlers: Vec<HandlerFunc> = vec![
            Arc::new(recovery),
            Arc::new(|c: &mut Context| c.string(StatusCode::OK, "fine")),
        ];
        let mut c = Context::for_test(RequestParts::new(Method::GET, "/")).with_handlers(handlers);
        c.next();

        assert!(!c.is_aborted());
        assert_eq!(c.writer().body(), b"fine");
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
