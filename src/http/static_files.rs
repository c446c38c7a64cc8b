//! Static directory serving.
//!
//! # Responsibilities
//! - Map the `filepath` wildcard of a static mount onto a directory
//! - Refuse traversal outside the mounted root
//! - Answer with the file contents and a type derived from its extension
//!
//! # Design Decisions
//! - Files are read whole; mounts are meant for small assets
//! - The `filepath` variable is already percent-decoded, so the traversal
//!   check sees exactly the path that is opened
//! - Missing, unreadable and unsafe paths all answer a bare 404 with no body

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::http::{header, StatusCode};

use crate::http::context::{Context, HandlerFunc};

/// Wildcard name used by static mounts.
pub const FILEPATH_PARAM: &str = "filepath";

/// Build the terminal handler serving files below `root`.
pub fn serve_dir(root: impl Into<PathBuf>) -> HandlerFunc {
    let root: PathBuf = root.into();
    Arc::new(move |c: &mut Context| serve_file(c, &root))
}

fn serve_file(c: &mut Context, root: &Path) {
    let requested = c.param(FILEPATH_PARAM).to_string();
    let Some(path) = resolve(root, &requested) else {
        tracing::debug!(path = %requested, "Rejected static file path");
        c.status(StatusCode::NOT_FOUND);
        return;
    };

    match std::fs::read(&path) {
        Ok(contents) => {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            c.header(header::CONTENT_TYPE.as_str(), mime_type_for_extension(ext));
            c.data(StatusCode::OK, &contents);
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Static file unavailable");
            c.status(StatusCode::NOT_FOUND);
        }
    }
}

/// Join `requested` onto `root`, or `None` if it could escape the root.
fn resolve(root: &Path, requested: &str) -> Option<PathBuf> {
    if requested.contains('\0') {
        return None;
    }
    let relative = Path::new(requested.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if resolved.is_dir() {
        resolved.push("index.html");
    }
    Some(resolved)
}

/// Content type for a file extension, `application/octet-stream` if unknown.
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}
