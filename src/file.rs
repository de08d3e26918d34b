//! File responses shared by [`Context::file`], [`Engine::serve_dir`] and the
//! static middleware.
//!
//! [`Engine::serve_dir`]: crate::Engine::serve_dir

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use http::header::CONTENT_TYPE;
use http::StatusCode;

use crate::context::Context;
use crate::error::{Error, HttpError};
use crate::handler::{BoxFuture, Handler};

pub(crate) const DEFAULT_INDEX: &str = "index.html";

/// Writes the file at `path`. A directory is served through its `index` file.
pub(crate) async fn serve(c: &mut Context, path: &Path, index: &str) -> Result<(), Error> {
    let meta = tokio::fs::metadata(path).await.map_err(io_to_http)?;
    let path = if meta.is_dir() {
        let index_path = path.join(index);
        if !is_file(&index_path).await {
            return Err(HttpError::not_found("not found").into());
        }
        index_path
    } else {
        path.to_path_buf()
    };

    let bytes = tokio::fs::read(&path).await.map_err(io_to_http)?;
    c.set_header(CONTENT_TYPE.as_str(), content_type(&path));
    c.set_status(StatusCode::OK);
    c.write(&bytes);
    Ok(())
}

/// Maps a decoded URL path onto a file below `root`.
///
/// The result always stays inside `root`; see [`clean_segments`].
pub(crate) fn resolve_under(root: &Path, request_path: &str) -> PathBuf {
    clean_segments(request_path)
        .iter()
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// The segments of a decoded URL path after cleaning.
///
/// `.` segments are dropped and `..` pops one level but never climbs above
/// the first segment. Empty segments and segments that would be read as a
/// path prefix on this platform are dropped.
pub(crate) fn clean_segments(request_path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in request_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s if is_plain_name(s) => parts.push(s),
            _ => {}
        }
    }
    parts
}

fn is_plain_name(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

fn io_to_http(err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound => HttpError::not_found("not found").with_source(err).into(),
        ErrorKind::PermissionDenied => {
            HttpError::new(StatusCode::FORBIDDEN, "forbidden").with_source(err).into()
        }
        _ => Error::Io(err),
    }
}

/// Serves `GET <prefix>/{path...}` from a directory. Registered by
/// [`Engine::serve_dir`](crate::Engine::serve_dir).
pub(crate) struct ServeDir {
    root: PathBuf,
}

impl ServeDir {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Handler for ServeDir {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let path = resolve_under(&self.root, c.param("path").unwrap_or_default());
            serve(c, &path, DEFAULT_INDEX).await
        })
    }
}

/// Content type by file extension; unknown extensions are binary.
pub(crate) fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css")          => "text/css; charset=utf-8",
        Some("js" | "mjs")   => "text/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("txt")          => "text/plain; charset=utf-8",
        Some("csv")          => "text/csv",
        Some("xml")          => "application/xml",
        Some("svg")          => "image/svg+xml",
        Some("png")          => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif")          => "image/gif",
        Some("webp")         => "image/webp",
        Some("ico")          => "image/x-icon",
        Some("woff")         => "font/woff",
        Some("woff2")        => "font/woff2",
        Some("wasm")         => "application/wasm",
        Some("pdf")          => "application/pdf",
        _                    => "application/octet-stream",
    }
}
