//! Static file serving in front of the route table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::context::Context;
use crate::error::Error;
use crate::file;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::logger::format_size;
use crate::middleware::Middleware;

/// Serves files below `root` for `GET` and `HEAD`; everything else, and
/// every path without a file behind it, falls through to the inner chain.
///
/// With `html5` on, a request the inner chain answers with `404` gets the
/// root index instead, which is what single-page apps with client-side
/// routing need. With `browse` on, directories without an index are listed.
///
/// ```rust
/// use zest::middleware::Static;
///
/// let assets = Static::new("public").html5(true);
/// ```
#[derive(Clone, Debug)]
pub struct Static {
    root: PathBuf,
    index: String,
    html5: bool,
    browse: bool,
}

impl Static {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Directory index file name. Default `index.html`.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn html5(mut self, on: bool) -> Self {
        self.html5 = on;
        self
    }

    pub fn browse(mut self, on: bool) -> Self {
        self.browse = on;
        self
    }
}

impl Default for Static {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: file::DEFAULT_INDEX.to_owned(),
            html5: false,
            browse: false,
        }
    }
}

impl Middleware for Static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(StaticHandler { config: self.clone(), next })
    }
}

struct StaticHandler {
    config: Static,
    next: BoxedHandler,
}

impl Handler for StaticHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let method = c.method();
            if method != http::Method::GET && method != http::Method::HEAD {
                return self.next.call(c).await;
            }

            let Ok(decoded) = urlencoding::decode(c.path()) else {
                return self.next.call(c).await;
            };
            let url_path = decoded.into_owned();
            let target = file::resolve_under(&self.config.root, &url_path);

            let Ok(meta) = tokio::fs::metadata(&target).await else {
                return self.fall_through(c).await;
            };

            if !meta.is_dir() {
                return file::serve(c, &target, &self.config.index).await;
            }

            if file::is_file(&target.join(&self.config.index)).await {
                return file::serve(c, &target, &self.config.index).await;
            }
            if self.config.browse {
                return list_dir(c, &target, &url_path).await;
            }
            self.next.call(c).await
        })
    }
}

impl StaticHandler {
    /// No file: let the routes try, then fall back to the root index in
    /// html5 mode.
    async fn fall_through(&self, c: &mut Context) -> Result<(), Error> {
        let err = match self.next.call(c).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if !self.config.html5 || err.status() != StatusCode::NOT_FOUND || c.committed() {
            return Err(err);
        }

        let index = self.config.root.join(&self.config.index);
        if !file::is_file(&index).await {
            return Err(err);
        }
        file::serve(c, &index, &self.config.index).await
    }
}

const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{{ title }}</title></head>
<body>
<h1>{{ title }}</h1>
<ul>
{%- for entry in entries %}
<li><a href="{{ entry.href }}">{{ entry.name }}{% if entry.dir %}/{% endif %}</a>
{%- if not entry.dir %} <small>{{ entry.size }}</small>{% endif %}</li>
{%- endfor %}
</ul>
</body>
</html>
"#;

#[derive(Serialize)]
struct Entry {
    name: String,
    href: String,
    dir: bool,
    size: String,
}

/// Renders the listing of `dir`. Links are built from the cleaned request
/// path, one percent-encoded segment at a time.
async fn list_dir(c: &mut Context, dir: &Path, url_path: &str) -> Result<(), Error> {
    let base: String = file::clean_segments(url_path)
        .iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect();

    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let meta = entry.metadata().await?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let mut href = format!("{base}/{}", urlencoding::encode(&name));
        if meta.is_dir() {
            href.push('/');
        }
        entries.push(Entry { name, href, dir: meta.is_dir(), size: format_size(meta.len()) });
    }
    entries.sort_by(|a, b| b.dir.cmp(&a.dir).then_with(|| a.name.cmp(&b.name)));

    let title = file::clean_segments(url_path).join("/");
    let mut env = Environment::new();
    env.add_template("listing.html", LISTING).map_err(Error::other)?;
    let html = env
        .get_template("listing.html")
        .and_then(|tpl| tpl.render(context! { title => format!("/{title}"), entries }))
        .map_err(Error::other)?;

    c.html(StatusCode::OK, html)
}
