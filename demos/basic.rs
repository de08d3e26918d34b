//! Minimal zest example: a small JSON API behind the built-in middleware.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:9000/api/hello
//!   curl -i http://localhost:9000/api/users/alice
//!   curl -i http://localhost:9000/api/temp/a/b/c
//!   curl -i http://localhost:9000/api/panic
//!   curl -i http://localhost:9000/nope

use zest::middleware::{Cors, Logger, Recovery, RequestId};
use zest::{Context, Engine, Error, StatusCode};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let mut app = Engine::new();
    app.use_middleware(RequestId::default())
        .use_middleware(Logger::default())
        .use_middleware(Recovery)
        .use_middleware(Cors::default());

    let mut api = app.group("/api", []);
    api.get("/hello", hello)
        .get("/users/{name}", get_user)
        .get("/temp/{path...}", temp)
        .get("/panic", explode);

    app.run(":9000").await
}

async fn hello(c: &mut Context) -> Result<(), Error> {
    c.string(StatusCode::OK, "hello")
}

async fn get_user(c: &mut Context) -> Result<(), Error> {
    let name = c.param("name").unwrap_or_default().to_owned();
    c.json(StatusCode::OK, &serde_json::json!({ "name": name }))
}

async fn temp(c: &mut Context) -> Result<(), Error> {
    let path = c.param("path").unwrap_or_default().to_owned();
    c.html(StatusCode::OK, format!("<h1>path: {path}</h1>"))
}

async fn explode(_: &mut Context) -> Result<(), Error> {
    panic!("something went badly wrong")
}
