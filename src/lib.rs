//! # zest
//!
//! A request-dispatch engine for HTTP services behind a reverse proxy:
//! routing, middleware, and one error path. Nothing more.
//!
//! ## The contract
//!
//! nginx (or the ingress) handles TLS, rate limiting, slow clients, and
//! body-size limits. zest does not. What's left is the part that changes
//! between applications:
//!
//! - **Routing** with specificity: `/users/me` beats `/users/{id}` beats
//!   `/users/{rest...}`, whatever the registration order.
//! - **Middleware** as handler decorators, composed global → group → route.
//! - **One error path**: handlers return [`Error`]; the Error Handler turns
//!   it into a response exactly once, and never after the response was
//!   committed.
//! - **Pooled contexts**: per-request state is recycled, never shared.
//! - **Graceful shutdown** on SIGTERM / Ctrl-C.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use zest::{Context, Engine, Error, HttpError, StatusCode};
//! use zest::middleware::{Cors, Logger, Recovery, RequestId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut app = Engine::new();
//!     app.use_middleware(RequestId::default())
//!         .use_middleware(Logger::default())
//!         .use_middleware(Recovery)
//!         .use_middleware(Cors::default());
//!
//!     let mut api = app.group("/api", []);
//!     api.get("/users/{name}", get_user);
//!     api.post("/users", create_user);
//!
//!     app.run(":3000").await
//! }
//!
//! async fn get_user(c: &mut Context) -> Result<(), Error> {
//!     let name = c.param("name").unwrap_or_default().to_owned();
//!     c.json(StatusCode::OK, &serde_json::json!({ "name": name }))
//! }
//!
//! #[derive(serde::Deserialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! async fn create_user(c: &mut Context) -> Result<(), Error> {
//!     let user: NewUser = c.bind_json().await?;
//!     if user.name.is_empty() {
//!         return Err(HttpError::bad_request("name is required").into());
//!     }
//!     c.set_header("location", &format!("/api/users/{}", user.name));
//!     c.no_content(StatusCode::CREATED)
//! }
//! ```

mod context;
mod engine;
mod error;
mod error_handler;
mod file;
mod group;
mod handler;
mod method;
mod pool;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use context::{Context, MIME_APPLICATION_JSON, MIME_TEXT_HTML, MIME_TEXT_PLAIN};
pub use engine::Engine;
pub use error::{BoxError, Error, HttpError};
pub use error_handler::{default_error_handler, ErrorHandler};
pub use group::Group;
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerFn};
pub use method::Method;
pub use request::{Request, RequestBody};
pub use response::Response;
pub use router::{Params, Pattern, Resolved, Route, RouteError, Router};
pub use server::Server;

pub use http::StatusCode;
