//! End-to-end dispatch through `Engine::dispatch`, mostly without a socket.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use serde_json::{json, Value};
use zest::middleware::{from_fn, BoxedMiddleware, IntoMiddleware, Middleware, Next, Recovery, RequestId};
use zest::{BoxFuture, BoxedHandler, Context, Engine, Error, Handler, HttpError, Method, Server, StatusCode};

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Reply {
    status: StatusCode,
    headers: http::HeaderMap,
    body: Bytes,
}

impl Reply {
    fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

fn peer() -> Option<SocketAddr> {
    Some("192.0.2.10:40000".parse().unwrap())
}

async fn send(app: &Engine, req: http::Request<Empty<Bytes>>) -> Reply {
    let res = app.dispatch(req, peer()).await;
    let (parts, body) = res.into_parts();
    Reply {
        status: parts.status,
        headers: parts.headers,
        body: body.collect().await.unwrap().to_bytes(),
    }
}

async fn get(app: &Engine, uri: &str) -> Reply {
    send(app, http::Request::get(uri).body(Empty::new()).unwrap()).await
}

type Log = Arc<Mutex<Vec<String>>>;

/// Records `<name>-before` / `<name>-after` around the inner chain.
struct Tag {
    name: &'static str,
    log: Log,
}

struct TagHandler {
    name: &'static str,
    log: Log,
    next: BoxedHandler,
}

impl Middleware for Tag {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(TagHandler { name: self.name, log: Arc::clone(&self.log), next })
    }
}

impl Handler for TagHandler {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("{}-before", self.name));
            let res = self.next.call(c).await;
            self.log.lock().unwrap().push(format!("{}-after", self.name));
            res
        })
    }
}

fn tag(name: &'static str, log: &Log) -> BoxedMiddleware {
    Tag { name, log: Arc::clone(log) }.into_middleware()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn get_user(c: &mut Context) -> Result<(), Error> {
    let name = c.param("name").unwrap_or_default().to_owned();
    c.json(StatusCode::OK, &json!({ "name": name }))
}

async fn ok(c: &mut Context) -> Result<(), Error> {
    c.string(StatusCode::OK, "ok")
}

async fn me(c: &mut Context) -> Result<(), Error> {
    c.string(StatusCode::OK, "me")
}

async fn missing(_: &mut Context) -> Result<(), Error> {
    Err(HttpError::not_found("no such user").into())
}

async fn partial_then_fail(c: &mut Context) -> Result<(), Error> {
    c.set_status(StatusCode::OK);
    c.write(b"partial");
    Err(Error::other("late failure"))
}

async fn explode(_: &mut Context) -> Result<(), Error> {
    panic!("kaboom")
}

async fn route_name(c: &mut Context) -> Result<(), Error> {
    let route = c.matched_route().unwrap_or("-").to_owned();
    c.string(StatusCode::OK, route)
}

/// Fails if anything from an earlier request is still in the store.
async fn fresh_store(c: &mut Context) -> Result<(), Error> {
    if c.contains("seen") {
        return Err(HttpError::internal("store leaked").into());
    }
    c.set("seen", true);
    c.string(StatusCode::OK, "fresh")
}

async fn powered_by(c: &mut Context, next: Next) -> Result<(), Error> {
    c.set_header("x-powered-by", "zest");
    next.run(c).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unmatched_path_runs_global_middleware_and_answers_json_404() {
    let mut app = Engine::new();
    app.use_middleware(RequestId::default());
    app.get("/known", ok);

    let reply = get(&app, "/nope").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.headers["content-type"], "application/json; charset=UTF-8");
    assert_eq!(reply.json(), json!({ "error": "not found" }));
    assert!(reply.headers.contains_key("x-request-id"));

    // Unknown methods take the same path; there is no 405.
    let req = http::Request::builder()
        .method("PURGE")
        .uri("/known")
        .body(Empty::new())
        .unwrap();
    assert_eq!(send(&app, req).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn group_route_with_path_parameter() {
    let mut app = Engine::new();
    app.group("/api", []).get("/users/{name}", get_user);

    let reply = get(&app, "/api/users/alice").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({ "name": "alice" }));
}

#[tokio::test]
async fn request_id_is_set_exactly_once() {
    let mut app = Engine::new();
    app.use_middleware(RequestId::default());
    app.get("/", ok);

    let reply = get(&app, "/").await;
    let ids: Vec<_> = reply.headers.get_all("x-request-id").iter().collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].len(), 32);

    let req = http::Request::get("/").header("x-request-id", "upstream-1").body(Empty::new()).unwrap();
    let reply = send(&app, req).await;
    assert_eq!(reply.headers.get_all("x-request-id").iter().count(), 1);
    assert_eq!(reply.headers["x-request-id"], "upstream-1");
}

#[tokio::test]
async fn middleware_nests_global_then_group_then_route() {
    let log: Log = Arc::default();

    let mut app = Engine::new();
    let mut api = app.group("/api", [tag("group", &log)]);
    api.handle(Method::Get, "/x", ok, [tag("route", &log)]);
    // Registered after the route and still outermost.
    app.use_middleware(tag("global", &log));

    assert_eq!(get(&app, "/api/x").await.status, StatusCode::OK);
    assert_eq!(
        *log.lock().unwrap(),
        [
            "global-before",
            "group-before",
            "route-before",
            "route-after",
            "group-after",
            "global-after",
        ]
    );
}

#[tokio::test]
async fn sibling_groups_do_not_share_middleware() {
    let log: Log = Arc::default();

    let mut app = Engine::new();
    let mut api = app.group("/api", []);
    api.use_middleware(tag("api", &log));
    {
        let mut admin = api.group("/admin", [tag("admin", &log)]);
        admin.use_middleware(tag("audit", &log));
        admin.get("/stats", ok);
    }
    api.get("/public", ok);

    get(&app, "/api/public").await;
    assert_eq!(*log.lock().unwrap(), ["api-before", "api-after"]);

    log.lock().unwrap().clear();
    get(&app, "/api/admin/stats").await;
    assert_eq!(
        *log.lock().unwrap(),
        ["api-before", "admin-before", "audit-before", "audit-after", "admin-after", "api-after"]
    );
}

#[test]
#[should_panic(expected = "invalid route: route GET /api/x conflicts")]
fn group_panic_names_the_full_route() {
    let mut app = Engine::new();
    let mut api = app.group("/api", []);
    api.get("/x", ok);
    api.get("x", ok);
}

#[tokio::test]
async fn structured_errors_and_head_requests() {
    let mut app = Engine::new();
    app.get("/users/{id}", missing);

    let reply = get(&app, "/users/7").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.text(), r#"{"error":"no such user"}"#);

    let req = http::Request::head("/users/7").body(Empty::new()).unwrap();
    let reply = send(&app, req).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn failure_after_commit_keeps_the_partial_response() {
    let mut app = Engine::new();
    app.get("/stream", partial_then_fail);

    let reply = get(&app, "/stream").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "partial");
}

#[tokio::test]
async fn pooled_contexts_do_not_leak_state() {
    let mut app = Engine::new().pool_limit(1);
    app.get("/fresh", fresh_store);

    for _ in 0..3 {
        let reply = get(&app, "/fresh").await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    }
}

#[tokio::test]
async fn most_specific_route_wins() {
    let mut app = Engine::new();
    app.get("/users/{id}", route_name);
    app.get("/users/me", me);
    app.get("/users/{id}/{rest...}", route_name);

    assert_eq!(get(&app, "/users/me").await.text(), "me");
    assert_eq!(get(&app, "/users/42").await.text(), "/users/{id}");
    assert_eq!(get(&app, "/users/42/a/b").await.text(), "/users/{id}/{rest...}");
}

#[tokio::test]
async fn panics_become_500() {
    let mut app = Engine::new();
    app.use_middleware(Recovery);
    app.get("/boom", explode);

    let reply = get(&app, "/boom").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!({ "error": "kaboom" }));
}

#[tokio::test]
async fn custom_error_handler_replaces_the_default() {
    let mut app = Engine::new();
    app.set_error_handler(|err, c| {
        if !c.committed() {
            let _ = c.string(err.status(), format!("oops: {}", err.status().as_u16()));
        }
    });

    let reply = get(&app, "/anything").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.text(), "oops: 404");
}

#[tokio::test]
async fn from_fn_middleware_and_json_body() {
    #[derive(serde::Deserialize)]
    struct NewUser {
        name: String,
    }

    async fn create(c: &mut Context) -> Result<(), Error> {
        let user: NewUser = c.bind_json().await?;
        c.json(StatusCode::CREATED, &json!({ "created": user.name }))
    }

    let mut app = Engine::new();
    app.use_middleware(from_fn(powered_by));
    app.post("/users", create);

    let req = http::Request::post("/users")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(br#"{"name":"bob"}"#)))
        .unwrap();
    let res = app.dispatch(req, None).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.headers()["x-powered-by"], "zest");
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], br#"{"created":"bob"}"#);

    let req = http::Request::post("/users")
        .body(Full::new(Bytes::from_static(b"not json")))
        .unwrap();
    let res = app.dispatch(req, None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn serve_dir_serves_files_below_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

    let mut app = Engine::new();
    app.serve_dir("/assets", dir.path());

    let reply = get(&app, "/assets/hello.txt").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "hi there");
    assert_eq!(reply.headers["content-type"], "text/plain; charset=utf-8");

    let reply = get(&app, "/assets/css/site.css").await;
    assert_eq!(reply.headers["content-type"], "text/css; charset=utf-8");

    assert_eq!(get(&app, "/assets/nope.txt").await.status, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/assets/../Cargo.toml").await.status, StatusCode::NOT_FOUND);
}

#[test]
fn invalid_routes_are_rejected() {
    let mut app = Engine::new();
    app.get("/users/{id}", ok);

    let err = app.try_handle(Method::Get, "/users/{name}", ok, []).err().unwrap();
    assert!(matches!(err, Error::Route(_)));
    assert!(app.try_handle(Method::Get, "no-slash", ok, []).is_err());
    assert!(app.try_handle(Method::Get, "/a/{rest...}/b", ok, []).is_err());
    assert_eq!(app.router().len(), 1);
}

#[test]
#[should_panic(expected = "invalid route")]
fn handle_panics_on_duplicates() {
    let mut app = Engine::new();
    app.get("/x", ok);
    app.get("/x", ok);
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut app = Engine::new();
    app.get("/ping", ok);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        Server::bind(&addr.to_string())
            .unwrap()
            .serve_listener(listener, app, async {
                let _ = stopped.await;
            })
            .await
    });

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
    assert!(raw.ends_with("ok"), "{raw}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
