//! Minimal baton example: auth middleware, a bag-driven response step, and
//! an error handler that maps errors to statuses.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42 -H 'authorization: Bearer t'
//!   curl -i http://localhost:3000/users/42                 # 401
//!   curl -i -X POST http://localhost:3000/users -H 'authorization: Bearer t' -d '{"name":"alice"}'
//!   curl -i -X PUT  http://localhost:3000/users/42         # 405

use std::fmt;

use baton::middleware::{self, from_fn, BoxedMiddleware, Outcome};
use baton::{BoxError, Request, Response, ResponseWriter, Router, Server, StatusCode};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Unauthorized;

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("missing or malformed bearer token")
    }
}

impl std::error::Error for Unauthorized {}

#[derive(Clone)]
struct Caller(String);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Router::builder()
        .error_handler(on_error)
        .response_handler(from_fn(respond))
        .not_found(|req: Request| async move { format!("nothing at {}", req.path()) })
        .before_dispatch([middleware::trace(), from_fn(authenticate)])
        .get("/users/:id", [from_fn(load_user)])
        .post("/users", [from_fn(create_user)])
        .delete("/users/:id", Vec::<BoxedMiddleware>::new())
        .build();

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// Puts the caller into the context for every later step.
async fn authenticate(_w: ResponseWriter, req: Request) -> Outcome {
    let token = req
        .header("authorization")
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(Unauthorized)?;
    Ok(Some(req.context().with(Caller(token.to_owned()))))
}

// GET /users/:id: the id is already in the bag.
async fn load_user(_w: ResponseWriter, req: Request) -> Outcome {
    let bag = req.bag();
    let id = bag.get("id").and_then(|v| v.as_str().map(str::to_owned)).unwrap_or_default();
    bag.set("body", format!(r#"{{"id":"{id}","name":"alice"}}"#));
    Ok(None)
}

// POST /users
async fn create_user(_w: ResponseWriter, req: Request) -> Outcome {
    if req.body().is_empty() {
        return Err("empty body".into());
    }
    req.bag().set("body", r#"{"id":"99","name":"new_user"}"#);
    req.bag().set("status", 201_i64);
    Ok(None)
}

// Terminal step: writes whatever earlier steps left in the bag.
async fn respond(w: ResponseWriter, req: Request) -> Outcome {
    let bag = req.bag();
    let status = bag
        .get("status")
        .and_then(|v| v.as_i64())
        .and_then(|n| u16::try_from(n).ok())
        .and_then(|n| StatusCode::from_u16(n).ok())
        .unwrap_or(StatusCode::OK);

    let caller = req.context().get::<Caller>().map(|c| c.0.as_str()).unwrap_or("anonymous");
    match bag.get("body").and_then(|v| v.as_str().map(str::to_owned)) {
        Some(body) => w.write(
            Response::builder()
                .status(status)
                .header("x-caller", caller)
                .json(body),
        ),
        None => w.write(StatusCode::NO_CONTENT),
    }
    Ok(None)
}

async fn on_error(w: ResponseWriter, _req: Request, err: BoxError) {
    let status = if err.downcast_ref::<Unauthorized>().is_some() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_REQUEST
    };
    w.write(Response::builder().status(status).text(err.to_string()));
}
