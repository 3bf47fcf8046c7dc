//! # baton
//!
//! Ordered middleware chains and request-scoped bags on top of a radix-tree
//! router.
//!
//! Each route gets a chain, fixed at registration:
//!
//! ```text
//! before_dispatch… → route middlewares… → after_dispatch… → response handler
//! ```
//!
//! - Every middleware returns `Ok(None)` to continue, `Ok(Some(ctx))` to hand
//!   a derived [`Context`] to the rest of the chain, or `Err(e)` to stop.
//! - On `Err(e)` the router's error handler runs once; nothing after the
//!   failing step does, the response handler included.
//! - Path parameters land in a per-request [`Bag`] that every step can read
//!   and extend.
//!
//! Route matching is [`matchit`]; transport is hyper.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use baton::middleware::{from_fn, Outcome};
//! use baton::{BoxError, Request, Response, ResponseWriter, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::builder()
//!         .error_handler(on_error)
//!         .response_handler(from_fn(respond))
//!         .before_dispatch([baton::middleware::trace()])
//!         .get("/users/:id", [from_fn(load_user)])
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn load_user(_w: ResponseWriter, req: Request) -> Outcome {
//!     let bag = req.bag();
//!     let id = bag.get("id").and_then(|v| v.as_str().map(str::to_owned));
//!     match id.as_deref() {
//!         Some("0") => Err("no such user".into()),
//!         _ => Ok(None),
//!     }
//! }
//!
//! async fn respond(w: ResponseWriter, _req: Request) -> Outcome {
//!     w.write(Response::json(r#"{"ok":true}"#));
//!     Ok(None)
//! }
//!
//! async fn on_error(w: ResponseWriter, _req: Request, err: BoxError) {
//!     w.write(Response::builder().status(StatusCode::NOT_FOUND).text(err.to_string()));
//! }
//! ```

mod bag;
mod chain;
mod context;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod writer;

pub mod middleware;

pub use bag::{Bag, Value, request_bag};
pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{ErrorHandler, Handler};
pub use http::StatusCode;
pub use method::{Method, UnknownMethod};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Router, RouterBuilder};
pub use server::Server;
pub use writer::ResponseWriter;
