//! Middleware: one step of a route's chain.
//!
//! A middleware is an async function taking the shared [`ResponseWriter`]
//! and its own copy of the [`Request`]:
//!
//! ```text
//! async fn name(w: ResponseWriter, req: Request) -> Outcome
//! ```
//!
//! - `Err(e)` stops the chain; the router's error handler gets `e`.
//! - `Ok(Some(ctx))` replaces the request context for every later step.
//! - `Ok(None)` moves on unchanged.
//!
//! Wrap a function with [`from_fn`] to register it:
//!
//! ```rust
//! use baton::middleware::{from_fn, Outcome};
//! use baton::{Request, ResponseWriter};
//!
//! async fn require_token(_w: ResponseWriter, req: Request) -> Outcome {
//!     match req.header("authorization") {
//!         Some(_) => Ok(None),
//!         None => Err("missing token".into()),
//!     }
//! }
//!
//! let mw = from_fn(require_token);
//! # let _ = mw;
//! ```

mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::writer::ResponseWriter;

pub use trace::trace;

/// What a middleware returns.
pub type Outcome = Result<Option<Context>, BoxError>;

/// Object-safe middleware interface.
///
/// [`from_fn`] covers async functions. Implement this directly for a
/// middleware type and wrap it in an `Arc` to get a [`BoxedMiddleware`].
pub trait ErasedMiddleware {
    fn call(&self, w: ResponseWriter, req: Request) -> BoxFuture<Outcome>;
}

/// A type-erased middleware, shared by every chain it appears in.
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn call(&self, w: ResponseWriter, req: Request) -> BoxFuture<Outcome> {
        Box::pin((self.0)(w, req))
    }
}

/// Boxes an async function so it can be passed to the router's
/// registration methods.
///
/// Named `async fn`s and closures returning an `async` block both work.
pub fn from_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Filters out absent entries, preserving order.
pub(crate) fn present<I>(middlewares: I) -> Vec<BoxedMiddleware>
where
    I: IntoIterator,
    I::Item: Into<Option<BoxedMiddleware>>,
{
    middlewares.into_iter().filter_map(Into::into).collect()
}
