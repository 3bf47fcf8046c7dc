//! Not-found and error handlers, and how they are type-erased.
//!
//! The router stores one handler of each kind behind an `Arc<dyn …>` so the
//! concrete function types never leak into [`Router`](crate::Router):
//!
//! ```text
//! async fn missing(req: Request) -> Response { … }     ← user writes this
//!        ↓ builder.not_found(missing)
//! missing.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(missing))                          ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time                    ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` so tokio can move it across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

// ── Not-found handler ─────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Response>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid not-found handler:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
    pub trait SealedErrorHandler {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Error handler ─────────────────────────────────────────────────────────────

#[doc(hidden)]
pub trait ErasedErrorHandler {
    fn call(&self, w: ResponseWriter, req: Request, err: BoxError) -> BoxFuture<()>;
}

#[doc(hidden)]
pub type BoxedErrorHandler = Arc<dyn ErasedErrorHandler + Send + Sync + 'static>;

/// Implemented for every valid error handler:
///
/// ```text
/// async fn name(w: ResponseWriter, req: Request, err: BoxError)
/// ```
///
/// It runs at most once per request, right after the middleware that failed,
/// and is expected to write the error response into `w`.
pub trait ErrorHandler: private::SealedErrorHandler + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_error_handler(self) -> BoxedErrorHandler;
}

impl<F, Fut> private::SealedErrorHandler for F
where
    F: Fn(ResponseWriter, Request, BoxError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(ResponseWriter, Request, BoxError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_error_handler(self) -> BoxedErrorHandler {
        Arc::new(FnErrorHandler(self))
    }
}

struct FnErrorHandler<F>(F);

impl<F, Fut> ErasedErrorHandler for FnErrorHandler<F>
where
    F: Fn(ResponseWriter, Request, BoxError) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, w: ResponseWriter, req: Request, err: BoxError) -> BoxFuture<()> {
        Box::pin((self.0)(w, req, err))
    }
}
