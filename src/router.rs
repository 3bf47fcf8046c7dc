//! Router facade: middleware chains over a radix-tree matcher.
//!
//! Two phases. [`RouterBuilder`] collects global middlewares, handlers and
//! routes; [`RouterBuilder::build`] freezes everything into a [`Router`] that
//! is only ever read while serving. One `matchit` tree per HTTP method.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;
use tracing::{Instrument, debug, info_span};

use crate::bag::{self, Bag};
use crate::chain::{self, Chain};
use crate::error::Error;
use crate::handler::{BoxedErrorHandler, BoxedHandler, ErrorHandler, Handler};
use crate::method::Method;
use crate::middleware::{self, BoxedMiddleware};
use crate::request::Request;
use crate::response::Response;
use crate::writer::ResponseWriter;

// ── Builder ───────────────────────────────────────────────────────────────────

struct PendingRoute {
    method: http::Method,
    path: String,
    steps: Vec<BoxedMiddleware>,
}

/// Registration-phase configuration. Every method returns `self`.
///
/// ```rust
/// use baton::middleware::{from_fn, Outcome};
/// use baton::{BoxError, Request, Response, ResponseWriter, Router, StatusCode};
///
/// async fn on_error(w: ResponseWriter, _req: Request, err: BoxError) {
///     w.write(Response::builder().status(StatusCode::BAD_REQUEST).text(err.to_string()));
/// }
///
/// async fn respond(w: ResponseWriter, req: Request) -> Outcome {
///     let id = req.bag().get("id").and_then(|v| v.as_str().map(str::to_owned));
///     w.write(Response::text(id.unwrap_or_default()));
///     Ok(None)
/// }
///
/// async fn load_item(_w: ResponseWriter, req: Request) -> Outcome {
///     req.bag().set("loaded", true);
///     Ok(None)
/// }
///
/// let router = Router::builder()
///     .error_handler(on_error)
///     .response_handler(from_fn(respond))
///     .before_dispatch([baton::middleware::trace()])
///     .get("/items/:id", [from_fn(load_item)])
///     .build();
/// # let _ = router;
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    before: Vec<BoxedMiddleware>,
    after: Vec<BoxedMiddleware>,
    routes: Vec<PendingRoute>,
    error_handler: Option<BoxedErrorHandler>,
    response_handler: Option<BoxedMiddleware>,
    not_found: Option<BoxedHandler>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mandatory. Receives the failing request and the error; must write the
    /// error response.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Some(handler.into_boxed_error_handler());
        self
    }

    /// The terminal step appended to every chain. Without one, writing the
    /// response is up to the route's own middlewares.
    pub fn response_handler(mut self, middleware: BoxedMiddleware) -> Self {
        self.response_handler = Some(middleware);
        self
    }

    /// Answers requests no route matches. Defaults to an empty `404`.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = Some(handler.into_boxed_handler());
        self
    }

    /// Appends to the global list that runs before route middlewares.
    /// `None` entries are skipped.
    pub fn before_dispatch<I>(mut self, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.before.extend(middleware::present(middlewares));
        self
    }

    /// Appends to the global list that runs after route middlewares.
    /// `None` entries are skipped.
    pub fn after_dispatch<I>(mut self, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.after.extend(middleware::present(middlewares));
        self
    }

    /// Registers a chain for `method` + `path`.
    ///
    /// Any method `http` can represent is accepted, so extension verbs
    /// like `PURGE` route the same as `GET`.
    /// Paths use `{name}` / `{*rest}`, or the `:name` / `*rest` spelling.
    /// The global before/after lists are copied now; see [`crate::Router`].
    pub fn route<I>(mut self, method: impl Into<http::Method>, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        let method = method.into();
        let steps = chain::assemble(&self.before, middleware::present(middlewares), &self.after);
        debug!(%method, path, steps = steps.len(), "route registered");
        self.routes.push(PendingRoute { method, path: path.to_owned(), steps });
        self
    }

    pub fn get<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Get, path, middlewares)
    }

    pub fn post<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Post, path, middlewares)
    }

    pub fn put<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Put, path, middlewares)
    }

    pub fn patch<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Patch, path, middlewares)
    }

    pub fn delete<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Delete, path, middlewares)
    }

    pub fn options<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Options, path, middlewares)
    }

    pub fn head<I>(self, path: &str, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxedMiddleware>>,
    {
        self.route(Method::Head, path, middlewares)
    }

    /// Finalizes the router.
    ///
    /// # Panics
    ///
    /// Panics if no error handler was set, or if the matcher rejects a route
    /// (invalid pattern, or the same method + path registered twice).
    pub fn build(self) -> Router {
        self.try_build().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`build`](Self::build), returning the configuration error.
    pub fn try_build(self) -> Result<Router, Error> {
        let Self { routes: pending, error_handler, response_handler, not_found, .. } = self;
        let error_handler = error_handler.ok_or(Error::MissingErrorHandler)?;

        let mut routes: HashMap<http::Method, MatchitRouter<Chain>> = HashMap::new();
        for PendingRoute { method, path, steps } in pending {
            let chain = chain::seal(steps, response_handler.as_ref());
            routes
                .entry(method.clone())
                .or_default()
                .insert(matchit_path(&path), chain)
                .map_err(|source| Error::Route { method, path, source })?;
        }

        Ok(Router { routes, error_handler, not_found })
    }
}

/// Rewrites `:name` and `*name` segments into matchit's `{name}` / `{*name}`.
fn matchit_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.as_bytes().first() {
            Some(b':') if segment.len() > 1 => format!("{{{}}}", &segment[1..]),
            Some(b'*') if segment.len() > 1 => format!("{{*{}}}", &segment[1..]),
            _ => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The finalized, read-only router.
///
/// Every route owns a chain fixed at registration:
/// before-dispatch globals, the route's own middlewares, after-dispatch
/// globals, then the response handler. A request runs the chain in that
/// order until a step fails; the error handler then runs once and nothing
/// else does.
pub struct Router {
    routes: HashMap<http::Method, MatchitRouter<Chain>>,
    error_handler: BoxedErrorHandler,
    not_found: Option<BoxedHandler>,
}

enum Resolution {
    Found(Chain, HashMap<String, String>),
    Redirect(StatusCode, String),
    Options(String),
    MethodNotAllowed(String),
    NotFound,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Routes one request and produces one response.
    pub async fn dispatch(&self, req: http::Request<Bytes>) -> Response {
        let span = info_span!("request", method = %req.method(), path = req.uri().path());
        async move {
            let started = Instant::now();
            let res = self.route_request(req).await;
            debug!(status = res.status_code().as_u16(), elapsed = ?started.elapsed(), "request finished");
            res
        }
        .instrument(span)
        .await
    }

    async fn route_request(&self, req: http::Request<Bytes>) -> Response {
        let (mut head, body) = req.into_parts();

        match self.resolve(&head.method, head.uri.path()) {
            Resolution::Found(chain, params) => {
                let bag = Bag::new();
                for (key, value) in &params {
                    bag.set(key.as_str(), value.as_str());
                }
                bag::attach(&mut head.extensions, bag);
                self.run(&chain, Request::from_parts(head, body, params)).await
            }
            Resolution::Redirect(status, path) => {
                let location = match head.uri.query() {
                    Some(query) => format!("{path}?{query}"),
                    None => path,
                };
                debug!(%location, "redirecting to the other trailing-slash form");
                Response::builder()
                    .status(status)
                    .header("location", &location)
                    .no_body()
            }
            Resolution::Options(allow) => Response::builder().header("allow", &allow).no_body(),
            Resolution::MethodNotAllowed(allow) => {
                debug!(%allow, "method not allowed");
                Response::builder()
                    .status(StatusCode::METHOD_NOT_ALLOWED)
                    .header("allow", &allow)
                    .no_body()
            }
            Resolution::NotFound => {
                debug!("no route matched");
                match &self.not_found {
                    Some(handler) => handler.call(Request::from_parts(head, body, HashMap::new())).await,
                    None => Response::status(StatusCode::NOT_FOUND),
                }
            }
        }
    }

    async fn run(&self, chain: &[BoxedMiddleware], mut req: Request) -> Response {
        let w = ResponseWriter::new();

        for (step, mw) in chain.iter().enumerate() {
            match mw.call(w.clone(), req.clone()).await {
                Ok(None) => {}
                Ok(Some(ctx)) => req = req.with_context(ctx),
                Err(err) => {
                    debug!(step, error = %err, "middleware failed");
                    // Whatever earlier steps wrote is discarded; only the
                    // error handler's write is sent.
                    if w.take().is_some() {
                        debug!("discarding response written before the failure");
                    }
                    self.error_handler.call(w.clone(), req, err).await;
                    return w.take().unwrap_or_else(|| {
                        debug!("error handler wrote no response");
                        Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                    });
                }
            }
        }

        w.take().unwrap_or_else(|| {
            debug!("chain completed without a response");
            Response::status(StatusCode::OK)
        })
    }

    fn resolve(&self, method: &http::Method, path: &str) -> Resolution {
        let tree = self.routes.get(method);

        if let Some(matched) = tree.and_then(|t| t.at(path).ok()) {
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), decode(v)))
                .collect();
            return Resolution::Found(Arc::clone(matched.value), params);
        }

        if *method != http::Method::CONNECT && path != "/" {
            let toggled = match path.strip_suffix('/') {
                Some(trimmed) => trimmed.to_owned(),
                None => format!("{path}/"),
            };
            if tree.is_some_and(|t| t.at(&toggled).is_ok()) {
                let status = if *method == http::Method::GET {
                    StatusCode::MOVED_PERMANENTLY
                } else {
                    StatusCode::PERMANENT_REDIRECT
                };
                return Resolution::Redirect(status, toggled);
            }
        }

        let mut allowed: Vec<&str> = self.routes.iter()
            .filter(|(m, t)| *m != method && **m != http::Method::OPTIONS && t.at(path).is_ok())
            .map(|(m, _)| m.as_str())
            .collect();
        if allowed.is_empty() {
            return Resolution::NotFound;
        }
        allowed.push("OPTIONS");
        allowed.sort_unstable();
        let allow = allowed.join(", ");

        if *method == http::Method::OPTIONS {
            Resolution::Options(allow)
        } else {
            Resolution::MethodNotAllowed(allow)
        }
    }
}

/// Percent-decodes a path parameter. Invalid UTF-8 is replaced, not rejected.
fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
