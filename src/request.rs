//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::bag::{self, Bag};
use crate::context::Context;

/// An incoming HTTP request with its body already collected.
///
/// Every middleware receives its own `Request`. Cloning is cheap: the head
/// and parameters sit behind an `Arc`, the body is [`Bytes`], and the
/// [`Context`] is itself reference counted.
#[derive(Clone, Debug)]
pub struct Request {
    head: Arc<http::request::Parts>,
    body: Bytes,
    params: Arc<HashMap<String, String>>,
    context: Context,
}

impl Request {
    /// Wraps a plain `http` request. No path parameters, empty context.
    ///
    /// Requests built this way carry whatever bag is already in their
    /// extensions; usually none, so [`bag`](Self::bag) returns an empty one.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::from_parts(head, body, HashMap::new())
    }

    pub(crate) fn from_parts(
        head: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            head: Arc::new(head),
            body,
            params: Arc::new(params),
            context: Context::new(),
        }
    }

    pub fn method(&self) -> &http::Method { &self.head.method }
    pub fn uri(&self) -> &http::Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &http::HeaderMap { &self.head.headers }
    pub fn extensions(&self) -> &http::Extensions { &self.head.extensions }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Header lookup; `None` when missing or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter as matched.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The bag the router attached to this request, or an empty one.
    pub fn bag(&self) -> Bag {
        bag::from_extensions(&self.head.extensions)
    }

    pub fn context(&self) -> &Context { &self.context }

    /// Replaces the context, keeping everything else.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request {
        Request::from_http(
            http::Request::builder()
                .uri(uri)
                .header("X-Request-Id", "abc")
                .body(Bytes::from_static(b"payload"))
                .unwrap(),
        )
    }

    #[test]
    fn accessors_read_the_head() {
        let req = get("/items/42?full=1");
        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(req.path(), "/items/42");
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.body().as_ref(), b"payload");
        assert_eq!(req.param("id"), None);
    }

    #[test]
    fn undispatched_request_has_empty_bag() {
        let req = get("/");
        req.bag().set("lost", "value");
        assert!(req.bag().is_empty());
    }

    #[test]
    fn with_context_replaces_only_the_context() {
        #[derive(Clone)]
        struct Marker;

        let req = get("/a").with_context(Context::new().with(Marker));
        assert!(req.context().get::<Marker>().is_some());
        assert_eq!(req.path(), "/a");
    }
}
