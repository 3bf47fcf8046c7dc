//! The response sink shared by one request's chain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::response::Response;

/// Where middlewares put the response.
///
/// One `ResponseWriter` is created per dispatch and a clone handed to every
/// middleware and to the error handler. The last [`write`](Self::write)
/// wins; whatever it holds when dispatch ends is sent to the client.
#[derive(Clone, Debug, Default)]
pub struct ResponseWriter {
    slot: Arc<Mutex<Option<Response>>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `response`, replacing anything written before.
    pub fn write(&self, response: impl crate::IntoResponse) {
        *self.lock() = Some(response.into_response());
    }

    pub fn is_written(&self) -> bool {
        self.lock().is_some()
    }

    /// Status of the stored response, if any.
    pub fn status(&self) -> Option<http::StatusCode> {
        self.lock().as_ref().map(Response::status_code)
    }

    pub(crate) fn take(&self) -> Option<Response> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Response>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
