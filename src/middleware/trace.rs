//! Request logging.

use tracing::info;

use super::{from_fn, BoxedMiddleware, Outcome};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Logs one `info!` line per request with its method, path and the number
/// of path parameters. Meant for `before_dispatch`.
///
/// Status and latency are logged by the router once the response is known,
/// at `debug` inside the same `request` span.
pub fn trace() -> BoxedMiddleware {
    from_fn(log_request)
}

async fn log_request(_w: ResponseWriter, req: Request) -> Outcome {
    info!(
        method = %req.method(),
        path = req.path(),
        params = req.bag().len(),
        "request",
    );
    Ok(None)
}
