//! Chain assembly.
//!
//! A route's chain is fixed when the route is registered:
//!
//! ```text
//! before_dispatch… → route middlewares… → after_dispatch… → response handler
//! ```
//!
//! The global lists are copied at registration time, so later
//! `before_dispatch` / `after_dispatch` calls only affect routes registered
//! after them. The response handler is appended when the router is built.

use std::sync::Arc;

use crate::middleware::BoxedMiddleware;

/// A finished chain, shared by every request that hits the route.
pub(crate) type Chain = Arc<[BoxedMiddleware]>;

/// Everything but the terminal step.
pub(crate) fn assemble(
    before: &[BoxedMiddleware],
    route: Vec<BoxedMiddleware>,
    after: &[BoxedMiddleware],
) -> Vec<BoxedMiddleware> {
    let mut steps = Vec::with_capacity(before.len() + route.len() + after.len() + 1);
    steps.extend(before.iter().cloned());
    steps.extend(route);
    steps.extend(after.iter().cloned());
    steps
}

/// Appends the terminal step, if any, and freezes the chain.
pub(crate) fn seal(mut steps: Vec<BoxedMiddleware>, terminal: Option<&BoxedMiddleware>) -> Chain {
    if let Some(t) = terminal {
        steps.push(Arc::clone(t));
    }
    steps.into()
}
