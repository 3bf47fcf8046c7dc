//! Unified error type.

use std::fmt;

/// The error type a middleware or error handler deals in.
///
/// Any `std::error::Error + Send + Sync` converts into it with `?` or
/// `.into()`, and the error handler can `downcast_ref` it back to the
/// concrete type the middleware returned.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by baton's fallible operations.
///
/// Per-request failures never show up here: a middleware error is handed to
/// the router's error handler and becomes a response. This type surfaces
/// configuration mistakes caught while finalizing a [`Router`](crate::Router)
/// and infrastructure failures while binding a port.
#[derive(Debug)]
pub enum Error {
    /// Binding the listener failed.
    Io(std::io::Error),
    /// `Server::try_bind` was given something that is not `host:port`.
    InvalidAddress(String),
    /// The router was finalized without an error handler.
    MissingErrorHandler,
    /// The path matcher refused a route (bad syntax or a duplicate).
    Route {
        method: http::Method,
        path: String,
        source: matchit::InsertError,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidAddress(addr) => write!(f, "invalid socket address `{addr}`"),
            Self::MissingErrorHandler => f.write_str("error handler must be specified"),
            Self::Route { method, path, source } => {
                write!(f, "invalid route `{method} {path}`: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Route { source, .. } => Some(source),
            Self::InvalidAddress(_) | Self::MissingErrorHandler => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
