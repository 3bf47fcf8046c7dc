//! Request-scoped key/value storage.
//!
//! Every dispatched request gets exactly one [`Bag`], seeded with the path
//! parameters the matcher extracted. Middlewares further down the chain read
//! and extend it. The bag lives in the request extensions under a key private
//! to this module, so the only way to reach it is [`request_bag`] or
//! [`Request::bag`](crate::Request::bag).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::request::Request;

/// A dynamically typed bag entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self { Self::Int(n) }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Self::Float(n) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

/// Key/value store scoped to one request.
///
/// `Bag` is a handle: clones share the same entries, which is what lets a
/// value set by one middleware be seen by the next one even though each
/// middleware receives its own copy of the request.
#[derive(Clone, Debug, Default)]
pub struct Bag {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(key.into(), value.into());
    }

    /// Returns a copy of the entry under `key`, or `None` when absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    // A panic in another middleware while holding the lock leaves the map
    // intact, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extension key under which dispatch stores the bag. Not exported.
#[derive(Clone)]
struct BagSlot(Bag);

pub(crate) fn attach(extensions: &mut http::Extensions, bag: Bag) {
    extensions.insert(BagSlot(bag));
}

pub(crate) fn from_extensions(extensions: &http::Extensions) -> Bag {
    extensions
        .get::<BagSlot>()
        .map(|slot| slot.0.clone())
        .unwrap_or_default()
}

/// Returns the bag attached to `req` by the router.
///
/// A request that never went through [`Router::dispatch`](crate::Router::dispatch)
/// has no bag; a fresh empty one is returned instead.
pub fn request_bag(req: &Request) -> Bag {
    req.bag()
}
