//! Typed, derivable request context.
//!
//! A middleware that wants to hand typed data to the ones after it returns a
//! *derived* context: the current one plus a new value. The router swaps it
//! into the request for the rest of the chain.
//!
//! ```rust
//! use baton::Context;
//!
//! #[derive(Clone)]
//! struct UserId(u64);
//!
//! let root = Context::new();
//! let derived = root.with(UserId(7));
//! assert_eq!(derived.get::<UserId>().map(|u| u.0), Some(7));
//! assert!(root.get::<UserId>().is_none());
//! ```

use std::sync::Arc;

/// Immutable map from type to value.
///
/// Cloning is one `Arc` increment. Deriving copies the map once.
#[derive(Clone, Debug, Default)]
pub struct Context {
    values: Arc<http::Extensions>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context holding every value of `self` plus `value`.
    /// A value of the same type already present is shadowed.
    pub fn with<T>(&self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = Arc::clone(&self.values);
        Arc::make_mut(&mut values).insert(value);
        Self { values }
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Tenant(&'static str);

    #[derive(Clone, Debug, PartialEq)]
    struct Role(&'static str);

    #[test]
    fn derived_context_inherits_parent_values() {
        let ctx = Context::new().with(Tenant("acme")).with(Role("admin"));
        assert_eq!(ctx.get::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(ctx.get::<Role>(), Some(&Role("admin")));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn deriving_leaves_parent_untouched() {
        let parent = Context::new().with(Tenant("acme"));
        let child = parent.with(Tenant("globex"));
        assert_eq!(parent.get::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(child.get::<Tenant>(), Some(&Tenant("globex")));
    }
}
