//! Context - values provided by an ancestor, read anywhere below it.
//!
//! A [`Context`] is an identity plus a default value. A provider element
//! (built with [`Context::provider`]) makes a value available to its whole
//! subtree; [`crate::hooks::RenderCx::use_context`] reads the nearest
//! provided value and subscribes the reading instance to provider updates -
//! exactly once per mount, with implicit unsubscription on unmount.
//!
//! When a provider re-renders with a different value (by reference
//! identity), every subscriber is enqueued for a forced re-render.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::element::{Child, Element, ElementType, h};
use crate::types::Props;

thread_local! {
    /// Identity allocator for contexts created on this thread.
    static NEXT_CONTEXT_ID: RefCell<u64> = const { RefCell::new(0) };
}

/// A context identity with a default value.
///
/// Clones share the identity: a clone reads values provided under the
/// original.
pub struct Context<T: 'static> {
    id: u64,
    default: Rc<T>,
}

impl<T: 'static> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

/// Create a context with a default value, used when no provider is above
/// the reading component.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
    let id = NEXT_CONTEXT_ID.with(|next| {
        let mut next = next.borrow_mut();
        *next += 1;
        *next
    });
    Context {
        id,
        default: Rc::new(default),
    }
}

impl<T: 'static> Context<T> {
    /// The context identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The default value.
    pub fn default_value(&self) -> Rc<T> {
        self.default.clone()
    }

    /// Build a provider element making `value` available to `children`.
    pub fn provider(&self, value: T, children: impl IntoIterator<Item = Child>) -> Element {
        let value: Rc<dyn Any> = Rc::new(value);
        h(
            ElementType::Provider {
                context_id: self.id,
                value,
            },
            Props::new(),
            children,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_have_distinct_identities() {
        let a = create_context(0i64);
        let b = create_context(0i64);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = create_context("fallback".to_string());
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_eq!(&*a.default_value(), &*b.default_value());
    }

    #[test]
    fn test_provider_element_carries_identity() {
        let ctx = create_context(1i64);
        let el = ctx.provider(5, []);
        match el.ty() {
            ElementType::Provider { context_id, .. } => assert_eq!(*context_id, ctx.id()),
            other => panic!("expected provider element, got {other:?}"),
        }
    }
}
