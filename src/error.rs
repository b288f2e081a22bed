//! Error and signal types for the render pipeline.
//!
//! Rendering distinguishes two kinds of non-success outcomes:
//!
//! - A [`RenderError`] is a real failure. It travels up the tree until an
//!   error boundary claims it, and reaches the caller of the render entry
//!   point otherwise.
//! - A [`Suspension`] is not an error. A component that is waiting on an
//!   asynchronous resource returns [`Signal::Suspend`]; the nearest
//!   suspense boundary keeps its previously committed output and retries
//!   once the suspension settles.
//!
//! Both are explicit tagged variants of [`Signal`] - the renderer never
//! inspects the shape of a value to decide which one it is holding.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

// =============================================================================
// RenderError
// =============================================================================

/// A failure raised while rendering, diffing, or committing.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A component reported a failure from its render or a lifecycle hook.
    #[error("{0}")]
    Message(String),

    /// A render entry point was invoked while the same root was already
    /// mid-pass (e.g. from inside one of its own effects).
    #[error("root is already rendering; re-entrant renders on the same root are not supported")]
    Busy,
}

impl RenderError {
    /// Build a message error from anything displayable.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Message(message.to_string())
    }
}

// =============================================================================
// Signal
// =============================================================================

/// Non-success outcome of a component render.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A real error, routed to the nearest error boundary.
    Error(RenderError),
    /// A pending asynchronous resource, routed to the nearest suspense
    /// boundary.
    Suspend(Suspension),
}

impl From<RenderError> for Signal {
    fn from(error: RenderError) -> Self {
        Signal::Error(error)
    }
}

impl From<Suspension> for Signal {
    fn from(suspension: Suspension) -> Self {
        Signal::Suspend(suspension)
    }
}

// =============================================================================
// Suspension
// =============================================================================

/// State shared between a suspended component and its boundary.
#[derive(Default)]
struct SuspensionState {
    settled: Option<Result<(), RenderError>>,
    /// Retry callbacks registered by boundaries waiting on this handle.
    wakers: Vec<Box<dyn FnOnce()>>,
}

/// Handle a component hands to the renderer while an asynchronous resource
/// is still pending.
///
/// The component keeps a clone for itself; once the resource is available it
/// calls [`Suspension::resolve`] (or [`Suspension::reject`]), which wakes
/// every boundary that caught this handle so the subtree renders again.
#[derive(Clone, Default)]
pub struct Suspension {
    inner: Rc<RefCell<SuspensionState>>,
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("settled", &self.inner.borrow().settled)
            .finish()
    }
}

impl Suspension {
    /// Create a fresh, unsettled suspension handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the handle has been resolved or rejected.
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().settled.is_some()
    }

    /// The rejection error, if the handle settled with one.
    pub fn rejection(&self) -> Option<RenderError> {
        match &self.inner.borrow().settled {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Mark the resource as available and wake waiting boundaries.
    pub fn resolve(&self) {
        self.settle(Ok(()));
    }

    /// Mark the resource as failed and wake waiting boundaries.
    ///
    /// The retry render is still attempted; the suspended component is
    /// expected to surface the rejection as a normal render error.
    pub fn reject(&self, error: RenderError) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<(), RenderError>) {
        let wakers = {
            let mut state = self.inner.borrow_mut();
            if state.settled.is_some() {
                return;
            }
            state.settled = Some(outcome);
            std::mem::take(&mut state.wakers)
        };
        for wake in wakers {
            wake();
        }
    }

    /// Register a retry callback. Runs immediately if already settled.
    pub(crate) fn add_waker(&self, wake: Box<dyn FnOnce()>) {
        {
            let mut state = self.inner.borrow_mut();
            if state.settled.is_none() {
                state.wakers.push(wake);
                return;
            }
        }
        wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn suspension_wakes_on_resolve() {
        let suspension = Suspension::new();
        let woke = Rc::new(Cell::new(false));
        let woke_clone = woke.clone();

        suspension.add_waker(Box::new(move || woke_clone.set(true)));
        assert!(!woke.get());

        suspension.resolve();
        assert!(woke.get());
        assert!(suspension.is_settled());
    }

    #[test]
    fn suspension_settles_once() {
        let suspension = Suspension::new();
        suspension.resolve();
        suspension.reject(RenderError::msg("late"));

        assert!(suspension.rejection().is_none());
    }

    #[test]
    fn rejection_is_reported() {
        let suspension = Suspension::new();
        suspension.reject(RenderError::msg("fetch failed"));

        let rejection = suspension.rejection();
        assert!(matches!(rejection, Some(RenderError::Message(m)) if m == "fetch failed"));
    }
}
