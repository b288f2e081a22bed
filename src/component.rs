//! Component runtime - behavior contract and per-instance bookkeeping.
//!
//! A component is any type implementing the [`Component`] capability set:
//! a render function plus optional lifecycle hooks, an optional state
//! container, an optional update-skip predicate, and optional error/suspense
//! boundary capabilities. There is no base class; the runtime owns the
//! instance record and calls into the behavior object.
//!
//! Instance lifecycle: `Constructed -> Mounted -> (Updating <-> Idle)* ->
//! Unmounted`. State survives across renders and is discarded on unmount,
//! together with the hook list and any queued patches.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::element::{Child, ComponentSpec};
use crate::error::{RenderError, Signal};
use crate::hooks::{HookList, RenderCx};
use crate::scheduler::{self, RootHandle, UpdateMsg};
use crate::tree::FiberId;
use crate::types::Props;

/// Outcome of a component render: a child description, or a signal
/// (error / suspension) for the boundaries above.
pub type Render = Result<Child, Signal>;

// =============================================================================
// Behavior contract
// =============================================================================

/// Capability set a component type implements.
///
/// Only `render` is required. Everything else defaults to "capability not
/// present".
pub trait Component: Any {
    /// Produce the component's output for the given props and state.
    ///
    /// `state` is the committed state map; it is empty until the component
    /// (or its `initial_state`) first sets something.
    fn render(&mut self, props: &Props, state: &Props, cx: &mut RenderCx<'_>) -> Render;

    /// Construct-phase state. Returning `None` leaves the instance with no
    /// state until first render, at which point it renders with (and
    /// commits) the empty map.
    fn initial_state(&self, _props: &Props) -> Option<Props> {
        None
    }

    /// Update-skip predicate, consulted before re-rendering on an update
    /// pass. Not consulted when the pass was forced.
    fn should_update(&mut self, _next_props: &Props, _next_state: &Props) -> bool {
        true
    }

    /// Called once, after the instance's first output is committed.
    fn did_mount(&mut self) {}

    /// Called once, before the instance's subtree is torn down.
    fn will_unmount(&mut self) {}

    /// Error boundary capability. Returning `true` claims a descendant
    /// error: the instance keeps its committed output, the error is stored
    /// for its next render, and a forced follow-up update is queued.
    fn catch_error(&mut self, _error: &RenderError) -> bool {
        false
    }

    /// Suspense boundary capability. A boundary keeps its committed output
    /// while a descendant is suspended and re-renders when the suspension
    /// settles.
    fn suspense_boundary(&self) -> bool {
        false
    }
}

// =============================================================================
// State patches
// =============================================================================

/// One queued state update. Patches accumulate between flushes and are
/// applied in call order, each seeing the result of the previous one.
#[derive(Clone)]
pub enum StatePatch {
    /// Shallow merge of a partial state map.
    Merge(Props),
    /// Updater function: `(previous_state, props) -> partial` to merge.
    With(Rc<dyn Fn(&Props, &Props) -> Props>),
}

impl fmt::Debug for StatePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatePatch::Merge(props) => f.debug_tuple("Merge").field(props).finish(),
            StatePatch::With(_) => f.write_str("With(..)"),
        }
    }
}

// =============================================================================
// Instance
// =============================================================================

/// Runtime record of a live component position.
pub struct Instance {
    /// The committed component reference.
    pub(crate) spec: ComponentSpec,
    /// User behavior object. Taken out while its own render runs.
    pub(crate) behavior: Option<Box<dyn Component>>,
    /// Committed props.
    pub(crate) props: Props,
    /// Committed element children, exposed to the render via the context.
    pub(crate) children: Vec<Child>,
    /// Committed state; `None` until first initialized (see
    /// [`Component::initial_state`]).
    pub(crate) state: Option<Props>,
    /// Queued state patches, applied in call order at flush time.
    pub(crate) pending: Vec<StatePatch>,
    /// Ordered hook records.
    pub(crate) hooks: HookList,
    /// Hook indices with a layout effect due at commit.
    pub(crate) layout_queue: Vec<usize>,
    /// Hook indices with a passive effect due after paint.
    pub(crate) passive_queue: Vec<usize>,
    /// Error claimed by this boundary, readable during its next render.
    pub(crate) caught: Option<RenderError>,
    /// Whether `did_mount` has run.
    pub(crate) mounted: bool,
    /// Cached suspense boundary capability (queried once at construction).
    pub(crate) suspense: bool,
    /// Derived-id scope mask, allocated on demand for boundaries/roots.
    pub(crate) id_mask: Option<(u32, u32)>,
}

impl Instance {
    /// Construct-phase: build the behavior object and its initial state.
    pub(crate) fn construct(spec: ComponentSpec, props: Props) -> Self {
        let behavior = spec.construct();
        let state = behavior.initial_state(&props);
        let suspense = behavior.suspense_boundary();
        Self {
            spec,
            behavior: Some(behavior),
            props,
            children: Vec::new(),
            state,
            pending: Vec::new(),
            hooks: HookList::default(),
            layout_queue: Vec::new(),
            passive_queue: Vec::new(),
            caught: None,
            mounted: false,
            suspense,
            id_mask: None,
        }
    }

    /// Introspection: the committed state, `None` before first
    /// initialization.
    pub fn state(&self) -> Option<&Props> {
        self.state.as_ref()
    }

    /// Apply queued patches to produce the next state map.
    pub(crate) fn compute_next_state(&mut self) -> Props {
        let mut next = self.state.clone().unwrap_or_default();
        for patch in self.pending.drain(..) {
            match patch {
                StatePatch::Merge(partial) => next.merge(&partial),
                StatePatch::With(updater) => {
                    let partial = updater(&next, &self.props);
                    next.merge(&partial);
                }
            }
        }
        next
    }

    /// The error claimed by this boundary since its last render, if any.
    pub(crate) fn take_caught(&mut self) -> Option<RenderError> {
        self.caught.take()
    }
}

// =============================================================================
// Updater handle
// =============================================================================

/// Handle for driving state updates on a live instance from outside a
/// render pass (event handlers, effects, timers).
///
/// All operations are ignored once the instance has unmounted.
#[derive(Clone)]
pub struct Updater {
    pub(crate) handle: RootHandle,
    pub(crate) fiber: FiberId,
}

impl Updater {
    /// Queue a shallow state merge and schedule a re-render.
    pub fn set_state(&self, patch: Props) {
        scheduler::send(
            &self.handle,
            UpdateMsg::SetState {
                fiber: self.fiber,
                patch: StatePatch::Merge(patch),
            },
        );
    }

    /// Queue an updater function `(previous_state, props) -> partial`.
    pub fn set_state_with(&self, updater: impl Fn(&Props, &Props) -> Props + 'static) {
        scheduler::send(
            &self.handle,
            UpdateMsg::SetState {
                fiber: self.fiber,
                patch: StatePatch::With(Rc::new(updater)),
            },
        );
    }

    /// Schedule a re-render that bypasses the update-skip predicate.
    pub fn force_update(&self) {
        scheduler::send(&self.handle, UpdateMsg::Force { fiber: self.fiber });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;

    impl Component for Plain {
        fn render(&mut self, _props: &Props, _state: &Props, _cx: &mut RenderCx<'_>) -> Render {
            Ok(Child::Hole)
        }
    }

    #[derive(Default)]
    struct WithState;

    impl Component for WithState {
        fn initial_state(&self, _props: &Props) -> Option<Props> {
            Some(Props::new().with("count", 0))
        }

        fn render(&mut self, _props: &Props, _state: &Props, _cx: &mut RenderCx<'_>) -> Render {
            Ok(Child::Hole)
        }
    }

    #[test]
    fn test_state_is_none_until_initialized() {
        let instance = Instance::construct(ComponentSpec::of::<Plain>(), Props::new());
        assert!(instance.state().is_none());

        let instance = Instance::construct(ComponentSpec::of::<WithState>(), Props::new());
        assert_eq!(
            instance.state().and_then(|s| s.get_int("count")),
            Some(0)
        );
    }

    #[test]
    fn test_patches_apply_in_call_order() {
        let mut instance = Instance::construct(ComponentSpec::of::<Plain>(), Props::new());
        instance
            .pending
            .push(StatePatch::Merge(Props::new().with("n", 1)));
        instance.pending.push(StatePatch::With(Rc::new(|prev, _| {
            let n = prev.get_int("n").unwrap_or(0);
            Props::new().with("n", n + 10)
        })));
        instance
            .pending
            .push(StatePatch::Merge(Props::new().with("m", 5)));

        let next = instance.compute_next_state();
        assert_eq!(next.get_int("n"), Some(11));
        assert_eq!(next.get_int("m"), Some(5));
        assert!(instance.pending.is_empty());
    }
}
