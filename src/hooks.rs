//! Hooks engine - ordered per-instance hook records.
//!
//! Within one render invocation, hook accessors consume the instance's hook
//! list in strict call order: the record at each index is created on first
//! render and reused on every later render. Hooks must therefore be called
//! unconditionally and in the same order every render; a kind mismatch at an
//! index is detected and fails fast with a descriptive panic.
//!
//! Accessors are methods on [`RenderCx`], the render context threaded
//! through the diff. There is no module-global "current instance" pointer:
//! a hook simply cannot be called outside an active render pass, and
//! re-entrant renders each carry their own context.
//!
//! Effect flavors:
//! - layout effects run synchronously during commit, after host mutations;
//! - passive effects are batched after paint, with a frame callback plus an
//!   independent short timeout as a fallback so they run even when frame
//!   notifications are suppressed.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Updater;
use crate::context::Context;
use crate::error::RenderError;
use crate::options;
use crate::scheduler::{self, RootHandle, UpdateMsg};
use crate::tree::{FiberId, FiberKind, FiberTree};
use crate::types::SameValue;

// =============================================================================
// Dependency lists
// =============================================================================

/// A dependency array for effects and memoization.
///
/// `()` is the empty list (run once, never again). Tuples of up to six
/// [`SameValue`] elements compare element-wise. [`Always`] re-runs on every
/// render.
pub trait DepList: Any {
    /// Whether this list differs from the previously committed one.
    fn changed_from(&self, old: &dyn Any) -> bool;

    /// The list as a type-erased value for comparison against a newer one.
    fn as_any(&self) -> &dyn Any;
}

/// Marker dependency list that is always considered changed.
pub struct Always;

impl DepList for Always {
    fn changed_from(&self, _old: &dyn Any) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DepList for () {
    fn changed_from(&self, old: &dyn Any) -> bool {
        !old.is::<()>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! dep_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: SameValue + 'static),+> DepList for ($($name,)+) {
            fn changed_from(&self, old: &dyn Any) -> bool {
                let Some(old) = old.downcast_ref::<Self>() else {
                    return true;
                };
                $(
                    if !self.$idx.same_value(&old.$idx) {
                        return true;
                    }
                )+
                false
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

dep_tuple!(A: 0);
dep_tuple!(A: 0, B: 1);
dep_tuple!(A: 0, B: 1, C: 2);
dep_tuple!(A: 0, B: 1, C: 2, D: 3);
dep_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
dep_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

// =============================================================================
// Effect plumbing
// =============================================================================

/// Teardown returned by an effect callback; runs before the next invocation
/// and on unmount.
pub type Cleanup = Box<dyn FnOnce()>;

/// Wrap a closure as an effect cleanup.
pub fn cleanup(f: impl FnOnce() + 'static) -> Option<Cleanup> {
    Some(Box::new(f))
}

/// Values an effect callback may return.
pub trait EffectReturn {
    /// Normalize into the internal result shape.
    fn into_effect_result(self) -> Result<Option<Cleanup>, RenderError>;
}

impl EffectReturn for () {
    fn into_effect_result(self) -> Result<Option<Cleanup>, RenderError> {
        Ok(None)
    }
}

impl EffectReturn for Option<Cleanup> {
    fn into_effect_result(self) -> Result<Option<Cleanup>, RenderError> {
        Ok(self)
    }
}

impl EffectReturn for Result<Option<Cleanup>, RenderError> {
    fn into_effect_result(self) -> Result<Option<Cleanup>, RenderError> {
        self
    }
}

pub(crate) type EffectCallback = Box<dyn FnMut() -> Result<Option<Cleanup>, RenderError>>;

/// Which phase an effect runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EffectKind {
    /// Synchronous, during commit.
    Layout,
    /// Deferred until after paint.
    Passive,
}

// =============================================================================
// Hook records
// =============================================================================

type SameFn = fn(&dyn Any, &dyn Any) -> bool;

fn same_any<T: SameValue + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a.same_value(b),
        _ => false,
    }
}

pub(crate) struct StateHook {
    /// Committed value.
    pub value: Rc<dyn Any>,
    /// Value produced by dispatches since the last render.
    pub pending: Option<Rc<dyn Any>>,
    /// Same-value comparison for the committed type.
    pub same: SameFn,
    /// The typed dispatch handle, identity-stable across renders.
    pub binding: Rc<dyn Any>,
}

pub(crate) struct EffectHook {
    pub kind: EffectKind,
    /// Callback awaiting its next run.
    pub callback: Option<EffectCallback>,
    /// Teardown from the previous run.
    pub cleanup: Option<Cleanup>,
    /// Committed dependency list.
    pub deps: Option<Box<dyn DepList>>,
    /// Dependency list for the scheduled run; committed after the diff.
    pub pending_deps: Option<Box<dyn DepList>>,
}

pub(crate) struct MemoHook {
    pub value: Rc<dyn Any>,
    pub deps: Box<dyn DepList>,
}

pub(crate) struct ContextHook {
    pub context_id: u64,
    /// Set on the render that first found a provider; a mount subscribes at
    /// most once.
    pub subscribed: bool,
}

pub(crate) struct IdHook {
    pub value: Rc<str>,
}

/// One slot in an instance's hook list.
pub(crate) enum HookRecord {
    State(StateHook),
    Effect(EffectHook),
    Memo(MemoHook),
    Context(ContextHook),
    Id(IdHook),
}

impl HookRecord {
    fn kind_name(&self) -> &'static str {
        match self {
            HookRecord::State(_) => "state",
            HookRecord::Effect(_) => "effect",
            HookRecord::Memo(_) => "memo",
            HookRecord::Context(_) => "context",
            HookRecord::Id(_) => "id",
        }
    }
}

#[cold]
fn hook_order_violation(index: usize, expected: &'static str, found: &'static str) -> ! {
    panic!(
        "hook call order changed across renders: index {index} holds a {found} record but a \
         {expected} hook was called; hooks must run unconditionally in the same order every render"
    );
}

/// Ordered hook records of one instance.
#[derive(Default)]
pub struct HookList {
    pub(crate) records: Vec<HookRecord>,
}

impl HookList {
    /// Fold dispatched pending values into committed values. Returns whether
    /// any value actually changed.
    pub(crate) fn fold_pending(&mut self) -> bool {
        let mut changed = false;
        for record in &mut self.records {
            if let HookRecord::State(state) = record {
                if let Some(pending) = state.pending.take() {
                    if !(state.same)(&*state.value, &*pending) {
                        changed = true;
                    }
                    state.value = pending;
                }
            }
        }
        changed
    }

    /// Commit scheduled dependency lists after a diff.
    pub(crate) fn commit_pending_deps(&mut self) {
        for record in &mut self.records {
            if let HookRecord::Effect(effect) = record {
                if let Some(deps) = effect.pending_deps.take() {
                    effect.deps = Some(deps);
                }
            }
        }
    }

    /// Run every remaining cleanup (unmount path).
    pub(crate) fn run_cleanups(&mut self) {
        for record in &mut self.records {
            if let HookRecord::Effect(effect) = record {
                effect.callback = None;
                if let Some(teardown) = effect.cleanup.take() {
                    teardown();
                }
            }
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Boxed updater action used by the plain state hook.
pub type BoxUpdater<T> = Box<dyn FnOnce(&T) -> T>;

/// Dispatch handle for the plain state hook.
pub type StateDispatch<T> = Dispatch<T, BoxUpdater<T>>;

struct DispatchInner<T: 'static, A: 'static> {
    handle: RootHandle,
    fiber: FiberId,
    index: usize,
    reducer: Box<dyn Fn(&T, A) -> T>,
}

/// Dispatch function returned by the state/reducer hooks.
///
/// Cloneable and callable outside render passes. Dispatching a value that is
/// same-value equal to the current one does not enqueue a re-render.
/// Dispatches targeting an unmounted instance are ignored.
pub struct Dispatch<T: 'static, A: 'static = BoxUpdater<T>> {
    inner: Rc<DispatchInner<T, A>>,
}

impl<T: 'static, A: 'static> Clone for Dispatch<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: SameValue + 'static, A: 'static> Dispatch<T, A> {
    /// Run the reducer against the current value and schedule a re-render
    /// if the result differs by same-value identity.
    pub fn dispatch(&self, action: A) {
        let inner = self.inner.clone();
        let apply = Box::new(move |current: &dyn Any| -> Option<Rc<dyn Any>> {
            let current = current.downcast_ref::<T>()?;
            let next = (inner.reducer)(current, action);
            if current.same_value(&next) {
                None
            } else {
                Some(Rc::new(next))
            }
        });
        scheduler::send(
            &self.inner.handle,
            UpdateMsg::Action {
                fiber: self.inner.fiber,
                index: self.inner.index,
                apply,
            },
        );
    }
}

impl<T: SameValue + 'static> StateDispatch<T> {
    /// Replace the value.
    pub fn set(&self, value: T) {
        self.dispatch(Box::new(move |_| value));
    }

    /// Compute the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.dispatch(Box::new(f));
    }
}

// =============================================================================
// Render context
// =============================================================================

/// Per-render hook context handed to a component's render function.
///
/// Holds the hook cursor for this render and a borrow of the tree, so hook
/// state can only be touched while the owning instance is actually
/// rendering.
pub struct RenderCx<'a> {
    pub(crate) tree: &'a mut FiberTree,
    pub(crate) hooks: &'a mut HookList,
    pub(crate) fiber: FiberId,
    pub(crate) cursor: usize,
    pub(crate) handle: RootHandle,
    pub(crate) layout_queue: &'a mut Vec<usize>,
    pub(crate) passive_queue: &'a mut Vec<usize>,
    pub(crate) caught: Option<RenderError>,
    pub(crate) children: &'a [crate::element::Child],
}

impl<'a> RenderCx<'a> {
    /// Handle for state updates on this instance from outside the render.
    pub fn updater(&self) -> Updater {
        Updater {
            handle: self.handle.clone(),
            fiber: self.fiber,
        }
    }

    /// The element children passed to this component.
    pub fn children(&self) -> &[crate::element::Child] {
        self.children
    }

    /// The error this boundary claimed since its previous render, if any.
    pub fn caught_error(&self) -> Option<&RenderError> {
        self.caught.as_ref()
    }

    /// Advance the cursor, creating the record on first render and
    /// verifying the kind on every later one.
    fn advance(&mut self, kind: &'static str, make: impl FnOnce() -> HookRecord) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        options::emit_hook_access(self.fiber, index, kind);
        if index == self.hooks.records.len() {
            self.hooks.records.push(make());
        }
        let found = self.hooks.records[index].kind_name();
        if found != kind {
            hook_order_violation(index, kind, found);
        }
        index
    }

    // --- state / reducer ---

    /// State hook: returns the current value and a dispatch handle.
    pub fn use_state<T: SameValue + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> (Rc<T>, StateDispatch<T>) {
        self.use_reducer(|current: &T, action: BoxUpdater<T>| action(current), init)
    }

    /// Reducer hook: dispatches run `reducer(current, action)` and enqueue a
    /// re-render only when the result differs by same-value identity.
    pub fn use_reducer<T, A>(
        &mut self,
        reducer: impl Fn(&T, A) -> T + 'static,
        init: impl FnOnce() -> T,
    ) -> (Rc<T>, Dispatch<T, A>)
    where
        T: SameValue + 'static,
        A: 'static,
    {
        let index = self.advance("state", || {
            HookRecord::State(StateHook {
                value: Rc::new(()),
                pending: None,
                same: same_any::<T>,
                binding: Rc::new(()),
            })
        });

        let fresh = {
            let HookRecord::State(state) = &self.hooks.records[index] else {
                hook_order_violation(index, "state", "other");
            };
            !state.binding.is::<Dispatch<T, A>>()
        };

        if fresh {
            let dispatch = Dispatch {
                inner: Rc::new(DispatchInner {
                    handle: self.handle.clone(),
                    fiber: self.fiber,
                    index,
                    reducer: Box::new(reducer),
                }),
            };
            let HookRecord::State(state) = &mut self.hooks.records[index] else {
                hook_order_violation(index, "state", "other");
            };
            state.value = Rc::new(init());
            state.same = same_any::<T>;
            state.binding = Rc::new(dispatch);
        }

        let HookRecord::State(state) = &self.hooks.records[index] else {
            hook_order_violation(index, "state", "other");
        };
        let value = state
            .value
            .clone()
            .downcast::<T>()
            .unwrap_or_else(|_| hook_order_violation(index, "state", "state"));
        let dispatch = match state.binding.downcast_ref::<Dispatch<T, A>>() {
            Some(dispatch) => dispatch.clone(),
            None => hook_order_violation(index, "state", "state"),
        };
        (value, dispatch)
    }

    // --- effects ---

    /// Passive effect: runs after paint when `deps` changed since the last
    /// run.
    pub fn use_effect<R: EffectReturn>(
        &mut self,
        deps: impl DepList,
        f: impl FnMut() -> R + 'static,
    ) {
        self.effect(EffectKind::Passive, deps, f);
    }

    /// Layout effect: runs synchronously during commit, after host
    /// mutations, when `deps` changed since the last run.
    pub fn use_layout_effect<R: EffectReturn>(
        &mut self,
        deps: impl DepList,
        f: impl FnMut() -> R + 'static,
    ) {
        self.effect(EffectKind::Layout, deps, f);
    }

    fn effect<R: EffectReturn>(
        &mut self,
        kind: EffectKind,
        deps: impl DepList,
        mut f: impl FnMut() -> R + 'static,
    ) {
        let index = self.advance("effect", || {
            HookRecord::Effect(EffectHook {
                kind,
                callback: None,
                cleanup: None,
                deps: None,
                pending_deps: None,
            })
        });
        let HookRecord::Effect(effect) = &mut self.hooks.records[index] else {
            hook_order_violation(index, "effect", "other");
        };

        let changed = match &effect.deps {
            Some(old) => deps.changed_from(old.as_any()),
            None => true,
        };
        if !changed {
            return;
        }

        effect.kind = kind;
        effect.callback = Some(Box::new(move || f().into_effect_result()));
        effect.pending_deps = Some(Box::new(deps));
        match kind {
            EffectKind::Layout => self.layout_queue.push(index),
            EffectKind::Passive => self.passive_queue.push(index),
        }
    }

    // --- memoization ---

    /// Recompute `factory` only when `deps` changed; the returned value is
    /// shared, so its identity is stable while deps are unchanged.
    pub fn use_memo<T: 'static>(
        &mut self,
        deps: impl DepList,
        factory: impl FnOnce() -> T,
    ) -> Rc<T> {
        let index = self.advance("memo", || {
            HookRecord::Memo(MemoHook {
                value: Rc::new(()),
                deps: Box::new(Always),
            })
        });
        let HookRecord::Memo(memo) = &mut self.hooks.records[index] else {
            hook_order_violation(index, "memo", "other");
        };

        let stale = !memo.value.is::<T>() || deps.changed_from(memo.deps.as_any());
        if stale {
            memo.value = Rc::new(factory());
            memo.deps = Box::new(deps);
        }
        memo.value
            .clone()
            .downcast::<T>()
            .unwrap_or_else(|_| hook_order_violation(index, "memo", "memo"))
    }

    /// Memoized callback: identity is stable while `deps` are unchanged.
    pub fn use_callback<F: 'static>(&mut self, deps: impl DepList, f: F) -> Rc<F> {
        self.use_memo(deps, move || f)
    }

    /// Mutable cell that survives renders without triggering them.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        self.use_memo((), move || RefCell::new(init()))
    }

    // --- context ---

    /// Read the nearest ancestor-provided value for `context`, subscribing
    /// this instance exactly once per mount.
    pub fn use_context<T: 'static>(&mut self, context: &Context<T>) -> Rc<T> {
        let index = self.advance("context", || {
            HookRecord::Context(ContextHook {
                context_id: context.id(),
                subscribed: false,
            })
        });

        // Nearest provider above this position.
        let mut provider = None;
        let mut cursor = self.tree.parent(self.fiber);
        while let Some(id) = cursor {
            if let Some(fiber) = self.tree.get(id) {
                if let FiberKind::Provider { context_id, value, .. } = &fiber.kind {
                    if *context_id == context.id() {
                        provider = Some((id, value.clone()));
                        break;
                    }
                }
            }
            cursor = self.tree.parent(id);
        }

        let Some((provider_id, value)) = provider else {
            return context.default_value();
        };

        let subscribed = {
            let HookRecord::Context(record) = &self.hooks.records[index] else {
                hook_order_violation(index, "context", "other");
            };
            // Reading a different context at the same index is the same
            // class of misuse as reordering hooks.
            if record.context_id != context.id() {
                hook_order_violation(index, "context", "context");
            }
            record.subscribed
        };
        if !subscribed {
            if let Some(FiberKind::Provider { subscribers, .. }) =
                self.tree.get_mut(provider_id).map(|f| &mut f.kind)
            {
                subscribers.push(self.fiber);
            }
            let HookRecord::Context(record) = &mut self.hooks.records[index] else {
                hook_order_violation(index, "context", "other");
            };
            record.subscribed = true;
        }

        value
            .downcast::<T>()
            .unwrap_or_else(|_| context.default_value())
    }

    // --- derived ids ---

    /// Stable unique string scoped to the nearest suspense boundary or the
    /// root, monotonically incremented per call within that scope.
    pub fn use_id(&mut self) -> Rc<str> {
        let index = self.advance("id", || {
            HookRecord::Id(IdHook {
                value: Rc::from(""),
            })
        });

        let existing = {
            let HookRecord::Id(record) = &self.hooks.records[index] else {
                hook_order_violation(index, "id", "other");
            };
            (!record.value.is_empty()).then(|| record.value.clone())
        };
        if let Some(value) = existing {
            return value;
        }

        // Nearest boundary scope, falling back to the root scope.
        let mut boundary = None;
        let mut cursor = Some(self.fiber);
        while let Some(id) = cursor {
            if let Some(instance) = self.tree.instance(id) {
                if instance.suspense {
                    boundary = Some(id);
                    break;
                }
            }
            cursor = self.tree.parent(id);
        }

        let value: Rc<str> = match boundary {
            Some(id) => {
                if self.tree.instance(id).is_some_and(|i| i.id_mask.is_none()) {
                    let mask = self.tree.next_boundary_mask();
                    if let Some(instance) = self.tree.instance_mut(id) {
                        instance.id_mask = Some(mask);
                    }
                }
                match self.tree.instance_mut(id).and_then(|i| i.id_mask.as_mut()) {
                    Some(mask) => {
                        let value = format!("P{}-{}", mask.0, mask.1);
                        mask.1 += 1;
                        Rc::from(value.as_str())
                    }
                    None => Rc::from("P0-0"),
                }
            }
            None => {
                let mask = self.tree.root_mask_mut();
                let value = format!("P{}-{}", mask.0, mask.1);
                mask.1 += 1;
                Rc::from(value.as_str())
            }
        };

        let HookRecord::Id(record) = &mut self.hooks.records[index] else {
            hook_order_violation(index, "id", "other");
        };
        record.value = value.clone();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dep_list_empty_never_changes() {
        let deps = ();
        assert!(!deps.changed_from(&()));
    }

    #[test]
    fn test_dep_list_always_changes() {
        assert!(Always.changed_from(&Always));
    }

    #[test]
    fn test_dep_tuple_same_value() {
        let old = (1i64, "a".to_string());
        let new = (1i64, "a".to_string());
        assert!(!new.changed_from(&old));

        let new = (2i64, "a".to_string());
        assert!(new.changed_from(&old));
    }

    #[test]
    fn test_dep_tuple_nan_is_stable() {
        let old = (f64::NAN,);
        let new = (f64::NAN,);
        assert!(!new.changed_from(&old));

        let old = (0.0f64,);
        let new = (-0.0f64,);
        assert!(new.changed_from(&old));
    }

    use crate::tree::FiberTree;
    use crate::types::Key;

    struct Harness {
        tree: FiberTree,
        hooks: HookList,
        fiber: FiberId,
        layout: Vec<usize>,
        passive: Vec<usize>,
    }

    impl Harness {
        fn new() -> Self {
            let mut tree = FiberTree::new();
            let fiber = tree.insert(FiberKind::Fragment, Key::None, None);
            Self {
                tree,
                hooks: HookList::default(),
                fiber,
                layout: Vec::new(),
                passive: Vec::new(),
            }
        }

        /// One simulated render pass.
        fn render<R>(&mut self, body: impl FnOnce(&mut RenderCx<'_>) -> R) -> R {
            let mut cx = RenderCx {
                tree: &mut self.tree,
                hooks: &mut self.hooks,
                fiber: self.fiber,
                cursor: 0,
                handle: RootHandle::detached(),
                layout_queue: &mut self.layout,
                passive_queue: &mut self.passive,
                caught: None,
                children: &[],
            };
            body(&mut cx)
        }
    }

    #[test]
    fn test_use_state_initializes_once() {
        let mut harness = Harness::new();

        let first = harness.render(|cx| cx.use_state(|| 5i64).0);
        assert_eq!(*first, 5);

        // The initializer must not run again on later renders.
        let second = harness.render(|cx| cx.use_state(|| -> i64 { unreachable!("init re-ran") }).0);
        assert_eq!(*second, 5);
    }

    #[test]
    fn test_use_state_folds_pending_values() {
        let mut harness = Harness::new();
        harness.render(|cx| cx.use_state(|| 1i64));

        if let HookRecord::State(state) = &mut harness.hooks.records[0] {
            state.pending = Some(Rc::new(9i64));
        }
        assert!(harness.hooks.fold_pending());

        let value = harness.render(|cx| cx.use_state(|| 0i64).0);
        assert_eq!(*value, 9);
    }

    #[test]
    fn test_use_memo_recomputes_only_on_dep_change() {
        use std::cell::Cell;

        let mut harness = Harness::new();
        let runs = Rc::new(Cell::new(0));

        let mut pass = |dep: i64| {
            let runs = runs.clone();
            harness.render(move |cx| {
                cx.use_memo((dep,), move || {
                    runs.set(runs.get() + 1);
                    dep * 2
                })
            })
        };

        let first = pass(3);
        let second = pass(3);
        assert_eq!(runs.get(), 1);
        assert!(Rc::ptr_eq(&first, &second));

        let third = pass(4);
        assert_eq!(runs.get(), 2);
        assert_eq!(*third, 8);
    }

    #[test]
    fn test_use_ref_survives_renders() {
        let mut harness = Harness::new();

        let cell = harness.render(|cx| cx.use_ref(|| 0i64));
        *cell.borrow_mut() = 42;

        let again = harness.render(|cx| cx.use_ref(|| 0i64));
        assert_eq!(*again.borrow(), 42);
        assert!(Rc::ptr_eq(&cell, &again));
    }

    #[test]
    fn test_use_callback_identity_is_stable() {
        let mut harness = Harness::new();

        let first = harness.render(|cx| cx.use_callback((1i64,), (|x: i64| x + 1) as fn(i64) -> i64));
        let second = harness.render(|cx| cx.use_callback((1i64,), (|x: i64| x + 1) as fn(i64) -> i64));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second(2), 3);
    }

    #[test]
    fn test_effect_schedules_only_on_dep_change() {
        let mut harness = Harness::new();

        harness.render(|cx| cx.use_effect((1i64,), || {}));
        assert_eq!(harness.passive, vec![0]);
        harness.passive.clear();
        harness.hooks.commit_pending_deps();

        harness.render(|cx| cx.use_effect((1i64,), || {}));
        assert_eq!(harness.passive, Vec::<usize>::new());

        harness.render(|cx| cx.use_effect((2i64,), || {}));
        assert_eq!(harness.passive, vec![0]);
    }

    #[test]
    #[should_panic(expected = "hook call order changed")]
    fn test_hook_order_violation_fails_fast() {
        let mut harness = Harness::new();
        harness.render(|cx| {
            cx.use_state(|| 0i64);
        });
        // A different hook kind at index 0 on the next render.
        harness.render(|cx| {
            cx.use_memo((), || 0i64);
        });
    }

    #[test]
    fn test_fold_pending_reports_change() {
        let mut hooks = HookList::default();
        hooks.records.push(HookRecord::State(StateHook {
            value: Rc::new(1i64),
            pending: Some(Rc::new(2i64)),
            same: same_any::<i64>,
            binding: Rc::new(()),
        }));

        assert!(hooks.fold_pending());

        // Folding an identical pending value reports no change.
        if let HookRecord::State(state) = &mut hooks.records[0] {
            state.pending = Some(Rc::new(2i64));
        }
        assert!(!hooks.fold_pending());
    }
}
