//! Root - render entry points and the flush loop.
//!
//! A [`Root`] binds an element tree to a container node in a host document.
//! It is the token for incremental re-invocation: calling
//! [`Root::render`] again diffs against the previously committed tree.
//!
//! The root owns the fiber arena, the host, and the scheduler. User
//! callbacks (renders, effects, event handlers) run through a shared
//! `RefCell`; state updates fired from inside a pass land in the always-
//! writable mailbox and are drained at the pass's next step, so re-entrant
//! dispatch never corrupts an in-progress diff. Calling a render entry
//! point re-entrantly on the same root fails fast with
//! [`RenderError::Busy`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::Instance;
use crate::diff;
use crate::element::Child;
use crate::error::{RenderError, Signal};
use crate::hooks::HookRecord;
use crate::host::{EventPayload, Host, NodeRef, Task};
use crate::options;
use crate::scheduler::{FRAME_FALLBACK_MS, RootHandle, Scheduler, UpdateMsg};
use crate::tree::{FiberFlags, FiberId, FiberKind, FiberTree};
use crate::types::Key;

// =============================================================================
// RootInner
// =============================================================================

pub(crate) struct RootInner {
    pub(crate) tree: FiberTree,
    pub(crate) host: Box<dyn Host>,
    pub(crate) container: NodeRef,
    /// Synthetic top fiber; its children are the rendered tree.
    pub(crate) root_fiber: FiberId,
    pub(crate) scheduler: Scheduler,
    pub(crate) handle: RootHandle,
    /// Last error that surfaced outside a synchronous entry point.
    pub(crate) last_error: Option<RenderError>,
}

impl RootInner {
    // --- update mailbox ---

    /// Apply every queued update message. Loops because applying one (a
    /// reducer is user code) may queue more.
    pub(crate) fn drain_updates(&mut self) {
        loop {
            let messages: Vec<UpdateMsg> =
                std::mem::take(&mut *self.handle.mailbox.borrow_mut());
            if messages.is_empty() {
                break;
            }
            for message in messages {
                self.apply_update(message);
            }
        }
    }

    fn apply_update(&mut self, message: UpdateMsg) {
        match message {
            UpdateMsg::SetState { fiber, patch } => {
                let Some(instance) = self.tree.instance_mut(fiber) else {
                    return; // unmounted: ignored
                };
                instance.pending.push(patch);
                self.enqueue_update(fiber, FiberFlags::DIRTY);
            }
            UpdateMsg::Force { fiber } => {
                if self.tree.instance(fiber).is_none() {
                    return;
                }
                self.enqueue_update(fiber, FiberFlags::FORCE);
            }
            UpdateMsg::Action { fiber, index, apply } => {
                let changed = match self.tree.instance_mut(fiber) {
                    Some(instance) => match instance.hooks.records.get_mut(index) {
                        Some(HookRecord::State(record)) => {
                            let current =
                                record.pending.clone().unwrap_or_else(|| record.value.clone());
                            match apply(&*current) {
                                Some(next) => {
                                    record.pending = Some(next);
                                    true
                                }
                                None => false, // same-value: no re-render
                            }
                        }
                        _ => false,
                    },
                    None => false,
                };
                if changed {
                    self.enqueue_update(fiber, FiberFlags::HOOK_DIRTY);
                }
            }
        }
    }

    /// Mark an instance dirty and queue it (deduplicated) for the next
    /// flush.
    pub(crate) fn enqueue_update(&mut self, fiber: FiberId, flags: FiberFlags) {
        if self.tree.instance(fiber).is_none() {
            return;
        }
        self.tree.add_flags(fiber, flags);
        self.scheduler.enqueue(fiber);
    }

    // --- flush ---

    /// Render every pending instance exactly once, parents first.
    fn run_queue(&mut self) {
        loop {
            self.drain_updates();
            let next = {
                let tree = &self.tree;
                self.scheduler.pop_min(|fiber| tree.depth(fiber))
            };
            let Some(fiber) = next else { break };
            // Rendered already this flush as a descendant of an earlier
            // dirty instance.
            if !self.tree.flags(fiber).is_queued() {
                continue;
            }
            log::debug!("flushing queued render of {fiber:?}");

            let (scope, host_node) = self.host_scope_of(fiber);
            let mut commit = Vec::new();
            let result = diff::render_component(self, fiber, None, host_node, &mut commit, None);

            match result {
                Ok(()) => {
                    diff::place_children(self, scope, host_node);
                    let unclaimed = self.commit_pass(commit);
                    for error in unclaimed {
                        self.report_uncaught(error);
                    }
                }
                Err(signal) => {
                    if let Some(error) = self.route_signal_up(fiber, signal) {
                        self.report_uncaught(error);
                    }
                }
            }
        }
    }

    /// Run commit work for instances that queued it: the mount callback,
    /// then layout effects. Effect errors are caught per callback so one
    /// failure never starves its siblings, then forwarded to boundaries;
    /// unclaimed errors are returned.
    pub(crate) fn commit_pass(&mut self, commit: Vec<FiberId>) -> Vec<RenderError> {
        let mut unclaimed = Vec::new();
        for fiber in commit {
            let needs_mount = self
                .tree
                .instance(fiber)
                .map(|instance| !instance.mounted)
                .unwrap_or(false);
            if needs_mount {
                if let Some(mut behavior) = self
                    .tree
                    .instance_mut(fiber)
                    .and_then(|instance| instance.behavior.take())
                {
                    behavior.did_mount();
                    if let Some(instance) = self.tree.instance_mut(fiber) {
                        instance.behavior = Some(behavior);
                    }
                }
                if let Some(instance) = self.tree.instance_mut(fiber) {
                    instance.mounted = true;
                }
            }

            let indices = self
                .tree
                .instance_mut(fiber)
                .map(|instance| std::mem::take(&mut instance.layout_queue))
                .unwrap_or_default();
            if indices.is_empty() {
                continue;
            }
            let errors = self.run_effects(fiber, &indices);
            for error in errors {
                if !self.route_error(fiber, error.clone()) {
                    unclaimed.push(error);
                }
            }
        }
        unclaimed
    }

    /// Run the effect records at `indices` for a live instance.
    fn run_effects(&mut self, fiber: FiberId, indices: &[usize]) -> Vec<RenderError> {
        let Some(mut instance) = self.tree.take_instance(fiber) else {
            return Vec::new();
        };
        let errors = run_instance_effects(&mut instance, indices);
        self.tree.put_instance(fiber, instance);
        errors
    }

    // --- passive effects ---

    /// Schedule the after-paint pass: a frame callback plus an independent
    /// timeout, whichever fires first.
    pub(crate) fn schedule_passive_flush(&mut self) {
        if !self.scheduler.wants_passive_flush() {
            return;
        }
        self.scheduler.mark_passive_scheduled();

        let fired = Rc::new(Cell::new(false));
        let frame_handle = self.handle.clone();
        let frame_fired = fired.clone();
        self.host.request_frame(Box::new(move || {
            if !frame_fired.replace(true) {
                flush_passive_entry(&frame_handle);
            }
        }));
        let timeout_handle = self.handle.clone();
        self.host.set_timeout(
            Box::new(move || {
                if !fired.replace(true) {
                    flush_passive_entry(&timeout_handle);
                }
            }),
            FRAME_FALLBACK_MS,
        );
    }

    /// Run every batched passive effect. Instances unmounted since they
    /// queued are skipped - their effects never run.
    fn flush_passive(&mut self) {
        let batch = self.scheduler.take_passive();
        if batch.is_empty() {
            return;
        }
        log::debug!("running passive effects for {} instance(s)", batch.len());
        for fiber in batch {
            if self.tree.instance(fiber).is_none() {
                continue;
            }
            let indices = self
                .tree
                .instance_mut(fiber)
                .map(|instance| std::mem::take(&mut instance.passive_queue))
                .unwrap_or_default();
            if indices.is_empty() {
                continue;
            }
            let errors = self.run_effects(fiber, &indices);
            for error in errors {
                self.report_effect_error(fiber, error);
            }
        }
    }

    // --- error routing ---

    /// Walk boundaries above `from`, offering them the signal. Returns the
    /// error if nothing claimed it.
    fn route_signal_up(&mut self, from: FiberId, signal: Signal) -> Option<RenderError> {
        let mut cursor = self.tree.parent(from);
        let mut signal = signal;
        while let Some(fiber) = cursor {
            if self.tree.instance(fiber).is_some() {
                match diff::handle_signal(self, fiber, signal) {
                    Ok(()) => return None,
                    Err(unclaimed) => signal = unclaimed,
                }
            }
            cursor = self.tree.parent(fiber);
        }
        match signal {
            Signal::Error(error) => Some(error),
            Signal::Suspend(_) => Some(RenderError::msg(
                "component suspended with no suspense boundary above it",
            )),
        }
    }

    /// Route an error from `from` to the nearest boundary. Returns whether
    /// it was claimed.
    pub(crate) fn route_error(&mut self, from: FiberId, error: RenderError) -> bool {
        self.route_signal_up(from, Signal::Error(error)).is_none()
    }

    /// Route an effect error, surfacing it when unclaimed.
    pub(crate) fn report_effect_error(&mut self, fiber: FiberId, error: RenderError) {
        if !self.route_error(fiber, error.clone()) {
            self.report_uncaught(error);
        }
    }

    /// Surface an error that reached the top outside a synchronous entry
    /// point.
    pub(crate) fn report_uncaught(&mut self, error: RenderError) {
        if !options::emit_uncaught_error(&error) {
            log::error!("uncaught render error: {error}");
        }
        self.last_error = Some(error);
    }

    // --- queries ---

    /// Nearest enclosing host scope of a fiber: the host-element fiber and
    /// its node, or the synthetic root and the container.
    fn host_scope_of(&self, fiber: FiberId) -> (FiberId, NodeRef) {
        let mut cursor = self.tree.parent(fiber);
        while let Some(id) = cursor {
            if let Some(FiberKind::Host { node: Some(node), .. }) =
                self.tree.get(id).map(|f| &f.kind)
            {
                return (id, *node);
            }
            cursor = self.tree.parent(id);
        }
        (self.root_fiber, self.container)
    }
}

/// Run the effect records at `indices` on a detached instance: the previous
/// cleanup first, then the callback. Each callback's failure is caught and
/// collected so sibling effects still run.
pub(crate) fn run_instance_effects(instance: &mut Instance, indices: &[usize]) -> Vec<RenderError> {
    let mut errors = Vec::new();
    for &index in indices {
        let taken = match instance.hooks.records.get_mut(index) {
            Some(HookRecord::Effect(effect)) => {
                log::trace!("running {:?} effect at hook index {index}", effect.kind);
                Some((effect.cleanup.take(), effect.callback.take()))
            }
            _ => None,
        };
        let Some((teardown, callback)) = taken else {
            continue;
        };
        if let Some(teardown) = teardown {
            teardown();
        }
        let Some(mut callback) = callback else {
            continue;
        };
        let result = callback();
        if let Some(HookRecord::Effect(effect)) = instance.hooks.records.get_mut(index) {
            effect.callback = Some(callback);
            match result {
                Ok(cleanup) => effect.cleanup = cleanup,
                Err(error) => errors.push(error),
            }
        } else if let Err(error) = result {
            errors.push(error);
        }
    }
    errors
}

// =============================================================================
// Flush entry points
// =============================================================================

/// Schedule a deferred flush when the pending set is non-empty and none is
/// in flight. Scheduling happens outside the root borrow so a synchronous
/// `debounce_rendering` override can run the flush immediately.
pub(crate) fn schedule_flush(rc: &Rc<RefCell<RootInner>>) {
    let handle = {
        let Ok(mut inner) = rc.try_borrow_mut() else {
            return;
        };
        if !inner.scheduler.wants_flush() {
            return;
        }
        inner.scheduler.mark_flush_scheduled();
        inner.handle.clone()
    };

    let task_handle = handle.clone();
    let task: Task = Box::new(move || process_flush(&task_handle));
    if let Some(task) = options::debounce(task) {
        if let Ok(mut inner) = rc.try_borrow_mut() {
            inner.host.defer(task);
        }
    }
}

/// One flush: drain updates, render the pending set, schedule the passive
/// pass, then re-check for work produced by effects.
pub(crate) fn process_flush(handle: &RootHandle) {
    let Some(rc) = handle.inner.upgrade() else {
        return;
    };
    {
        let Ok(mut inner) = rc.try_borrow_mut() else {
            return;
        };
        inner.scheduler.clear_flush_scheduled();
        inner.run_queue();
        inner.schedule_passive_flush();
    }
    schedule_flush(&rc);
}

/// Passive pass entry, shared by the frame callback and its timeout
/// fallback.
fn flush_passive_entry(handle: &RootHandle) {
    let Some(rc) = handle.inner.upgrade() else {
        return;
    };
    {
        let Ok(mut inner) = rc.try_borrow_mut() else {
            return;
        };
        inner.flush_passive();
        inner.drain_updates();
    }
    schedule_flush(&rc);
}

// =============================================================================
// Root
// =============================================================================

/// A render target: one container node in one host document.
///
/// Cloning yields another handle to the same root.
#[derive(Clone)]
pub struct Root {
    inner: Rc<RefCell<RootInner>>,
}

impl Root {
    /// Bind a root to `container` in `host`.
    pub fn new(host: impl Host, container: NodeRef) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let mut tree = FiberTree::new();
            let root_fiber = tree.insert(FiberKind::Fragment, Key::None, None);
            RefCell::new(RootInner {
                tree,
                host: Box::new(host),
                container,
                root_fiber,
                scheduler: Scheduler::default(),
                handle: RootHandle {
                    inner: weak.clone(),
                    mailbox: Rc::new(RefCell::new(Vec::new())),
                },
                last_error: None,
            })
        });
        Self { inner }
    }

    /// Mount or update the tree rooted at the container.
    pub fn render(&self, child: impl Into<Child>) -> Result<(), RenderError> {
        self.render_inner(child.into(), false)
    }

    /// Like [`Root::render`], but reconcile against markup already present
    /// in the container instead of building fresh.
    pub fn hydrate(&self, child: impl Into<Child>) -> Result<(), RenderError> {
        self.render_inner(child.into(), true)
    }

    fn render_inner(&self, child: Child, hydrate: bool) -> Result<(), RenderError> {
        let result = {
            let mut inner = self
                .inner
                .try_borrow_mut()
                .map_err(|_| RenderError::Busy)?;
            let result = diff::patch_root(&mut inner, child, hydrate);
            inner.drain_updates();
            result
        };
        schedule_flush(&self.inner);
        result
    }

    /// Remove everything rendered into the container.
    pub fn unmount(&self) -> Result<(), RenderError> {
        self.render(Child::Hole)
    }

    /// Deliver a host event to the delegated handler stored for
    /// `(target, event)`. Returns whether a handler ran.
    pub fn dispatch_event(&self, target: NodeRef, event: &str) -> bool {
        let handler = {
            let Ok(inner) = self.inner.try_borrow() else {
                return false;
            };
            let Some(fiber) = inner.tree.fiber_for_node(target) else {
                return false;
            };
            inner
                .tree
                .host_state(fiber)
                .and_then(|state| state.listeners.get(event).cloned())
        };
        match handler {
            Some(handler) => {
                handler.call(&EventPayload {
                    kind: Rc::from(event),
                    target,
                });
                true
            }
            None => false,
        }
    }

    /// Flush pending re-renders now instead of waiting for the deferred
    /// task.
    pub fn flush_sync(&self) {
        let handle = {
            let Ok(inner) = self.inner.try_borrow() else {
                return;
            };
            inner.handle.clone()
        };
        process_flush(&handle);
    }

    /// The last error that surfaced outside a synchronous entry point
    /// (from a deferred flush or an effect pass).
    pub fn take_error(&self) -> Option<RenderError> {
        self.inner.borrow_mut().last_error.take()
    }

    /// The container node this root renders into.
    pub fn container(&self) -> NodeRef {
        self.inner.borrow().container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Render};
    use crate::element::{Child, ComponentSpec, Element, fragment, h, text};
    use crate::error::Suspension;
    use crate::hooks::{RenderCx, StateDispatch, cleanup};
    use crate::host::{HostOp, MemoryHost};
    use crate::types::Props;

    fn setup() -> (MemoryHost, Root) {
        let host = MemoryHost::new();
        let root = Root::new(host.clone(), host.root());
        (host, root)
    }

    fn created_count(ops: &[HostOp]) -> usize {
        ops.iter()
            .filter(|op| matches!(op, HostOp::CreateElement(_) | HostOp::CreateText(_)))
            .count()
    }

    // --- mounting and diffing host trees ---

    #[test]
    fn test_mount_builds_tree() {
        let (host, root) = setup();
        root.render(h(
            "div",
            Props::new().with("id", "app"),
            [h("p", Props::new(), [text("hello")]).into()],
        ))
        .unwrap();

        assert_eq!(host.html(), "<div id=\"app\"><p>hello</p></div>");
    }

    #[test]
    fn test_same_type_reuses_node_and_merges_props() {
        let (host, root) = setup();
        root.render(h("div", Props::new().with("a", 1).with("b", 2), []))
            .unwrap();
        let node = host.child_list(host.root())[0];

        root.render(h("div", Props::new().with("a", 1).with("c", 3), []))
            .unwrap();

        // Same host node survives; props are diffed, not replaced.
        assert_eq!(host.child_list(host.root()), vec![node]);
        assert_eq!(host.attr(node, "a").is_some(), true);
        assert!(host.attr(node, "b").is_none());
        assert!(host.attr(node, "c").is_some());
    }

    #[test]
    fn test_type_change_replaces_subtree() {
        let (host, root) = setup();
        root.render(h("div", Props::new(), [text("x")])).unwrap();
        let old = host.child_list(host.root())[0];

        root.render(h("span", Props::new(), [text("x")])).unwrap();
        let new = host.child_list(host.root())[0];

        assert_ne!(old, new);
        assert_eq!(host.html(), "<span>x</span>");
    }

    #[test]
    fn test_render_nothing_empties_container() {
        let (host, root) = setup();
        root.render(h(
            "div",
            Props::new(),
            [text("a"), h("p", Props::new(), []).into()],
        ))
        .unwrap();
        assert!(!host.child_list(host.root()).is_empty());

        root.render(Child::Hole).unwrap();
        assert!(host.child_list(host.root()).is_empty());
        assert_eq!(host.html(), "");
    }

    #[test]
    fn test_identical_rerender_is_mutation_free() {
        let (host, root) = setup();
        let build = || {
            h(
                "div",
                Props::new().with("id", "app").with("n", 7),
                [
                    text("a"),
                    h("span", Props::new().with("x", "y"), [text("b")]).into(),
                ],
            )
        };

        root.render(build()).unwrap();
        host.take_ops();

        root.render(build()).unwrap();
        assert_eq!(host.take_ops(), vec![]);
    }

    #[test]
    fn test_text_update_mutates_in_place() {
        let (host, root) = setup();
        root.render(h("div", Props::new(), [text("one")])).unwrap();
        host.take_ops();

        root.render(h("div", Props::new(), [text("two")])).unwrap();
        let ops = host.take_ops();
        assert_eq!(created_count(&ops), 0);
        assert!(ops.iter().any(|op| matches!(op, HostOp::SetText { .. })));
        assert_eq!(host.html(), "<div>two</div>");
    }

    #[test]
    fn test_keyed_reorder_moves_without_recreating() {
        let (host, root) = setup();
        let item = |k: &str| h("li", Props::new().with("key", k), [text(k)]);

        root.render(h(
            "ul",
            Props::new(),
            [item("1").into(), item("2").into(), item("3").into()],
        ))
        .unwrap();
        let ul = host.child_list(host.root())[0];
        let before = host.child_list(ul);
        host.take_ops();

        root.render(h(
            "ul",
            Props::new(),
            [item("3").into(), item("1").into(), item("2").into()],
        ))
        .unwrap();
        let after = host.child_list(ul);

        assert_eq!(created_count(&host.take_ops()), 0);
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[2]);
        assert_eq!(after[1], before[0]);
        assert_eq!(after[2], before[1]);
        assert_eq!(host.to_html(ul), "<ul><li>3</li><li>1</li><li>2</li></ul>");
    }

    #[test]
    fn test_hole_toggle_is_replacement_not_move() {
        let (host, root) = setup();
        root.render(h("div", Props::new(), [Child::Hole, text("b")]))
            .unwrap();
        let div = host.child_list(host.root())[0];
        let b_node = host.child_list(div)[0];

        root.render(h("div", Props::new(), [text("a"), text("b")]))
            .unwrap();
        let children = host.child_list(div);

        // "b" kept its node; the hole position became a fresh text node.
        assert_eq!(children.len(), 2);
        assert_eq!(children[1], b_node);
        assert_eq!(host.to_html(div), "<div>ab</div>");
    }

    #[test]
    fn test_fragments_are_transparent() {
        let (host, root) = setup();
        root.render(h(
            "div",
            Props::new(),
            [fragment([text("a"), text("b")]).into(), text("c")],
        ))
        .unwrap();

        assert_eq!(host.html(), "<div>abc</div>");
    }

    #[test]
    fn test_sibling_lists_scope_keys_independently() {
        let (host, root) = setup();
        let keyed = |k: &str, t: &str| Child::from(h("i", Props::new().with("key", k), [text(t)]));

        root.render(h(
            "div",
            Props::new(),
            [
                Child::list([keyed("a", "1"), keyed("b", "2")]),
                Child::list([keyed("a", "3")]),
            ],
        ))
        .unwrap();

        // The repeated key "a" across sibling lists is not a collision.
        assert_eq!(host.html(), "<div><i>1</i><i>2</i><i>3</i></div>");
    }

    // --- event delegation ---

    #[test]
    fn test_handler_swap_keeps_one_listener_and_fires_latest() {
        use std::cell::Cell;

        let (host, root) = setup();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let f1 = first.clone();
        root.render(h(
            "div",
            Props::new().on("click", move |_| f1.set(f1.get() + 1)),
            [],
        ))
        .unwrap();
        let div = host.child_list(host.root())[0];
        assert_eq!(host.listener_count(div, "click"), 1);

        let f2 = second.clone();
        root.render(h(
            "div",
            Props::new().on("click", move |_| f2.set(f2.get() + 1)),
            [],
        ))
        .unwrap();

        // Exactly one underlying listener across both renders.
        assert_eq!(host.listener_count(div, "click"), 1);

        assert!(root.dispatch_event(div, "click"));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_removing_last_handler_detaches_listener() {
        let (host, root) = setup();
        root.render(h("div", Props::new().on("click", |_| {}), []))
            .unwrap();
        let div = host.child_list(host.root())[0];
        assert_eq!(host.listener_count(div, "click"), 1);

        root.render(h("div", Props::new(), [])).unwrap();
        assert_eq!(host.listener_count(div, "click"), 0);
        assert!(!root.dispatch_event(div, "click"));
    }

    // --- component lifecycle ---

    thread_local! {
        static LIFECYCLE: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn lifecycle_log() -> Vec<String> {
        LIFECYCLE.with(|log| log.borrow().clone())
    }

    fn push_lifecycle(entry: &str) {
        LIFECYCLE.with(|log| log.borrow_mut().push(entry.to_string()));
    }

    #[derive(Default)]
    struct First;

    impl Component for First {
        fn render(&mut self, _p: &Props, _s: &Props, _cx: &mut RenderCx<'_>) -> Render {
            Ok(text("first"))
        }

        fn did_mount(&mut self) {
            push_lifecycle("mount first");
        }

        fn will_unmount(&mut self) {
            push_lifecycle("unmount first");
        }
    }

    #[derive(Default)]
    struct Second;

    impl Component for Second {
        fn render(&mut self, _p: &Props, _s: &Props, _cx: &mut RenderCx<'_>) -> Render {
            Ok(text("second"))
        }

        fn did_mount(&mut self) {
            push_lifecycle("mount second");
        }
    }

    #[test]
    fn test_type_change_unmounts_before_mounting() {
        let (host, root) = setup();
        root.render(Element::component::<First>(Props::new(), []))
            .unwrap();
        assert_eq!(lifecycle_log(), vec!["mount first"]);

        root.render(Element::component::<Second>(Props::new(), []))
            .unwrap();
        assert_eq!(
            lifecycle_log(),
            vec!["mount first", "unmount first", "mount second"]
        );
        assert_eq!(host.html(), "second");
    }

    // --- state hooks and the scheduler ---

    thread_local! {
        static RENDER_COUNT: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
        static COUNTER_DISPATCH: RefCell<Option<StateDispatch<i64>>> = const { RefCell::new(None) };
    }

    fn counter(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        RENDER_COUNT.with(|count| count.set(count.get() + 1));
        let (value, dispatch) = cx.use_state(|| 0i64);
        COUNTER_DISPATCH.with(|slot| *slot.borrow_mut() = Some(dispatch));
        Ok(text(*value))
    }

    fn counter_dispatch() -> StateDispatch<i64> {
        COUNTER_DISPATCH.with(|slot| slot.borrow().clone().expect("counter rendered"))
    }

    #[test]
    fn test_three_dispatches_flush_as_one_render() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(counter), Props::new(), []))
            .unwrap();
        assert_eq!(RENDER_COUNT.with(|c| c.get()), 1);
        assert_eq!(host.html(), "0");

        let dispatch = counter_dispatch();
        dispatch.update(|n| n + 1);
        dispatch.update(|n| n + 1);
        dispatch.update(|n| n + 1);

        // Nothing rendered yet; the flush is deferred and deduplicated.
        assert_eq!(RENDER_COUNT.with(|c| c.get()), 1);
        host.run_tasks();

        assert_eq!(RENDER_COUNT.with(|c| c.get()), 2);
        assert_eq!(host.html(), "3");
    }

    #[test]
    fn test_same_value_dispatch_does_not_enqueue() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(counter), Props::new(), []))
            .unwrap();

        counter_dispatch().set(0);
        host.run_tasks();

        assert_eq!(RENDER_COUNT.with(|c| c.get()), 1);
        assert_eq!(host.html(), "0");
    }

    #[test]
    fn test_dispatch_after_unmount_is_ignored() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(counter), Props::new(), []))
            .unwrap();
        let dispatch = counter_dispatch();

        root.render(Child::Hole).unwrap();
        dispatch.update(|n| n + 1);
        host.run_tasks();

        assert_eq!(host.html(), "");
        assert_eq!(RENDER_COUNT.with(|c| c.get()), 1);
    }

    // --- effects ---

    thread_local! {
        static EFFECT_LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn effect_log() -> Vec<String> {
        EFFECT_LOG.with(|log| log.borrow().clone())
    }

    fn push_effect(entry: &str) {
        EFFECT_LOG.with(|log| log.borrow_mut().push(entry.to_string()));
    }

    fn once_effect(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        cx.use_effect((), || {
            push_effect("run");
            cleanup(|| push_effect("cleanup"))
        });
        Ok(text("x"))
    }

    #[test]
    fn test_effect_with_unchanged_deps_runs_once() {
        let (host, root) = setup();
        let el = || h(ComponentSpec::function(once_effect), Props::new(), []);

        root.render(el()).unwrap();
        host.fire_frame();
        assert_eq!(effect_log(), vec!["run"]);

        root.render(el()).unwrap();
        host.fire_frame();
        host.fire_timeouts();

        // Unchanged deps: neither the callback nor the cleanup re-ran.
        assert_eq!(effect_log(), vec!["run"]);
    }

    #[test]
    fn test_passive_effect_falls_back_to_timeout() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(once_effect), Props::new(), []))
            .unwrap();

        // No frame notification arrives; the timeout fallback fires it.
        host.fire_timeouts();
        assert_eq!(effect_log(), vec!["run"]);

        // The late frame must not run it a second time.
        host.fire_frame();
        assert_eq!(effect_log(), vec!["run"]);
    }

    #[test]
    fn test_unmount_cancels_pending_passive_effect() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(once_effect), Props::new(), []))
            .unwrap();

        // Unmount before the paint notification.
        root.render(Child::Hole).unwrap();
        host.fire_frame();
        host.fire_timeouts();

        assert_eq!(effect_log(), Vec::<String>::new());
    }

    #[test]
    fn test_unmount_runs_cleanup() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(once_effect), Props::new(), []))
            .unwrap();
        host.fire_frame();
        assert_eq!(effect_log(), vec!["run"]);

        root.render(Child::Hole).unwrap();
        assert_eq!(effect_log(), vec!["run", "cleanup"]);
    }

    fn layout_effect(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        cx.use_layout_effect((), || {
            push_effect("layout");
        });
        cx.use_effect((), || {
            push_effect("passive");
        });
        Ok(text("x"))
    }

    #[test]
    fn test_layout_effects_run_in_the_same_flush() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(layout_effect), Props::new(), []))
            .unwrap();

        // Layout ran synchronously with the render; passive waits for paint.
        assert_eq!(effect_log(), vec!["layout"]);
        host.fire_frame();
        assert_eq!(effect_log(), vec!["layout", "passive"]);
    }

    // --- update skipping ---

    thread_local! {
        static VETO_RENDERS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
        static VETO_UPDATER: RefCell<Option<crate::component::Updater>> = const { RefCell::new(None) };
    }

    #[derive(Default)]
    struct Stubborn;

    impl Component for Stubborn {
        fn render(&mut self, _p: &Props, _s: &Props, cx: &mut RenderCx<'_>) -> Render {
            VETO_RENDERS.with(|count| count.set(count.get() + 1));
            VETO_UPDATER.with(|slot| *slot.borrow_mut() = Some(cx.updater()));
            Ok(text("stubborn"))
        }

        fn should_update(&mut self, _next_props: &Props, _next_state: &Props) -> bool {
            false
        }
    }

    #[test]
    fn test_skip_predicate_blocks_update_but_not_force() {
        let (host, root) = setup();
        root.render(Element::component::<Stubborn>(Props::new(), []))
            .unwrap();
        assert_eq!(VETO_RENDERS.with(|c| c.get()), 1);

        let updater = VETO_UPDATER.with(|slot| slot.borrow().clone().expect("rendered"));
        updater.set_state(Props::new().with("n", 1));
        host.run_tasks();
        assert_eq!(VETO_RENDERS.with(|c| c.get()), 1);

        updater.force_update();
        host.run_tasks();
        assert_eq!(VETO_RENDERS.with(|c| c.get()), 2);
        assert_eq!(host.html(), "stubborn");
    }

    // --- context ---

    thread_local! {
        static THEME: RefCell<Option<crate::context::Context<String>>> =
            const { RefCell::new(None) };
    }

    fn theme_context() -> crate::context::Context<String> {
        THEME.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(|| crate::context::create_context("plain".to_string()))
                .clone()
        })
    }

    fn themed_label(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        let ctx = theme_context();
        let theme = cx.use_context(&ctx);
        Ok(text(theme.as_str()))
    }

    #[test]
    fn test_context_default_without_provider() {
        let (host, root) = setup();
        root.render(h(ComponentSpec::function(themed_label), Props::new(), []))
            .unwrap();
        assert_eq!(host.html(), "plain");
    }

    #[test]
    fn test_context_provider_value_and_update() {
        let (host, root) = setup();
        let ctx = theme_context();

        root.render(ctx.provider(
            "dark".to_string(),
            [h(ComponentSpec::function(themed_label), Props::new(), []).into()],
        ))
        .unwrap();
        assert_eq!(host.html(), "dark");

        root.render(ctx.provider(
            "light".to_string(),
            [h(ComponentSpec::function(themed_label), Props::new(), []).into()],
        ))
        .unwrap();
        host.run_tasks();
        assert_eq!(host.html(), "light");
    }

    // --- error boundaries ---

    fn failing(_props: &Props, _cx: &mut RenderCx<'_>) -> Render {
        Err(Signal::Error(RenderError::msg("exploded")))
    }

    #[derive(Default)]
    struct Boundary;

    impl Component for Boundary {
        fn render(&mut self, _p: &Props, _s: &Props, cx: &mut RenderCx<'_>) -> Render {
            if let Some(error) = cx.caught_error() {
                return Ok(text(format!("caught: {error}")));
            }
            Ok(Child::from(cx.children().to_vec()))
        }

        fn catch_error(&mut self, _error: &RenderError) -> bool {
            true
        }
    }

    #[test]
    fn test_error_boundary_recovers() {
        let (host, root) = setup();
        root.render(Element::component::<Boundary>(
            Props::new(),
            [h(ComponentSpec::function(failing), Props::new(), []).into()],
        ))
        .unwrap();

        // The boundary claimed the error and queued its recovery render.
        host.run_tasks();
        assert_eq!(host.html(), "caught: exploded");
    }

    #[test]
    fn test_unclaimed_error_reaches_caller() {
        let (_host, root) = setup();
        let result = root.render(h(ComponentSpec::function(failing), Props::new(), []));
        assert!(matches!(result, Err(RenderError::Message(m)) if m == "exploded"));
    }

    #[test]
    fn test_failing_sibling_leaves_committed_siblings_intact() {
        let (host, root) = setup();
        root.render(h("div", Props::new(), [text("ok")])).unwrap();

        let result = root.render(h(
            "section",
            Props::new(),
            [h(ComponentSpec::function(failing), Props::new(), []).into()],
        ));

        assert!(result.is_err());
        // The previously committed tree is still what the user sees.
        assert_eq!(host.html(), "<div>ok</div>");
    }

    // --- suspense ---

    thread_local! {
        static RESOURCE: RefCell<Option<String>> = const { RefCell::new(None) };
        static PENDING: RefCell<Option<Suspension>> = const { RefCell::new(None) };
    }

    fn async_label(_props: &Props, _cx: &mut RenderCx<'_>) -> Render {
        match RESOURCE.with(|slot| slot.borrow().clone()) {
            Some(value) => Ok(text(value)),
            None => {
                let suspension = PENDING.with(|slot| {
                    slot.borrow_mut()
                        .get_or_insert_with(Suspension::new)
                        .clone()
                });
                Err(Signal::Suspend(suspension))
            }
        }
    }

    #[derive(Default)]
    struct Loader;

    impl Component for Loader {
        fn render(&mut self, _p: &Props, _s: &Props, cx: &mut RenderCx<'_>) -> Render {
            Ok(Child::from(cx.children().to_vec()))
        }

        fn suspense_boundary(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_suspense_retries_after_resolve() {
        let (host, root) = setup();
        root.render(Element::component::<Loader>(
            Props::new(),
            [h(ComponentSpec::function(async_label), Props::new(), []).into()],
        ))
        .unwrap();

        // Suspended: the boundary holds its (empty) committed output.
        assert_eq!(host.html(), "");

        RESOURCE.with(|slot| *slot.borrow_mut() = Some("loaded".to_string()));
        PENDING.with(|slot| slot.borrow().clone().expect("suspended").resolve());
        host.run_tasks();

        assert_eq!(host.html(), "loaded");
    }

    #[test]
    fn test_suspense_without_boundary_is_an_error() {
        let (_host, root) = setup();
        RESOURCE.with(|slot| *slot.borrow_mut() = None);
        PENDING.with(|slot| *slot.borrow_mut() = None);

        let result = root.render(h(ComponentSpec::function(async_label), Props::new(), []));
        assert!(result.is_err());
    }

    // --- hydration ---

    #[test]
    fn test_hydrate_claims_existing_markup() {
        let (host, root) = setup();
        {
            // Server-rendered markup already in the container.
            let mut doc = host.clone();
            let container = doc.root();
            let div = doc.create_element("div");
            let label = doc.create_text("hi");
            doc.append_child(container, div);
            doc.append_child(div, label);
        }
        host.take_ops();

        root.hydrate(h(
            "div",
            Props::new().with("id", "app"),
            [text("hi")],
        ))
        .unwrap();

        // Existing nodes were adopted, not rebuilt.
        assert_eq!(created_count(&host.take_ops()), 0);
        assert_eq!(host.html(), "<div>hi</div>");

        // Subsequent renders diff against the adopted tree.
        root.render(h("div", Props::new().with("id", "app"), [text("bye")]))
            .unwrap();
        assert_eq!(host.html(), "<div>bye</div>");
    }

    #[test]
    fn test_hydrate_removes_leftover_nodes() {
        let (host, root) = setup();
        {
            let mut doc = host.clone();
            let container = doc.root();
            let div = doc.create_element("div");
            let stale = doc.create_element("aside");
            doc.append_child(container, div);
            doc.append_child(container, stale);
        }

        root.hydrate(h("div", Props::new(), [])).unwrap();
        assert_eq!(host.html(), "<div></div>");
    }

    #[test]
    fn test_hydrate_mismatch_falls_back_to_fresh_mount() {
        let (host, root) = setup();
        {
            let mut doc = host.clone();
            let container = doc.root();
            let stale = doc.create_element("aside");
            doc.append_child(container, stale);
        }

        root.hydrate(h("div", Props::new(), [text("x")])).unwrap();
        assert_eq!(host.html(), "<div>x</div>");
    }

    // --- derived ids ---

    thread_local! {
        static SEEN_IDS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn labeled(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        let first = cx.use_id();
        let second = cx.use_id();
        SEEN_IDS.with(|ids| {
            ids.borrow_mut().push(first.to_string());
            ids.borrow_mut().push(second.to_string());
        });
        Ok(text("ids"))
    }

    #[test]
    fn test_use_id_is_stable_and_unique() {
        let (host, root) = setup();
        let el = || h(ComponentSpec::function(labeled), Props::new(), []);

        root.render(el()).unwrap();
        let first_pass = SEEN_IDS.with(|ids| ids.borrow().clone());
        assert_eq!(first_pass.len(), 2);
        assert_ne!(first_pass[0], first_pass[1]);

        root.render(el()).unwrap();
        let second_pass = SEEN_IDS.with(|ids| ids.borrow().clone());
        // Re-render reuses the same ids.
        assert_eq!(&second_pass[2..], &first_pass[..]);
        let _ = host;
    }

    // --- re-entrancy ---

    thread_local! {
        static NESTED_ROOT: RefCell<Option<Root>> = const { RefCell::new(None) };
        static NESTED_RESULT: RefCell<Option<Result<(), RenderError>>> =
            const { RefCell::new(None) };
    }

    fn reentrant(_props: &Props, cx: &mut RenderCx<'_>) -> Render {
        cx.use_layout_effect((), || {
            let result = NESTED_ROOT
                .with(|slot| slot.borrow().clone())
                .map(|root| root.render(text("again")));
            NESTED_RESULT.with(|slot| *slot.borrow_mut() = result);
        });
        Ok(text("outer"))
    }

    #[test]
    fn test_reentrant_render_on_same_root_fails_fast() {
        let (host, root) = setup();
        NESTED_ROOT.with(|slot| *slot.borrow_mut() = Some(root.clone()));

        root.render(h(ComponentSpec::function(reentrant), Props::new(), []))
            .unwrap();

        let nested = NESTED_RESULT.with(|slot| slot.borrow_mut().take());
        assert!(matches!(nested, Some(Err(RenderError::Busy))));
        assert_eq!(host.html(), "outer");
    }
}
