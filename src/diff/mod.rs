//! Diff driver - mounting, updating and unmounting tree positions.
//!
//! Two positions are the same logical node across renders iff their
//! descriptions have equal type and equal key. A mismatch unmounts the old
//! subtree and mounts the new one fresh; host nodes are never reused across
//! type changes.
//!
//! Component boundaries are transparent: the driver resolves the instance,
//! invokes its render contract, and recurses into the output. Signals
//! (errors, suspensions) unwind through the recursion; each component frame
//! on the way up gets a chance to claim them (error boundary / suspense
//! boundary), and unclaimed signals reach the render entry point.
//!
//! Host mutations are applied as the diff walks; child ordering is fixed up
//! by a minimal-move placement pass per host scope once its subtree diff
//! completes.

pub(crate) mod children;
pub(crate) mod props;

use std::rc::Rc;

use crate::component::Instance;
use crate::element::{Child, Element, ElementType};
use crate::error::{RenderError, Signal};
use crate::hooks::RenderCx;
use crate::host::NodeRef;
use crate::options;
use crate::root::RootInner;
use crate::scheduler::{self, UpdateMsg};
use crate::tree::{FiberFlags, FiberId, FiberKind};
use crate::types::Key;

pub(crate) use children::diff_children;
pub(crate) use props::patch_props;

// =============================================================================
// Root entry
// =============================================================================

/// Diff the whole tree against `child` and commit.
///
/// With `hydrate` set, existing container content is claimed instead of
/// rebuilt, and leftover nodes are removed afterwards.
pub(crate) fn patch_root(
    inner: &mut RootInner,
    child: Child,
    hydrate: bool,
) -> Result<(), RenderError> {
    let root = inner.root_fiber;
    let container = inner.container;
    let mut commit = Vec::new();

    let mut claims = if hydrate {
        Some(inner.host.child_list(container))
    } else {
        None
    };

    let result = diff_children(
        inner,
        root,
        std::slice::from_ref(&child),
        container,
        &mut commit,
        claims.as_mut(),
    );

    if let Some(leftovers) = claims {
        for node in leftovers {
            inner.host.remove_child(container, node);
        }
    }

    match result {
        Ok(()) => {}
        Err(Signal::Error(error)) => return Err(error),
        Err(Signal::Suspend(_)) => {
            return Err(RenderError::msg(
                "component suspended with no suspense boundary above it",
            ));
        }
    }

    place_children(inner, root, container);

    let queued = commit.len();
    let unclaimed = inner.commit_pass(commit);
    options::emit_commit(root, queued);
    inner.schedule_passive_flush();

    match unclaimed.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

// =============================================================================
// Node-level diff
// =============================================================================

/// Whether the committed fiber and the new description are the same logical
/// node. Keys are already equal by construction of the child matching.
fn same_logical_node(kind: &FiberKind, new: &Child) -> bool {
    match (kind, new) {
        (FiberKind::Hole, Child::Hole) => true,
        (FiberKind::Text { .. }, Child::Text(_)) => true,
        (FiberKind::List, Child::List(_)) => true,
        (FiberKind::Host { tag, .. }, Child::Element(el)) => {
            matches!(el.ty(), ElementType::Host(new_tag) if new_tag == tag)
        }
        (FiberKind::Fragment, Child::Element(el)) => {
            matches!(el.ty(), ElementType::Fragment)
        }
        (FiberKind::Provider { context_id, .. }, Child::Element(el)) => {
            matches!(el.ty(), ElementType::Provider { context_id: new_id, .. } if new_id == context_id)
        }
        (FiberKind::Component { spec }, Child::Element(el)) => {
            matches!(el.ty(), ElementType::Component(new_spec) if new_spec.id() == spec.id())
        }
        _ => false,
    }
}

/// Update the committed position `old_id` to match `new`, replacing the
/// subtree on a type mismatch. Returns the surviving fiber id.
pub(crate) fn diff_node(
    inner: &mut RootInner,
    old_id: FiberId,
    new: &Child,
    host_parent: NodeRef,
    commit: &mut Vec<FiberId>,
    claims: Option<&mut Vec<NodeRef>>,
) -> Result<FiberId, Signal> {
    let compatible = inner
        .tree
        .get(old_id)
        .is_some_and(|fiber| same_logical_node(&fiber.kind, new));

    if !compatible {
        let parent = inner.tree.parent(old_id);
        log::trace!("replacing fiber {old_id:?}: type changed");
        // Mount the replacement first: if it aborts, the committed subtree
        // is still intact for the boundary above to keep on screen.
        let new_id = mount_node(
            inner,
            parent.unwrap_or(inner.root_fiber),
            new,
            host_parent,
            commit,
            claims,
        )?;
        unmount(inner, old_id, true);
        return Ok(new_id);
    }

    match new {
        Child::Hole => Ok(old_id),

        Child::Text(next) => {
            let changed_node = match inner.tree.get_mut(old_id).map(|f| &mut f.kind) {
                Some(FiberKind::Text { text, node }) if *text != *next => {
                    *text = next.clone();
                    *node
                }
                _ => None,
            };
            if let Some(node) = changed_node {
                inner.host.set_text(node, next);
            }
            Ok(old_id)
        }

        Child::List(items) => {
            diff_children(inner, old_id, items, host_parent, commit, claims)?;
            Ok(old_id)
        }

        Child::Element(element) => match element.ty() {
            ElementType::Host(_) => {
                let node = match inner.tree.get(old_id).map(|f| &f.kind) {
                    Some(FiberKind::Host { node: Some(node), .. }) => *node,
                    _ => return Ok(old_id),
                };
                patch_props(
                    &mut inner.tree,
                    &mut *inner.host,
                    old_id,
                    node,
                    element.props(),
                    false,
                );
                diff_children(inner, old_id, element.children(), node, commit, None)?;
                place_children(inner, old_id, node);
                options::emit_after_diff(old_id);
                Ok(old_id)
            }

            ElementType::Fragment => {
                diff_children(inner, old_id, element.children(), host_parent, commit, claims)?;
                options::emit_after_diff(old_id);
                Ok(old_id)
            }

            ElementType::Provider { value: next_value, .. } => {
                update_provider(inner, old_id, next_value);
                diff_children(inner, old_id, element.children(), host_parent, commit, claims)?;
                options::emit_after_diff(old_id);
                Ok(old_id)
            }

            ElementType::Component(_) => {
                render_component(inner, old_id, Some(element), host_parent, commit, claims)?;
                Ok(old_id)
            }
        },
    }
}

/// Provider update: a value change (by reference identity) queues a forced
/// re-render for every live subscriber.
fn update_provider(inner: &mut RootInner, fiber: FiberId, next_value: &Rc<dyn std::any::Any>) {
    let notify = match inner.tree.get_mut(fiber).map(|f| &mut f.kind) {
        Some(FiberKind::Provider { value, subscribers, .. }) => {
            if Rc::ptr_eq(value, next_value) {
                None
            } else {
                *value = next_value.clone();
                Some(std::mem::take(subscribers))
            }
        }
        _ => None,
    };

    if let Some(subscribers) = notify {
        let mut live = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            if inner.tree.instance(subscriber).is_some() {
                inner.enqueue_update(subscriber, FiberFlags::FORCE);
                live.push(subscriber);
            }
        }
        if let Some(FiberKind::Provider { subscribers, .. }) =
            inner.tree.get_mut(fiber).map(|f| &mut f.kind)
        {
            *subscribers = live;
        }
    }
}

// =============================================================================
// Mounting
// =============================================================================

/// Claim the next hydration node if it matches, taking it out of the list.
fn claim_node(
    claims: &mut Option<&mut Vec<NodeRef>>,
    matches: impl Fn(NodeRef) -> bool,
) -> Option<NodeRef> {
    let list = claims.as_mut()?;
    let first = *list.first()?;
    if matches(first) {
        list.remove(0);
        Some(first)
    } else {
        None
    }
}

/// Mount a fresh position under `parent`. The created host nodes stay
/// detached until the enclosing scope's placement pass.
pub(crate) fn mount_node(
    inner: &mut RootInner,
    parent: FiberId,
    new: &Child,
    host_parent: NodeRef,
    commit: &mut Vec<FiberId>,
    mut claims: Option<&mut Vec<NodeRef>>,
) -> Result<FiberId, Signal> {
    match new {
        Child::Hole => Ok(inner.tree.insert(FiberKind::Hole, Key::None, Some(parent))),

        Child::Text(text) => {
            let claimed = claim_node(&mut claims, |node| {
                inner.host.node_kind(node) == crate::host::NodeKind::Text
            });
            let node = match claimed {
                Some(node) => {
                    // The host contract has no text getter, so a claimed
                    // text node is normalized rather than verified.
                    inner.host.set_text(node, text);
                    node
                }
                None => inner.host.create_text(text),
            };
            let fiber = inner.tree.insert(
                FiberKind::Text {
                    text: text.clone(),
                    node: Some(node),
                },
                Key::None,
                Some(parent),
            );
            inner.tree.register_node(node, fiber);
            Ok(fiber)
        }

        Child::List(items) => {
            let fiber = inner.tree.insert(FiberKind::List, Key::None, Some(parent));
            checked_mount(
                inner,
                fiber,
                |inner| diff_children(inner, fiber, items, host_parent, commit, claims),
            )?;
            Ok(fiber)
        }

        Child::Element(element) => mount_element(inner, parent, element, host_parent, commit, claims),
    }
}

/// Run the body of a fresh mount; when it aborts (a signal unwinding), the
/// half-built subtree is discarded so a retry starts clean. Nothing in it
/// was committed, so no lifecycle runs.
fn checked_mount(
    inner: &mut RootInner,
    fiber: FiberId,
    body: impl FnOnce(&mut RootInner) -> Result<(), Signal>,
) -> Result<(), Signal> {
    match body(inner) {
        Ok(()) => Ok(()),
        Err(signal) => {
            let mut subtree = Vec::new();
            inner.tree.collect_subtree(fiber, &mut subtree);
            for id in subtree {
                inner.tree.remove(id);
            }
            Err(signal)
        }
    }
}

fn mount_element(
    inner: &mut RootInner,
    parent: FiberId,
    element: &Element,
    host_parent: NodeRef,
    commit: &mut Vec<FiberId>,
    mut claims: Option<&mut Vec<NodeRef>>,
) -> Result<FiberId, Signal> {
    match element.ty() {
        ElementType::Host(tag) => {
            let claimed = claim_node(&mut claims, |node| {
                inner.host.node_kind(node) == crate::host::NodeKind::Element
                    && inner.host.tag(node).as_deref() == Some(tag)
            });
            let trusted = claimed.is_some();
            let node = claimed.unwrap_or_else(|| inner.host.create_element(tag));

            let fiber = inner.tree.insert(
                FiberKind::Host {
                    tag: tag.clone(),
                    node: Some(node),
                },
                element.key().clone(),
                Some(parent),
            );
            inner.tree.register_node(node, fiber);
            log::trace!("mounted <{tag}> as {fiber:?}");

            patch_props(
                &mut inner.tree,
                &mut *inner.host,
                fiber,
                node,
                element.props(),
                trusted,
            );

            let mut child_claims = trusted.then(|| inner.host.child_list(node));
            checked_mount(inner, fiber, |inner| {
                diff_children(
                    inner,
                    fiber,
                    element.children(),
                    node,
                    commit,
                    child_claims.as_mut(),
                )
            })?;
            if let Some(leftovers) = child_claims {
                for leftover in leftovers {
                    inner.host.remove_child(node, leftover);
                }
            }
            place_children(inner, fiber, node);
            options::emit_after_diff(fiber);
            Ok(fiber)
        }

        ElementType::Fragment => {
            let fiber = inner
                .tree
                .insert(FiberKind::Fragment, element.key().clone(), Some(parent));
            checked_mount(inner, fiber, |inner| {
                diff_children(inner, fiber, element.children(), host_parent, commit, claims)
            })?;
            options::emit_after_diff(fiber);
            Ok(fiber)
        }

        ElementType::Provider { context_id, value } => {
            let fiber = inner.tree.insert(
                FiberKind::Provider {
                    context_id: *context_id,
                    value: value.clone(),
                    subscribers: Vec::new(),
                },
                element.key().clone(),
                Some(parent),
            );
            checked_mount(inner, fiber, |inner| {
                diff_children(inner, fiber, element.children(), host_parent, commit, claims)
            })?;
            options::emit_after_diff(fiber);
            Ok(fiber)
        }

        ElementType::Component(spec) => {
            let fiber = inner.tree.insert(
                FiberKind::Component { spec: spec.clone() },
                element.key().clone(),
                Some(parent),
            );
            let instance = Instance::construct(spec.clone(), element.props().clone());
            inner.tree.put_instance(fiber, instance);
            log::trace!("constructed {} as {fiber:?}", spec.name());
            checked_mount(inner, fiber, |inner| {
                render_component(inner, fiber, Some(element), host_parent, commit, claims)
            })?;
            Ok(fiber)
        }
    }
}

// =============================================================================
// Component render
// =============================================================================

/// Render an instance and diff its output.
///
/// `element` carries the new description on parent-driven updates and
/// mounts; queue-driven re-renders pass `None` and reuse the committed
/// props/children.
pub(crate) fn render_component(
    inner: &mut RootInner,
    fiber: FiberId,
    element: Option<&Element>,
    host_parent: NodeRef,
    commit: &mut Vec<FiberId>,
    claims: Option<&mut Vec<NodeRef>>,
) -> Result<(), Signal> {
    let flags = inner.tree.flags(fiber);
    let force = flags.contains(FiberFlags::FORCE);
    let parent_driven = element.is_some();

    let Some(mut instance) = inner.tree.take_instance(fiber) else {
        return Ok(());
    };

    let next_props = match element {
        Some(element) => element.props().clone(),
        None => instance.props.clone(),
    };
    let next_children = match element {
        Some(element) => element.children().to_vec(),
        None => instance.children.clone(),
    };

    let had_patches = !instance.pending.is_empty();
    let hooks_changed = instance.hooks.fold_pending();
    let next_state = instance.compute_next_state();

    // Update-skip: never on mount, never when forced. Props and state are
    // committed even when the render is skipped.
    if instance.mounted && !force {
        let vetoed = match instance.behavior.take() {
            Some(mut behavior) => {
                let allow = behavior.should_update(&next_props, &next_state);
                instance.behavior = Some(behavior);
                !allow
            }
            None => false,
        };
        let nothing_changed = !parent_driven && !had_patches && !hooks_changed;
        if vetoed || nothing_changed {
            log::trace!("skipping render of {fiber:?} (vetoed={vetoed})");
            instance.props = next_props;
            instance.state = Some(next_state);
            instance.children = next_children;
            inner.tree.put_instance(fiber, instance);
            inner.tree.remove_flags(
                fiber,
                FiberFlags::DIRTY | FiberFlags::FORCE | FiberFlags::HOOK_DIRTY,
            );
            options::emit_after_diff(fiber);
            return Ok(());
        }
    }

    // Passive effects scheduled by the previous render run before the next
    // one (cleanup always precedes the next invocation).
    let mut early_errors = Vec::new();
    if !instance.passive_queue.is_empty() {
        let indices = std::mem::take(&mut instance.passive_queue);
        early_errors = crate::root::run_instance_effects(&mut instance, &indices);
    }

    let Some(mut behavior) = instance.behavior.take() else {
        inner.tree.put_instance(fiber, instance);
        return Ok(());
    };

    log::trace!("rendering {} at {fiber:?}", instance.spec.name());
    let mut layout_queue = Vec::new();
    let mut passive_queue = Vec::new();
    let caught = instance.take_caught();
    let handle = inner.handle.clone();

    let result = {
        let mut cx = RenderCx {
            tree: &mut inner.tree,
            hooks: &mut instance.hooks,
            fiber,
            cursor: 0,
            handle,
            layout_queue: &mut layout_queue,
            passive_queue: &mut passive_queue,
            caught,
            children: &next_children,
        };
        behavior.render(&next_props, &next_state, &mut cx)
    };

    instance.behavior = Some(behavior);
    instance.props = next_props;
    instance.state = Some(next_state);
    instance.children = next_children;
    instance.layout_queue = layout_queue;
    instance.passive_queue = passive_queue;
    instance.hooks.commit_pending_deps();
    inner.tree.put_instance(fiber, instance);
    inner.tree.remove_flags(
        fiber,
        FiberFlags::DIRTY | FiberFlags::FORCE | FiberFlags::HOOK_DIRTY,
    );

    for error in early_errors {
        inner.report_effect_error(fiber, error);
    }

    let diffed = match result {
        Ok(child) => {
            match diff_children(
                inner,
                fiber,
                std::slice::from_ref(&child),
                host_parent,
                commit,
                claims,
            ) {
                Ok(()) => Ok(()),
                // This instance is an ancestor of whatever signaled inside
                // its output, so it gets the first chance to claim.
                Err(signal) => handle_signal(inner, fiber, signal),
            }
        }
        // The instance's own signal is claimable only by ancestors.
        Err(signal) => Err(signal),
    };

    if diffed.is_ok() {
        inner.tree.remove_flags(fiber, FiberFlags::SUSPENDED);
        let (has_layout, has_passive, fresh_mount) = match inner.tree.instance(fiber) {
            Some(instance) => (
                !instance.layout_queue.is_empty(),
                !instance.passive_queue.is_empty(),
                !instance.mounted,
            ),
            None => (false, false, false),
        };
        if has_layout || fresh_mount {
            commit.push(fiber);
        }
        if has_passive {
            inner.scheduler.queue_passive(fiber);
        }
        options::emit_after_diff(fiber);
    }

    diffed
}

/// Give a component frame the chance to claim a signal unwinding through
/// it.
pub(crate) fn handle_signal(
    inner: &mut RootInner,
    fiber: FiberId,
    signal: Signal,
) -> Result<(), Signal> {
    match signal {
        Signal::Suspend(suspension) => {
            let is_boundary = inner
                .tree
                .instance(fiber)
                .map(|instance| instance.suspense)
                .unwrap_or(false);
            if !is_boundary {
                return Err(Signal::Suspend(suspension));
            }
            log::trace!("suspense boundary {fiber:?} holding committed output");
            inner.tree.add_flags(fiber, FiberFlags::SUSPENDED);
            let handle = inner.handle.clone();
            suspension.add_waker(Box::new(move || {
                scheduler::send(&handle, UpdateMsg::Force { fiber });
            }));
            Ok(())
        }

        Signal::Error(error) => {
            let claimed = match inner
                .tree
                .instance_mut(fiber)
                .and_then(|instance| instance.behavior.take())
            {
                Some(mut behavior) => {
                    let claimed = behavior.catch_error(&error);
                    if let Some(instance) = inner.tree.instance_mut(fiber) {
                        instance.behavior = Some(behavior);
                    }
                    claimed
                }
                None => false,
            };
            if !claimed {
                return Err(Signal::Error(error));
            }
            log::trace!("error boundary {fiber:?} claimed: {error}");
            if let Some(instance) = inner.tree.instance_mut(fiber) {
                instance.caught = Some(error);
            }
            inner.enqueue_update(fiber, FiberFlags::FORCE);
            Ok(())
        }
    }
}

// =============================================================================
// Unmount
// =============================================================================

/// Tear down a subtree: effect cleanups and `will_unmount` first, children
/// next, host removal last (topmost host node per subtree only).
pub(crate) fn unmount(inner: &mut RootInner, fiber: FiberId, remove_nodes: bool) {
    let Some(kind_name) = inner.tree.get(fiber).map(|f| f.kind.name()) else {
        return;
    };
    log::trace!("unmounting {kind_name} fiber {fiber:?}");
    options::emit_before_unmount(fiber);

    if let Some(mut instance) = inner.tree.take_instance(fiber) {
        instance.hooks.run_cleanups();
        if let Some(mut behavior) = instance.behavior.take() {
            behavior.will_unmount();
        }
        // Dropping the instance discards queued patches and the hook list;
        // the passive flush skips fibers with no instance, so pending
        // passive effects never run after this point.
    }

    let owned_node = match inner.tree.get(fiber).map(|f| &f.kind) {
        Some(FiberKind::Host { node, .. }) | Some(FiberKind::Text { node, .. }) => *node,
        _ => None,
    };

    let children: Vec<FiberId> = inner.tree.children(fiber).to_vec();
    for child in children {
        unmount(inner, child, remove_nodes && owned_node.is_none());
    }

    if remove_nodes {
        if let Some(node) = owned_node {
            if let Some(parent) = inner.host.parent(node) {
                inner.host.remove_child(parent, node);
            }
        }
    }

    inner.tree.remove(fiber);
}

// =============================================================================
// Placement
// =============================================================================

/// Reorder the direct host children of `host_node` to match the committed
/// order of the fiber subtree under `scope`, with minimal insert/move
/// operations. Unchanged prefixes produce zero host calls.
pub(crate) fn place_children(inner: &mut RootInner, scope: FiberId, host_node: NodeRef) {
    let mut desired = Vec::new();
    inner.tree.collect_host_nodes(scope, &mut desired);

    let mut current = inner.host.child_list(host_node);
    for (position, node) in desired.iter().enumerate() {
        if current.get(position) == Some(node) {
            continue;
        }
        let before = current.get(position).copied();
        inner.host.insert_before(host_node, *node, before);
        if let Some(old_position) = current.iter().position(|n| n == node) {
            current.remove(old_position);
        }
        current.insert(position, *node);
    }
}
