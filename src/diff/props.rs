//! Host prop diffing.
//!
//! Computes the set difference between the committed and next prop maps and
//! applies only what changed: removed props are cleared to the host-level
//! default, changed/added props are set.
//!
//! Event-handler props (named `on*` with a handler value) are delegated:
//! the underlying host listener for an event type is attached the first
//! time such a prop appears and detached when the last handler goes away.
//! A handler swap only replaces the stored reference - the listener itself
//! is never re-attached. This is a contract, not an optimization: callers
//! rely on listener identity being stable across re-renders.

use std::rc::Rc;

use crate::host::{Host, NodeRef};
use crate::tree::{FiberId, FiberTree};
use crate::types::{Props, PropValue};

/// The event type a delegated prop maps to (`onClick` -> `click`).
fn event_name(prop: &str) -> Option<String> {
    let suffix = prop.strip_prefix("on")?;
    if suffix.is_empty() {
        return None;
    }
    Some(suffix.to_ascii_lowercase())
}

/// Apply the difference between the committed props of `fiber` and
/// `new_props` to `node`.
///
/// With `trust_existing` set (hydration claims), attribute values already
/// present on the node are assumed correct and only listeners are wired up.
pub(crate) fn patch_props(
    tree: &mut FiberTree,
    host: &mut dyn Host,
    fiber: FiberId,
    node: NodeRef,
    new_props: &Props,
    trust_existing: bool,
) {
    let state = tree.host_state_mut(fiber);
    let old_props = std::mem::take(&mut state.props);

    // Removed props: restore defaults, detach orphaned listeners.
    for (name, old_value) in old_props.iter() {
        if new_props.contains(name) {
            continue;
        }
        match (event_name(name), old_value) {
            (Some(event), PropValue::Handler(_)) => {
                if state.listeners.remove(event.as_str()).is_some() {
                    host.detach_listener(node, &event);
                }
            }
            _ => host.remove_attribute(node, name),
        }
    }

    // Added / changed props.
    for (name, new_value) in new_props.iter() {
        match (event_name(name), new_value) {
            (Some(event), PropValue::Handler(handler)) => {
                let event: Rc<str> = Rc::from(event.as_str());
                if !state.listeners.contains_key(&event) {
                    host.attach_listener(node, &event);
                }
                // Swap the stored reference only.
                state.listeners.insert(event, handler.clone());
            }
            (None, PropValue::Handler(_)) => {
                log::warn!("handler prop `{name}` ignored: event props must be named on<Event>");
            }
            _ => {
                let unchanged = old_props
                    .get(name)
                    .is_some_and(|old| old.same_value(new_value));
                if !unchanged && !trust_existing {
                    host.set_attribute(node, name, new_value);
                }
            }
        }
    }

    tree.host_state_mut(fiber).props = new_props.clone();
}
