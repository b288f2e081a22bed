//! Keyed child reconciliation.
//!
//! For one child list scope:
//!
//! 1. previous children are split into a key -> fiber multimap (keyed) and
//!    a FIFO of unkeyed fibers;
//! 2. each new child takes its match - keyed children only by equal key,
//!    unkeyed children positionally from the FIFO;
//! 3. matched pairs diff in place (a type mismatch replaces the subtree),
//!    unmatched new children mount fresh, and unmatched previous children
//!    unmount.
//!
//! Keys are compared only within this scope: sibling lists may reuse key
//! values freely. Duplicate keys inside one scope are a usage error - the
//! reconciler warns and degrades to first-unused-wins matching.
//!
//! Host node ordering is not handled here; the enclosing host scope runs a
//! minimal-move placement pass after its subtree diff (see `place_children`
//! in the diff driver).

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::element::Child;
use crate::error::Signal;
use crate::host::NodeRef;
use crate::root::RootInner;
use crate::tree::FiberId;
use crate::types::Key;

use super::{diff_node, mount_node, unmount};

/// The matching key of a child description.
fn child_key(child: &Child) -> Key {
    match child {
        Child::Element(element) => element.key().clone(),
        _ => Key::None,
    }
}

/// Reconcile the children of `parent` against `new_children`.
pub(crate) fn diff_children(
    inner: &mut RootInner,
    parent: FiberId,
    new_children: &[Child],
    host_parent: NodeRef,
    commit: &mut Vec<FiberId>,
    mut claims: Option<&mut Vec<NodeRef>>,
) -> Result<(), Signal> {
    let existing: SmallVec<[FiberId; 8]> =
        SmallVec::from_slice(inner.tree.children(parent));

    // Split previous children by matching mode.
    let mut keyed: FxHashMap<Key, VecDeque<FiberId>> = FxHashMap::default();
    let mut unkeyed: VecDeque<FiberId> = VecDeque::new();
    for child_id in &existing {
        let Some(child) = inner.tree.get(*child_id) else {
            continue;
        };
        if child.key.is_some() {
            keyed.entry(child.key.clone()).or_default().push_back(*child_id);
        } else {
            unkeyed.push_back(*child_id);
        }
    }

    let mut seen_keys: FxHashSet<Key> = FxHashSet::default();
    let mut consumed: FxHashSet<FiberId> = FxHashSet::default();
    let mut new_ids: SmallVec<[FiberId; 4]> = SmallVec::with_capacity(new_children.len());
    let mut failure = None;

    for child_desc in new_children {
        let key = child_key(child_desc);
        if key.is_some() && !seen_keys.insert(key.clone()) {
            log::warn!("duplicate key {key:?} within one child list; matching degrades to order");
        }

        // Keyed children match only by key; unkeyed match positionally.
        let candidate = if key.is_some() {
            keyed.get_mut(&key).and_then(|list| list.pop_front())
        } else {
            unkeyed.pop_front()
        };
        if let Some(old_id) = candidate {
            consumed.insert(old_id);
        }

        let outcome = match candidate {
            Some(old_id) => diff_node(
                inner,
                old_id,
                child_desc,
                host_parent,
                commit,
                claims.as_mut().map(|c| &mut **c),
            ),
            None => mount_node(
                inner,
                parent,
                child_desc,
                host_parent,
                commit,
                claims.as_mut().map(|c| &mut **c),
            ),
        };

        match outcome {
            Ok(child_id) => new_ids.push(child_id),
            Err(signal) => {
                failure = Some(signal);
                break;
            }
        }
    }

    if let Some(signal) = failure {
        // The in-progress subtree aborts; siblings committed earlier this
        // pass keep their new state, the rest keep their previous state for
        // the boundary above to hold on to. A replacement that failed
        // mid-mount leaves its still-alive predecessor in the list.
        for child_id in &existing {
            if inner.tree.contains(*child_id) && !new_ids.contains(child_id) {
                new_ids.push(*child_id);
            }
        }
        inner.tree.set_children(parent, new_ids);
        return Err(signal);
    }

    // Unmatched previous children unmount.
    for child_id in &existing {
        if !consumed.contains(child_id) && inner.tree.contains(*child_id) {
            log::trace!("unmounting unmatched child {child_id:?}");
            unmount(inner, *child_id, true);
        }
    }

    inner.tree.set_children(parent, new_ids);
    Ok(())
}
