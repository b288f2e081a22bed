//! Fiber tree - the reconciler-owned mutable tree.
//!
//! Fibers pair the last committed description of a position with its live
//! host state or component instance. They live in a slotmap arena and link
//! to each other by id: parent links are ids, child lists are id vectors,
//! and nothing in the tree holds a reference cycle. Host node handles stored
//! here are weak references into the host document.
//!
//! The arena is owned exclusively by the reconciler. Everything here is
//! bookkeeping; the diff in [`crate::diff`] drives all mutation.

use std::any::Any;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slotmap::{DefaultKey, SecondaryMap, SlotMap};
use smallvec::SmallVec;

use crate::component::Instance;
use crate::element::ComponentSpec;
use crate::host::NodeRef;
use crate::types::{EventHandler, Key, Props};

// =============================================================================
// Ids and flags
// =============================================================================

/// Stable handle to a fiber in the arena.
///
/// Keys are versioned: a handle to a removed fiber never aliases a later
/// one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FiberId(DefaultKey);

bitflags! {
    /// Per-fiber bookkeeping flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiberFlags: u8 {
        /// Queued for re-render by a state patch or force update.
        const DIRTY = 1 << 0;
        /// Re-render must bypass the update-skip predicate.
        const FORCE = 1 << 1;
        /// Queued purely by hook dispatches; eligible for the no-change
        /// bailout.
        const HOOK_DIRTY = 1 << 2;
        /// A suspense boundary currently holding its previous output.
        const SUSPENDED = 1 << 3;
    }
}

impl FiberFlags {
    /// Whether this fiber is queued for a render pass.
    pub fn is_queued(self) -> bool {
        self.intersects(Self::DIRTY | Self::FORCE | Self::HOOK_DIRTY)
    }
}

// =============================================================================
// Fiber
// =============================================================================

/// What a fiber position holds.
pub enum FiberKind {
    /// A `null`/boolean child: renders nothing, holds its position.
    Hole,
    /// A text node.
    Text {
        /// Committed text.
        text: Rc<str>,
        /// Host text node, once mounted.
        node: Option<NodeRef>,
    },
    /// A host element.
    Host {
        /// Committed tag.
        tag: Rc<str>,
        /// Host element node, once mounted.
        node: Option<NodeRef>,
    },
    /// A nested child list - its own keyed matching scope.
    List,
    /// Transparent grouping.
    Fragment,
    /// A context provider position.
    Provider {
        /// Identity of the provided context.
        context_id: u64,
        /// Committed provided value.
        value: Rc<dyn Any>,
        /// Instance fibers subscribed to this provider.
        subscribers: Vec<FiberId>,
    },
    /// A component position; the instance lives in its own arena column.
    Component {
        /// Committed component reference.
        spec: ComponentSpec,
    },
}

impl FiberKind {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            FiberKind::Hole => "hole",
            FiberKind::Text { .. } => "text",
            FiberKind::Host { .. } => "host",
            FiberKind::List => "list",
            FiberKind::Fragment => "fragment",
            FiberKind::Provider { .. } => "provider",
            FiberKind::Component { .. } => "component",
        }
    }
}

/// One position in the committed tree.
pub struct Fiber {
    /// What the position holds.
    pub kind: FiberKind,
    /// Matching key committed for this position.
    pub key: Key,
    /// Bookkeeping flags.
    pub flags: FiberFlags,
    /// Distance from the root; flush order is parents-first.
    pub depth: u32,
}

/// Committed props and delegated handlers of a host element fiber.
#[derive(Default)]
pub struct HostState {
    /// Committed prop map (handlers included).
    pub props: Props,
    /// Current handler per event type. The underlying host listener exists
    /// exactly while an entry is present.
    pub listeners: FxHashMap<Rc<str>, EventHandler>,
}

// =============================================================================
// FiberTree
// =============================================================================

/// The fiber arena.
#[derive(Default)]
pub struct FiberTree {
    fibers: SlotMap<DefaultKey, Fiber>,
    /// Children lists stored separately to keep fibers small.
    children: SecondaryMap<DefaultKey, SmallVec<[FiberId; 4]>>,
    /// Parent links stored separately.
    parents: SecondaryMap<DefaultKey, Option<FiberId>>,
    /// Component instances.
    instances: SecondaryMap<DefaultKey, Instance>,
    /// Host element fiber state.
    host_state: SecondaryMap<DefaultKey, HostState>,
    /// Host node -> owning fiber, for event dispatch.
    nodes: FxHashMap<NodeRef, FiberId>,
    /// Allocator for id-hook boundary masks.
    boundary_seq: u32,
    /// Root-level id-hook scope.
    root_mask: (u32, u32),
}

impl FiberTree {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fiber under `parent` (depth is derived; the child list of
    /// the parent is NOT updated - the diff owns child ordering).
    pub fn insert(&mut self, kind: FiberKind, key: Key, parent: Option<FiberId>) -> FiberId {
        let depth = parent
            .and_then(|p| self.get(p))
            .map(|f| f.depth + 1)
            .unwrap_or(0);
        let id = FiberId(self.fibers.insert(Fiber {
            kind,
            key,
            flags: FiberFlags::empty(),
            depth,
        }));
        self.children.insert(id.0, SmallVec::new());
        self.parents.insert(id.0, parent);
        id
    }

    /// Whether the fiber is still alive.
    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id.0)
    }

    /// Read a fiber.
    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id.0)
    }

    /// Mutate a fiber.
    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id.0)
    }

    /// Flags of a fiber (empty if removed).
    pub fn flags(&self, id: FiberId) -> FiberFlags {
        self.get(id).map(|f| f.flags).unwrap_or_default()
    }

    /// Add flags on a fiber.
    pub fn add_flags(&mut self, id: FiberId, flags: FiberFlags) {
        if let Some(fiber) = self.get_mut(id) {
            fiber.flags |= flags;
        }
    }

    /// Remove flags on a fiber.
    pub fn remove_flags(&mut self, id: FiberId, flags: FiberFlags) {
        if let Some(fiber) = self.get_mut(id) {
            fiber.flags &= !flags;
        }
    }

    /// Parent link.
    pub fn parent(&self, id: FiberId) -> Option<FiberId> {
        self.parents.get(id.0).copied().flatten()
    }

    /// Children in committed order.
    pub fn children(&self, id: FiberId) -> &[FiberId] {
        self.children
            .get(id.0)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Replace a fiber's child list and fix the children's parent links.
    pub fn set_children(&mut self, id: FiberId, new_children: SmallVec<[FiberId; 4]>) {
        for child in &new_children {
            self.parents.insert(child.0, Some(id));
        }
        self.children.insert(id.0, new_children);
    }

    /// Depth of a fiber (0 if removed).
    pub fn depth(&self, id: FiberId) -> u32 {
        self.get(id).map(|f| f.depth).unwrap_or(0)
    }

    // --- instances ---

    /// Attach a component instance to a fiber.
    pub fn put_instance(&mut self, id: FiberId, instance: Instance) {
        self.instances.insert(id.0, instance);
    }

    /// Detach the instance for a render pass ("take, render, put back").
    pub fn take_instance(&mut self, id: FiberId) -> Option<Instance> {
        self.instances.remove(id.0)
    }

    /// Read the instance.
    pub fn instance(&self, id: FiberId) -> Option<&Instance> {
        self.instances.get(id.0)
    }

    /// Mutate the instance.
    pub fn instance_mut(&mut self, id: FiberId) -> Option<&mut Instance> {
        self.instances.get_mut(id.0)
    }

    // --- host element state ---

    /// Committed host state, created on demand.
    pub fn host_state_mut(&mut self, id: FiberId) -> &mut HostState {
        if !self.host_state.contains_key(id.0) {
            self.host_state.insert(id.0, HostState::default());
        }
        &mut self.host_state[id.0]
    }

    /// Committed host state.
    pub fn host_state(&self, id: FiberId) -> Option<&HostState> {
        self.host_state.get(id.0)
    }

    // --- host node index ---

    /// Record that `node` belongs to `fiber`.
    pub fn register_node(&mut self, node: NodeRef, fiber: FiberId) {
        self.nodes.insert(node, fiber);
    }

    /// Forget a host node mapping.
    pub fn unregister_node(&mut self, node: NodeRef) {
        self.nodes.remove(&node);
    }

    /// The fiber owning a host node, if any.
    pub fn fiber_for_node(&self, node: NodeRef) -> Option<FiberId> {
        self.nodes.get(&node).copied()
    }

    // --- removal ---

    /// Remove a single fiber's storage. The caller is responsible for
    /// lifecycle ordering and for removing the id from its parent's child
    /// list.
    pub fn remove(&mut self, id: FiberId) {
        if let Some(fiber) = self.fibers.remove(id.0) {
            match fiber.kind {
                FiberKind::Host { node: Some(node), .. }
                | FiberKind::Text { node: Some(node), .. } => {
                    self.nodes.remove(&node);
                }
                _ => {}
            }
        }
        self.children.remove(id.0);
        self.parents.remove(id.0);
        self.instances.remove(id.0);
        self.host_state.remove(id.0);
    }

    // --- host node queries ---

    /// First host node produced by this subtree, in committed order.
    pub fn first_host_node(&self, id: FiberId) -> Option<NodeRef> {
        match &self.get(id)?.kind {
            FiberKind::Host { node, .. } | FiberKind::Text { node, .. } => *node,
            _ => self
                .children(id)
                .to_vec()
                .into_iter()
                .find_map(|child| self.first_host_node(child)),
        }
    }

    /// Collect the topmost host nodes of a subtree in committed order.
    pub fn collect_host_nodes(&self, id: FiberId, out: &mut Vec<NodeRef>) {
        let Some(fiber) = self.get(id) else { return };
        match &fiber.kind {
            FiberKind::Host { node, .. } | FiberKind::Text { node, .. } => {
                if let Some(node) = node {
                    out.push(*node);
                }
            }
            _ => {
                for child in self.children(id).to_vec() {
                    self.collect_host_nodes(child, out);
                }
            }
        }
    }

    /// Collect every fiber in a subtree, parents before children.
    pub fn collect_subtree(&self, id: FiberId, out: &mut Vec<FiberId>) {
        if !self.contains(id) {
            return;
        }
        out.push(id);
        for child in self.children(id).to_vec() {
            self.collect_subtree(child, out);
        }
    }

    // --- id-hook boundary masks ---

    /// Allocate a fresh boundary mask for the derived-id hook.
    pub fn next_boundary_mask(&mut self) -> (u32, u32) {
        self.boundary_seq += 1;
        (self.boundary_seq, 0)
    }

    /// The root-level derived-id scope.
    pub fn root_mask_mut(&mut self) -> &mut (u32, u32) {
        &mut self.root_mask
    }
}
