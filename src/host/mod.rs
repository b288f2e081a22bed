//! Host environment contract.
//!
//! The reconciler never assumes a specific document implementation. It talks
//! to the environment through the [`Host`] trait: a node factory, a small
//! traversal/mutation surface, delegated event listeners, and three
//! scheduling primitives. Anything that can satisfy this capability set can
//! be a render target - a browser bridge, a test document, a scene graph.
//!
//! Node handles are plain ids ([`NodeRef`]): weak references into the host
//! document. The reconciler owns no host memory and never dereferences a
//! handle except through the trait.

pub mod memory;

use std::rc::Rc;

use crate::types::PropValue;

pub use memory::{HostOp, MemoryHost};

// =============================================================================
// Node handles
// =============================================================================

/// Weak handle to a node in the host document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// The two node shapes the reconciler distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// An element node with a tag, attributes, and children.
    Element,
    /// A text node.
    Text,
}

/// Payload delivered to delegated event handlers.
#[derive(Clone, Debug)]
pub struct EventPayload {
    /// Event type, e.g. `click`.
    pub kind: Rc<str>,
    /// The host node the event targeted.
    pub target: NodeRef,
}

/// A deferred unit of work handed to the host's scheduling primitives.
pub type Task = Box<dyn FnOnce()>;

// =============================================================================
// Host trait
// =============================================================================

/// Capability contract for a render target.
///
/// Mutation methods are expected to be cheap and silent; the reconciler
/// guarantees it only calls them for actual changes. `insert_before` with a
/// node that is already in the tree is a move.
pub trait Host: 'static {
    // --- node factory ---

    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> NodeRef;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeRef;

    // --- inspection ---

    /// Node shape.
    fn node_kind(&self, node: NodeRef) -> NodeKind;

    /// Tag of an element node; `None` for text nodes.
    fn tag(&self, node: NodeRef) -> Option<Rc<str>>;

    /// Parent node, if attached.
    fn parent(&self, node: NodeRef) -> Option<NodeRef>;

    /// First child, if any.
    fn first_child(&self, node: NodeRef) -> Option<NodeRef>;

    /// Children in document order.
    fn child_list(&self, node: NodeRef) -> Vec<NodeRef>;

    // --- mutation ---

    /// Insert `node` before `before` under `parent`; append when `before`
    /// is `None`. Moving an attached node re-parents it.
    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>);

    /// Append `node` as the last child of `parent`.
    fn append_child(&mut self, parent: NodeRef, node: NodeRef) {
        self.insert_before(parent, node, None);
    }

    /// Detach `node` from `parent`.
    fn remove_child(&mut self, parent: NodeRef, node: NodeRef);

    /// Replace the content of a text node.
    fn set_text(&mut self, node: NodeRef, text: &str);

    /// Set an attribute on an element node.
    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &PropValue);

    /// Remove an attribute, restoring the host-level default.
    fn remove_attribute(&mut self, node: NodeRef, name: &str);

    // --- event delegation ---

    /// Attach the single underlying listener for `event` on `node`. Called
    /// at most once per (node, event) while a handler is present.
    fn attach_listener(&mut self, node: NodeRef, event: &str);

    /// Detach the underlying listener for `event` on `node`.
    fn detach_listener(&mut self, node: NodeRef, event: &str);

    // --- scheduling ---

    /// Queue a task on the microtask-equivalent queue.
    fn defer(&mut self, task: Task);

    /// Request a callback after the next paint. May never fire (e.g. a
    /// hidden surface); callers pair it with `set_timeout`.
    fn request_frame(&mut self, task: Task);

    /// Queue a task after a timeout.
    fn set_timeout(&mut self, task: Task, delay_ms: u64);
}
