//! In-memory host document.
//!
//! `MemoryHost` implements the full [`Host`] capability contract against a
//! plain node store, with deterministic task/frame/timeout queues the
//! embedder pumps explicitly. It backs the test suite and works as a render
//! target for non-browser embedders.
//!
//! The host records every mutation it is asked to perform in an operation
//! log. A diff pass over an unchanged tree must leave the log empty - the
//! log is how tests assert the "minimal mutations" contract.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::{Host, NodeKind, NodeRef, Task};
use crate::types::PropValue;

// =============================================================================
// Operation log
// =============================================================================

/// One recorded host mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateElement(NodeRef),
    CreateText(NodeRef),
    InsertBefore {
        parent: NodeRef,
        node: NodeRef,
        before: Option<NodeRef>,
    },
    RemoveChild {
        parent: NodeRef,
        node: NodeRef,
    },
    SetText {
        node: NodeRef,
        text: String,
    },
    SetAttribute {
        node: NodeRef,
        name: String,
    },
    RemoveAttribute {
        node: NodeRef,
        name: String,
    },
    AttachListener {
        node: NodeRef,
        event: String,
    },
    DetachListener {
        node: NodeRef,
        event: String,
    },
}

// =============================================================================
// Node store
// =============================================================================

struct NodeData {
    kind: NodeKind,
    tag: Option<Rc<str>>,
    text: String,
    attrs: FxHashMap<Rc<str>, PropValue>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    listeners: Vec<Rc<str>>,
}

struct MemoryDoc {
    nodes: FxHashMap<u64, NodeData>,
    next_id: u64,
    root: NodeRef,
    ops: Vec<HostOp>,
    tasks: VecDeque<Task>,
    frames: Vec<Task>,
    timeouts: Vec<(u64, Task)>,
}

impl MemoryDoc {
    fn node(&self, node: NodeRef) -> &NodeData {
        self.nodes
            .get(&node.0)
            .unwrap_or_else(|| panic!("unknown host node {node:?}"))
    }

    fn node_mut(&mut self, node: NodeRef) -> &mut NodeData {
        self.nodes
            .get_mut(&node.0)
            .unwrap_or_else(|| panic!("unknown host node {node:?}"))
    }

    fn alloc(&mut self, data: NodeData) -> NodeRef {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, data);
        NodeRef(id)
    }

    fn detach(&mut self, node: NodeRef) {
        if let Some(parent) = self.node(node).parent {
            let siblings = &mut self.node_mut(parent).children;
            if let Some(pos) = siblings.iter().position(|n| *n == node) {
                siblings.remove(pos);
            }
            self.node_mut(node).parent = None;
        }
    }
}

// =============================================================================
// MemoryHost handle
// =============================================================================

/// Cheaply cloneable handle to an in-memory host document.
///
/// Tests keep one clone for inspection and hand another to the root.
#[derive(Clone)]
pub struct MemoryHost {
    state: Rc<RefCell<MemoryDoc>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a document with a single container node (see [`Self::root`]).
    pub fn new() -> Self {
        let mut doc = MemoryDoc {
            nodes: FxHashMap::default(),
            next_id: 0,
            root: NodeRef(0),
            ops: Vec::new(),
            tasks: VecDeque::new(),
            frames: Vec::new(),
            timeouts: Vec::new(),
        };
        let root = doc.alloc(NodeData {
            kind: NodeKind::Element,
            tag: Some(Rc::from("root")),
            text: String::new(),
            attrs: FxHashMap::default(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        doc.root = root;
        Self {
            state: Rc::new(RefCell::new(doc)),
        }
    }

    /// The pre-created container node.
    pub fn root(&self) -> NodeRef {
        self.state.borrow().root
    }

    // --- inspection helpers for tests and embedders ---

    /// Drain the mutation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.state.borrow_mut().ops)
    }

    /// Number of recorded mutations since the last drain.
    pub fn op_count(&self) -> usize {
        self.state.borrow().ops.len()
    }

    /// Number of underlying listeners attached for `event` on `node`.
    pub fn listener_count(&self, node: NodeRef, event: &str) -> usize {
        self.state
            .borrow()
            .node(node)
            .listeners
            .iter()
            .filter(|e| &***e == event)
            .count()
    }

    /// Text content of a text node.
    pub fn text(&self, node: NodeRef) -> String {
        self.state.borrow().node(node).text.clone()
    }

    /// Attribute value on an element node.
    pub fn attr(&self, node: NodeRef, name: &str) -> Option<PropValue> {
        self.state.borrow().node(node).attrs.get(name).cloned()
    }

    /// Serialize a subtree to a compact markup string.
    pub fn to_html(&self, node: NodeRef) -> String {
        let doc = self.state.borrow();
        let mut out = String::new();
        write_node(&doc, node, &mut out);
        out
    }

    /// Serialize the container's children.
    pub fn html(&self) -> String {
        let doc = self.state.borrow();
        let mut out = String::new();
        for child in doc.node(doc.root).children.clone() {
            write_node(&doc, child, &mut out);
        }
        out
    }

    // --- queue pumping ---

    /// Run queued microtasks until the queue is empty.
    pub fn run_tasks(&self) {
        loop {
            let task = self.state.borrow_mut().tasks.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Fire pending frame callbacks (simulates a paint).
    pub fn fire_frame(&self) {
        let frames = std::mem::take(&mut self.state.borrow_mut().frames);
        for task in frames {
            task();
        }
    }

    /// Fire pending timeouts regardless of delay.
    pub fn fire_timeouts(&self) {
        let timeouts = std::mem::take(&mut self.state.borrow_mut().timeouts);
        for (_, task) in timeouts {
            task();
        }
    }

    /// Pump every queue until the document is idle.
    pub fn run_until_idle(&self) {
        loop {
            self.run_tasks();
            let quiet = {
                let doc = self.state.borrow();
                doc.frames.is_empty() && doc.timeouts.is_empty()
            };
            if quiet {
                break;
            }
            self.fire_frame();
            self.fire_timeouts();
        }
    }
}

fn write_node(doc: &MemoryDoc, node: NodeRef, out: &mut String) {
    let data = doc.node(node);
    match data.kind {
        NodeKind::Text => out.push_str(&data.text),
        NodeKind::Element => {
            let tag = data.tag.as_deref().unwrap_or("node");
            let _ = write!(out, "<{tag}");
            let mut attrs: Vec<_> = data
                .attrs
                .iter()
                .filter_map(|(name, value)| value.to_attr_string().map(|v| (name.clone(), v)))
                .collect();
            attrs.sort();
            for (name, value) in attrs {
                let _ = write!(out, " {name}=\"{value}\"");
            }
            out.push('>');
            for child in &data.children {
                write_node(doc, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

// =============================================================================
// Host impl
// =============================================================================

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str) -> NodeRef {
        let mut doc = self.state.borrow_mut();
        let node = doc.alloc(NodeData {
            kind: NodeKind::Element,
            tag: Some(Rc::from(tag)),
            text: String::new(),
            attrs: FxHashMap::default(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        doc.ops.push(HostOp::CreateElement(node));
        node
    }

    fn create_text(&mut self, text: &str) -> NodeRef {
        let mut doc = self.state.borrow_mut();
        let node = doc.alloc(NodeData {
            kind: NodeKind::Text,
            tag: None,
            text: text.to_string(),
            attrs: FxHashMap::default(),
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        });
        doc.ops.push(HostOp::CreateText(node));
        node
    }

    fn node_kind(&self, node: NodeRef) -> NodeKind {
        self.state.borrow().node(node).kind
    }

    fn tag(&self, node: NodeRef) -> Option<Rc<str>> {
        self.state.borrow().node(node).tag.clone()
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.state.borrow().node(node).parent
    }

    fn first_child(&self, node: NodeRef) -> Option<NodeRef> {
        self.state.borrow().node(node).children.first().copied()
    }

    fn child_list(&self, node: NodeRef) -> Vec<NodeRef> {
        self.state.borrow().node(node).children.clone()
    }

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>) {
        let mut doc = self.state.borrow_mut();
        doc.detach(node);
        let pos = match before {
            Some(before) => doc
                .node(parent)
                .children
                .iter()
                .position(|n| *n == before)
                .unwrap_or(doc.node(parent).children.len()),
            None => doc.node(parent).children.len(),
        };
        doc.node_mut(parent).children.insert(pos, node);
        doc.node_mut(node).parent = Some(parent);
        doc.ops.push(HostOp::InsertBefore {
            parent,
            node,
            before,
        });
    }

    fn remove_child(&mut self, parent: NodeRef, node: NodeRef) {
        let mut doc = self.state.borrow_mut();
        doc.detach(node);
        doc.ops.push(HostOp::RemoveChild { parent, node });
    }

    fn set_text(&mut self, node: NodeRef, text: &str) {
        let mut doc = self.state.borrow_mut();
        doc.node_mut(node).text = text.to_string();
        doc.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &PropValue) {
        let mut doc = self.state.borrow_mut();
        doc.node_mut(node).attrs.insert(Rc::from(name), value.clone());
        doc.ops.push(HostOp::SetAttribute {
            node,
            name: name.to_string(),
        });
    }

    fn remove_attribute(&mut self, node: NodeRef, name: &str) {
        let mut doc = self.state.borrow_mut();
        doc.node_mut(node).attrs.remove(name);
        doc.ops.push(HostOp::RemoveAttribute {
            node,
            name: name.to_string(),
        });
    }

    fn attach_listener(&mut self, node: NodeRef, event: &str) {
        let mut doc = self.state.borrow_mut();
        doc.node_mut(node).listeners.push(Rc::from(event));
        doc.ops.push(HostOp::AttachListener {
            node,
            event: event.to_string(),
        });
    }

    fn detach_listener(&mut self, node: NodeRef, event: &str) {
        let mut doc = self.state.borrow_mut();
        let listeners = &mut doc.node_mut(node).listeners;
        if let Some(pos) = listeners.iter().position(|e| &**e == event) {
            listeners.remove(pos);
        }
        doc.ops.push(HostOp::DetachListener {
            node,
            event: event.to_string(),
        });
    }

    fn defer(&mut self, task: Task) {
        self.state.borrow_mut().tasks.push_back(task);
    }

    fn request_frame(&mut self, task: Task) {
        self.state.borrow_mut().frames.push(task);
    }

    fn set_timeout(&mut self, task: Task, delay_ms: u64) {
        self.state.borrow_mut().timeouts.push((delay_ms, task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_construction() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let div = host.create_element("div");
        let text = host.create_text("hi");

        host.append_child(root, div);
        host.append_child(div, text);

        assert_eq!(host.node_kind(div), NodeKind::Element);
        assert_eq!(host.node_kind(text), NodeKind::Text);
        assert_eq!(host.parent(text), Some(div));
        assert_eq!(host.child_list(root), vec![div]);
        assert_eq!(host.html(), "<div>hi</div>");
    }

    #[test]
    fn test_insert_before_moves_nodes() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let a = host.create_element("a");
        let b = host.create_element("b");
        let c = host.create_element("c");
        host.append_child(root, a);
        host.append_child(root, b);
        host.append_child(root, c);

        // Move c to the front.
        host.insert_before(root, c, Some(a));
        assert_eq!(host.child_list(root), vec![c, a, b]);
    }

    #[test]
    fn test_op_log_drain() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let div = host.create_element("div");
        host.append_child(root, div);

        assert!(host.op_count() > 0);
        host.take_ops();
        assert_eq!(host.op_count(), 0);
    }

    #[test]
    fn test_task_queue_runs_in_order() {
        use std::cell::RefCell;

        let mut host = MemoryHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log1 = log.clone();
        let log2 = log.clone();

        host.defer(Box::new(move || log1.borrow_mut().push(1)));
        host.defer(Box::new(move || log2.borrow_mut().push(2)));

        host.run_tasks();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_listener_bookkeeping() {
        let mut host = MemoryHost::new();
        let div = host.create_element("div");

        host.attach_listener(div, "click");
        assert_eq!(host.listener_count(div, "click"), 1);

        host.detach_listener(div, "click");
        assert_eq!(host.listener_count(div, "click"), 0);
    }
}
