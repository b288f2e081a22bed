//! Options - process-wide hook points for external tooling.
//!
//! A set of optional callback slots that devtools, debug layers, and
//! compatibility shims may chain onto. The core invokes a slot when it is
//! set and never depends on one being present.
//!
//! Chaining works by reading the old slot and wrapping it:
//!
//! ```ignore
//! use spark_dom::options;
//!
//! options::with(|o| {
//!     let prev = o.after_diff.take();
//!     o.after_diff = Some(std::rc::Rc::new(move |fiber| {
//!         // ... observe the diff ...
//!         if let Some(prev) = &prev {
//!             prev(fiber);
//!         }
//!     }));
//! });
//! ```
//!
//! Slots are thread-local: the render model is single-threaded and tooling
//! instruments the thread it renders on.

use std::cell::RefCell;
use std::rc::Rc;

use crate::element::Element;
use crate::error::RenderError;
use crate::host::Task;
use crate::tree::FiberId;

/// Callback slots available to external tooling.
#[derive(Default)]
pub struct Options {
    /// Invoked for every element produced by the construction functions.
    pub element_created: Option<Rc<dyn Fn(&Element)>>,
    /// Invoked before a fiber's subtree is unmounted.
    pub before_unmount: Option<Rc<dyn Fn(FiberId)>>,
    /// Invoked after a fiber (and its subtree) finished diffing.
    pub after_diff: Option<Rc<dyn Fn(FiberId)>>,
    /// Invoked when a render pass commits, with the number of instances
    /// that queued layout effects.
    pub commit: Option<Rc<dyn Fn(FiberId, usize)>>,
    /// Invoked when an error reaches the top of the tree unclaimed during
    /// an asynchronous flush.
    pub uncaught_error: Option<Rc<dyn Fn(&RenderError)>>,
    /// Invoked on every hook access with the owning fiber, hook index, and
    /// hook kind name.
    pub hook_access: Option<Rc<dyn Fn(FiberId, usize, &'static str)>>,
    /// Overrides the scheduling primitive used to defer render flushes.
    /// Set this to a callback that runs its task immediately to force
    /// synchronous flushes in tests.
    pub debounce_rendering: Option<Rc<dyn Fn(Task)>>,
}

thread_local! {
    static OPTIONS: RefCell<Options> = RefCell::new(Options::default());
}

/// Read or mutate the options object.
pub fn with<R>(f: impl FnOnce(&mut Options) -> R) -> R {
    OPTIONS.with(|options| f(&mut options.borrow_mut()))
}

/// Reset every slot (for testing).
pub fn reset() {
    OPTIONS.with(|options| *options.borrow_mut() = Options::default());
}

// =============================================================================
// Emit helpers (crate-internal)
// =============================================================================

fn slot<T: Clone>(read: impl FnOnce(&Options) -> Option<T>) -> Option<T> {
    OPTIONS.with(|options| read(&options.borrow()))
}

pub(crate) fn emit_element_created(element: &Element) {
    if let Some(cb) = slot(|o| o.element_created.clone()) {
        cb(element);
    }
}

pub(crate) fn emit_before_unmount(fiber: FiberId) {
    if let Some(cb) = slot(|o| o.before_unmount.clone()) {
        cb(fiber);
    }
}

pub(crate) fn emit_after_diff(fiber: FiberId) {
    if let Some(cb) = slot(|o| o.after_diff.clone()) {
        cb(fiber);
    }
}

pub(crate) fn emit_commit(fiber: FiberId, queued: usize) {
    if let Some(cb) = slot(|o| o.commit.clone()) {
        cb(fiber, queued);
    }
}

pub(crate) fn emit_uncaught_error(error: &RenderError) -> bool {
    match slot(|o| o.uncaught_error.clone()) {
        Some(cb) => {
            cb(error);
            true
        }
        None => false,
    }
}

pub(crate) fn emit_hook_access(fiber: FiberId, index: usize, kind: &'static str) {
    if let Some(cb) = slot(|o| o.hook_access.clone()) {
        cb(fiber, index, kind);
    }
}

pub(crate) fn debounce(task: Task) -> Option<Task> {
    match slot(|o| o.debounce_rendering.clone()) {
        Some(defer) => {
            defer(task);
            None
        }
        None => Some(task),
    }
}
