//! # spark-dom
//!
//! Lightweight Virtual DOM Rendering Library for Rust.
//!
//! Declarative element trees are diffed against a live document tree and
//! applied as minimal mutations, with a hooks subsystem for per-component
//! local state tied to a cooperative re-render scheduler.
//!
//! ## Architecture
//!
//! Elements are immutable descriptions built with [`h`]. The reconciler
//! owns a slotmap arena of fibers (the committed tree) and talks to the
//! environment only through the [`host::Host`] capability trait:
//!
//! ```text
//! h() elements → diff (keyed matching) → host mutations → commit effects
//!                       ↑                                      │
//!                  render scheduler  ←  hooks dispatch  ←──────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (Key, PropValue, Props, SameValue)
//! - [`element`] - Immutable element descriptions and `h()`
//! - [`host`] - Host environment contract and the in-memory host
//! - [`tree`] - Fiber arena (the committed tree)
//! - [`component`] - Component behavior trait and instances
//! - [`hooks`] - Hook records and the render context
//! - [`context`] - Ancestor-provided values
//! - [`root`] - Render entry points
//! - [`options`] - Hook points for external tooling

pub mod component;
pub mod context;
pub(crate) mod diff;
pub mod element;
pub mod error;
pub mod hooks;
pub mod host;
pub mod options;
pub mod root;
pub(crate) mod scheduler;
pub mod tree;
pub mod types;

// Re-export commonly used items
pub use types::{EventHandler, Key, PropValue, Props, SameValue};

pub use element::{
    Child, ComponentSpec, Element, ElementType, ViewFn, clone_element, fragment, h,
    h_keyed_fragment, text, to_child_list,
};

pub use component::{Component, Render, StatePatch, Updater};

pub use hooks::{Always, Cleanup, DepList, Dispatch, RenderCx, StateDispatch, cleanup};

pub use context::{Context, create_context};

pub use error::{RenderError, Signal, Suspension};

pub use host::{EventPayload, Host, MemoryHost, NodeKind, NodeRef};

pub use root::Root;
