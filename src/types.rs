//! Core types for spark-dom.
//!
//! These types define the foundation that everything builds on.
//! They flow through element construction, the diff, and the hooks engine.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::host::{EventPayload, NodeRef};

// =============================================================================
// Key
// =============================================================================

/// Optional stable identity hint used to match children across renders.
///
/// `Key::None` is equal to itself: unkeyed children match positionally.
/// Keys only participate in matching; they are never rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Key {
    /// No key - match by position.
    #[default]
    None,
    /// String key.
    Str(Rc<str>),
    /// Integer key.
    Int(i64),
}

impl Key {
    /// Whether this is an explicit key (participates in keyed matching).
    pub fn is_some(&self) -> bool {
        !matches!(self, Key::None)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

// =============================================================================
// Same-value identity
// =============================================================================

/// Same-value identity comparison used for dispatch bailouts and dependency
/// arrays.
///
/// Plain equality for value types, reference identity for shared (`Rc`)
/// values, and the IEEE-corrected identity rule for floats: `NaN` is equal
/// to `NaN`, while `+0.0` and `-0.0` are distinct.
pub trait SameValue {
    /// Compare two values for same-value identity.
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {$(
        impl SameValue for $ty {
            fn same_value(&self, other: &Self) -> bool {
                self == other
            }
        }
    )*};
}

same_value_by_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    str,
    String,
);

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl<T: SameValue + ?Sized> SameValue for &T {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(*other)
    }
}

/// Shared values compare by reference identity.
impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Event handlers
// =============================================================================

/// A delegated event handler stored on a host fiber.
///
/// Handlers compare by reference identity: swapping a prop to a new closure
/// replaces the stored reference without touching the underlying host
/// listener.
#[derive(Clone)]
pub struct EventHandler {
    callback: Rc<dyn Fn(&EventPayload)>,
}

impl EventHandler {
    /// Wrap a closure as an event handler.
    pub fn new(callback: impl Fn(&EventPayload) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Invoke the handler.
    pub fn call(&self, payload: &EventPayload) {
        (self.callback)(payload);
    }

    /// Reference identity comparison.
    pub fn same_ref(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

// =============================================================================
// PropValue
// =============================================================================

/// A single property value on an element.
#[derive(Clone, Debug)]
pub enum PropValue {
    /// Boolean attribute.
    Bool(bool),
    /// Integer attribute.
    Int(i64),
    /// Floating point attribute.
    Float(f64),
    /// String attribute.
    Str(Rc<str>),
    /// Delegated event handler (props named `on*`).
    Handler(EventHandler),
}

impl PropValue {
    /// Same-value comparison: floats by bits, handlers by reference.
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a.same_value(b),
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.same_ref(b),
            _ => false,
        }
    }

    /// Render the value for host attribute output. Handlers have no
    /// attribute representation.
    pub fn to_attr_string(&self) -> Option<String> {
        match self {
            PropValue::Bool(v) => Some(v.to_string()),
            PropValue::Int(v) => Some(v.to_string()),
            PropValue::Float(v) => Some(v.to_string()),
            PropValue::Str(v) => Some(v.to_string()),
            PropValue::Handler(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Rc::from(value.as_str()))
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

// =============================================================================
// Props
// =============================================================================

/// Property map for elements; also the shape of component state maps.
///
/// Shallow merge semantics: `merge` overwrites entry by entry, never
/// recursing into values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    entries: FxHashMap<Rc<str>, PropValue>,
}

impl Props {
    /// Empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style event handler: `on("click", f)` stores an `onclick`
    /// prop.
    pub fn on(self, event: &str, handler: impl Fn(&EventPayload) + 'static) -> Self {
        let name = format!("on{event}");
        self.with(&name, PropValue::Handler(EventHandler::new(handler)))
    }

    /// Insert an entry.
    pub fn insert(&mut self, name: &str, value: impl Into<PropValue>) {
        self.entries.insert(Rc::from(name), value.into());
    }

    /// Remove an entry, returning the previous value.
    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.entries.remove(name)
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    /// String accessor.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(PropValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Integer accessor.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Bool accessor.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(PropValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Whether an entry exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &PropValue)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow merge: entries of `patch` overwrite entries of `self`.
    pub fn merge(&mut self, patch: &Props) {
        for (name, value) in patch.iter() {
            self.entries.insert(name.clone(), value.clone());
        }
    }
}

// =============================================================================
// Event payload re-export point
// =============================================================================

/// Convenience constructor for a payload targeting a host node.
pub fn event(kind: &str, target: NodeRef) -> EventPayload {
    EventPayload {
        kind: Rc::from(kind),
        target,
    }
}
