//! Element tree model.
//!
//! Elements are immutable descriptions of desired tree nodes, produced fresh
//! on every render and never mutated afterwards. The construction function
//! [`h`] normalizes children into [`Child`] values:
//!
//! - `null`/booleans become [`Child::Hole`] - they render nothing but hold
//!   their position, so toggling a child between nothing and something is
//!   never mistaken for a move;
//! - strings and numbers become text children;
//! - nested arrays are preserved as [`Child::List`] rather than flattened,
//!   which keeps each array level a distinct keyed matching scope.
//!
//! Keys are extracted from props at construction and used only for matching.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::component::{Component, Render};
use crate::hooks::RenderCx;
use crate::options;
use crate::types::{Key, PropValue, Props};

// =============================================================================
// Child values
// =============================================================================

/// A normalized child of an element.
#[derive(Clone, Debug)]
pub enum Child {
    /// Renders nothing, holds its position in the child list.
    Hole,
    /// Renders as a text node.
    Text(Rc<str>),
    /// Renders as an element subtree.
    Element(Element),
    /// A nested sequence - rendered as a sibling group with its own keyed
    /// matching scope.
    List(Rc<[Child]>),
}

impl Child {
    /// A child list value from an iterator.
    pub fn list(children: impl IntoIterator<Item = Child>) -> Self {
        Child::List(children.into_iter().collect())
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(Rc::from(value))
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(Rc::from(value.as_str()))
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(Rc::from(value.to_string().as_str()))
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(Rc::from(value.to_string().as_str()))
    }
}

/// Booleans render as nothing.
impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Hole
    }
}

/// `None` renders as nothing.
impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Child::Hole,
        }
    }
}

impl From<Vec<Child>> for Child {
    fn from(children: Vec<Child>) -> Self {
        Child::List(children.into())
    }
}

/// Text child shorthand.
pub fn text(value: impl fmt::Display) -> Child {
    Child::Text(Rc::from(value.to_string().as_str()))
}

/// Flatten a child value into a flat list of renderable children, dropping
/// holes. This is the public helper for prop-level children handling; the
/// diff itself never flattens.
pub fn to_child_list(child: &Child) -> Vec<Child> {
    let mut out = Vec::new();
    collect(child, &mut out);
    return out;

    fn collect(child: &Child, out: &mut Vec<Child>) {
        match child {
            Child::Hole => {}
            Child::List(items) => {
                for item in items.iter() {
                    collect(item, out);
                }
            }
            other => out.push(other.clone()),
        }
    }
}

// =============================================================================
// Component references
// =============================================================================

/// Function component signature.
pub type ViewFn = fn(&Props, &mut RenderCx<'_>) -> Render;

/// Identity of a component reference. Two elements are the same logical
/// component node only when their spec ids are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecId {
    /// Trait-based component, identified by its concrete type.
    Type(TypeId),
    /// Function component, identified by function pointer.
    Func(usize),
}

/// A reference to a component: an identity plus a constructor for fresh
/// behavior objects.
#[derive(Clone)]
pub struct ComponentSpec {
    id: SpecId,
    name: &'static str,
    make: Rc<dyn Fn() -> Box<dyn Component>>,
}

impl ComponentSpec {
    /// Spec for a trait-based component constructed via `Default`.
    pub fn of<C: Component + Default>() -> Self {
        Self {
            id: SpecId::Type(TypeId::of::<C>()),
            name: std::any::type_name::<C>(),
            make: Rc::new(|| Box::new(C::default())),
        }
    }

    /// Spec for a function component.
    pub fn function(func: ViewFn) -> Self {
        Self {
            id: SpecId::Func(func as usize),
            name: "fn",
            make: Rc::new(move || Box::new(FnComponent { func })),
        }
    }

    /// Identity for same-logical-node checks.
    pub fn id(&self) -> SpecId {
        self.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Construct a fresh behavior object.
    pub(crate) fn construct(&self) -> Box<dyn Component> {
        (self.make)()
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Behavior shell that drives a function component through the hooks engine.
struct FnComponent {
    func: ViewFn,
}

impl Component for FnComponent {
    fn render(&mut self, props: &Props, _state: &Props, cx: &mut RenderCx<'_>) -> Render {
        (self.func)(props, cx)
    }
}

// =============================================================================
// Element type
// =============================================================================

/// What an element describes.
#[derive(Clone)]
pub enum ElementType {
    /// A host element with a tag.
    Host(Rc<str>),
    /// Transparent grouping - no host node of its own.
    Fragment,
    /// A context provider (see [`crate::context`]).
    Provider {
        /// Identity of the provided context.
        context_id: u64,
        /// The provided value.
        value: Rc<dyn Any>,
    },
    /// A component reference.
    Component(ComponentSpec),
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Host(tag) => f.debug_tuple("Host").field(tag).finish(),
            ElementType::Fragment => f.write_str("Fragment"),
            ElementType::Provider { context_id, .. } => f
                .debug_struct("Provider")
                .field("context_id", context_id)
                .finish(),
            ElementType::Component(spec) => f.debug_tuple("Component").field(spec).finish(),
        }
    }
}

impl From<&str> for ElementType {
    fn from(tag: &str) -> Self {
        ElementType::Host(Rc::from(tag))
    }
}

impl From<ViewFn> for ElementType {
    fn from(func: ViewFn) -> Self {
        ElementType::Component(ComponentSpec::function(func))
    }
}

impl From<ComponentSpec> for ElementType {
    fn from(spec: ComponentSpec) -> Self {
        ElementType::Component(spec)
    }
}

// =============================================================================
// Element
// =============================================================================

struct ElementInner {
    ty: ElementType,
    props: Props,
    children: Vec<Child>,
    key: Key,
}

/// Immutable description of a desired tree node.
///
/// Cheap to clone; two clones share the same description.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    /// The element's type.
    pub fn ty(&self) -> &ElementType {
        &self.inner.ty
    }

    /// The element's props (without `key`, which is extracted at
    /// construction).
    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    /// The element's normalized children.
    pub fn children(&self) -> &[Child] {
        &self.inner.children
    }

    /// The element's matching key.
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    /// Whether two elements share the exact same description.
    pub fn same_ref(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Trait-based component element.
    pub fn component<C: Component + Default>(
        props: Props,
        children: impl IntoIterator<Item = Child>,
    ) -> Element {
        h(ComponentSpec::of::<C>(), props, children)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("ty", &self.inner.ty)
            .field("key", &self.inner.key)
            .field("children", &self.inner.children.len())
            .finish()
    }
}

/// Construct a frozen element.
///
/// `key` is extracted from `props` if present (string or integer value) and
/// participates only in child matching.
pub fn h(
    ty: impl Into<ElementType>,
    mut props: Props,
    children: impl IntoIterator<Item = Child>,
) -> Element {
    let key = match props.remove("key") {
        Some(PropValue::Str(s)) => Key::Str(s),
        Some(PropValue::Int(i)) => Key::Int(i),
        Some(other) => {
            log::warn!("ignoring non-string, non-integer key: {other:?}");
            Key::None
        }
        None => Key::None,
    };

    let element = Element {
        inner: Rc::new(ElementInner {
            ty: ty.into(),
            props,
            children: children.into_iter().collect(),
            key,
        }),
    };
    options::emit_element_created(&element);
    element
}

/// Transparent grouping element.
pub fn fragment(children: impl IntoIterator<Item = Child>) -> Element {
    h_keyed_fragment(Key::None, children)
}

/// Fragment carrying an explicit key (useful for keyed groups).
pub fn h_keyed_fragment(key: Key, children: impl IntoIterator<Item = Child>) -> Element {
    let element = Element {
        inner: Rc::new(ElementInner {
            ty: ElementType::Fragment,
            props: Props::new(),
            children: children.into_iter().collect(),
            key,
        }),
    };
    options::emit_element_created(&element);
    element
}

/// Copy an element, shallow-merging `props` over the original's and
/// optionally replacing its children.
pub fn clone_element(element: &Element, props: Props, children: Option<Vec<Child>>) -> Element {
    let mut merged = element.props().clone();
    match element.key() {
        Key::Str(s) => merged.insert("key", PropValue::Str(s.clone())),
        Key::Int(i) => merged.insert("key", PropValue::Int(*i)),
        Key::None => {}
    }
    merged.merge(&props);

    h(
        element.ty().clone(),
        merged,
        children.unwrap_or_else(|| element.children().to_vec()),
    )
}
