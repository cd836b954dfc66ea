//! Core types for spark-view.
//!
//! These types flow through every pass: the dynamic [`Value`] carried by
//! bindings, the bit flags aggregated by the definition builder, and the small
//! handles the engine hands to renderers.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use fixedbitset::FixedBitSet;

// =============================================================================
// Value
// =============================================================================

/// A binding value.
///
/// Primitives compare by value. Lists, maps and objects compare by identity,
/// so a binding is only dirty when a *new* aggregate is produced.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Map(Rc<BTreeMap<Rc<str>, Value>>),
    /// A render node handle (what element queries collect).
    Node(RenderNode),
    Object(Rc<dyn Any>),
}

impl Value {
    /// Wrap an arbitrary object. Equality is by identity of the allocation.
    pub fn object<T: Any>(value: T) -> Self {
        Self::Object(Rc::new(value))
    }

    /// Build a list value from anything iterable.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Downcast an object value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(obj) => obj.downcast_ref(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// `true` for Undefined and Null.
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Undefined | Self::Null | Self::Bool(_) | Self::Number(_) | Self::Str(_)
        )
    }

    /// Truthiness as the template language understands it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Identity comparison used by the check-and-update pass.
    ///
    /// NaN is identical to NaN; otherwise a binding flipping between NaN values
    /// would be dirty on every pass.
    pub fn loose_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    /// Looser comparison used only by the check-no-changes pass.
    ///
    /// Lists compare element-wise and two non-primitive, non-list values are
    /// always considered equal.
    pub fn dev_mode_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.dev_mode_equal(y))
            }
            (a, b)
                if !a.is_primitive()
                    && !b.is_primitive()
                    && !matches!(a, Self::List(_))
                    && !matches!(b, Self::List(_)) =>
            {
                true
            }
            _ => self.loose_identical(other),
        }
    }

    /// String used for text interpolation: nullish values render as nothing.
    pub fn to_interpolation(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => format_number(*n, f),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Map(_) | Self::Object(_) => f.write_str("[object Object]"),
            Self::Node(node) => write!(f, "[node {}]", node.0),
        }
    }
}

/// Identity equality, as in [`Value::loose_identical`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_identical(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(&&**s).finish(),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(&node.0).finish(),
            Self::Object(obj) => write!(f, "Object({:p})", Rc::as_ptr(obj)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Render handles
// =============================================================================

/// Opaque handle to a node owned by a [`Renderer`](crate::renderer::Renderer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderNode(pub u64);

// =============================================================================
// Node and view flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Per-node flags. The builder ORs them into `child_flags` of every
    /// ancestor and into the definition-wide `node_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct NodeFlags: u32 {
        const ON_INIT = 1 << 0;
        const ON_DESTROY = 1 << 1;
        const DO_CHECK = 1 << 2;
        const ON_CHANGES = 1 << 3;
        const AFTER_CONTENT_INIT = 1 << 4;
        const AFTER_CONTENT_CHECKED = 1 << 5;
        const AFTER_VIEW_INIT = 1 << 6;
        const AFTER_VIEW_CHECKED = 1 << 7;
        const HAS_EMBEDDED_VIEWS = 1 << 8;
        const HAS_COMPONENT = 1 << 9;
        const HAS_CONTENT_QUERY = 1 << 10;
        const HAS_VIEW_QUERY = 1 << 11;
    }
}

bitflags::bitflags! {
    /// Flags of a whole view definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct ViewFlags: u8 {
        /// Bypass the renderer: the view renders nothing.
        const DIRECT = 1 << 0;
        /// Only check this view while it is marked for check.
        const ON_PUSH = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Runtime state bits of a view instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct ViewState: u8 {
        const CHECKS_ENABLED = 1 << 0;
        const DESTROYED = 1 << 1;
    }
}

// =============================================================================
// Node type
// =============================================================================

/// Kind of a node, derived from its definition payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Text,
    Provider,
    PureExpression,
    Query,
    ProjectedContent,
}

// =============================================================================
// Query identifiers
// =============================================================================

/// Identifier of a query declared somewhere in a view tree.
pub type QueryId = usize;

/// Bitmap of query identifiers matched by a node or a subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryIds(FixedBitSet);

impl QueryIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: QueryId) {
        if id >= self.0.len() {
            self.0.grow(id + 1);
        }
        self.0.insert(id);
    }

    #[inline]
    pub fn contains(&self, id: QueryId) -> bool {
        self.0.contains(id)
    }

    /// Add every id of `other` to `self`.
    pub fn union_with(&mut self, other: &QueryIds) {
        if other.0.len() > self.0.len() {
            self.0.grow(other.0.len());
        }
        self.0.union_with(&other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.count_ones(..) == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.0.ones()
    }
}

impl FromIterator<QueryId> for QueryIds {
    fn from_iter<I: IntoIterator<Item = QueryId>>(iter: I) -> Self {
        let mut ids = Self::new();
        for id in iter {
            ids.insert(id);
        }
        ids
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// Identity of a provider for dependency lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub &'static str);
