//! View definitions - the immutable, flattened description of a template.
//!
//! A [`ViewDefinition`] is built once and shared (`Rc`) by every view created
//! from it. Nodes are stored in depth-first order and addressed by index:
//!
//! ```text
//! Index 0: Element  (parent=None, child_count=2)
//! Index 1: Text     (parent=0)
//! Index 2: Provider (parent=0, bindings 0..1)
//! ```
//!
//! Node lists are authored with the [`NodeDef`] constructors and handed to a
//! [`ViewDefinitionBuilder`], which computes every derived field (indices,
//! parents, reverse child order, aggregated flags) and validates the tree.

mod builder;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::directive::Instance;
use crate::error::{DefinitionError, ViewError};
use crate::renderer::ComponentRenderType;
use crate::types::{NodeFlags, NodeType, QueryId, QueryIds, Token, Value, ViewFlags};
use crate::view::{NodeCheck, ViewData};

pub(crate) use builder::flatten;

/// Evaluates every binding of a view, in source order, through a [`NodeCheck`].
pub type ViewUpdateFn = Rc<dyn Fn(&mut NodeCheck<'_>) -> Result<(), ViewError>>;

/// Handles an event raised on `node_index`. Returns `false` to prevent the default.
pub type ViewHandleEventFn = Rc<dyn Fn(&ViewData, usize, &str, &Value) -> bool>;

/// Builds a provider instance from its resolved dependencies.
pub type ProviderFactory = Rc<dyn Fn(&[Instance]) -> Instance>;

/// Pure transform applied by pipe expressions.
pub type PipeFn = Rc<dyn Fn(&[Value]) -> Value>;

// =============================================================================
// Bindings
// =============================================================================

/// What a binding writes to when its value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    ElementAttribute,
    ElementClass,
    ElementStyle,
    ElementProperty,
    DirectiveProperty,
    Interpolation,
    PureExpressionProperty,
}

/// One reactive input slot of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDef {
    pub kind: BindingKind,
    pub name: Option<Rc<str>>,
    /// Unit of a style binding, or the text following an interpolation.
    pub suffix: Option<Rc<str>>,
}

impl BindingDef {
    fn named(kind: BindingKind, name: &str) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            suffix: None,
        }
    }

    pub fn attribute(name: &str) -> Self {
        Self::named(BindingKind::ElementAttribute, name)
    }

    pub fn class(name: &str) -> Self {
        Self::named(BindingKind::ElementClass, name)
    }

    pub fn style(name: &str) -> Self {
        Self::named(BindingKind::ElementStyle, name)
    }

    /// Style binding whose value gets `unit` appended (`width.px`).
    pub fn style_with_unit(name: &str, unit: &str) -> Self {
        Self {
            suffix: Some(unit.into()),
            ..Self::named(BindingKind::ElementStyle, name)
        }
    }

    pub fn property(name: &str) -> Self {
        Self::named(BindingKind::ElementProperty, name)
    }

    pub fn directive(name: &str) -> Self {
        Self::named(BindingKind::DirectiveProperty, name)
    }

    pub fn interpolation(suffix: &str) -> Self {
        Self {
            kind: BindingKind::Interpolation,
            name: None,
            suffix: Some(suffix.into()),
        }
    }

    pub fn pure(name: Option<&str>) -> Self {
        Self {
            kind: BindingKind::PureExpressionProperty,
            name: name.map(Into::into),
            suffix: None,
        }
    }
}

// =============================================================================
// Node payloads
// =============================================================================

#[derive(Clone, Default)]
pub struct ElementDef {
    /// `None` for a template anchor.
    pub name: Option<Rc<str>>,
    pub attrs: Vec<(Rc<str>, Rc<str>)>,
    pub outputs: Vec<Rc<str>>,
    /// Template of the embedded views hosted at this anchor.
    pub template: Option<Rc<ViewDefinition>>,
    /// Token -> node index of the providers declared on this element.
    pub(crate) provider_indices: HashMap<Token, usize>,
    pub(crate) component_provider: Option<usize>,
}

impl ElementDef {
    pub fn provider_index(&self, token: Token) -> Option<usize> {
        self.provider_indices.get(&token).copied()
    }

    /// Node index of the component provider hosted on this element.
    pub fn component_provider(&self) -> Option<usize> {
        self.component_provider
    }
}

#[derive(Debug, Clone)]
pub struct TextDef {
    pub prefix: Rc<str>,
}

#[derive(Clone)]
pub struct ProviderDef {
    pub token: Token,
    pub factory: ProviderFactory,
    pub deps: Vec<Token>,
    /// View definition of the component this provider hosts.
    pub component: Option<Rc<ViewDefinition>>,
}

#[derive(Clone)]
pub enum PureExpressionKind {
    Array,
    /// Keys are the binding names.
    Object,
    Pipe(PipeFn),
}

#[derive(Clone)]
pub struct PureExpressionDef {
    pub kind: PureExpressionKind,
}

/// How query results are assigned to the owning provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryBindingKind {
    First,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBindingDef {
    pub prop_name: Rc<str>,
    pub kind: QueryBindingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDef {
    pub id: QueryId,
    pub bindings: Vec<QueryBindingDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgContentDef {
    pub index: usize,
}

/// Kind-specific payload. The variant is the tag node handlers dispatch on.
#[derive(Clone)]
pub enum NodeKind {
    Element(ElementDef),
    Text(TextDef),
    Provider(ProviderDef),
    PureExpression(PureExpressionDef),
    Query(QueryDef),
    ProjectedContent(NgContentDef),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Element(_) => NodeType::Element,
            Self::Text(_) => NodeType::Text,
            Self::Provider(_) => NodeType::Provider,
            Self::PureExpression(_) => NodeType::PureExpression,
            Self::Query(_) => NodeType::Query,
            Self::ProjectedContent(_) => NodeType::ProjectedContent,
        }
    }
}

// =============================================================================
// NodeDef
// =============================================================================

/// One static position in a view tree.
///
/// The constructors only fill what the author knows (kind, flags, bindings,
/// `child_count`); the builder fills the rest.
#[derive(Clone)]
pub struct NodeDef {
    pub(crate) index: usize,
    pub(crate) parent: Option<usize>,
    /// Nearest ancestor element.
    pub(crate) render_parent: Option<usize>,
    pub(crate) reverse_child_index: usize,
    pub(crate) binding_index: usize,
    pub(crate) disposable_index: usize,
    pub(crate) flags: NodeFlags,
    pub(crate) child_flags: NodeFlags,
    pub(crate) child_count: usize,
    pub(crate) matched_queries: QueryIds,
    pub(crate) child_matched_queries: QueryIds,
    pub(crate) ng_content_index: Option<usize>,
    pub(crate) bindings: Vec<BindingDef>,
    pub(crate) kind: NodeKind,
}

impl NodeDef {
    fn new(kind: NodeKind) -> Self {
        Self {
            index: 0,
            parent: None,
            render_parent: None,
            reverse_child_index: 0,
            binding_index: 0,
            disposable_index: 0,
            flags: NodeFlags::empty(),
            child_flags: NodeFlags::empty(),
            child_count: 0,
            matched_queries: QueryIds::new(),
            child_matched_queries: QueryIds::new(),
            ng_content_index: None,
            bindings: Vec::new(),
            kind,
        }
    }

    pub fn element(name: &str) -> Self {
        Self::new(NodeKind::Element(ElementDef {
            name: Some(name.into()),
            ..ElementDef::default()
        }))
    }

    /// Template anchor hosting embedded views of `template`.
    pub fn anchor(template: Rc<ViewDefinition>) -> Self {
        let mut node = Self::new(NodeKind::Element(ElementDef {
            template: Some(template),
            ..ElementDef::default()
        }));
        node.flags |= NodeFlags::HAS_EMBEDDED_VIEWS;
        node
    }

    /// Text node `prefix{{v0}}suffix0{{v1}}suffix1...`; one binding per suffix.
    pub fn text<S: AsRef<str>>(prefix: &str, suffixes: impl IntoIterator<Item = S>) -> Self {
        let mut node = Self::new(NodeKind::Text(TextDef {
            prefix: prefix.into(),
        }));
        node.bindings = suffixes
            .into_iter()
            .map(|s| BindingDef::interpolation(s.as_ref()))
            .collect();
        node
    }

    pub fn provider(token: Token, factory: impl Fn(&[Instance]) -> Instance + 'static) -> Self {
        Self::new(NodeKind::Provider(ProviderDef {
            token,
            factory: Rc::new(factory),
            deps: Vec::new(),
            component: None,
        }))
    }

    /// Pure array literal with `arity` entries.
    pub fn pure_array(arity: usize) -> Self {
        let mut node = Self::new(NodeKind::PureExpression(PureExpressionDef {
            kind: PureExpressionKind::Array,
        }));
        node.bindings = (0..arity).map(|_| BindingDef::pure(None)).collect();
        node
    }

    /// Pure object literal with the given keys.
    pub fn pure_object<S: AsRef<str>>(keys: impl IntoIterator<Item = S>) -> Self {
        let mut node = Self::new(NodeKind::PureExpression(PureExpressionDef {
            kind: PureExpressionKind::Object,
        }));
        node.bindings = keys
            .into_iter()
            .map(|k| BindingDef::pure(Some(k.as_ref())))
            .collect();
        node
    }

    /// Pure pipe: `transform` runs only when one of its `arity` arguments changed.
    pub fn pure_pipe(arity: usize, transform: impl Fn(&[Value]) -> Value + 'static) -> Self {
        let mut node = Self::new(NodeKind::PureExpression(PureExpressionDef {
            kind: PureExpressionKind::Pipe(Rc::new(transform)),
        }));
        node.bindings = (0..arity).map(|_| BindingDef::pure(None)).collect();
        node
    }

    pub fn content_query(id: QueryId) -> Self {
        let mut node = Self::new(NodeKind::Query(QueryDef {
            id,
            bindings: Vec::new(),
        }));
        node.flags |= NodeFlags::HAS_CONTENT_QUERY;
        node
    }

    pub fn view_query(id: QueryId) -> Self {
        let mut node = Self::new(NodeKind::Query(QueryDef {
            id,
            bindings: Vec::new(),
        }));
        node.flags |= NodeFlags::HAS_VIEW_QUERY;
        node
    }

    /// Projection slot `index` of a component template.
    pub fn ng_content(index: usize) -> Self {
        Self::new(NodeKind::ProjectedContent(NgContentDef { index }))
    }

    // -------------------------------------------------------------------------
    // Chained setters
    // -------------------------------------------------------------------------

    /// Number of direct and transitive descendants.
    pub fn with_child_count(mut self, child_count: usize) -> Self {
        self.child_count = child_count;
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_matched_queries(mut self, ids: impl IntoIterator<Item = QueryId>) -> Self {
        for id in ids {
            self.matched_queries.insert(id);
        }
        self
    }

    /// Project this node into the host component's `<ng-content>` slot `index`.
    pub fn with_ng_content_index(mut self, index: usize) -> Self {
        self.ng_content_index = Some(index);
        self
    }

    pub fn with_bindings(mut self, bindings: impl IntoIterator<Item = BindingDef>) -> Self {
        self.bindings = bindings.into_iter().collect();
        self
    }

    pub fn with_attrs<'a>(mut self, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        if let NodeKind::Element(element) = &mut self.kind {
            element.attrs = attrs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect();
        }
        self
    }

    /// Events to listen to; each costs one disposer slot.
    pub fn with_outputs<'a>(mut self, outputs: impl IntoIterator<Item = &'a str>) -> Self {
        if let NodeKind::Element(element) = &mut self.kind {
            element.outputs = outputs.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn with_deps(mut self, deps: impl IntoIterator<Item = Token>) -> Self {
        if let NodeKind::Provider(provider) = &mut self.kind {
            provider.deps = deps.into_iter().collect();
        }
        self
    }

    /// Make this provider a component host rendering `view`.
    pub fn with_component(mut self, view: Rc<ViewDefinition>) -> Self {
        if let NodeKind::Provider(provider) = &mut self.kind {
            provider.component = Some(view);
            self.flags |= NodeFlags::HAS_COMPONENT;
        }
        self
    }

    /// Directive inputs, one binding each.
    pub fn with_props<S: AsRef<str>>(mut self, props: impl IntoIterator<Item = S>) -> Self {
        self.bindings = props
            .into_iter()
            .map(|p| BindingDef::directive(p.as_ref()))
            .collect();
        self
    }

    pub fn with_query_binding(mut self, prop_name: &str, kind: QueryBindingKind) -> Self {
        if let NodeKind::Query(query) = &mut self.kind {
            query.bindings.push(QueryBindingDef {
                prop_name: prop_name.into(),
                kind,
            });
        }
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn render_parent(&self) -> Option<usize> {
        self.render_parent
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn reverse_child_index(&self) -> usize {
        self.reverse_child_index
    }

    pub fn binding_index(&self) -> usize {
        self.binding_index
    }

    pub fn disposable_index(&self) -> usize {
        self.disposable_index
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn child_flags(&self) -> NodeFlags {
        self.child_flags
    }

    pub fn matched_queries(&self) -> &QueryIds {
        &self.matched_queries
    }

    pub fn child_matched_queries(&self) -> &QueryIds {
        &self.child_matched_queries
    }

    pub fn ng_content_index(&self) -> Option<usize> {
        self.ng_content_index
    }

    pub fn bindings(&self) -> &[BindingDef] {
        &self.bindings
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn as_element(&self) -> Option<&ElementDef> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_provider(&self) -> Option<&ProviderDef> {
        match &self.kind {
            NodeKind::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&QueryDef> {
        match &self.kind {
            NodeKind::Query(query) => Some(query),
            _ => None,
        }
    }

    /// Disposer slots this node needs.
    pub(crate) fn disposable_count(&self) -> usize {
        self.as_element().map_or(0, |element| element.outputs.len())
    }

    /// Last index covered by this node's subtree.
    #[inline]
    pub(crate) fn subtree_end(&self) -> usize {
        self.index.saturating_add(self.child_count)
    }
}

impl fmt::Debug for NodeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDef")
            .field("index", &self.index)
            .field("type", &self.node_type())
            .field("parent", &self.parent)
            .field("child_count", &self.child_count)
            .field("reverse_child_index", &self.reverse_child_index)
            .field("flags", &self.flags)
            .field("child_flags", &self.child_flags)
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ViewDefinition
// =============================================================================

/// Immutable, flattened template shared by all of its view instances.
pub struct ViewDefinition {
    pub(crate) flags: ViewFlags,
    pub(crate) nodes: Vec<NodeDef>,
    /// Node indices in reverse child order.
    pub(crate) reverse_child_nodes: Vec<usize>,
    pub(crate) node_flags: NodeFlags,
    pub(crate) node_matched_queries: QueryIds,
    pub(crate) binding_count: usize,
    pub(crate) disposable_count: usize,
    pub(crate) last_root_node: usize,
    pub(crate) update: Option<ViewUpdateFn>,
    pub(crate) handle_event: Option<ViewHandleEventFn>,
    pub(crate) component_type: Option<Rc<ComponentRenderType>>,
}

impl ViewDefinition {
    pub fn builder() -> ViewDefinitionBuilder {
        ViewDefinitionBuilder::default()
    }

    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&NodeDef> {
        self.nodes.get(index)
    }

    /// Nodes in reverse child order: at every level the last child comes
    /// first, and every node still precedes its own descendants.
    pub fn reverse_child_nodes(&self) -> impl Iterator<Item = &NodeDef> + '_ {
        self.reverse_child_nodes.iter().map(|&i| &self.nodes[i])
    }

    pub fn node_flags(&self) -> NodeFlags {
        self.node_flags
    }

    pub fn node_matched_queries(&self) -> &QueryIds {
        &self.node_matched_queries
    }

    pub fn binding_count(&self) -> usize {
        self.binding_count
    }

    pub fn disposable_count(&self) -> usize {
        self.disposable_count
    }

    /// The last top-level node in source order.
    pub fn last_root_node(&self) -> &NodeDef {
        &self.nodes[self.last_root_node]
    }

    pub fn component_type(&self) -> Option<&ComponentRenderType> {
        self.component_type.as_deref()
    }

    /// Indices of nodes carrying any of `flags`, in depth-first order.
    ///
    /// A node that lacks the flags itself and whose `child_flags` lack them
    /// too has its whole subtree skipped.
    pub fn flagged_nodes(&self, flags: NodeFlags) -> FlaggedNodes<'_> {
        FlaggedNodes {
            nodes: &self.nodes,
            flags,
            next: 0,
        }
    }
}

impl fmt::Debug for ViewDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewDefinition")
            .field("flags", &self.flags)
            .field("nodes", &self.nodes)
            .field("node_flags", &self.node_flags)
            .field("binding_count", &self.binding_count)
            .field("disposable_count", &self.disposable_count)
            .field("component_type", &self.component_type)
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`ViewDefinition::flagged_nodes`].
pub struct FlaggedNodes<'a> {
    nodes: &'a [NodeDef],
    flags: NodeFlags,
    next: usize,
}

impl Iterator for FlaggedNodes<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some(node) = self.nodes.get(self.next) {
            self.next += 1;
            if node.flags.intersects(self.flags) {
                return Some(node.index);
            }
            if !node.child_flags.intersects(self.flags) {
                self.next += node.child_count;
            }
        }
        None
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects a node list and callbacks, then flattens them.
#[derive(Default)]
pub struct ViewDefinitionBuilder {
    flags: ViewFlags,
    nodes: Vec<NodeDef>,
    update: Option<ViewUpdateFn>,
    handle_event: Option<ViewHandleEventFn>,
    component_type: Option<ComponentRenderType>,
}

impl ViewDefinitionBuilder {
    pub fn flags(mut self, flags: ViewFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn node(mut self, node: NodeDef) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = NodeDef>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn update(
        mut self,
        update: impl Fn(&mut NodeCheck<'_>) -> Result<(), ViewError> + 'static,
    ) -> Self {
        self.update = Some(Rc::new(update));
        self
    }

    pub fn on_event(
        mut self,
        handle_event: impl Fn(&ViewData, usize, &str, &Value) -> bool + 'static,
    ) -> Self {
        self.handle_event = Some(Rc::new(handle_event));
        self
    }

    /// Render metadata; views of this definition get their own renderer.
    pub fn component_type(mut self, component_type: ComponentRenderType) -> Self {
        self.component_type = Some(component_type);
        self
    }

    pub fn build(self) -> Result<Rc<ViewDefinition>, DefinitionError> {
        flatten(
            self.flags,
            self.nodes,
            self.update,
            self.handle_event,
            self.component_type.map(Rc::new),
        )
        .map(Rc::new)
    }
}
