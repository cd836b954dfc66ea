//! Views - runtime instances of a [`ViewDefinition`].
//!
//! A [`ViewData`] owns flat arrays indexed by the definition's node indices:
//!
//! ```text
//! nodes:       [Element, Text, Provider]      one slot per NodeDef
//! old_values:  [v0, v1, ...]                  one slot per binding
//! disposables: [d0, d1, ...]                  one slot per declared output
//! ```
//!
//! Nested views are owned by the node slots that host them: embedded views by
//! their anchor's [`ElementData`], component views by their [`ProviderData`].
//!
//! # Passes
//!
//! - [`create_view_nodes`] - instantiate node runtime data (depth-first)
//! - [`check_and_update_view`] - evaluate bindings and propagate changes
//! - [`check_no_changes_view`] - dev-mode verification that nothing changed
//! - [`destroy_view`] - run hooks and disposers, then tear down child views

mod check;
mod create;
mod destroy;
mod embedded;
pub(crate) mod render;
mod services;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::definition::ViewDefinition;
use crate::directive::{Directive, Instance, downcast_instance};
use crate::error::{ViewError, ViewPathSegment};
use crate::renderer::{Disposer, Renderer, RendererFactory};
use crate::types::{NodeType, QueryId, QueryIds, RenderNode, Token, Value, ViewFlags, ViewState};

pub use check::{
    CheckType, MAX_INLINE_VALUES, NodeCheck, check_and_update_view, check_no_changes_view,
    detect_changes,
};
pub use create::{create_embedded_view, create_root_view, create_view, create_view_nodes};
pub use destroy::destroy_view;
pub use embedded::{attach_embedded_view, detach_embedded_view, dispatch_event, move_embedded_view};
pub use render::root_render_nodes;
pub use services::{ViewAction, current_action};

// =============================================================================
// Root data
// =============================================================================

/// Resolves provider dependencies no element in the view declares.
pub trait Injector {
    fn get(&self, token: Token) -> Option<Instance>;
}

/// Injector backed by a fixed token map.
#[derive(Default)]
pub struct StaticInjector {
    providers: HashMap<Token, Instance>,
}

impl StaticInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: Token, instance: Instance) -> Self {
        self.providers.insert(token, instance);
        self
    }
}

impl Injector for StaticInjector {
    fn get(&self, token: Token) -> Option<Instance> {
        self.providers.get(&token).cloned()
    }
}

/// State shared by a root view and everything nested inside it.
pub struct RootData {
    /// `None` runs headless: views get no renderer.
    pub(crate) renderer_factory: Option<Rc<dyn RendererFactory>>,
    pub(crate) injector: Rc<dyn Injector>,
    /// Element root-level nodes of the root view are created under.
    pub(crate) host_element: Option<RenderNode>,
    /// Bumped per query id whenever an embedded view matching it moves.
    query_epochs: RefCell<Vec<u64>>,
}

impl RootData {
    pub fn new(renderer_factory: Rc<dyn RendererFactory>) -> Self {
        Self {
            renderer_factory: Some(renderer_factory),
            injector: Rc::new(StaticInjector::new()),
            host_element: None,
            query_epochs: RefCell::default(),
        }
    }

    /// Root without a renderer; bindings are tracked but render nowhere.
    pub fn headless() -> Self {
        Self {
            renderer_factory: None,
            injector: Rc::new(StaticInjector::new()),
            host_element: None,
            query_epochs: RefCell::default(),
        }
    }

    pub fn with_injector(mut self, injector: Rc<dyn Injector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn with_host_element(mut self, host: RenderNode) -> Self {
        self.host_element = Some(host);
        self
    }

    /// Dirty every query list, anywhere in the tree, collecting one of `ids`.
    pub(crate) fn invalidate_queries(&self, ids: &QueryIds) {
        let mut epochs = self.query_epochs.borrow_mut();
        for id in ids.ids() {
            if id >= epochs.len() {
                epochs.resize(id + 1, 0);
            }
            epochs[id] += 1;
        }
    }

    pub(crate) fn query_epoch(&self, id: QueryId) -> u64 {
        self.query_epochs.borrow().get(id).copied().unwrap_or(0)
    }
}

// =============================================================================
// Node runtime data
// =============================================================================

#[derive(Debug, Default)]
pub struct ElementData {
    pub render_element: Option<RenderNode>,
    /// Embedded views attached at this anchor, in render order.
    pub embedded_views: Vec<ViewData>,
}

#[derive(Debug, Default)]
pub struct TextData {
    pub render_text: Option<RenderNode>,
}

pub struct ProviderData {
    pub instance: Instance,
    pub component_view: Option<Box<ViewData>>,
}

impl fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderData")
            .field("instance", &Rc::as_ptr(&self.instance))
            .field("component_view", &self.component_view)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct PureExpressionData {
    pub value: Value,
}

/// Live result list of a query node.
///
/// A list is dirty until first computed, and again whenever the root's epoch
/// for its query id moves past the one it was computed at.
#[derive(Debug, Clone, Default)]
pub struct QueryList {
    pub(crate) dirty: bool,
    pub(crate) epoch: u64,
    pub(crate) results: Vec<Value>,
}

impl QueryList {
    pub(crate) fn new() -> Self {
        Self {
            dirty: true,
            epoch: 0,
            results: Vec::new(),
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.results.first()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.results.iter()
    }

    pub(crate) fn reset(&mut self, results: Vec<Value>, epoch: u64) {
        self.results = results;
        self.epoch = epoch;
        self.dirty = false;
    }
}

/// Runtime slot of one node, tagged like its definition.
#[derive(Debug, Default)]
pub enum NodeData {
    /// Not created yet.
    #[default]
    Empty,
    Element(ElementData),
    Text(TextData),
    Provider(ProviderData),
    PureExpression(PureExpressionData),
    Query(QueryList),
    ProjectedContent,
}

// =============================================================================
// ViewData
// =============================================================================

/// Runtime instance of a view definition.
pub struct ViewData {
    pub(crate) def: Rc<ViewDefinition>,
    pub(crate) root: Rc<RootData>,
    pub(crate) renderer: Option<Rc<dyn Renderer>>,
    /// Node in the parent view hosting this view.
    pub(crate) parent_index: Option<usize>,
    /// Host element of a component view.
    pub(crate) host_element: Option<RenderNode>,
    /// Node root-level render nodes are created under.
    pub(crate) render_host: Option<RenderNode>,
    /// Host content grouped by `<ng-content>` slot.
    pub(crate) projectable_nodes: Vec<Vec<RenderNode>>,
    pub(crate) context: Value,
    pub(crate) component: Option<Instance>,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) old_values: Vec<Value>,
    pub(crate) disposables: Option<Vec<Option<Disposer>>>,
    pub(crate) first_change: bool,
    pub(crate) state: ViewState,
    pub(crate) nodes_created: bool,
}

impl ViewData {
    pub fn def(&self) -> &Rc<ViewDefinition> {
        &self.def
    }

    pub fn renderer(&self) -> Option<&Rc<dyn Renderer>> {
        self.renderer.as_ref()
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent_index
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn component(&self) -> Option<&Instance> {
        self.component.as_ref()
    }

    /// The component instance of a component view, as its concrete type.
    pub fn component_as<T: Directive>(&self) -> Option<Rc<T>> {
        self.component.as_ref().and_then(downcast_instance)
    }

    /// `true` until the first check-and-update pass completes.
    pub fn first_change(&self) -> bool {
        self.first_change
    }

    pub fn old_values(&self) -> &[Value] {
        &self.old_values
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.contains(ViewState::DESTROYED)
    }

    /// Re-enable checking of an on-push view.
    pub fn mark_for_check(&mut self) {
        self.state.insert(ViewState::CHECKS_ENABLED);
    }

    pub(crate) fn checks_enabled(&self) -> bool {
        !self.def.flags.contains(ViewFlags::ON_PUSH) || self.state.contains(ViewState::CHECKS_ENABLED)
    }

    pub fn node(&self, index: usize) -> Result<&NodeData, ViewError> {
        self.nodes
            .get(index)
            .ok_or(ViewError::NodeOutOfRange { index })
    }

    pub fn element(&self, index: usize) -> Result<&ElementData, ViewError> {
        match self.node(index)? {
            NodeData::Element(data) => Ok(data),
            _ => Err(mismatch(index, NodeType::Element)),
        }
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> Result<&mut ElementData, ViewError> {
        match self.nodes.get_mut(index) {
            Some(NodeData::Element(data)) => Ok(data),
            Some(_) => Err(mismatch(index, NodeType::Element)),
            None => Err(ViewError::NodeOutOfRange { index }),
        }
    }

    pub fn text(&self, index: usize) -> Result<&TextData, ViewError> {
        match self.node(index)? {
            NodeData::Text(data) => Ok(data),
            _ => Err(mismatch(index, NodeType::Text)),
        }
    }

    pub fn provider(&self, index: usize) -> Result<&ProviderData, ViewError> {
        match self.node(index)? {
            NodeData::Provider(data) => Ok(data),
            _ => Err(mismatch(index, NodeType::Provider)),
        }
    }

    pub(crate) fn provider_mut(&mut self, index: usize) -> Result<&mut ProviderData, ViewError> {
        match self.nodes.get_mut(index) {
            Some(NodeData::Provider(data)) => Ok(data),
            Some(_) => Err(mismatch(index, NodeType::Provider)),
            None => Err(ViewError::NodeOutOfRange { index }),
        }
    }

    /// Provider instance at `index`, as its concrete type.
    pub fn instance_as<T: Directive>(&self, index: usize) -> Result<Option<Rc<T>>, ViewError> {
        Ok(downcast_instance(&self.provider(index)?.instance))
    }

    pub fn component_view(&self, index: usize) -> Result<&ViewData, ViewError> {
        self.provider(index)?
            .component_view
            .as_deref()
            .ok_or(mismatch(index, NodeType::Provider))
    }

    pub fn component_view_mut(&mut self, index: usize) -> Result<&mut ViewData, ViewError> {
        self.provider_mut(index)?
            .component_view
            .as_deref_mut()
            .ok_or(mismatch(index, NodeType::Provider))
    }

    pub fn pure_value(&self, index: usize) -> Result<&Value, ViewError> {
        match self.node(index)? {
            NodeData::PureExpression(data) => Ok(&data.value),
            _ => Err(mismatch(index, NodeType::PureExpression)),
        }
    }

    pub fn query(&self, index: usize) -> Result<&QueryList, ViewError> {
        match self.node(index)? {
            NodeData::Query(list) => Ok(list),
            _ => Err(mismatch(index, NodeType::Query)),
        }
    }

    pub(crate) fn query_mut(&mut self, index: usize) -> Result<&mut QueryList, ViewError> {
        match self.nodes.get_mut(index) {
            Some(NodeData::Query(list)) => Ok(list),
            Some(_) => Err(mismatch(index, NodeType::Query)),
            None => Err(ViewError::NodeOutOfRange { index }),
        }
    }

    /// Whether the query list at `index` must be recomputed.
    pub fn is_query_dirty(&self, index: usize) -> Result<bool, ViewError> {
        let list = self.query(index)?;
        let id = self
            .def
            .node(index)
            .and_then(|node| node.as_query())
            .map(|query| query.id)
            .ok_or(mismatch(index, NodeType::Query))?;
        Ok(list.dirty || list.epoch != self.root.query_epoch(id))
    }

    pub fn embedded_views(&self, anchor_index: usize) -> Result<&[ViewData], ViewError> {
        Ok(&self.element(anchor_index)?.embedded_views)
    }

    pub fn embedded_view_mut(
        &mut self,
        anchor_index: usize,
        position: usize,
    ) -> Result<&mut ViewData, ViewError> {
        self.element_mut(anchor_index)?
            .embedded_views
            .get_mut(position)
            .ok_or(ViewError::EmbeddedViewOutOfRange {
                index: anchor_index,
                position,
            })
    }

    /// Follow `path` down through component and embedded views.
    pub fn descendant_view_mut(&mut self, path: &[ViewPathSegment]) -> Result<&mut ViewData, ViewError> {
        let mut view = self;
        for segment in path {
            view = match segment.embedded_index {
                Some(position) => view.embedded_view_mut(segment.node_index, position)?,
                None => view.component_view_mut(segment.node_index)?,
            };
        }
        Ok(view)
    }
}

impl fmt::Debug for ViewData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewData")
            .field("component_type", &self.def.component_type().map(|t| &t.id))
            .field("parent_index", &self.parent_index)
            .field("first_change", &self.first_change)
            .field("state", &self.state)
            .field("old_values", &self.old_values)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

fn mismatch(index: usize, expected: NodeType) -> ViewError {
    ViewError::NodeTypeMismatch { index, expected }
}
