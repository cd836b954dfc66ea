//! View instantiation.
//!
//! Two steps: [`create_view`] sizes the runtime arrays and resolves the
//! renderer, [`create_view_nodes`] walks the definition and builds every node.

use std::iter;
use std::rc::Rc;

use tracing::{debug, trace};

use super::destroy::release_failed_creation;
use super::render::projectable_nodes;
use super::services::{ViewAction, enter};
use super::{NodeData, ProviderData, PureExpressionData, QueryList, RootData, ViewData};
use crate::definition::{NodeKind, ViewDefinition};
use crate::directive::instance_value;
use crate::error::ViewError;
use crate::nodes::{element, ng_content, provider, text};
use crate::renderer::Renderer;
use crate::types::{NodeFlags, NodeType, Value, ViewFlags, ViewState};

/// Allocate a view for `def`.
///
/// `parent` is the view and node hosting it: a provider node for a component
/// view, a template anchor for an embedded view. Nodes are not created yet.
pub fn create_view(
    root: Rc<RootData>,
    def: Rc<ViewDefinition>,
    parent: Option<(&ViewData, usize)>,
    context: Value,
) -> ViewData {
    let renderer = resolve_renderer(&root, &def, parent.map(|(view, _)| view));

    let mut host_element = None;
    let mut render_host = None;
    let mut projectable = Vec::new();
    match parent {
        None => render_host = root.host_element,
        Some((parent, index)) => match parent.def.node(index) {
            Some(node) if node.node_type() == NodeType::Provider => {
                host_element = node
                    .parent()
                    .and_then(|host| parent.element(host).ok())
                    .and_then(|host| host.render_element);
                if let (Some(renderer), Some(host)) = (&renderer, host_element) {
                    render_host = Some(renderer.create_view_root(host));
                }
            }
            // Embedded views render detached until attached, and project
            // whatever their declaring view projects.
            _ => projectable = parent.projectable_nodes.clone(),
        },
    }

    let disposables = (def.disposable_count > 0)
        .then(|| iter::repeat_with(|| None).take(def.disposable_count).collect());

    debug!(
        component = def.component_type().map(|t| &*t.id),
        nodes = def.nodes.len(),
        bindings = def.binding_count,
        "view created"
    );

    ViewData {
        nodes: iter::repeat_with(NodeData::default)
            .take(def.nodes.len())
            .collect(),
        old_values: vec![Value::Undefined; def.binding_count],
        disposables,
        renderer,
        parent_index: parent.map(|(_, index)| index),
        host_element,
        render_host,
        projectable_nodes: projectable,
        context,
        component: None,
        first_change: true,
        state: ViewState::CHECKS_ENABLED,
        nodes_created: false,
        def,
        root,
    }
}

fn resolve_renderer(
    root: &RootData,
    def: &ViewDefinition,
    parent: Option<&ViewData>,
) -> Option<Rc<dyn Renderer>> {
    if def.flags.contains(ViewFlags::DIRECT) {
        return None;
    }
    let factory = root.renderer_factory.as_ref()?;
    if let Some(component_type) = def.component_type() {
        return Some(factory.create_renderer(Some(component_type)));
    }
    match parent {
        Some(parent) => parent.renderer.clone(),
        None => Some(factory.create_renderer(None)),
    }
}

/// Build the runtime data of every node, then of every nested component view.
///
/// Calling it again on a view whose nodes exist is a no-op.
pub fn create_view_nodes(view: &mut ViewData) -> Result<(), ViewError> {
    let _guard = enter(ViewAction::Create)?;
    create_view_nodes_inner(view)
}

fn create_view_nodes_inner(view: &mut ViewData) -> Result<(), ViewError> {
    if view.nodes_created {
        return Ok(());
    }
    if let Err(err) = build_nodes(view) {
        debug!(error = %err, "view creation failed, releasing created nodes");
        release_failed_creation(view);
        return Err(err);
    }
    Ok(())
}

fn build_nodes(view: &mut ViewData) -> Result<(), ViewError> {
    let def = view.def.clone();

    for node in &def.nodes {
        trace!(index = node.index, kind = ?node.node_type(), "create node");
        let data = match &node.kind {
            NodeKind::Element(_) => NodeData::Element(element::create_element(view, node)),
            NodeKind::Text(_) => NodeData::Text(text::create_text(view, node)),
            NodeKind::Provider(provider_def) => {
                let component_view = provider_def.component.as_ref().map(|component| {
                    create_view(
                        view.root.clone(),
                        component.clone(),
                        Some((&*view, node.index)),
                        Value::Undefined,
                    )
                });
                let instance = provider::create_instance(view, node)?;
                let component_view = component_view.map(|mut component_view| {
                    component_view.component = Some(instance.clone());
                    component_view.context = instance_value(&instance);
                    Box::new(component_view)
                });
                NodeData::Provider(ProviderData {
                    instance,
                    component_view,
                })
            }
            NodeKind::PureExpression(_) => NodeData::PureExpression(PureExpressionData::default()),
            NodeKind::Query(_) => NodeData::Query(QueryList::new()),
            NodeKind::ProjectedContent(_) => {
                ng_content::project_content(view, node);
                NodeData::ProjectedContent
            }
        };
        view.nodes[node.index] = data;
    }
    view.nodes_created = true;

    // Host content exists only now, so component views are filled last.
    for index in def.flagged_nodes(NodeFlags::HAS_COMPONENT) {
        let projectable = match def.nodes[index].parent {
            Some(host) => projectable_nodes(view, host),
            None => Vec::new(),
        };
        if let NodeData::Provider(ProviderData {
            component_view: Some(component_view),
            ..
        }) = &mut view.nodes[index]
        {
            component_view.projectable_nodes = projectable;
            create_view_nodes_inner(component_view)?;
        }
    }
    Ok(())
}

/// Create a root view and all of its nodes.
pub fn create_root_view(
    root: Rc<RootData>,
    def: Rc<ViewDefinition>,
    context: Value,
) -> Result<ViewData, ViewError> {
    let mut view = create_view(root, def, None, context);
    create_view_nodes(&mut view)?;
    Ok(view)
}

/// Create a detached embedded view of the template at `anchor_index`.
///
/// The view is rendered nowhere until passed to
/// [`attach_embedded_view`](super::attach_embedded_view).
pub fn create_embedded_view(
    parent: &ViewData,
    anchor_index: usize,
    context: Value,
) -> Result<ViewData, ViewError> {
    let template = parent
        .def
        .node(anchor_index)
        .ok_or(ViewError::NodeOutOfRange {
            index: anchor_index,
        })?
        .as_element()
        .and_then(|element| element.template.clone())
        .ok_or(ViewError::NodeTypeMismatch {
            index: anchor_index,
            expected: NodeType::Element,
        })?;

    let mut view = create_view(
        parent.root.clone(),
        template,
        Some((parent, anchor_index)),
        context,
    );
    create_view_nodes(&mut view)?;
    Ok(view)
}
