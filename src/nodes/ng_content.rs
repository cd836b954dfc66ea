use crate::definition::{NodeDef, NodeKind};
use crate::view::{ViewData, render::render_parent_node};

/// Move the host content for this slot under the slot's render parent.
///
/// Slots at the root of an embedded view have no parent yet; their nodes
/// travel with the view's root nodes when it is attached.
pub(crate) fn project_content(view: &ViewData, node: &NodeDef) {
    let (Some(renderer), NodeKind::ProjectedContent(ng_content)) = (&view.renderer, &node.kind) else {
        return;
    };
    let Some(parent) = render_parent_node(view, node) else {
        return;
    };
    if let Some(nodes) = view.projectable_nodes.get(ng_content.index) {
        if !nodes.is_empty() {
            renderer.project_nodes(parent, nodes);
        }
    }
}
