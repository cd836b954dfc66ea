//! Render-node bookkeeping: where nodes attach and which nodes a view owns.

use super::{NodeData, ViewData};
use crate::definition::{NodeDef, NodeKind};
use crate::types::RenderNode;

/// Render node `node` is created under.
///
/// `None` when the node renders detached: content of a component host waits
/// to be projected, and embedded-view roots wait to be attached.
pub(crate) fn render_parent_node(view: &ViewData, node: &NodeDef) -> Option<RenderNode> {
    match node.render_parent {
        Some(parent) => {
            let hosts_component = view.def.nodes[parent]
                .as_element()
                .is_some_and(|element| element.component_provider().is_some());
            if hosts_component {
                return None;
            }
            view.element(parent).ok().and_then(|element| element.render_element)
        }
        None => view.render_host,
    }
}

/// Top-level render nodes of `view`, in order, including the roots of
/// embedded views attached at top-level anchors.
pub fn root_render_nodes(view: &ViewData) -> Vec<RenderNode> {
    let mut out = Vec::new();
    let mut index = 0;
    while let Some(node) = view.def.nodes.get(index) {
        visit_render_node(view, node, &mut out);
        index += node.child_count + 1;
    }
    out
}

fn visit_render_node(view: &ViewData, node: &NodeDef, out: &mut Vec<RenderNode>) {
    match (&node.kind, &view.nodes[node.index]) {
        (_, NodeData::Element(element)) => {
            out.extend(element.render_element);
            for embedded in &element.embedded_views {
                out.extend(root_render_nodes(embedded));
            }
        }
        (_, NodeData::Text(text)) => out.extend(text.render_text),
        (NodeKind::ProjectedContent(ng_content), NodeData::ProjectedContent) => {
            if let Some(nodes) = view.projectable_nodes.get(ng_content.index) {
                out.extend_from_slice(nodes);
            }
        }
        _ => {}
    }
}

/// Last top-level render node, where the next sibling view attaches.
pub(crate) fn last_render_node(view: &ViewData) -> Option<RenderNode> {
    root_render_nodes(view).last().copied()
}

/// Every element and text node `view` created itself.
pub(crate) fn own_render_nodes(view: &ViewData) -> Vec<RenderNode> {
    view.nodes
        .iter()
        .filter_map(|data| match data {
            NodeData::Element(element) => element.render_element,
            NodeData::Text(text) => text.render_text,
            _ => None,
        })
        .collect()
}

/// Content of the host element at `host_index`, grouped by projection slot.
pub(crate) fn projectable_nodes(view: &ViewData, host_index: usize) -> Vec<Vec<RenderNode>> {
    let def = &view.def;
    let mut slots: Vec<Vec<RenderNode>> = Vec::new();
    let end = def.nodes[host_index].subtree_end();

    for node in &def.nodes[host_index + 1..=end] {
        if node.render_parent != Some(host_index) {
            continue;
        }
        let Some(slot) = node.ng_content_index else {
            continue;
        };
        if slots.len() <= slot {
            slots.resize_with(slot + 1, Vec::new);
        }
        visit_render_node(view, node, &mut slots[slot]);
    }
    slots
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::definition::{NodeDef, ViewDefinition};
    use crate::types::Value;
    use crate::view::{RootData, create_root_view};

    #[test]
    fn test_headless_views_have_no_render_nodes() {
        let def = ViewDefinition::builder()
            .node(NodeDef::element("div").with_child_count(1))
            .node(NodeDef::text("hi", Vec::<&str>::new()))
            .build()
            .unwrap();
        let view = create_root_view(Rc::new(RootData::headless()), def, Value::Undefined).unwrap();

        assert!(view.renderer().is_none());
        assert!(root_render_nodes(&view).is_empty());
        assert!(own_render_nodes(&view).is_empty());
    }
}
