//! Flattening - turns an authored node list into a [`ViewDefinition`].
//!
//! # Algorithm
//!
//! One pass over the nodes in depth-first order, tracking the most recently
//! opened node whose child range still contains the upcoming index:
//!
//! 1. Close every ancestor whose range is used up, OR-ing its aggregated
//!    `child_flags` / `child_matched_queries` into its own parent.
//! 2. Assign the absolute fields (index, parent, binding and disposer offsets,
//!    reverse child index) and validate the node against its parent.
//! 3. Fold the node's flags and matched queries (including those of an
//!    anchor's template) into the parent and into the definition-wide totals.
//!
//! # Reverse child order
//!
//! ```text
//! Nodes:  n0
//!           n1         n2
//!             n11 n12    n21 n22
//! dfs:    0  1  2  3  4  5  6
//! result: 0  4  6  5  1  3  2
//! ```
//!
//! Within its parent, each child subtree is mirrored, so a node still
//! directly precedes its `child_count` descendants.

use std::rc::Rc;

use super::{NodeDef, NodeKind, ViewDefinition, ViewHandleEventFn, ViewUpdateFn};
use crate::error::DefinitionError;
use crate::renderer::ComponentRenderType;
use crate::types::{NodeFlags, NodeType, QueryIds, ViewFlags};

pub(crate) fn flatten(
    flags: ViewFlags,
    mut nodes: Vec<NodeDef>,
    update: Option<ViewUpdateFn>,
    handle_event: Option<ViewHandleEventFn>,
    component_type: Option<Rc<ComponentRenderType>>,
) -> Result<ViewDefinition, DefinitionError> {
    if nodes.is_empty() {
        return Err(DefinitionError::Empty);
    }

    let node_count = nodes.len();
    let mut reverse_child_nodes = vec![0; node_count];
    let mut binding_count = 0;
    let mut disposable_count = 0;
    let mut node_flags = NodeFlags::empty();
    let mut node_matched_queries = QueryIds::new();
    let mut current_parent: Option<usize> = None;
    let mut last_root_node = 0;

    for i in 0..node_count {
        while let Some(parent) = current_parent {
            if i <= nodes[parent].subtree_end() {
                break;
            }
            close_node(&mut nodes, parent);
            current_parent = nodes[parent].parent;
        }

        let parent = current_parent.map(|p| &nodes[p]);
        validate_node(parent, &nodes[i], i, node_count)?;
        let reverse_child_index = reverse_child_index(parent, i, nodes[i].child_count, node_count);
        let render_parent = parent.and_then(|p| match p.kind {
            NodeKind::Element(_) => Some(p.index),
            _ => p.render_parent,
        });

        let node = &mut nodes[i];
        node.index = i;
        node.parent = current_parent;
        node.render_parent = render_parent;
        node.binding_index = binding_count;
        node.disposable_index = disposable_count;
        node.reverse_child_index = reverse_child_index;
        node.child_flags = NodeFlags::empty();
        node.child_matched_queries = QueryIds::new();

        node_flags |= node.flags;
        node_matched_queries.union_with(&node.matched_queries);
        // Nested templates count too: attaching their views moves these matches.
        if let Some(template) = node.as_element().and_then(|e| e.template.as_ref()) {
            node_matched_queries.union_with(&template.node_matched_queries);
        }
        binding_count += node.bindings.len();
        disposable_count += node.disposable_count();
        reverse_child_nodes[reverse_child_index] = i;

        match current_parent {
            Some(parent) => attach_to_parent(&mut nodes, parent, i),
            None => last_root_node = i,
        }

        if nodes[i].child_count > 0 {
            current_parent = Some(i);
        }
    }

    while let Some(parent) = current_parent {
        close_node(&mut nodes, parent);
        current_parent = nodes[parent].parent;
    }

    tracing::trace!(
        nodes = node_count,
        bindings = binding_count,
        disposables = disposable_count,
        "flattened view definition"
    );

    Ok(ViewDefinition {
        flags,
        nodes,
        reverse_child_nodes,
        node_flags,
        node_matched_queries,
        binding_count,
        disposable_count,
        last_root_node,
        update,
        handle_event,
        component_type,
    })
}

/// Position of node `i` in reverse child order.
fn reverse_child_index(
    parent: Option<&NodeDef>,
    i: usize,
    child_count: usize,
    node_count: usize,
) -> usize {
    match parent {
        Some(parent) => {
            let last_child_offset = i + child_count - parent.index - 1;
            let parent_end = parent.reverse_child_index + parent.child_count;
            parent_end - last_child_offset
        }
        None => (node_count - 1) - (i + child_count),
    }
}

fn validate_node(
    parent: Option<&NodeDef>,
    node: &NodeDef,
    index: usize,
    node_count: usize,
) -> Result<(), DefinitionError> {
    match &node.kind {
        NodeKind::Element(element) => {
            if let Some(template) = &element.template {
                let last_root = template.last_root_node();
                let hosts_component = last_root
                    .as_element()
                    .is_some_and(|e| e.component_provider.is_some());
                if hosts_component || last_root.flags.contains(NodeFlags::HAS_EMBEDDED_VIEWS) {
                    return Err(DefinitionError::LastRootNodeHost { index });
                }
            }
        }
        NodeKind::Provider(_) => {
            if parent.map(NodeDef::node_type) != Some(NodeType::Element) {
                return Err(DefinitionError::ProviderOutsideElement { index });
            }
        }
        NodeKind::Query(_) => {
            let Some(provider) = parent.and_then(NodeDef::as_provider) else {
                return Err(DefinitionError::QueryOutsideProvider { index });
            };
            if node.flags.contains(NodeFlags::HAS_VIEW_QUERY) && provider.component.is_none() {
                return Err(DefinitionError::ViewQueryOutsideComponent { index });
            }
        }
        NodeKind::Text(_) | NodeKind::PureExpression(_) | NodeKind::ProjectedContent(_) => {}
    }

    if node.child_count > 0 {
        if !matches!(node.kind, NodeKind::Element(_) | NodeKind::Provider(_)) {
            return Err(DefinitionError::LeafWithChildren {
                index,
                node_type: node.node_type(),
            });
        }
        let parent_end = parent.map_or(node_count - 1, NodeDef::subtree_end);
        let outside = index
            .checked_add(node.child_count)
            .is_none_or(|end| end > parent_end);
        if index <= parent_end && outside {
            return Err(DefinitionError::ChildRangeOutsideParent { index });
        }
    }
    Ok(())
}

/// Fold node `child` into its direct parent.
fn attach_to_parent(nodes: &mut [NodeDef], parent: usize, child: usize) {
    let flags = nodes[child].flags;
    let mut matched = nodes[child].matched_queries.clone();
    if let Some(template) = nodes[child].as_element().and_then(|e| e.template.as_ref()) {
        matched.union_with(&template.node_matched_queries);
    }
    let provider_token = nodes[child].as_provider().map(|p| (p.token, p.component.is_some()));

    let parent = &mut nodes[parent];
    parent.child_flags |= flags;
    parent.child_matched_queries.union_with(&matched);
    if let (NodeKind::Element(element), Some((token, is_component))) =
        (&mut parent.kind, provider_token)
    {
        element.provider_indices.insert(token, child);
        if is_component {
            element.component_provider = Some(child);
        }
    }
}

/// Propagate a finished subtree's aggregates into its parent.
fn close_node(nodes: &mut [NodeDef], index: usize) {
    let Some(parent) = nodes[index].parent else {
        return;
    };
    let child_flags = nodes[index].child_flags;
    let child_matched = nodes[index].child_matched_queries.clone();
    let parent = &mut nodes[parent];
    parent.child_flags |= child_flags;
    parent.child_matched_queries.union_with(&child_matched);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{BindingDef, NodeDef, QueryBindingKind};
    use crate::directive::{Directive, Instance};
    use crate::types::Token;

    struct Plain;
    impl Directive for Plain {}

    fn plain(_: &[Instance]) -> Instance {
        Rc::new(Plain)
    }

    fn build(nodes: Vec<NodeDef>) -> Result<ViewDefinition, DefinitionError> {
        flatten(ViewFlags::empty(), nodes, None, None, None)
    }

    /// n0 { n1 { n11 n12 } n2 { n21 n22 } }
    fn sample_tree() -> Vec<NodeDef> {
        vec![
            NodeDef::element("n0").with_child_count(6),
            NodeDef::element("n1").with_child_count(2),
            NodeDef::element("n11"),
            NodeDef::element("n12"),
            NodeDef::element("n2").with_child_count(2),
            NodeDef::element("n21"),
            NodeDef::element("n22"),
        ]
    }

    /// Every node's descendants in reverse child order are exactly the nodes
    /// of its depth-first subtree.
    fn assert_reverse_order_consistent(def: &ViewDefinition) {
        let order: Vec<usize> = def.reverse_child_nodes().map(NodeDef::index).collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..def.nodes.len()).collect::<Vec<_>>());

        for node in &def.nodes {
            let pos = node.reverse_child_index;
            assert_eq!(order[pos], node.index);
            let mut in_reverse: Vec<usize> =
                order[pos + 1..=pos + node.child_count].to_vec();
            in_reverse.sort_unstable();
            let in_dfs: Vec<usize> = (node.index + 1..=node.subtree_end()).collect();
            assert_eq!(in_reverse, in_dfs, "subtree of node {}", node.index);
        }
    }

    #[test]
    fn test_reverse_child_order() {
        let def = build(sample_tree()).unwrap();
        let reverse: Vec<usize> = def.nodes.iter().map(|n| n.reverse_child_index).collect();
        assert_eq!(reverse, vec![0, 4, 6, 5, 1, 3, 2]);
        assert_reverse_order_consistent(&def);
    }

    #[test]
    fn test_reverse_child_order_with_several_roots() {
        let def = build(vec![
            NodeDef::element("a").with_child_count(1),
            NodeDef::text("a", Vec::<&str>::new()),
            NodeDef::element("b"),
            NodeDef::element("c").with_child_count(3),
            NodeDef::element("c1").with_child_count(1),
            NodeDef::element("c11"),
            NodeDef::element("c2"),
        ])
        .unwrap();
        assert_reverse_order_consistent(&def);
        assert_eq!(def.reverse_child_nodes().next().unwrap().index, 3);
        assert_eq!(def.last_root_node().index, 3);
    }

    #[test]
    fn test_parents_and_offsets() {
        let def = build(vec![
            NodeDef::element("div")
                .with_child_count(3)
                .with_bindings([BindingDef::property("title")])
                .with_outputs(["click", "keydown"]),
            NodeDef::text("Hi ", ["!"]),
            NodeDef::element("span").with_child_count(1),
            NodeDef::text("", ["", ""]),
        ])
        .unwrap();

        let parents: Vec<Option<usize>> = def.nodes.iter().map(|n| n.parent).collect();
        assert_eq!(parents, vec![None, Some(0), Some(0), Some(2)]);
        let binding_offsets: Vec<usize> = def.nodes.iter().map(|n| n.binding_index).collect();
        assert_eq!(binding_offsets, vec![0, 1, 2, 2]);
        assert_eq!(def.binding_count, 4);
        assert_eq!(def.disposable_count, 2);
        assert_eq!(def.nodes[3].render_parent, Some(2));
    }

    #[test]
    fn test_child_flags_aggregate_descendants() {
        let def = build(vec![
            NodeDef::element("outer").with_child_count(4),
            NodeDef::element("inner").with_child_count(2),
            NodeDef::provider(Token("Dir"), plain)
                .with_flags(NodeFlags::ON_INIT)
                .with_matched_queries([4])
                .with_child_count(1),
            NodeDef::content_query(1).with_query_binding("items", QueryBindingKind::All),
            NodeDef::element("sibling").with_matched_queries([7]),
        ])
        .unwrap();

        let outer = &def.nodes[0];
        assert_eq!(
            outer.child_flags,
            NodeFlags::ON_INIT | NodeFlags::HAS_CONTENT_QUERY
        );
        assert!(outer.child_matched_queries.contains(4));
        assert!(outer.child_matched_queries.contains(7));
        assert!(!outer.matched_queries.contains(4));

        let inner = &def.nodes[1];
        assert_eq!(inner.child_flags, NodeFlags::ON_INIT | NodeFlags::HAS_CONTENT_QUERY);
        assert!(!inner.child_matched_queries.contains(7));
        assert_eq!(inner.as_element().unwrap().provider_index(Token("Dir")), Some(2));

        assert_eq!(def.nodes[2].child_flags, NodeFlags::HAS_CONTENT_QUERY);
        assert_eq!(
            def.node_flags,
            NodeFlags::ON_INIT | NodeFlags::HAS_CONTENT_QUERY
        );
        assert!(def.node_matched_queries.contains(7));
    }

    #[test]
    fn test_template_queries_count_for_anchor_parent() {
        let template = Rc::new(build(vec![NodeDef::element("li").with_matched_queries([2])]).unwrap());
        let def = build(vec![
            NodeDef::element("ul").with_child_count(1),
            NodeDef::anchor(template),
        ])
        .unwrap();
        assert!(def.nodes[0].child_matched_queries.contains(2));
        assert!(def.nodes[0].child_flags.contains(NodeFlags::HAS_EMBEDDED_VIEWS));
    }

    #[test]
    fn test_nested_template_queries_count_for_definition() {
        let inner = Rc::new(build(vec![NodeDef::element("li").with_matched_queries([3])]).unwrap());
        let outer = Rc::new(
            build(vec![NodeDef::anchor(inner), NodeDef::element("span")]).unwrap(),
        );
        assert!(outer.node_matched_queries.contains(3));

        let def = build(vec![
            NodeDef::element("ul").with_child_count(1),
            NodeDef::anchor(outer),
        ])
        .unwrap();
        assert!(def.node_matched_queries.contains(3));
        assert!(def.nodes[0].child_matched_queries.contains(3));
    }

    #[test]
    fn test_single_node_is_valid() {
        let def = build(vec![NodeDef::element("div")]).unwrap();
        assert_eq!(def.nodes.len(), 1);
        assert_eq!(def.reverse_child_nodes, vec![0]);
        assert_eq!(def.last_root_node, 0);
    }

    #[test]
    fn test_empty_fails() {
        assert_eq!(build(Vec::new()).unwrap_err(), DefinitionError::Empty);
    }

    #[test]
    fn test_child_range_outside_parent_fails() {
        let err = build(vec![
            NodeDef::element("a").with_child_count(1),
            NodeDef::element("b").with_child_count(1),
            NodeDef::element("c"),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::ChildRangeOutsideParent { index: 1 });

        let err = build(vec![NodeDef::element("a").with_child_count(1)]).unwrap_err();
        assert_eq!(err, DefinitionError::ChildRangeOutsideParent { index: 0 });

        let err = build(vec![
            NodeDef::element("a"),
            NodeDef::element("b").with_child_count(usize::MAX),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::ChildRangeOutsideParent { index: 1 });
    }

    /// Child counts, in depth-first order, of every forest with `size` nodes.
    fn forests(size: usize) -> Vec<Vec<usize>> {
        if size == 0 {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for first in 1..=size {
            for inner in forests(first - 1) {
                for rest in forests(size - first) {
                    let mut shape = vec![first - 1];
                    shape.extend(&inner);
                    shape.extend(&rest);
                    out.push(shape);
                }
            }
        }
        out
    }

    #[test]
    fn test_every_small_tree_shape() {
        const FLAGS: [NodeFlags; 4] = [
            NodeFlags::ON_INIT,
            NodeFlags::DO_CHECK,
            NodeFlags::AFTER_VIEW_INIT,
            NodeFlags::ON_DESTROY,
        ];

        let mut shapes = 0;
        for size in 1..=6 {
            for shape in forests(size) {
                let nodes = shape
                    .iter()
                    .enumerate()
                    .map(|(i, &child_count)| {
                        NodeDef::element("n")
                            .with_child_count(child_count)
                            .with_flags(FLAGS[i % FLAGS.len()])
                            .with_matched_queries([i])
                    })
                    .collect();
                let def = build(nodes).unwrap();
                assert_reverse_order_consistent(&def);

                for node in &def.nodes {
                    let descendants = node.index + 1..=node.subtree_end();
                    let expected = descendants
                        .clone()
                        .fold(NodeFlags::empty(), |acc, j| acc | def.nodes[j].flags);
                    assert_eq!(node.child_flags, expected, "shape {shape:?}, node {}", node.index);
                    for j in 0..def.nodes.len() {
                        assert_eq!(
                            node.child_matched_queries.contains(j),
                            descendants.contains(&j),
                            "shape {shape:?}, node {}, query {j}",
                            node.index
                        );
                    }
                }
                shapes += 1;
            }
        }
        // Catalan numbers: forests of 1..=6 nodes.
        assert_eq!(shapes, 1 + 2 + 5 + 14 + 42 + 132);
    }

    #[test]
    fn test_provider_must_sit_on_element() {
        let err = build(vec![NodeDef::provider(Token("Dir"), plain)]).unwrap_err();
        assert_eq!(err, DefinitionError::ProviderOutsideElement { index: 0 });
    }

    #[test]
    fn test_query_must_sit_on_provider() {
        let err = build(vec![
            NodeDef::element("div").with_child_count(1),
            NodeDef::content_query(0),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::QueryOutsideProvider { index: 1 });

        let err = build(vec![
            NodeDef::element("div").with_child_count(2),
            NodeDef::provider(Token("Dir"), plain).with_child_count(1),
            NodeDef::view_query(0),
        ])
        .unwrap_err();
        assert_eq!(err, DefinitionError::ViewQueryOutsideComponent { index: 2 });
    }

    #[test]
    fn test_leaf_with_children_fails() {
        let err = build(vec![
            NodeDef::text("x", Vec::<&str>::new()).with_child_count(1),
            NodeDef::element("div"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::LeafWithChildren { index: 0, node_type: NodeType::Text }
        );
    }

    #[test]
    fn test_component_host_cannot_be_last_root_of_template() {
        let component = Rc::new(build(vec![NodeDef::element("span")]).unwrap());
        let template = Rc::new(
            build(vec![
                NodeDef::element("my-comp").with_child_count(1),
                NodeDef::provider(Token("Comp"), plain).with_component(component),
            ])
            .unwrap(),
        );
        let err = build(vec![NodeDef::anchor(template)]).unwrap_err();
        assert_eq!(err, DefinitionError::LastRootNodeHost { index: 0 });
    }
}
