//! Query nodes.
//!
//! A content query collects matches inside its host element (embedded views
//! included); a view query collects matches inside the component view of its
//! provider. Results are handed to the provider through `set_input`.

use crate::definition::{NodeDef, QueryBindingKind, QueryDef};
use crate::directive::instance_value;
use crate::error::{ViewError, ViewPath};
use crate::types::{NodeFlags, NodeType, QueryId, Value};
use crate::view::{NodeData, ViewData};

pub(crate) fn check_and_update_query(view: &mut ViewData, node: &NodeDef) -> Result<(), ViewError> {
    if !view.is_query_dirty(node.index)? {
        return Ok(());
    }
    let (query, provider_index) = query_parts(node)?;
    let def = view.def.clone();

    let mut results = Vec::new();
    if node.flags.contains(NodeFlags::HAS_CONTENT_QUERY) {
        if let Some(host) = def.nodes[provider_index].parent {
            collect_matches(view, host + 1, def.nodes[host].subtree_end(), query.id, &mut results);
        }
    } else {
        let component_view = view.component_view(provider_index)?;
        let end = component_view.def.nodes.len() - 1;
        collect_matches(component_view, 0, end, query.id, &mut results);
    }

    let instance = view.provider(provider_index)?.instance.clone();
    for binding in &query.bindings {
        let value = match binding.kind {
            QueryBindingKind::First => results.first().cloned().unwrap_or_default(),
            QueryBindingKind::All => Value::list(results.iter().cloned()),
        };
        instance.set_input(&binding.prop_name, &value);
    }

    let epoch = view.root.query_epoch(query.id);
    view.query_mut(node.index)?.reset(results, epoch);
    Ok(())
}

/// A query still dirty after check-and-update means the structure changed
/// while the view was being checked.
pub(crate) fn check_query_no_changes(
    view: &ViewData,
    path: &ViewPath,
    node: &NodeDef,
) -> Result<(), ViewError> {
    if !view.is_query_dirty(node.index)? {
        return Ok(());
    }
    let (query, _) = query_parts(node)?;
    Err(ViewError::ExpressionChanged {
        context: super::debug_context(view, path, node),
        expected: format!("Query {} not dirty", query.id),
        actual: format!("Query {} dirty", query.id),
        first_check: view.first_change,
    })
}

fn query_parts(node: &NodeDef) -> Result<(&QueryDef, usize), ViewError> {
    match (node.as_query(), node.parent) {
        (Some(query), Some(provider)) => Ok((query, provider)),
        _ => Err(ViewError::NodeTypeMismatch {
            index: node.index,
            expected: NodeType::Query,
        }),
    }
}

/// Matches of `id` among nodes `start..=end` of `view`, in depth-first order.
fn collect_matches(view: &ViewData, start: usize, end: usize, id: QueryId, out: &mut Vec<Value>) {
    let def = &view.def;
    let mut index = start;
    while index <= end {
        let Some(node) = def.nodes.get(index) else {
            break;
        };
        if node.matched_queries.contains(id) {
            out.push(match &view.nodes[index] {
                NodeData::Element(element) => element.render_element.map_or(Value::Null, Value::Node),
                NodeData::Provider(provider) => instance_value(&provider.instance),
                _ => Value::Undefined,
            });
        }
        let template_matches = node
            .as_element()
            .and_then(|element| element.template.as_ref())
            .is_some_and(|template| template.node_matched_queries.contains(id));
        if template_matches {
            if let NodeData::Element(element) = &view.nodes[index] {
                for embedded in &element.embedded_views {
                    collect_matches(embedded, 0, embedded.def.nodes.len() - 1, id, out);
                }
            }
        }
        if !node.child_matched_queries.contains(id) {
            index += node.child_count;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::definition::{NodeDef, QueryBindingKind, ViewDefinition};
    use crate::directive::Directive;
    use crate::types::{Token, Value};
    use crate::view::{RootData, check_and_update_view, create_root_view};

    #[derive(Default)]
    struct Tabs {
        first: RefCell<Value>,
        all: RefCell<Value>,
    }

    impl Directive for Tabs {
        fn set_input(&self, name: &str, value: &Value) {
            match name {
                "first" => *self.first.borrow_mut() = value.clone(),
                "all" => *self.all.borrow_mut() = value.clone(),
                _ => {}
            }
        }
    }

    struct Tab(&'static str);

    impl Directive for Tab {}

    #[test]
    fn test_content_query_collects_providers_in_host() {
        let def = ViewDefinition::builder()
            .node(NodeDef::element("tabs").with_child_count(6))
            .node(
                NodeDef::provider(Token("Tabs"), |_| Rc::new(Tabs::default())).with_child_count(1),
            )
            .node(
                NodeDef::content_query(0)
                    .with_query_binding("first", QueryBindingKind::First)
                    .with_query_binding("all", QueryBindingKind::All),
            )
            .node(NodeDef::element("tab").with_child_count(1))
            .node(NodeDef::provider(Token("Tab"), |_| Rc::new(Tab("a"))).with_matched_queries([0]))
            .node(NodeDef::element("tab").with_child_count(1))
            .node(NodeDef::provider(Token("Tab"), |_| Rc::new(Tab("b"))).with_matched_queries([0]))
            .build()
            .unwrap();
        let mut view = create_root_view(Rc::new(RootData::headless()), def, Value::Undefined).unwrap();

        assert!(view.is_query_dirty(2).unwrap());
        check_and_update_view(&mut view).unwrap();
        assert!(!view.is_query_dirty(2).unwrap());

        let tabs = view.instance_as::<Tabs>(1).unwrap().unwrap();
        assert_eq!(tabs.first.borrow().downcast_ref::<Tab>().map(|t| t.0), Some("a"));
        let all = tabs.all.borrow();
        let names: Vec<_> = all
            .as_list()
            .unwrap()
            .iter()
            .filter_map(|v| v.downcast_ref::<Tab>().map(|t| t.0))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(view.query(2).unwrap().len(), 2);
    }
}
