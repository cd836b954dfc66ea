//! Node-kind handlers.
//!
//! Each kind has a create step, called once per node by view creation, and
//! (for kinds that take bindings) a check step called from the update callback
//! through [`NodeCheck`](crate::view::NodeCheck). Dispatch is on the node's
//! [`NodeKind`] tag.

pub(crate) mod element;
pub(crate) mod ng_content;
pub(crate) mod provider;
pub(crate) mod pure_expression;
pub(crate) mod query;
pub(crate) mod text;

use crate::definition::{NodeDef, NodeKind};
use crate::error::{DebugContext, ViewError, ViewPath};
use crate::types::Value;
use crate::view::ViewData;

/// Apply `values` to `node`, acting on every binding that changed.
pub(crate) fn check_and_update_node(
    view: &mut ViewData,
    node: &NodeDef,
    values: &[Value],
) -> Result<Value, ViewError> {
    check_arity(node, values)?;
    match &node.kind {
        NodeKind::Element(_) => element::check_and_update(view, node, values).map(|()| Value::Undefined),
        NodeKind::Text(_) => text::check_and_update(view, node, values).map(|()| Value::Undefined),
        NodeKind::Provider(_) => provider::check_and_update(view, node, values).map(|()| Value::Undefined),
        NodeKind::PureExpression(_) => pure_expression::check_and_update(view, node, values),
        NodeKind::Query(_) | NodeKind::ProjectedContent(_) => Err(not_bindable(node)),
    }
}

/// Verify `values` against the stored ones without applying anything.
pub(crate) fn check_no_changes_node(
    view: &mut ViewData,
    path: &ViewPath,
    node: &NodeDef,
    values: &[Value],
) -> Result<Value, ViewError> {
    check_arity(node, values)?;
    if matches!(node.kind, NodeKind::Query(_) | NodeKind::ProjectedContent(_)) {
        return Err(not_bindable(node));
    }
    for (binding, value) in values.iter().enumerate() {
        check_binding_no_changes(view, path, node, binding, value)?;
    }
    match node.kind {
        NodeKind::PureExpression(_) => Ok(view.pure_value(node.index)?.clone()),
        _ => Ok(Value::Undefined),
    }
}

fn check_arity(node: &NodeDef, values: &[Value]) -> Result<(), ViewError> {
    if values.len() != node.bindings.len() {
        return Err(ViewError::BindingCount {
            index: node.index,
            expected: node.bindings.len(),
            actual: values.len(),
        });
    }
    Ok(())
}

fn not_bindable(node: &NodeDef) -> ViewError {
    ViewError::NotBindable {
        index: node.index,
        node_type: node.node_type(),
    }
}

/// Store `value` in the binding's slot if it differs (NaN-aware identity).
///
/// Every binding counts as changed on the view's first check.
pub(crate) fn check_and_update_binding(
    view: &mut ViewData,
    node: &NodeDef,
    binding: usize,
    value: &Value,
) -> bool {
    let slot = &mut view.old_values[node.binding_index + binding];
    if view.first_change || !slot.loose_identical(value) {
        *slot = value.clone();
        true
    } else {
        false
    }
}

/// Fail if `value` differs from the one stored by the last check.
pub(crate) fn check_binding_no_changes(
    view: &ViewData,
    path: &ViewPath,
    node: &NodeDef,
    binding: usize,
    value: &Value,
) -> Result<(), ViewError> {
    let old = &view.old_values[node.binding_index + binding];
    if view.first_change || !old.dev_mode_equal(value) {
        return Err(ViewError::ExpressionChanged {
            context: debug_context(view, path, node),
            expected: old.to_string(),
            actual: value.to_string(),
            first_check: view.first_change,
        });
    }
    Ok(())
}

pub(crate) fn debug_context(view: &ViewData, path: &ViewPath, node: &NodeDef) -> DebugContext {
    DebugContext {
        component: view.def.component_type().map(|t| t.id.to_string()),
        view_path: path.to_vec(),
        node_index: node.index,
        node_type: node.node_type(),
    }
}
