use std::collections::BTreeMap;
use std::rc::Rc;

use crate::definition::{NodeDef, NodeKind, PureExpressionKind};
use crate::error::ViewError;
use crate::types::{NodeType, Value};
use crate::view::{NodeData, ViewData};

/// Recompute the expression only when an argument changed; the cached value
/// keeps its identity otherwise.
pub(crate) fn check_and_update(
    view: &mut ViewData,
    node: &NodeDef,
    values: &[Value],
) -> Result<Value, ViewError> {
    let NodeKind::PureExpression(expression) = &node.kind else {
        return Err(ViewError::NodeTypeMismatch {
            index: node.index,
            expected: NodeType::PureExpression,
        });
    };

    let mut changed = false;
    for (i, value) in values.iter().enumerate() {
        changed |= super::check_and_update_binding(view, node, i, value);
    }

    let NodeData::PureExpression(data) = &mut view.nodes[node.index] else {
        return Err(ViewError::NodeTypeMismatch {
            index: node.index,
            expected: NodeType::PureExpression,
        });
    };
    if changed {
        data.value = match &expression.kind {
            PureExpressionKind::Array => Value::list(values.iter().cloned()),
            PureExpressionKind::Object => {
                let entries = node
                    .bindings
                    .iter()
                    .zip(values)
                    .filter_map(|(binding, value)| Some((binding.name.clone()?, value.clone())));
                Value::Map(Rc::new(BTreeMap::from_iter(entries)))
            }
            PureExpressionKind::Pipe(transform) => transform(values),
        };
    }
    Ok(data.value.clone())
}
