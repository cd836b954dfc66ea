use crate::definition::{NodeDef, NodeKind};
use crate::error::ViewError;
use crate::types::Value;
use crate::view::{TextData, ViewData, render::render_parent_node};

pub(crate) fn create_text(view: &ViewData, node: &NodeDef) -> TextData {
    let (Some(renderer), NodeKind::Text(text)) = (&view.renderer, &node.kind) else {
        return TextData::default();
    };
    let parent = render_parent_node(view, node);
    TextData {
        render_text: Some(renderer.create_text(parent, &text.prefix)),
    }
}

/// Rewrite the text when any interpolated value changed.
pub(crate) fn check_and_update(
    view: &mut ViewData,
    node: &NodeDef,
    values: &[Value],
) -> Result<(), ViewError> {
    let render_text = view.text(node.index)?.render_text;

    // Every binding is compared so each slot stays current.
    let mut changed = false;
    for (i, value) in values.iter().enumerate() {
        changed |= super::check_and_update_binding(view, node, i, value);
    }
    if !changed {
        return Ok(());
    }

    if let (Some(renderer), Some(render_text), NodeKind::Text(text)) =
        (&view.renderer, render_text, &node.kind)
    {
        renderer.set_text(render_text, &interpolate(&text.prefix, node, values));
    }
    Ok(())
}

fn interpolate(prefix: &str, node: &NodeDef, values: &[Value]) -> String {
    let mut out = String::from(prefix);
    for (binding, value) in node.bindings.iter().zip(values) {
        out.push_str(&value.to_interpolation());
        if let Some(suffix) = &binding.suffix {
            out.push_str(suffix);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        let node = NodeDef::text("Hello ", [", ", "!"]);
        let values = [Value::from("Ada"), Value::Null];
        assert_eq!(interpolate("Hello ", &node, &values), "Hello Ada, !");
    }
}
