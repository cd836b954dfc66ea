use crate::definition::{BindingKind, NodeDef};
use crate::error::ViewError;
use crate::types::Value;
use crate::view::{ElementData, ViewData, render::render_parent_node};

/// Create the element (or template anchor), its static attributes and one
/// listener per declared output.
pub(crate) fn create_element(view: &mut ViewData, node: &NodeDef) -> ElementData {
    let Some(element) = node.as_element() else {
        return ElementData::default();
    };
    let Some(renderer) = view.renderer.clone() else {
        return ElementData::default();
    };

    let parent = render_parent_node(view, node);
    let render_element = match &element.name {
        Some(name) => {
            let el = renderer.create_element(parent, name);
            for (attr, value) in &element.attrs {
                renderer.set_element_attribute(el, attr, Some(&**value));
            }
            el
        }
        None => renderer.create_template_anchor(parent),
    };

    if let Some(disposables) = view.disposables.as_mut() {
        for (i, output) in element.outputs.iter().enumerate() {
            disposables[node.disposable_index + i] = Some(renderer.listen(render_element, output));
        }
    }

    ElementData {
        render_element: Some(render_element),
        embedded_views: Vec::new(),
    }
}

pub(crate) fn check_and_update(
    view: &mut ViewData,
    node: &NodeDef,
    values: &[Value],
) -> Result<(), ViewError> {
    let render_element = view.element(node.index)?.render_element;
    for (i, value) in values.iter().enumerate() {
        if !super::check_and_update_binding(view, node, i, value) {
            continue;
        }
        if let (Some(renderer), Some(el)) = (&view.renderer, render_element) {
            let binding = &node.bindings[i];
            let name = binding.name.as_deref().unwrap_or_default();
            match binding.kind {
                BindingKind::ElementAttribute => {
                    let value = (!value.is_nullish()).then(|| value.to_string());
                    renderer.set_element_attribute(el, name, value.as_deref());
                }
                BindingKind::ElementClass => {
                    renderer.set_element_class(el, name, value.is_truthy());
                }
                BindingKind::ElementStyle => {
                    let value = (!value.is_nullish()).then(|| {
                        let unit = binding.suffix.as_deref().unwrap_or_default();
                        format!("{value}{unit}")
                    });
                    renderer.set_element_style(el, name, value.as_deref());
                }
                BindingKind::ElementProperty => {
                    renderer.set_element_property(el, name, value);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::definition::{BindingDef, NodeDef, ViewDefinition};
    use crate::types::Value;
    use crate::view::{RootData, check_and_update_view, create_root_view};

    #[test]
    fn test_headless_element_tracks_bindings() {
        let def = ViewDefinition::builder()
            .node(NodeDef::element("div").with_bindings([
                BindingDef::attribute("title"),
                BindingDef::class("active"),
            ]))
            .update(|check| {
                check.inline(0, &[Value::from("tip"), Value::from(true)])?;
                Ok(())
            })
            .build()
            .unwrap();
        let mut view = create_root_view(Rc::new(RootData::headless()), def, Value::Undefined).unwrap();

        check_and_update_view(&mut view).unwrap();
        assert_eq!(view.old_values(), &[Value::from("tip"), Value::Bool(true)]);
        assert_eq!(view.element(0).unwrap().render_element, None);
    }
}
