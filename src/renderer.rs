//! Renderer capability.
//!
//! The engine never touches a display technology. Everything visible goes
//! through [`Renderer`]; views obtain one from a [`RendererFactory`], scoped to
//! their component type when the definition carries one.

use std::rc::Rc;

use crate::types::{RenderNode, Value};

/// Disposer registered by a view; run once when the view is destroyed.
pub type Disposer = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// Render metadata of a component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRenderType {
    /// Unique id of the component type (also used in diagnostics).
    pub id: Rc<str>,
    pub styles: Vec<Rc<str>>,
}

impl ComponentRenderType {
    pub fn new(id: impl Into<Rc<str>>) -> Self {
        Self {
            id: id.into(),
            styles: Vec::new(),
        }
    }

    pub fn with_styles<S: Into<Rc<str>>>(mut self, styles: impl IntoIterator<Item = S>) -> Self {
        self.styles = styles.into_iter().map(Into::into).collect();
        self
    }
}

/// Operations the engine performs on a display tree.
///
/// Methods take `&self`: a renderer is shared by every view that inherits it.
pub trait Renderer {
    /// Create the node component-view roots attach to, given the host element.
    fn create_view_root(&self, host: RenderNode) -> RenderNode;

    fn create_element(&self, parent: Option<RenderNode>, name: &str) -> RenderNode;

    /// Placeholder marking where embedded views are inserted.
    fn create_template_anchor(&self, parent: Option<RenderNode>) -> RenderNode;

    fn create_text(&self, parent: Option<RenderNode>, value: &str) -> RenderNode;

    fn project_nodes(&self, parent: RenderNode, nodes: &[RenderNode]);

    /// Insert `view_root_nodes` right after `node`.
    fn attach_view_after(&self, node: RenderNode, view_root_nodes: &[RenderNode]);

    fn detach_view(&self, view_root_nodes: &[RenderNode]);

    /// Release every node a destroyed view created.
    fn destroy_view(&self, host: Option<RenderNode>, view_all_nodes: &[RenderNode]);

    /// Start listening for `event_name`; the returned disposer stops it.
    fn listen(&self, element: RenderNode, event_name: &str) -> Disposer;

    fn set_element_property(&self, element: RenderNode, name: &str, value: &Value);

    /// `None` removes the attribute.
    fn set_element_attribute(&self, element: RenderNode, name: &str, value: Option<&str>);

    fn set_element_class(&self, element: RenderNode, name: &str, is_add: bool);

    /// `None` removes the style.
    fn set_element_style(&self, element: RenderNode, name: &str, value: Option<&str>);

    fn set_text(&self, node: RenderNode, text: &str);
}

/// Hands out renderers, one per component type.
pub trait RendererFactory {
    /// `None` asks for the default renderer of a root view.
    fn create_renderer(&self, component_type: Option<&ComponentRenderType>) -> Rc<dyn Renderer>;
}
