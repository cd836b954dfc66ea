//! View teardown.
//!
//! Order per view: OnDestroy hooks (children first), disposers in slot order,
//! component views, embedded views, then the renderer releases the view's
//! nodes. A failing disposer never stops the rest of the teardown.

use tracing::{debug, warn};

use super::check::call_lifecycle_hooks_children_first;
use super::render::own_render_nodes;
use super::services::{ViewAction, enter};
use super::{NodeData, ViewData};
use crate::error::ViewError;
use crate::types::{NodeFlags, ViewState};

/// Destroy `view` and everything nested in it. Destroying twice is a no-op.
///
/// Every disposer runs even when some fail; the failures are returned
/// together as [`ViewError::Teardown`].
pub fn destroy_view(view: &mut ViewData) -> Result<(), ViewError> {
    let _guard = enter(ViewAction::Destroy)?;
    let mut failures = Vec::new();
    destroy_view_inner(view, &mut failures);

    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        warn!(error = %failure, "disposer failed during teardown");
    }
    Err(ViewError::Teardown(failures))
}

fn destroy_view_inner(view: &mut ViewData, failures: &mut Vec<anyhow::Error>) {
    if view.is_destroyed() {
        return;
    }
    let def = view.def.clone();
    debug!(
        component = def.component_type().map(|t| &*t.id),
        "destroying view"
    );

    call_lifecycle_hooks_children_first(view, NodeFlags::ON_DESTROY);
    run_disposers(view, failures);

    if def.node_flags.contains(NodeFlags::HAS_COMPONENT) {
        for index in def.flagged_nodes(NodeFlags::HAS_COMPONENT) {
            if let NodeData::Provider(provider) = &mut view.nodes[index] {
                if let Some(component_view) = provider.component_view.as_deref_mut() {
                    destroy_view_inner(component_view, failures);
                }
            }
        }
    }

    if def.node_flags.contains(NodeFlags::HAS_EMBEDDED_VIEWS) {
        for index in def.flagged_nodes(NodeFlags::HAS_EMBEDDED_VIEWS) {
            if let NodeData::Element(element) = &mut view.nodes[index] {
                for embedded in &mut element.embedded_views {
                    destroy_view_inner(embedded, failures);
                }
            }
        }
    }

    if let Some(renderer) = &view.renderer {
        renderer.destroy_view(view.host_element, &own_render_nodes(view));
    }
    view.state.insert(ViewState::DESTROYED);
}

fn run_disposers(view: &mut ViewData, failures: &mut Vec<anyhow::Error>) {
    if let Some(disposables) = view.disposables.as_mut() {
        for disposer in disposables.iter_mut().filter_map(Option::take) {
            if let Err(err) = disposer() {
                failures.push(err);
            }
        }
    }
}

/// Undo a node creation that failed part-way.
///
/// Listeners and render nodes created so far are released, here and in
/// nested component views. No hooks run since nothing was checked yet. The
/// view is left uncreated, so creating its nodes again starts clean.
pub(crate) fn release_failed_creation(view: &mut ViewData) {
    let mut failures = Vec::new();
    release_created(view, &mut failures);
    for failure in &failures {
        warn!(error = %failure, "disposer failed while undoing view creation");
    }
}

fn release_created(view: &mut ViewData, failures: &mut Vec<anyhow::Error>) {
    run_disposers(view, failures);
    for data in &mut view.nodes {
        if let NodeData::Provider(provider) = data {
            if let Some(component_view) = provider.component_view.as_deref_mut() {
                release_created(component_view, failures);
            }
        }
    }

    if let Some(renderer) = &view.renderer {
        let render_nodes = own_render_nodes(view);
        if !render_nodes.is_empty() {
            renderer.destroy_view(view.host_element, &render_nodes);
        }
    }
    view.nodes.fill_with(NodeData::default);
    view.nodes_created = false;
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::definition::{NodeDef, ViewDefinition};
    use crate::directive::Directive;
    use crate::types::{Token, Value};
    use crate::view::{RootData, check_and_update_view, create_root_view};

    struct Tracked(Rc<RefCell<Vec<&'static str>>>);

    impl Directive for Tracked {
        fn on_destroy(&self) {
            self.0.borrow_mut().push("on_destroy");
        }
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let def = ViewDefinition::builder()
            .node(NodeDef::element("div").with_child_count(1))
            .node(
                NodeDef::provider(Token("Tracked"), {
                    let log = log.clone();
                    move |_| Rc::new(Tracked(log.clone()))
                })
                .with_flags(NodeFlags::ON_DESTROY),
            )
            .build()
            .unwrap();
        let mut view = create_root_view(Rc::new(RootData::headless()), def, Value::Undefined).unwrap();

        destroy_view(&mut view).unwrap();
        destroy_view(&mut view).unwrap();
        assert_eq!(*log.borrow(), vec!["on_destroy"]);
        assert!(view.is_destroyed());
        assert!(matches!(
            check_and_update_view(&mut view),
            Err(ViewError::Destroyed)
        ));
    }
}
