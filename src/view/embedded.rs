//! Embedded views at template anchors, and event dispatch.
//!
//! An anchor keeps its embedded views in render order. Every structural change
//! dirties the queries the moved template can match.

use tracing::trace;

use super::render::{last_render_node, root_render_nodes};
use super::services::{ViewAction, enter};
use super::ViewData;
use crate::error::{ViewError, ViewPathSegment};
use crate::types::{Value, ViewFlags};

/// Insert `view` at `position` among the embedded views of `anchor_index`.
pub fn attach_embedded_view(
    parent: &mut ViewData,
    anchor_index: usize,
    position: usize,
    mut view: ViewData,
) -> Result<(), ViewError> {
    let count = parent.element(anchor_index)?.embedded_views.len();
    if position > count {
        return Err(ViewError::EmbeddedViewOutOfRange {
            index: anchor_index,
            position,
        });
    }
    trace!(anchor = anchor_index, position, "attach embedded view");

    render_attach(parent, anchor_index, position, &view);
    parent.root.invalidate_queries(&view.def.node_matched_queries);
    view.parent_index = Some(anchor_index);
    parent
        .element_mut(anchor_index)?
        .embedded_views
        .insert(position, view);
    Ok(())
}

/// Remove the embedded view at `position` and hand it back, still alive.
pub fn detach_embedded_view(
    parent: &mut ViewData,
    anchor_index: usize,
    position: usize,
) -> Result<ViewData, ViewError> {
    let views = &mut parent.element_mut(anchor_index)?.embedded_views;
    if position >= views.len() {
        return Err(ViewError::EmbeddedViewOutOfRange {
            index: anchor_index,
            position,
        });
    }
    trace!(anchor = anchor_index, position, "detach embedded view");

    let view = views.remove(position);
    if let Some(renderer) = &parent.renderer {
        renderer.detach_view(&root_render_nodes(&view));
    }
    parent.root.invalidate_queries(&view.def.node_matched_queries);
    Ok(view)
}

/// Move the embedded view at `from` to `to`.
pub fn move_embedded_view(
    parent: &mut ViewData,
    anchor_index: usize,
    from: usize,
    to: usize,
) -> Result<(), ViewError> {
    let count = parent.element(anchor_index)?.embedded_views.len();
    if to >= count {
        return Err(ViewError::EmbeddedViewOutOfRange {
            index: anchor_index,
            position: to,
        });
    }
    let view = detach_embedded_view(parent, anchor_index, from)?;
    attach_embedded_view(parent, anchor_index, to, view)
}

fn render_attach(parent: &ViewData, anchor_index: usize, position: usize, view: &ViewData) {
    let Some(renderer) = &parent.renderer else {
        return;
    };
    let Ok(anchor) = parent.element(anchor_index) else {
        return;
    };
    let previous = match position.checked_sub(1) {
        Some(prev) => anchor.embedded_views.get(prev).and_then(last_render_node),
        None => None,
    };
    if let Some(after) = previous.or(anchor.render_element) {
        renderer.attach_view_after(after, &root_render_nodes(view));
    }
}

/// Route an event raised on `node_index` of the view at `path` (relative to
/// `view`) to that view's event callback.
///
/// Every on-push view along the path is re-enabled for checking. Returns the
/// callback's verdict: `false` asks the renderer to prevent the default.
pub fn dispatch_event(
    view: &mut ViewData,
    path: &[ViewPathSegment],
    node_index: usize,
    event_name: &str,
    event: &Value,
) -> Result<bool, ViewError> {
    let _guard = enter(ViewAction::HandleEvent)?;
    trace!(path = ?path, node = node_index, event = event_name, "dispatch event");

    let mut target = view;
    mark_on_push(target);
    for segment in path {
        target = match segment.embedded_index {
            Some(position) => target.embedded_view_mut(segment.node_index, position)?,
            None => target.component_view_mut(segment.node_index)?,
        };
        mark_on_push(target);
    }

    if target.is_destroyed() {
        return Err(ViewError::Destroyed);
    }
    target.node(node_index)?;
    match target.def.handle_event.clone() {
        Some(handle_event) => Ok(handle_event(target, node_index, event_name, event)),
        None => Ok(true),
    }
}

fn mark_on_push(view: &mut ViewData) {
    if view.def.flags.contains(ViewFlags::ON_PUSH) {
        view.mark_for_check();
    }
}
