//! Change detection.
//!
//! # Check-and-update order
//!
//! 1. The view's update callback (own bindings, in source order)
//! 2. Embedded views
//! 3. Content queries, then AfterContent hooks (children first)
//! 4. Component views
//! 5. View queries, then AfterView hooks (children first)
//!
//! Init-suffixed hooks fire only while `first_change` is set, which is cleared
//! at the very end. The check-no-changes pass walks the same shape without
//! hooks and fails on the first binding or query that would change.

use std::rc::Rc;

use tracing::trace;

use super::services::{ViewAction, enter};
use super::{NodeData, ViewData};
use crate::config::is_dev_mode;
use crate::directive::{Directive, Instance, call_lifecycle_hooks, downcast_instance};
use crate::error::{ViewError, ViewPath, ViewPathSegment};
use crate::nodes;
use crate::types::{NodeFlags, Value, ViewFlags, ViewState};

/// Most values an inline check accepts.
pub const MAX_INLINE_VALUES: usize = 10;

/// Which pass a [`NodeCheck`] is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    CheckAndUpdate,
    CheckNoChanges,
}

/// Handle the update callback evaluates its bindings through.
///
/// Every node that takes bindings is checked once per pass with its current
/// values; the active pass decides whether they are applied or verified.
/// Providers run their OnInit/DoCheck hooks from this check, so a provider
/// with such hooks must be checked even when it has no bindings.
pub struct NodeCheck<'v> {
    view: &'v mut ViewData,
    check_type: CheckType,
    path: &'v ViewPath,
}

impl NodeCheck<'_> {
    pub fn view(&self) -> &ViewData {
        self.view
    }

    pub fn context(&self) -> &Value {
        &self.view.context
    }

    pub fn component(&self) -> Option<&Instance> {
        self.view.component.as_ref()
    }

    pub fn component_as<T: Directive>(&self) -> Option<Rc<T>> {
        self.view.component.as_ref().and_then(downcast_instance)
    }

    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    /// Check a node with at most [`MAX_INLINE_VALUES`] values.
    ///
    /// Returns the node's value for pure expressions, `Undefined` otherwise.
    pub fn inline(&mut self, node_index: usize, values: &[Value]) -> Result<Value, ViewError> {
        if values.len() > MAX_INLINE_VALUES {
            return Err(ViewError::TooManyInlineValues {
                max: MAX_INLINE_VALUES,
                actual: values.len(),
            });
        }
        self.dynamic(node_index, values)
    }

    /// Check a node with any number of values.
    pub fn dynamic(&mut self, node_index: usize, values: &[Value]) -> Result<Value, ViewError> {
        let def = self.view.def.clone();
        let node = def.node(node_index).ok_or(ViewError::NodeOutOfRange {
            index: node_index,
        })?;
        match self.check_type {
            CheckType::CheckAndUpdate => nodes::check_and_update_node(self.view, node, values),
            CheckType::CheckNoChanges => {
                nodes::check_no_changes_node(self.view, self.path, node, values)
            }
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Run one check-and-update pass over `view` and everything nested in it.
pub fn check_and_update_view(view: &mut ViewData) -> Result<(), ViewError> {
    let _guard = enter(ViewAction::CheckAndUpdate)?;
    if view.is_destroyed() {
        return Err(ViewError::Destroyed);
    }
    check_and_update_inner(view, &mut ViewPath::new())
}

/// Verify that a new check would change nothing. Skipped in prod mode.
pub fn check_no_changes_view(view: &mut ViewData) -> Result<(), ViewError> {
    if !is_dev_mode() {
        return Ok(());
    }
    let _guard = enter(ViewAction::CheckNoChanges)?;
    if view.is_destroyed() {
        return Err(ViewError::Destroyed);
    }
    check_no_changes_inner(view, &mut ViewPath::new())
}

/// Check-and-update, then (in dev mode) check-no-changes.
pub fn detect_changes(view: &mut ViewData) -> Result<(), ViewError> {
    check_and_update_view(view)?;
    check_no_changes_view(view)
}

// =============================================================================
// Passes
// =============================================================================

fn check_and_update_inner(view: &mut ViewData, path: &mut ViewPath) -> Result<(), ViewError> {
    trace!(path = ?path.as_slice(), first_change = view.first_change, "check and update");
    let def = view.def.clone();

    if let Some(update) = &def.update {
        update(&mut NodeCheck {
            view: &mut *view,
            check_type: CheckType::CheckAndUpdate,
            path: &*path,
        })?;
    }

    exec_embedded_views_action(view, path, ViewAction::CheckAndUpdate)?;

    exec_queries_action(view, path, NodeFlags::HAS_CONTENT_QUERY, CheckType::CheckAndUpdate)?;
    let mut hooks = NodeFlags::AFTER_CONTENT_CHECKED;
    if view.first_change {
        hooks |= NodeFlags::AFTER_CONTENT_INIT;
    }
    call_lifecycle_hooks_children_first(view, hooks);

    exec_component_views_action(view, path, ViewAction::CheckAndUpdate)?;

    exec_queries_action(view, path, NodeFlags::HAS_VIEW_QUERY, CheckType::CheckAndUpdate)?;
    let mut hooks = NodeFlags::AFTER_VIEW_CHECKED;
    if view.first_change {
        hooks |= NodeFlags::AFTER_VIEW_INIT;
    }
    call_lifecycle_hooks_children_first(view, hooks);

    if def.flags.contains(ViewFlags::ON_PUSH) {
        view.state.remove(ViewState::CHECKS_ENABLED);
    }
    view.first_change = false;
    Ok(())
}

fn check_no_changes_inner(view: &mut ViewData, path: &mut ViewPath) -> Result<(), ViewError> {
    trace!(path = ?path.as_slice(), "check no changes");
    let def = view.def.clone();

    if let Some(update) = &def.update {
        update(&mut NodeCheck {
            view: &mut *view,
            check_type: CheckType::CheckNoChanges,
            path: &*path,
        })?;
    }

    exec_embedded_views_action(view, path, ViewAction::CheckNoChanges)?;
    exec_queries_action(view, path, NodeFlags::HAS_CONTENT_QUERY, CheckType::CheckNoChanges)?;
    exec_component_views_action(view, path, ViewAction::CheckNoChanges)?;
    exec_queries_action(view, path, NodeFlags::HAS_VIEW_QUERY, CheckType::CheckNoChanges)
}

fn call_view_action(
    view: &mut ViewData,
    path: &mut ViewPath,
    action: ViewAction,
) -> Result<(), ViewError> {
    if view.is_destroyed() {
        return Ok(());
    }
    match action {
        ViewAction::CheckAndUpdate => check_and_update_inner(view, path),
        ViewAction::CheckNoChanges => check_no_changes_inner(view, path),
        other => Err(ViewError::UnexpectedAction {
            action: other,
            site: "call_view_action",
        }),
    }
}

fn exec_embedded_views_action(
    view: &mut ViewData,
    path: &mut ViewPath,
    action: ViewAction,
) -> Result<(), ViewError> {
    let def = view.def.clone();
    if !def.node_flags.contains(NodeFlags::HAS_EMBEDDED_VIEWS) {
        return Ok(());
    }
    for index in def.flagged_nodes(NodeFlags::HAS_EMBEDDED_VIEWS) {
        let NodeData::Element(element) = &mut view.nodes[index] else {
            continue;
        };
        for (position, embedded) in element.embedded_views.iter_mut().enumerate() {
            path.push(ViewPathSegment {
                node_index: index,
                embedded_index: Some(position),
            });
            let result = call_view_action(embedded, path, action);
            path.pop();
            result?;
        }
    }
    Ok(())
}

fn exec_component_views_action(
    view: &mut ViewData,
    path: &mut ViewPath,
    action: ViewAction,
) -> Result<(), ViewError> {
    let def = view.def.clone();
    if !def.node_flags.contains(NodeFlags::HAS_COMPONENT) {
        return Ok(());
    }
    for index in def.flagged_nodes(NodeFlags::HAS_COMPONENT) {
        let NodeData::Provider(provider) = &mut view.nodes[index] else {
            continue;
        };
        let Some(component_view) = provider.component_view.as_deref_mut() else {
            continue;
        };
        if !component_view.checks_enabled() {
            continue;
        }
        path.push(ViewPathSegment {
            node_index: index,
            embedded_index: None,
        });
        let result = call_view_action(component_view, path, action);
        path.pop();
        result?;
    }
    Ok(())
}

fn exec_queries_action(
    view: &mut ViewData,
    path: &ViewPath,
    query_flags: NodeFlags,
    check_type: CheckType,
) -> Result<(), ViewError> {
    let def = view.def.clone();
    if !def.node_flags.intersects(query_flags) {
        return Ok(());
    }
    for index in def.flagged_nodes(query_flags) {
        match check_type {
            CheckType::CheckAndUpdate => nodes::query::check_and_update_query(view, &def.nodes[index])?,
            CheckType::CheckNoChanges => nodes::query::check_query_no_changes(view, path, &def.nodes[index])?,
        }
    }
    Ok(())
}

/// Call `hooks` on every provider, children before their ancestors.
pub(crate) fn call_lifecycle_hooks_children_first(view: &ViewData, hooks: NodeFlags) {
    let def = &view.def;
    if !def.node_flags.intersects(hooks) {
        return;
    }
    let mut i = 0;
    while let Some(&index) = def.reverse_child_nodes.get(i) {
        let node = &def.nodes[index];
        if node.flags.intersects(hooks) {
            if let NodeData::Provider(provider) = &view.nodes[index] {
                call_lifecycle_hooks(&*provider.instance, node.flags & hooks);
            }
        }
        if !node.child_flags.intersects(hooks) {
            i += node.child_count;
        }
        i += 1;
    }
}
