//! Error types.
//!
//! Three families, all fatal to the operation that raised them:
//! - [`DefinitionError`] - a node list violates a structural invariant.
//! - [`ViewError::ExpressionChanged`] - check-no-changes observed a new value.
//! - [`ViewError::Reentrant`] / [`ViewError::UnexpectedAction`] - orchestration
//!   invariants were broken.

use std::fmt;

use smallvec::SmallVec;

use crate::types::{NodeType, Token};
use crate::view::ViewAction;

// =============================================================================
// Definition errors
// =============================================================================

/// Raised while flattening a node list into a view definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Illegal state: a view definition needs at least one node")]
    Empty,
    #[error("Illegal state: childCount of node leads outside of parent, at index {index}")]
    ChildRangeOutsideParent { index: usize },
    #[error("Illegal state: provider nodes need to be children of elements, at index {index}")]
    ProviderOutsideElement { index: usize },
    #[error("Illegal state: query nodes need to be children of providers, at index {index}")]
    QueryOutsideProvider { index: usize },
    #[error("Illegal state: view queries need a component provider as parent, at index {index}")]
    ViewQueryOutsideComponent { index: usize },
    #[error(
        "Illegal state: last root node of a template can't host a component or embedded views, at index {index}"
    )]
    LastRootNodeHost { index: usize },
    #[error("Illegal state: {node_type:?} nodes can't have children, at index {index}")]
    LeafWithChildren { index: usize, node_type: NodeType },
}

// =============================================================================
// Diagnostic context
// =============================================================================

/// One step from a root view down to a nested view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPathSegment {
    /// Node in the parent view that owns the nested view.
    pub node_index: usize,
    /// Position among the anchor's embedded views, `None` for component views.
    pub embedded_index: Option<usize>,
}

impl fmt::Display for ViewPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.embedded_index {
            Some(pos) => write!(f, "{}[{}]", self.node_index, pos),
            None => write!(f, "{}", self.node_index),
        }
    }
}

/// Location of the view currently being processed, relative to the view a pass
/// was started on.
pub type ViewPath = SmallVec<[ViewPathSegment; 8]>;

/// Where a problem happened. Built only when an error is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugContext {
    /// Component type id of the view, if it is a component view.
    pub component: Option<String>,
    pub view_path: Vec<ViewPathSegment>,
    pub node_index: usize,
    pub node_type: NodeType,
}

impl fmt::Display for DebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("view ")?;
        if self.view_path.is_empty() {
            f.write_str("<root>")?;
        } else {
            for (i, segment) in self.view_path.iter().enumerate() {
                if i > 0 {
                    f.write_str("/")?;
                }
                write!(f, "{segment}")?;
            }
        }
        if let Some(component) = &self.component {
            write!(f, " ({component})")?;
        }
        write!(f, ", node {} ({:?})", self.node_index, self.node_type)
    }
}

// =============================================================================
// View errors
// =============================================================================

/// Errors raised while creating, checking or destroying views.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(
        "Expression has changed after it was checked. Previous value: '{expected}'. Current value: '{actual}'.{} [{context}]",
        first_check_hint(.first_check)
    )]
    ExpressionChanged {
        context: DebugContext,
        expected: String,
        actual: String,
        first_check: bool,
    },

    #[error("Illegal state: cannot start {requested:?} while {active:?} is running")]
    Reentrant {
        active: ViewAction,
        requested: ViewAction,
    },

    #[error("Illegal state: unexpected action {action:?} in {site}")]
    UnexpectedAction {
        action: ViewAction,
        site: &'static str,
    },

    #[error("view has been destroyed")]
    Destroyed,

    #[error("node {index} is not a {expected:?} node")]
    NodeTypeMismatch { index: usize, expected: NodeType },

    #[error("node {index} does not exist")]
    NodeOutOfRange { index: usize },

    #[error("node {index} ({node_type:?}) takes no bindings")]
    NotBindable { index: usize, node_type: NodeType },

    #[error("node {index} declares {expected} bindings but was checked with {actual} values")]
    BindingCount {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("inline checks take at most {max} values, got {actual}")]
    TooManyInlineValues { max: usize, actual: usize },

    #[error("no provider for {token:?}, at index {index}")]
    NoProvider { token: Token, index: usize },

    #[error("embedded view position {position} is out of range at anchor {index}")]
    EmbeddedViewOutOfRange { index: usize, position: usize },

    #[error("teardown finished with {} failure(s)", .0.len())]
    Teardown(Vec<anyhow::Error>),
}

fn first_check_hint(first_check: &bool) -> &'static str {
    if *first_check {
        " It seems like the view has been created after its parent and its children have been dirty checked. Has it been created in a change detection hook ?"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_debug_context_display() {
        let path: ViewPath = smallvec![
            ViewPathSegment { node_index: 2, embedded_index: None },
            ViewPathSegment { node_index: 0, embedded_index: Some(1) },
        ];
        let context = DebugContext {
            component: Some("Greeting".into()),
            view_path: path.to_vec(),
            node_index: 3,
            node_type: NodeType::Text,
        };
        assert_eq!(context.to_string(), "view 2/0[1] (Greeting), node 3 (Text)");
    }

    #[test]
    fn test_expression_changed_message() {
        let err = ViewError::ExpressionChanged {
            context: DebugContext {
                component: None,
                view_path: Vec::new(),
                node_index: 1,
                node_type: NodeType::Element,
            },
            expected: "a".into(),
            actual: "b".into(),
            first_check: false,
        };
        assert_eq!(
            err.to_string(),
            "Expression has changed after it was checked. Previous value: 'a'. Current value: 'b'. [view <root>, node 1 (Element)]"
        );
    }
}
