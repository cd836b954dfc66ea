//! Entry guard for top-level view actions.
//!
//! Every public pass records the action it runs in a thread-local marker.
//! Starting another action while one is active fails fast; only `Create` may
//! nest, since creating a view from a hook is a legitimate thing to do.

use std::cell::Cell;

use crate::error::ViewError;

/// Kind of pass currently running over the view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewAction {
    Create,
    CheckAndUpdate,
    CheckNoChanges,
    Destroy,
    HandleEvent,
}

thread_local! {
    static CURRENT_ACTION: Cell<Option<ViewAction>> = const { Cell::new(None) };
}

/// The action running on this thread, if any.
pub fn current_action() -> Option<ViewAction> {
    CURRENT_ACTION.with(Cell::get)
}

/// Restores the previous marker when the pass ends (including on error).
#[must_use]
pub(crate) struct EntryGuard {
    previous: Option<ViewAction>,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        CURRENT_ACTION.with(|current| current.set(self.previous));
    }
}

pub(crate) fn enter(action: ViewAction) -> Result<EntryGuard, ViewError> {
    let previous = current_action();
    if let Some(active) = previous {
        if action != ViewAction::Create {
            return Err(ViewError::Reentrant {
                active,
                requested: action,
            });
        }
    }
    CURRENT_ACTION.with(|current| current.set(Some(action)));
    Ok(EntryGuard { previous })
}
