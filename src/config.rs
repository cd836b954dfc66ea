//! Runtime configuration.
//!
//! Dev mode is on by default. In prod mode the check-no-changes pass is skipped
//! entirely; it only exists to catch unstable bindings during development.

use std::cell::Cell;

thread_local! {
    static DEV_MODE: Cell<bool> = const { Cell::new(true) };
}

/// Switch the current thread to prod mode.
pub fn enable_prod_mode() {
    DEV_MODE.with(|dev| dev.set(false));
    tracing::debug!("prod mode enabled, check-no-changes passes are skipped");
}

/// Whether check-no-changes passes run on this thread.
pub fn is_dev_mode() -> bool {
    DEV_MODE.with(Cell::get)
}

/// Restore the defaults (for testing).
pub fn reset_config() {
    DEV_MODE.with(|dev| dev.set(true));
}
