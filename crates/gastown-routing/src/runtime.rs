//! Process-wide store-routing state.
//!
//! The foreign CLI routes by directory unless told otherwise; the dispatch
//! core forces it into local mode once, before the first store call. A
//! daemon-owned store additionally gates the filesystem-mutating helpers.

use std::sync::Once;

/// Environment variable that selects the foreign CLI's routing mode.
pub const ROUTING_MODE_ENV: &str = "BD_ROUTING_MODE";

/// Environment variable marking the store as daemon-owned.
pub const DAEMON_MODE_ENV: &str = "BD_DAEMON_MODE";

static FORCE_LOCAL: Once = Once::new();

/// Forces the foreign CLI into directory-local routing, once per process.
///
/// Must run before the first store invocation; later calls are no-ops.
pub fn force_local_routing() {
    FORCE_LOCAL.call_once(|| {
        // Safety: called before any store subprocess is spawned and before
        // worker threads read the routing environment.
        unsafe { std::env::set_var(ROUTING_MODE_ENV, "local") };
    });
}

/// Returns `true` when a daemon owns the store.
///
/// Filesystem-mutating helpers (redirect setup, artifact cleanup) must
/// refuse to act in daemon mode.
pub fn is_daemon_mode() -> bool {
    matches!(
        std::env::var(DAEMON_MODE_ENV).as_deref(),
        Ok("1") | Ok("true")
    )
}
