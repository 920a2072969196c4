//! Command handlers for the `gt` CLI.

pub mod attach_cmd;
pub mod convoy_cmd;
pub mod dispatch_cmd;
pub mod hook_cmd;
pub mod queue_cmd;
pub mod redirect_cmd;
pub mod rigs_cmd;
pub mod routes_cmd;
pub mod version;
