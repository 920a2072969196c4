//! Prefix routing and store-directory resolution for a Gas Town.
//!
//! A town hosts many rigs, each owning a bead-id prefix and a store
//! directory. This crate maps bead ids to rigs via the town's route table,
//! resolves `.beads/redirect` chains to effective store directories, and
//! reads the town-level configuration files.

pub mod error;
pub mod redirect;
pub mod routes;
pub mod runtime;
pub mod town;

pub use error::{Result, RoutingError};
pub use routes::{Route, RouteSource, RouteTable};
