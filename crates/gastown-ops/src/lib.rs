//! Store bindings for the Gas Town dispatch core.
//!
//! The foreign issue store is reached through two seams: [`BeadStore`],
//! the directory-scoped contract of the underlying CLI, and [`BeadsOps`],
//! the routing-aware capability surface the queue and dispatcher consume.
//! Both have a process-exec binding ([`bd_cli`]) and an in-memory fake
//! ([`fake`]) honouring the same conformance contract ([`conformance`]).

pub mod bd_cli;
pub mod conformance;
pub mod error;
pub mod fake;
pub mod routed;
pub mod traits;

pub use error::{OpsError, Result};
pub use routed::{RoutedOps, StoreRouter};
pub use traits::{BeadPatch, BeadStore, BeadsOps, BondReceipt, CreateSpec, WispReceipt};
