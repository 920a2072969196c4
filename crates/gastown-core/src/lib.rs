//! Core types for the Gas Town dispatch system.
//!
//! This crate holds the bead domain model shared by the routing, ops,
//! dispatch and attachment layers.

pub mod attachment;
pub mod bead;
pub mod enums;
pub mod ids;
pub mod jsonl;
