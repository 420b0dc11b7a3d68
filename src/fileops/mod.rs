//! File-operation classifier (spec C9).
//!
//! Maps an analyzed [`crate::intent::UserIntent`] onto concrete file targets
//! plus a safety/impact classification, so the natural-language router (C8)
//! and the safety orchestrator (C10) can decide whether the operation needs
//! a human in the loop.

pub mod classifier;
pub mod target;

pub use classifier::{FileOperationIntent, Impact, Operation, Safety};
pub use target::TargetResolution;
