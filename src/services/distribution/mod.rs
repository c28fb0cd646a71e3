//! Outfit distribution rule engine.
//!
//! Parsers turn SPID and SkyPatcher lines into one filter model; the matcher
//! evaluates it per character; keyword simulation, winner resolution and
//! conflict detection build on top.

pub mod conflict;
pub mod discovery;
pub mod document;
pub mod filter;
pub mod keywords;
pub mod matcher;
pub mod parser;
pub mod pipeline;
pub mod resolution;
pub mod rule;

pub use document::DistributionFile;
pub use resolution::{AssignmentResult, OutfitDistribution, ResolutionOutcome};
pub use rule::{Dialect, DistributionRule, OutfitSlot};

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a cancellable engine pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

pub(crate) fn is_cancelled(cancel_flag: &AtomicBool) -> bool {
    cancel_flag.load(Ordering::Relaxed)
}
