//! Capability engine core: the rule-table classifier, the bounded patcher,
//! and the profile catalog they share.

pub mod catalog;
pub mod classifier;
pub mod manifest;
pub mod patcher;

pub use classifier::{Classifier, Correction, PatchRule, Verdict};
pub use patcher::{PatchReport, Patcher, VisitedSet};
