//! Rank-biased precision (RBP) evaluation of retrieval runs
//!
//! Besides scoring runs against relevance judgments, with a residual
//! bounding what unjudged documents could add, the crate tracks these
//! bounds while documents get judged one at a time, and provides
//! strategies choosing which documents to judge next.

pub mod base;
pub mod error;
pub mod formats;
pub mod interner;
pub mod judging;
pub mod keytable;
pub mod occurrence;
pub mod qrels;
pub mod rbp;
pub mod run;
pub mod stats;
pub mod tracker;

#[cfg(feature = "python")]
mod py;

pub use error::{Error, Result};
pub use qrels::{RelevanceMode, RelevanceTable};
pub use rbp::{evaluate_run, InducedRbp, RbpScorer};
pub use run::{RankedList, Run, ScoreOrdering};
pub use tracker::{JudgmentErrorTracker, TrackerOptions};
