//! Strategies choosing which documents to judge next
//!
//! Every driver feeds a [JudgmentErrorTracker] (which must hold its runs
//! and usually a qrels table) until its stopping condition is met: the
//! tracker asks to stop, the strategy runs out of documents, or the
//! average residual falls below a minimum.

mod minmax;
mod pooling;
mod top_k;
mod weighted;
mod weights;

use log::info;
use serde::{Deserialize, Serialize};

use crate::tracker::{ErrorStats, JudgmentErrorTracker};

pub use minmax::{judge_min_max, MinMaxJudgingOptions};
pub use pooling::{judge_by_pooling, PoolJudgingOptions};
pub use top_k::TopKHeap;
pub use weighted::{judge_weighted, WeightedJudgingOptions};
pub use weights::{DocumentWeights, WeightedDocument};

/// Result of a judging session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JudgingOutcome {
    /// Number of judgments made by the driver
    pub judgments: usize,
    /// Whether the tracker asked to stop
    pub stopped_early: bool,
    /// Periodic error statistics
    pub reports: Vec<ErrorStats>,
}

/// Records periodic error statistics of a tracker
struct Reporter {
    prev_judged: usize,
    prev_relevant: f64,
    start: usize,
    reports: Vec<ErrorStats>,
}

impl Reporter {
    fn new(tracker: &JudgmentErrorTracker) -> Self {
        Self {
            prev_judged: tracker.num_judged(),
            prev_relevant: tracker.num_relevant(),
            start: tracker.num_judged(),
            reports: Vec::new(),
        }
    }

    /// Records the current statistics and returns the average residual
    fn report(&mut self, tracker: &JudgmentErrorTracker) -> f64 {
        let stats = tracker.stats();
        let new_judged = stats.num_judged - self.prev_judged;
        let precision = if new_judged > 0 {
            (stats.num_relevant - self.prev_relevant) / new_judged as f64
        } else {
            0.
        };
        info!(
            "{} judged: error {:.4} (sd {:.4}, max {:.4}), precision {:.4}, max run {:?}, {} lacking",
            stats.num_judged,
            stats.mean,
            stats.std_dev,
            stats.max,
            precision,
            stats.max_run,
            stats.num_lacking
        );
        self.prev_judged = stats.num_judged;
        self.prev_relevant = stats.num_relevant;
        let mean = stats.mean;
        self.reports.push(stats);
        mean
    }

    fn outcome(mut self, tracker: &JudgmentErrorTracker, stopped_early: bool) -> JudgingOutcome {
        if self.prev_judged != tracker.num_judged() || self.reports.is_empty() {
            self.report(tracker);
        }
        JudgingOutcome {
            judgments: tracker.num_judged() - self.start,
            stopped_early,
            reports: self.reports,
        }
    }
}

/// True while the average residual is above the requested minimum
fn above_minimum(average_error: f64, min_average_error: f64) -> bool {
    min_average_error == 0. || average_error >= min_average_error
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::qrels::RelevanceTable;
    use crate::run::Run;
    use crate::tracker::{JudgmentErrorTracker, TrackerOptions};

    /// Three runs over two queries; relevant documents are r*
    pub(crate) fn tracker(options: TrackerOptions) -> JudgmentErrorTracker {
        let mut qrels = RelevanceTable::new();
        for (qid, docid, rel) in [
            ("1", "r1", 1.),
            ("1", "r2", 1.),
            ("1", "n1", 0.),
            ("2", "r3", 1.),
            ("2", "n2", 0.),
            ("2", "n3", 0.),
        ] {
            qrels.insert(qid, docid, rel, true);
        }
        let mut tracker = JudgmentErrorTracker::from_qrels(qrels, options).unwrap();
        for (runid, lists) in [
            ("a", [["r1", "r2", "n1"], ["r3", "n2", "n3"]]),
            ("b", [["n1", "r1", "r2"], ["n2", "r3", "n3"]]),
            ("c", [["n1", "n4", "r1"], ["n3", "n2", "n5"]]),
        ] {
            let mut run = Run::new(runid);
            for (qid, docids) in ["1", "2"].iter().zip(lists.iter()) {
                let list = run.list_or_create(qid);
                for (i, docid) in docids.iter().enumerate() {
                    list.push(docid, i + 1, (10 - i) as f64);
                }
            }
            tracker.add_run(run).unwrap();
        }
        tracker
    }
}
