use derivative::Derivative;
use log::debug;

use super::{above_minimum, JudgingOutcome, Reporter};
use crate::error::Result;
use crate::tracker::JudgmentErrorTracker;

#[derive(Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct PoolJudgingOptions {
    /// Depth of the pool
    #[derivative(Default(value = "1000"))]
    pub pool_depth: usize,

    /// Reports every N judgments (instead of after each depth)
    #[derivative(Default(value = "None"))]
    pub report_interval: Option<usize>,

    /// Stops once the average residual is below this value (0 to
    /// ignore)
    #[derivative(Default(value = "0."))]
    pub min_average_error: f64,
}

/// Depth-k pooling
///
/// For each depth, the document at that depth of each contributing run
/// and each query is judged (if not already).
pub fn judge_by_pooling(
    tracker: &mut JudgmentErrorTracker,
    options: &PoolJudgingOptions,
) -> Result<JudgingOutcome> {
    let mut reporter = Reporter::new(tracker);
    let mut average_error = tracker.stats().mean;
    let report_interval = options.report_interval.map(|n| n.max(1));

    let max_len = (0..tracker.num_runs())
        .filter(|&r| tracker.runs()[r].contributes())
        .flat_map(|r| (0..tracker.num_queries()).map(move |q| (r, q)))
        .map(|(r, q)| tracker.runs()[r].judgeable_len(q))
        .max()
        .unwrap_or(0);

    for depth in 0..options.pool_depth.min(max_len) {
        if !above_minimum(average_error, options.min_average_error) {
            break;
        }
        for r in 0..tracker.num_runs() {
            if !tracker.runs()[r].contributes() {
                continue;
            }
            for q in 0..tracker.num_queries() {
                let run = &tracker.runs()[r];
                if depth >= run.judgeable_len(q) || tracker.is_judged(r, q, depth) {
                    continue;
                }
                let docid = match run.list(q) {
                    Some(list) => list.scores()[depth].docid.clone(),
                    None => continue,
                };
                let proceed = tracker.judge_query(&docid, q)?;
                if let Some(interval) = report_interval {
                    if tracker.num_judged() % interval == 0 {
                        average_error = reporter.report(tracker);
                    }
                }
                if !proceed {
                    return Ok(reporter.outcome(tracker, true));
                }
            }
        }
        if report_interval.is_none() {
            average_error = reporter.report(tracker);
        }
        debug!("pool complete at depth {}", depth + 1);
    }
    Ok(reporter.outcome(tracker, false))
}
