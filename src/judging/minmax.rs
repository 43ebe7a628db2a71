use derivative::Derivative;
use log::{info, warn};

use super::{above_minimum, JudgingOutcome, Reporter};
use crate::error::Result;
use crate::tracker::{JudgmentErrorTracker, RunWeighting};

#[derive(Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct MinMaxJudgingOptions {
    /// Judging stops once the run with the largest error is judged to
    /// this depth
    #[derivative(Default(value = "1000"))]
    pub max_depth: usize,

    /// Weighting of the run errors
    #[derivative(Default(value = "RunWeighting::Uniform"))]
    pub run_weighting: RunWeighting,

    #[derivative(Default(value = "1000"))]
    pub report_interval: usize,

    /// Stops once the average residual is below this value (0 to
    /// ignore)
    #[derivative(Default(value = "0."))]
    pub min_average_error: f64,
}

/// Minimises the maximum error
///
/// At each step, the run with the largest weighted residual gets its
/// shallowest unjudged document judged, the queries being visited in
/// turn at each depth.
pub fn judge_min_max(
    tracker: &mut JudgmentErrorTracker,
    options: &MinMaxJudgingOptions,
) -> Result<JudgingOutcome> {
    let mut reporter = Reporter::new(tracker);
    let mut average_error = tracker.stats().mean;
    let report_interval = options.report_interval.max(1);

    let mut step = 0;
    loop {
        if step % report_interval == 0 {
            average_error = reporter.report(tracker);
        }
        if !above_minimum(average_error, options.min_average_error) {
            break;
        }
        let r = match tracker.stats_weighted(options.run_weighting).max_run {
            Some(r) => r,
            None => break,
        };
        step += 1;

        loop {
            let run = &tracker.runs()[r];
            let depth = run.judged_depth();
            if depth >= options.max_depth {
                info!(
                    "Exhausted judgments for run {} at depth {}: {:.4} +{:.4}",
                    run.runid(),
                    depth,
                    run.rbp(),
                    run.err()
                );
                return Ok(reporter.outcome(tracker, false));
            }

            // No list of the run reaches this depth
            let mut exhausted = true;
            let mut next = None;
            for q in 0..tracker.num_queries() {
                if depth < run.judgeable_len(q) {
                    exhausted = false;
                    if !tracker.is_judged(r, q, depth) {
                        next = run.list(q).map(|list| (list.scores()[depth].docid.clone(), q));
                        break;
                    }
                }
            }

            if let Some((docid, q)) = next {
                if !tracker.judge_query(&docid, q)? {
                    return Ok(reporter.outcome(tracker, true));
                }
                break;
            }
            if exhausted {
                warn!(
                    "finishing as run {} has no more judgments at depth {}",
                    run.runid(),
                    depth
                );
                return Ok(reporter.outcome(tracker, false));
            }
            tracker.runs_mut()[r].set_judged_depth(depth + 1);
        }
    }
    Ok(reporter.outcome(tracker, false))
}
