use derivative::Derivative;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use super::{above_minimum, DocumentWeights, JudgingOutcome, Reporter, TopKHeap, WeightedDocument};
use crate::base::Len;
use crate::error::Result;
use crate::tracker::{JudgmentErrorTracker, QueryWeighting, RunWeighting};

const DEFAULT_PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(DEFAULT_PROGRESS_TEMPLATE)
        .progress_chars("=> ")
}

#[derive(Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct WeightedJudgingOptions {
    #[derivative(Default(value = "RunWeighting::Uniform"))]
    pub run_weighting: RunWeighting,

    #[derivative(Default(value = "QueryWeighting::Uniform"))]
    pub query_weighting: QueryWeighting,

    /// Document weights are recomputed every `multiplier × queries`
    /// judgments
    #[derivative(Default(value = "5"))]
    pub recalc_interval_multiplier: usize,

    #[derivative(Default(value = "1000"))]
    pub report_interval: usize,

    /// Stops once the average residual is below this value (0 to
    /// ignore)
    #[derivative(Default(value = "0."))]
    pub min_average_error: f64,

    /// Shows a progress bar
    #[derivative(Default(value = "false"))]
    pub progress: bool,
}

/// Selects the documents with the largest weighted error
///
/// The weighted error of a document sums, over the contributing runs
/// retrieving it, its rank weight times the proportional weight of the
/// run and the weight of the query. Since these weights change as
/// documents get judged, the best `K` documents are selected at once
/// and judged before recomputing. Documents are scanned by decreasing
/// summed rank weight, which stops as soon as the upper bound of the
/// next document falls below the K-th best weight found.
///
/// With uniform run and query weights, documents are judged in the
/// order of [DocumentWeights].
pub fn judge_weighted(
    tracker: &mut JudgmentErrorTracker,
    options: &WeightedJudgingOptions,
) -> Result<JudgingOutcome> {
    let documents = DocumentWeights::new(tracker);
    let weighted = options.run_weighting != RunWeighting::Uniform
        || options.query_weighting != QueryWeighting::Uniform;
    let recalc_interval = (options.recalc_interval_multiplier * tracker.num_queries()).max(2);
    let report_interval = options.report_interval.max(1);

    let progress = if options.progress {
        ProgressBar::new(documents.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(pb_style());

    let mut reporter = Reporter::new(tracker);
    let mut average_error = tracker.stats().mean;
    let mut selected = vec![false; documents.len()];
    let mut pending: Vec<usize> = Vec::new();
    let mut stopped_early = false;

    for step in 0..documents.len() {
        if step % report_interval == 0 {
            average_error = reporter.report(tracker);
        }
        if !above_minimum(average_error, options.min_average_error) {
            break;
        }

        let next = if weighted {
            if pending.is_empty() {
                pending = select(tracker, &documents, &selected, recalc_interval, options);
                debug!("selected {} documents to judge", pending.len());
            }
            pending.pop()
        } else {
            Some(step)
        };
        let next = match next {
            Some(next) => next,
            None => break,
        };
        selected[next] = true;
        progress.inc(1);

        let document = documents.get(next);
        if tracker.is_pair_judged(&document.docid, document.query) {
            continue;
        }
        if !tracker.judge_query(&document.docid, document.query)? {
            stopped_early = true;
            break;
        }
    }
    progress.finish();
    Ok(reporter.outcome(tracker, stopped_early))
}

/// The (at most) `k` unselected documents with the largest weighted
/// error, by increasing weight
fn select(
    tracker: &JudgmentErrorTracker,
    documents: &DocumentWeights,
    selected: &[bool],
    k: usize,
    options: &WeightedJudgingOptions,
) -> Vec<usize> {
    // Both the bound and the weights below are not divided by the
    // number of queries
    let (max_run_weight, _) = tracker.max_proportional_weight(options.run_weighting);
    let query_weights: Vec<f64> = (0..tracker.num_queries())
        .map(|q| tracker.query_weight(q, options.query_weighting))
        .collect();
    let max_query_weight = query_weights.iter().copied().fold(0., f64::max);
    let bound = max_run_weight * max_query_weight;
    let mut run_weights: Vec<Option<f64>> = vec![None; tracker.num_runs()];

    let mut heap = TopKHeap::with_capacity(k);
    let mut considered = 0;
    for (ix, document) in documents.iter().enumerate() {
        if selected[ix] || tracker.is_pair_judged(&document.docid, document.query) {
            continue;
        }
        if document.weight * bound < heap.threshold() {
            break;
        }
        considered += 1;
        let weight = document_weight(
            tracker,
            document,
            &mut run_weights,
            query_weights[document.query],
            options.run_weighting,
        );
        heap.push(weight, ix);
    }
    debug!("considered {} documents out of {}", considered, documents.len());
    heap.into_ascending()
}

/// Weighted error of a document, caching the run weights
fn document_weight(
    tracker: &JudgmentErrorTracker,
    document: &WeightedDocument,
    run_weights: &mut [Option<f64>],
    query_weight: f64,
    run_weighting: RunWeighting,
) -> f64 {
    let rank_weights = tracker.rank_weights();
    let runs = tracker.runs();
    let mut weight = 0.;
    for o in tracker
        .occurrence_index()
        .get(&document.docid, document.query)
        .unwrap_or(&[])
    {
        if !runs[o.run].contributes() {
            continue;
        }
        let run_weight = *run_weights[o.run]
            .get_or_insert_with(|| tracker.run_proportional_weight(o.run, run_weighting));
        weight += rank_weights[o.rank] * run_weight * query_weight;
    }
    weight
}
