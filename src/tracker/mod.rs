//! Incremental tracking of score bounds as documents get judged
//!
//! For every run and every assessed query, the tracker keeps the RBP
//! credited by the judgments so far and the residual that unjudged
//! documents could still add. Judging a document subtracts its rank
//! weight from the residual of every run retrieving it, and credits the
//! weight times the relevance to the run score.
//!
//! On top of these bounds the tracker computes:
//! - selection weights of runs and queries ([weighting])
//! - error statistics ([ErrorStats])
//! - the proportion of significantly different run pairs
//!   ([significance])

pub mod significance;
mod snapshot;
pub mod weighting;

use std::io::Write;

use derivative::Derivative;
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::base::{
    check_persistence, rbp_weights, Len, QueryIndex, Rank, Relevance, RunIndex, EPSILON,
};
use crate::error::{Error, Result};
use crate::interner::StringInterner;
use crate::keytable::CompositeKeyTable;
use crate::occurrence::{DocumentOccurrenceIndex, Occurrence};
use crate::qrels::{Rel, RelevanceTable};
use crate::run::{RankedList, Run, ScoreOrdering};
use crate::stats::SignificanceOracle;

pub use significance::{SignificanceMode, SignificanceOptions};
pub use snapshot::{RunScore, TrackerSnapshot};
pub use weighting::{projected_rbp, QueryWeighting, RunWeighting};

#[derive(Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct TrackerOptions {
    /// RBP persistence
    #[derivative(Default(value = "0.95"))]
    pub persistence: f64,

    /// Ranks at or beyond this depth are ignored
    #[derivative(Default(value = "10000"))]
    pub depth: usize,

    /// Judging stops once this number of judgments is reached
    #[derivative(Default(value = "None"))]
    pub max_judgments: Option<usize>,

    /// Judging stops once the top run cannot be overtaken
    #[derivative(Default(value = "false"))]
    pub stop_when_top_run_found: bool,

    /// Relevance used for documents missing from the attached qrels
    #[derivative(Default(value = "0."))]
    pub relevance_if_unjudged: Relevance,
}

/// Per-query judging statistics
#[derive(Clone, Debug)]
pub struct QueryInfo {
    qid: String,
    judged: usize,
    rel: f64,
}

impl QueryInfo {
    pub fn qid(&self) -> &str {
        &self.qid
    }

    /// Number of judgments made for the query
    pub fn judged(&self) -> usize {
        self.judged
    }

    /// Relevance found so far
    pub fn relevance(&self) -> f64 {
        self.rel
    }
}

/// A run within the tracker
pub struct RunInfo {
    run: Run,
    /// Mean credited score over the queries
    rbp: f64,
    /// Mean residual over the queries
    err: f64,
    contributes: bool,
    judged_depth: usize,
    /// For each query, the position of the run's list (if any)
    lists: Vec<Option<usize>>,
    /// For each query, which (depth-truncated) ranks are judged
    judged: Vec<Vec<bool>>,
}

impl RunInfo {
    pub fn runid(&self) -> &str {
        self.run.runid()
    }

    pub fn rbp(&self) -> f64 {
        self.rbp
    }

    pub fn err(&self) -> f64 {
        self.err
    }

    /// Whether the run drives the selection of documents to judge
    pub fn contributes(&self) -> bool {
        self.contributes
    }

    /// Depth up to which the run has been judged (min-max judging)
    pub fn judged_depth(&self) -> usize {
        self.judged_depth
    }

    pub(crate) fn set_judged_depth(&mut self, depth: usize) {
        self.judged_depth = depth;
    }

    /// The run's list for a query, in score order
    pub fn list(&self, q: QueryIndex) -> Option<&RankedList> {
        self.lists
            .get(q)
            .copied()
            .flatten()
            .map(|ix| &self.run.lists()[ix])
    }

    /// Number of ranks of a query taken into account
    pub fn judgeable_len(&self, q: QueryIndex) -> usize {
        self.judged.get(q).map(|j| j.len()).unwrap_or(0)
    }
}

fn check_relevance(relevance: Relevance) -> Result<()> {
    if relevance.is_finite() && relevance >= 0. {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "relevance must be non-negative, got {}",
            relevance
        )))
    }
}

/// Summary of the (weighted) residuals of the runs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub max: f64,
    pub max_run: Option<RunIndex>,
    pub num_judged: usize,
    pub num_relevant: f64,
    pub num_lacking: usize,
}

/// How the relevance of a judged document was obtained
#[derive(Clone, Copy, Debug, PartialEq)]
enum Assessment {
    Judged(Relevance),
    /// Missing from the qrels, replaced by a default relevance
    Lacking(Relevance),
    /// No relevance is known: only residuals shrink
    Unknown,
}

impl Assessment {
    fn relevance(&self) -> Option<Relevance> {
        match self {
            Assessment::Judged(rel) | Assessment::Lacking(rel) => Some(*rel),
            Assessment::Unknown => None,
        }
    }

    fn reported(&self) -> Relevance {
        match self {
            Assessment::Judged(rel) => *rel,
            _ => -1.,
        }
    }
}

struct SignificanceLog {
    writer: Box<dyn Write>,
    interval: usize,
    oracle: Box<dyn SignificanceOracle>,
    options: SignificanceOptions,
}

#[derive(Default)]
struct LogSinks {
    judgments: Option<Box<dyn Write>>,
    lacking: Option<Box<dyn Write>>,
    scores: Option<(Box<dyn Write>, usize)>,
    significance: Option<SignificanceLog>,
}

/// Score bounds of a set of runs under incremental judging
pub struct JudgmentErrorTracker {
    options: TrackerOptions,
    qids: StringInterner,
    queries: Vec<QueryInfo>,
    runs: Vec<RunInfo>,
    /// Credited score, runs × queries
    rbp: Array2<f64>,
    /// Residual, runs × queries
    err: Array2<f64>,
    rank_weights: Vec<f64>,
    occurrences: DocumentOccurrenceIndex,
    /// Judged (docid, query) pairs, with the relevance used (if any)
    judgments: CompositeKeyTable<Option<Relevance>>,
    num_judged: usize,
    num_relevant: f64,
    num_lacking: usize,
    /// Largest relevance used so far (at least 1)
    max_relevance: Relevance,
    qrels: Option<RelevanceTable>,
    sinks: LogSinks,
}

impl JudgmentErrorTracker {
    /// Creates a tracker assessing the given queries
    pub fn new<'a, I>(qids: I, options: TrackerOptions) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        check_persistence(options.persistence)?;
        if options.depth == 0 {
            return Err(Error::InvalidParameter("depth must be positive".to_string()));
        }
        check_relevance(options.relevance_if_unjudged)?;

        let mut interner = StringInterner::new();
        let mut queries = Vec::new();
        for qid in qids {
            let qid = qid.to_lowercase();
            if interner.lookup_id(&qid).is_none() {
                interner.get_id(&qid);
                queries.push(QueryInfo {
                    qid,
                    judged: 0,
                    rel: 0.,
                });
            }
        }
        if queries.is_empty() {
            return Err(Error::InvalidParameter("no query to assess".to_string()));
        }

        let num_queries = queries.len();
        Ok(Self {
            rank_weights: rbp_weights(options.persistence, options.depth),
            options,
            qids: interner,
            queries,
            runs: Vec::new(),
            rbp: Array2::zeros((0, num_queries)),
            err: Array2::zeros((0, num_queries)),
            occurrences: DocumentOccurrenceIndex::new(),
            judgments: CompositeKeyTable::new(),
            num_judged: 0,
            num_relevant: 0.,
            num_lacking: 0,
            max_relevance: 1.,
            qrels: None,
            sinks: LogSinks::default(),
        })
    }

    /// Creates a tracker assessing the queries of a qrels, which are
    /// then used by [Self::judge]
    pub fn from_qrels(qrels: RelevanceTable, options: TrackerOptions) -> Result<Self> {
        let mut tracker = Self::new(qrels.qids(), options)?;
        tracker.set_qrels(qrels);
        Ok(tracker)
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    pub fn set_qrels(&mut self, qrels: RelevanceTable) {
        self.qrels = Some(qrels);
    }

    pub fn qrels(&self) -> Option<&RelevanceTable> {
        self.qrels.as_ref()
    }

    /// Adds a run; its lists for queries that are not assessed are ignored
    pub fn add_run(&mut self, mut run: Run) -> Result<RunIndex> {
        if self.num_judged > 0 {
            return Err(Error::InvalidParameter(format!(
                "run '{}' added after judging started",
                run.runid()
            )));
        }
        let r = self.runs.len();
        run.sort(ScoreOrdering::Score);

        let num_queries = self.queries.len();
        let mut lists = vec![None; num_queries];
        let mut judged = vec![Vec::new(); num_queries];
        for (ix, list) in run.lists().iter().enumerate() {
            let q = match self.qids.lookup_id(&list.qid().to_lowercase()) {
                Some(q) => q,
                None => {
                    debug!("run {}: query {} is not assessed", run.runid(), list.qid());
                    continue;
                }
            };
            let depth = list.len().min(self.options.depth);
            for (rank, doc) in list.scores()[..depth].iter().enumerate() {
                self.occurrences.add(&doc.docid, q, r, rank);
            }
            lists[q] = Some(ix);
            judged[q] = vec![false; depth];
        }

        self.rbp.push_row(Array1::zeros(num_queries).view())?;
        self.err.push_row(Array1::ones(num_queries).view())?;
        debug!("added run {} ({} queries)", run.runid(), run.len());
        self.runs.push(RunInfo {
            run,
            rbp: 0.,
            err: 1.,
            contributes: true,
            judged_depth: 0,
            lists,
            judged,
        });
        Ok(r)
    }

    /// Marks a run as scored but not driving document selection
    pub fn set_run_noncontributing(&mut self, runid: &str) -> Result<()> {
        let run = self
            .runs
            .iter_mut()
            .find(|ri| ri.runid() == runid)
            .ok_or_else(|| Error::UnknownRun(runid.to_string()))?;
        run.contributes = false;
        Ok(())
    }

    /// Writes `qid docid relevance` for each judgment (-1 when unknown)
    pub fn log_judgments(&mut self, writer: Box<dyn Write>) {
        self.sinks.judgments = Some(writer);
    }

    /// Writes the occurrences of judged documents missing from the qrels
    pub fn log_lacking_judgments(&mut self, writer: Box<dyn Write>) {
        self.sinks.lacking = Some(writer);
    }

    /// Writes the run scores every `interval` judgments
    pub fn log_scores(&mut self, writer: Box<dyn Write>, interval: usize) {
        self.sinks.scores = Some((writer, interval.max(1)));
    }

    /// Writes the proportion of significant pairs every `interval`
    /// judgments
    pub fn log_significance(
        &mut self,
        writer: Box<dyn Write>,
        interval: usize,
        oracle: Box<dyn SignificanceOracle>,
        options: SignificanceOptions,
    ) {
        self.sinks.significance = Some(SignificanceLog {
            writer,
            interval: interval.max(1),
            oracle,
            options,
        });
    }

    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn num_judged(&self) -> usize {
        self.num_judged
    }

    pub fn num_relevant(&self) -> f64 {
        self.num_relevant
    }

    pub fn num_lacking(&self) -> usize {
        self.num_lacking
    }

    pub fn queries(&self) -> &[QueryInfo] {
        &self.queries
    }

    pub fn query_index(&self, qid: &str) -> Result<QueryIndex> {
        self.qids
            .lookup_id(&qid.to_lowercase())
            .ok_or_else(|| Error::UnknownQuery(qid.to_string()))
    }

    pub fn qid(&self, q: QueryIndex) -> &str {
        &self.queries[q].qid
    }

    pub fn runs(&self) -> &[RunInfo] {
        &self.runs
    }

    pub(crate) fn runs_mut(&mut self) -> &mut [RunInfo] {
        &mut self.runs
    }

    pub fn run_index(&self, runid: &str) -> Result<RunIndex> {
        self.runs
            .iter()
            .position(|ri| ri.runid() == runid)
            .ok_or_else(|| Error::UnknownRun(runid.to_string()))
    }

    /// Credited scores, runs × queries
    pub fn rbp_scores(&self) -> &Array2<f64> {
        &self.rbp
    }

    /// Residuals, runs × queries
    pub fn residuals(&self) -> &Array2<f64> {
        &self.err
    }

    /// Weight of each rank (up to the tracker's depth)
    pub fn rank_weights(&self) -> &[f64] {
        &self.rank_weights
    }

    pub fn occurrence_index(&self) -> &DocumentOccurrenceIndex {
        &self.occurrences
    }

    /// Where a document was retrieved for a query
    pub fn occurrences(&self, docid: &str, qid: &str) -> Option<&[Occurrence]> {
        let q = self.qids.lookup_id(&qid.to_lowercase())?;
        self.occurrences.get(&docid.to_lowercase(), q)
    }

    /// Whether the document at `rank` of a run's list has been judged
    pub fn is_judged(&self, run: RunIndex, q: QueryIndex, rank: Rank) -> bool {
        self.runs[run]
            .judged
            .get(q)
            .and_then(|j| j.get(rank))
            .copied()
            .unwrap_or(false)
    }

    /// Whether a (document, query) pair has been judged
    pub fn is_pair_judged(&self, docid: &str, q: QueryIndex) -> bool {
        self.judgments.get(docid, q).is_some()
    }

    /// Records the relevance of a document, returning whether judging
    /// should continue
    ///
    /// The relevance must be finite and non-negative. If writing to a
    /// log fails, the error is returned once the judgment is recorded.
    pub fn judged(&mut self, docid: &str, qid: &str, relevance: Relevance) -> Result<bool> {
        check_relevance(relevance)?;
        let q = self.query_index(qid)?;
        let docid = docid.to_lowercase();
        self.check_judgeable(&docid, q)?;
        self.apply(&docid, q, Assessment::Judged(relevance))
    }

    /// Judges a document using the attached qrels
    ///
    /// Without qrels, only the residuals are reduced. Documents missing
    /// from the qrels are counted as lacking and take the default
    /// relevance.
    pub fn judge(&mut self, docid: &str, qid: &str) -> Result<bool> {
        let q = self.query_index(qid)?;
        self.judge_query(&docid.to_lowercase(), q)
    }

    pub(crate) fn judge_query(&mut self, docid: &str, q: QueryIndex) -> Result<bool> {
        self.check_judgeable(docid, q)?;
        let assessment = match &self.qrels {
            None => Assessment::Unknown,
            Some(qrels) => match qrels.rel(&self.queries[q].qid, docid) {
                Rel::Judged(rel) => {
                    check_relevance(rel)?;
                    Assessment::Judged(rel)
                }
                Rel::Unjudged | Rel::UnknownQuery => {
                    Assessment::Lacking(self.options.relevance_if_unjudged)
                }
            },
        };
        self.apply(docid, q, assessment)
    }

    fn check_judgeable(&self, docid: &str, q: QueryIndex) -> Result<()> {
        if self.occurrences.get(docid, q).is_none() {
            return Err(Error::DocumentNotRetrieved {
                docid: docid.to_string(),
                qid: self.queries[q].qid.clone(),
            });
        }
        if self.judgments.get(docid, q).is_some() {
            return Err(Error::DuplicateJudgment {
                docid: docid.to_string(),
                qid: self.queries[q].qid.clone(),
            });
        }
        Ok(())
    }

    fn report_lacking(&mut self, docid: &str, q: QueryIndex) -> Result<()> {
        let qid = &self.queries[q].qid;
        let occurrences = self.occurrences.get(docid, q).unwrap_or(&[]);
        match self.sinks.lacking.as_mut() {
            Some(writer) => {
                write!(writer, "{} {}:", docid, qid)?;
                for o in occurrences {
                    write!(writer, " ({}, {})", self.runs[o.run].runid(), o.rank)?;
                }
                writeln!(writer)?;
            }
            None => warn!("Unjudged: {} {} ({} judged)", docid, qid, self.num_judged),
        }
        Ok(())
    }

    fn apply(&mut self, docid: &str, q: QueryIndex, assessment: Assessment) -> Result<bool> {
        self.record(docid, q, assessment);
        self.write_logs(docid, q, assessment)?;

        let mut finished = false;
        if self.options.stop_when_top_run_found && self.top_run_found() {
            finished = true;
            match self.sinks.scores.as_mut() {
                Some((writer, _)) => Self::write_scores(writer, self.num_judged, &self.runs)?,
                None => info!("Top run found after {} judgments", self.num_judged),
            }
        }
        if let Some(max) = self.options.max_judgments {
            if self.num_judged >= max {
                finished = true;
            }
        }
        Ok(!finished)
    }

    /// Updates the counters and bounds for a new judgment
    fn record(&mut self, docid: &str, q: QueryIndex, assessment: Assessment) {
        let num_queries = self.queries.len() as f64;
        let rel = assessment.relevance();

        if let Assessment::Lacking(_) = assessment {
            self.num_lacking += 1;
        }
        let query = &mut self.queries[q];
        query.judged += 1;
        if let Some(rel) = rel {
            query.rel += rel;
            if rel > 0. {
                self.num_relevant += rel;
            }
            self.max_relevance = self.max_relevance.max(rel);
        }
        *self.judgments.update(docid, q).0 = rel;

        let occurrences = self.occurrences.get(docid, q).unwrap_or(&[]);
        for o in occurrences {
            let wgt = self.rank_weights[o.rank];
            let ri = &mut self.runs[o.run];
            ri.judged[q][o.rank] = true;
            ri.err -= wgt / num_queries;
            self.err[[o.run, q]] -= wgt;
            if let Some(rel) = rel.filter(|r| *r > 0.) {
                ri.rbp += wgt * rel / num_queries;
                self.rbp[[o.run, q]] += wgt * rel;
            }
        }
        self.num_judged += 1;

        for o in occurrences {
            self.check_bounds(o.run, q);
        }
    }

    /// Credited scores cannot exceed the judged weight times the
    /// largest relevance, and residuals cannot be negative
    fn check_bounds(&self, r: RunIndex, q: QueryIndex) {
        let (rbp, err) = (self.rbp[[r, q]], self.err[[r, q]]);
        assert!(err >= -EPSILON, "negative residual {} (run {}, query {})", err, r, q);
        assert!(
            rbp <= self.max_relevance * (1. - err) + EPSILON,
            "score {} exceeds its judged weight (run {}, query {})",
            rbp,
            r,
            q
        );
        let ri = &self.runs[r];
        assert!(ri.err >= -EPSILON, "negative residual {} (run {})", ri.err, r);
        assert!(
            ri.rbp <= self.max_relevance * (1. - ri.err) + EPSILON,
            "score {} exceeds its judged weight (run {})",
            ri.rbp,
            r
        );
    }

    fn write_logs(&mut self, docid: &str, q: QueryIndex, assessment: Assessment) -> Result<()> {
        if let Some(writer) = self.sinks.judgments.as_mut() {
            let qid = &self.queries[q].qid;
            writeln!(writer, "{} {} {:.2}", qid, docid, assessment.reported())?;
        }
        if let Assessment::Lacking(_) = assessment {
            self.report_lacking(docid, q)?;
        }
        if let Some((writer, interval)) = self.sinks.scores.as_mut() {
            if self.num_judged % *interval == 0 {
                Self::write_scores(writer, self.num_judged, &self.runs)?;
            }
        }
        if let Some(mut log) = self.sinks.significance.take() {
            let result = if self.num_judged % log.interval == 0 {
                self.significance(
                    log.options.p_threshold,
                    log.options.proportion,
                    log.oracle.as_mut(),
                    log.options.mode,
                )
                .and_then(|fraction| {
                    writeln!(log.writer, "{} {:.4}", self.num_judged, fraction)?;
                    Ok(())
                })
            } else {
                Ok(())
            };
            self.sinks.significance = Some(log);
            result?;
        }
        Ok(())
    }

    fn write_scores(writer: &mut Box<dyn Write>, num_judged: usize, runs: &[RunInfo]) -> Result<()> {
        writeln!(writer, "# {} judged", num_judged)?;
        for ri in runs {
            writeln!(writer, "{} {:.4} +{:.4}", ri.runid(), ri.rbp, ri.err)?;
        }
        writeln!(writer)?;
        Ok(())
    }

    /// True if the run with the highest credited score cannot be
    /// overtaken by any other run, even if all its unjudged documents
    /// were relevant
    pub fn top_run_found(&self) -> bool {
        let mut max_base = 0.;
        let mut max_pos = 0;
        for (r, ri) in self.runs.iter().enumerate() {
            if ri.rbp > max_base {
                max_base = ri.rbp;
                max_pos = r;
            }
        }
        self.runs
            .iter()
            .enumerate()
            .filter(|(r, _)| *r != max_pos)
            .all(|(_, ri)| ri.rbp + ri.err < max_base)
    }

    /// Weight of the residual of a run, divided by the residual
    pub fn run_proportional_weight(&self, run: RunIndex, weighting: RunWeighting) -> f64 {
        let ri = &self.runs[run];
        weighting.proportional_weight(ri.rbp, ri.err)
    }

    /// Largest proportional weight over all runs, and the run having it
    pub fn max_proportional_weight(&self, weighting: RunWeighting) -> (f64, Option<RunIndex>) {
        let mut max = 0.;
        let mut max_run = None;
        for r in 0..self.runs.len() {
            let wgt = self.run_proportional_weight(r, weighting);
            if wgt > max {
                max = wgt;
                max_run = Some(r);
            }
        }
        (max, max_run)
    }

    pub fn query_weight(&self, q: QueryIndex, weighting: QueryWeighting) -> f64 {
        let query = &self.queries[q];
        weighting.weight(query.judged, query.rel)
    }

    /// Statistics of the run residuals
    pub fn stats(&self) -> ErrorStats {
        self.stats_weighted(RunWeighting::Uniform)
    }

    /// Statistics of the weighted run residuals
    pub fn stats_weighted(&self, weighting: RunWeighting) -> ErrorStats {
        let weights: Vec<f64> = self
            .runs
            .iter()
            .map(|ri| weighting.weight(ri.rbp, ri.err))
            .collect();
        let mut stats = ErrorStats {
            num_judged: self.num_judged,
            num_relevant: self.num_relevant,
            num_lacking: self.num_lacking,
            ..Default::default()
        };
        if weights.is_empty() {
            return stats;
        }

        let n = weights.len() as f64;
        stats.mean = weights.iter().sum::<f64>() / n;
        for (r, &w) in weights.iter().enumerate() {
            if w > stats.max {
                stats.max = w;
                stats.max_run = Some(r);
            }
        }
        stats.std_dev = (weights.iter().map(|w| (stats.mean - w).powi(2)).sum::<f64>() / n).sqrt();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::assert_about_eq;

    fn run(runid: &str, docs: &[(&str, &[&str])]) -> Run {
        let mut run = Run::new(runid);
        for (qid, docids) in docs {
            let list = run.list_or_create(qid);
            for (i, docid) in docids.iter().enumerate() {
                list.push(docid, i + 1, (docids.len() - i) as f64);
            }
        }
        run
    }

    fn tracker() -> JudgmentErrorTracker {
        let options = TrackerOptions {
            persistence: 0.5,
            ..Default::default()
        };
        let mut tracker = JudgmentErrorTracker::new(["1", "2"], options).unwrap();
        tracker
            .add_run(run("a", &[("1", &["d1", "d2"]), ("2", &["d3"])]))
            .unwrap();
        tracker
            .add_run(run("b", &[("1", &["d2", "d1"]), ("3", &["d9"])]))
            .unwrap();
        tracker
    }

    #[test]
    fn test_defaults() {
        let options = TrackerOptions::default();
        assert_eq!(options.persistence, 0.95);
        assert_eq!(options.depth, 10000);
        assert_eq!(options.max_judgments, None);
        assert!(!options.stop_when_top_run_found);
    }

    #[test]
    fn test_judged_updates_bounds() {
        let mut tracker = tracker();
        assert!(tracker.judged("d1", "1", 1.).unwrap());

        // a: rank 0 (0.5), b: rank 1 (0.25)
        assert_about_eq!(tracker.rbp_scores()[[0, 0]], 0.5);
        assert_about_eq!(tracker.residuals()[[0, 0]], 0.5);
        assert_about_eq!(tracker.rbp_scores()[[1, 0]], 0.25);
        assert_about_eq!(tracker.residuals()[[1, 0]], 0.75);
        assert_about_eq!(tracker.runs()[0].rbp(), 0.25);
        assert_about_eq!(tracker.runs()[0].err(), 0.75);
        assert!(tracker.is_judged(0, 0, 0));
        assert!(tracker.is_judged(1, 0, 1));
        assert!(!tracker.is_judged(1, 0, 0));
        assert_eq!(tracker.queries()[0].judged(), 1);
        assert_eq!(tracker.num_relevant(), 1.);
    }

    #[test]
    fn test_judgment_errors() {
        let mut tracker = tracker();
        tracker.judged("d1", "1", 0.).unwrap();
        assert!(matches!(
            tracker.judged("D1", "1", 1.),
            Err(Error::DuplicateJudgment { .. })
        ));
        assert!(matches!(
            tracker.judged("d3", "1", 1.),
            Err(Error::DocumentNotRetrieved { .. })
        ));
        assert!(matches!(
            tracker.judged("d9", "3", 1.),
            Err(Error::UnknownQuery(_))
        ));
        assert_eq!(tracker.num_judged(), 1);
    }

    #[test]
    fn test_qrels_and_logs() {
        let mut qrels = RelevanceTable::new();
        qrels.insert("1", "d1", 1., true);
        qrels.insert("2", "d3", 0., true);
        let mut tracker = JudgmentErrorTracker::from_qrels(
            qrels,
            TrackerOptions {
                persistence: 0.5,
                relevance_if_unjudged: 1.,
                max_judgments: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        tracker.add_run(run("a", &[("1", &["d1", "d2"]), ("2", &["d3"])])).unwrap();

        let (writer, buffer) = shared_buffer();
        tracker.log_judgments(writer);
        assert!(tracker.judge("d1", "1").unwrap());
        assert!(tracker.judge("d2", "1").unwrap());
        assert!(!tracker.judge("d3", "2").unwrap());
        assert_eq!(tracker.num_lacking(), 1);
        // The lacking document got the default relevance
        assert_about_eq!(tracker.rbp_scores()[[0, 0]], 0.75);
        assert_eq!(
            String::from_utf8(buffer.borrow().clone()).unwrap(),
            "1 d1 1.00\n1 d2 -1.00\n2 d3 0.00\n"
        );
    }

    #[test]
    fn test_stop_when_top_run_found() {
        let options = TrackerOptions {
            persistence: 0.5,
            stop_when_top_run_found: true,
            ..Default::default()
        };
        let mut tracker = JudgmentErrorTracker::new(["1"], options).unwrap();
        tracker.add_run(run("a", &[("1", &["r1", "r2"])])).unwrap();
        tracker.add_run(run("b", &[("1", &["n1", "r2"])])).unwrap();
        tracker.add_run(run("c", &[("1", &["n2", "n3"])])).unwrap();

        assert!(tracker.judged("r1", "1", 1.).unwrap());
        assert!(tracker.judged("n1", "1", 0.).unwrap());
        assert!(tracker.judged("n2", "1", 0.).unwrap());
        // a: 0.75 with 0.25 left; b: 0.25 with 0.25 left; c: 0 with 0.5 left
        assert!(!tracker.judged("r2", "1", 1.).unwrap());
        assert!(tracker.top_run_found());
    }

    #[test]
    fn test_stats() {
        let mut tracker = tracker();
        tracker.judged("d1", "1", 1.).unwrap();
        let stats = tracker.stats();
        // residuals: a 0.75, b 0.875
        assert_about_eq!(stats.mean, 0.8125);
        assert_about_eq!(stats.std_dev, 0.0625);
        assert_eq!(stats.max_run, Some(1));
        assert_eq!(stats.num_judged, 1);

        let (max, max_run) = tracker.max_proportional_weight(RunWeighting::Uniform);
        assert_about_eq!(max, 1.);
        assert!(max_run.is_some());
        assert_about_eq!(tracker.query_weight(0, QueryWeighting::Linear), 1.01);
    }

    #[test]
    fn test_noncontributing() {
        let mut tracker = tracker();
        tracker.set_run_noncontributing("b").unwrap();
        assert!(!tracker.runs()[1].contributes());
        assert!(matches!(
            tracker.set_run_noncontributing("z"),
            Err(Error::UnknownRun(_))
        ));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failing_judgment_log() {
        let mut tracker = tracker();
        tracker.log_judgments(Box::new(FailingWriter));
        assert!(matches!(tracker.judged("d1", "1", 1.), Err(Error::Io(_))));

        // The judgment is recorded once, and only once
        assert_eq!(tracker.num_judged(), 1);
        assert_eq!(tracker.queries()[0].judged(), 1);
        assert_eq!(tracker.num_relevant(), 1.);
        assert!(tracker.is_pair_judged("d1", 0));
        assert_about_eq!(tracker.residuals()[[0, 0]], 0.5);
        assert!(matches!(
            tracker.judged("d1", "1", 1.),
            Err(Error::DuplicateJudgment { .. })
        ));
        assert_eq!(tracker.queries()[0].judged(), 1);
    }

    #[test]
    fn test_failing_lacking_log() {
        let mut tracker = tracker();
        tracker.set_qrels(RelevanceTable::new());
        tracker.log_lacking_judgments(Box::new(FailingWriter));
        assert!(matches!(tracker.judge("d2", "1"), Err(Error::Io(_))));
        assert_eq!(tracker.num_lacking(), 1);
        assert_eq!(tracker.num_judged(), 1);
        assert_eq!(tracker.queries()[0].judged(), 1);
        assert!(matches!(
            tracker.judge("d2", "1"),
            Err(Error::DuplicateJudgment { .. })
        ));
        assert_eq!(tracker.num_lacking(), 1);
    }

    #[test]
    fn test_invalid_relevance() {
        let mut tracker = tracker();
        for relevance in [-3., f64::NAN, f64::INFINITY] {
            assert!(matches!(
                tracker.judged("d1", "1", relevance),
                Err(Error::InvalidParameter(_))
            ));
        }
        assert_eq!(tracker.num_judged(), 0);
        assert_eq!(tracker.queries()[0].judged(), 0);
        assert_about_eq!(tracker.query_weight(0, QueryWeighting::Linear), 1.01);
        assert!(!tracker.is_pair_judged("d1", 0));

        let options = TrackerOptions {
            relevance_if_unjudged: -1.,
            ..Default::default()
        };
        assert!(JudgmentErrorTracker::new(["1"], options).is_err());
    }

    #[test]
    fn test_graded_relevance() {
        let mut tracker = tracker();
        tracker.judged("d1", "1", 5.).unwrap();
        // Scores are bounded by the judged weight times the relevance
        assert_about_eq!(tracker.rbp_scores()[[0, 0]], 2.5);
        assert_about_eq!(tracker.rbp_scores()[[1, 0]], 1.25);
        assert_about_eq!(tracker.query_weight(0, QueryWeighting::Linear), 5.01);
    }

    #[test]
    #[should_panic(expected = "negative residual")]
    fn test_negative_residual_aborts() {
        let mut tracker = tracker();
        tracker.err[[0, 0]] = -0.5;
        tracker.check_bounds(0, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds its judged weight")]
    fn test_excess_score_aborts() {
        let mut tracker = tracker();
        tracker.rbp[[0, 0]] = 0.9;
        tracker.check_bounds(0, 0);
    }

    pub(crate) fn shared_buffer() -> (Box<dyn Write>, std::rc::Rc<std::cell::RefCell<Vec<u8>>>) {
        struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let buffer = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        (Box::new(Shared(buffer.clone())), buffer)
    }
}
