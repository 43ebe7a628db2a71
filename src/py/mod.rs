use log::debug;
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::{pyclass, pyfunction, pymethods, pymodule, types::PyModule, wrap_pyfunction, Py, PyErr, PyResult, Python};

use crate::error::Error;
use crate::formats::{load_qrels_file, load_run_file};
use crate::judging::{judge_weighted, WeightedJudgingOptions};
use crate::qrels::RelevanceTable;
use crate::rbp::{evaluate_run, QueryResult, RbpScorer};
use crate::run::ScoreOrdering;
use crate::stats::oracle_by_name;
use crate::tracker::{JudgmentErrorTracker, TrackerOptions};

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => PyIOError::new_err(e.to_string()),
            e => PyValueError::new_err(e.to_string()),
        }
    }
}

/// (qid, depth, num_rel_ret, persistence, score, residual)
type EvaluationRow = (String, usize, f64, f64, f64, f64);

fn rows(result: &QueryResult, out: &mut Vec<EvaluationRow>) {
    for depth in result.depths.iter() {
        for value in depth.values.iter() {
            out.push((
                result.qid.clone(),
                depth.depth,
                depth.num_rel_ret,
                value.persist,
                value.score,
                value.residual,
            ));
        }
    }
}

/// Evaluates a run file, returning one row per query, depth and
/// persistence (the last rows are the averages, with qid "all")
#[pyfunction]
#[pyo3(signature = (run_path, qrels_path, persist, depths, ordering="score"))]
fn evaluate(
    run_path: &str,
    qrels_path: &str,
    persist: Vec<f64>,
    depths: Vec<usize>,
    ordering: &str,
) -> PyResult<Vec<EvaluationRow>> {
    let mut run = load_run_file(run_path, None)?;
    let qrels = load_qrels_file(qrels_path)?;
    let scorer = RbpScorer::new(&persist, ordering.parse::<ScoreOrdering>()?)?;
    let evaluation = evaluate_run(&mut run, &qrels, &scorer, &depths)?;

    let mut out = Vec::new();
    for result in evaluation.queries.iter() {
        rows(result, &mut out);
    }
    rows(&evaluation.average, &mut out);
    Ok(out)
}

#[pyclass(unsendable, name = "JudgmentTracker")]
pub struct PyJudgmentTracker {
    tracker: JudgmentErrorTracker,
}

#[pymethods]
impl PyJudgmentTracker {
    /// Creates a tracker over the queries of a qrels file (used to judge
    /// documents), or over a list of query IDs
    #[new]
    #[pyo3(signature = (qrels_path=None, qids=None, persistence=0.95, depth=10000, max_judgments=None, stop_when_top_run_found=false, relevance_if_unjudged=0.))]
    fn new(
        qrels_path: Option<&str>,
        qids: Option<Vec<String>>,
        persistence: f64,
        depth: usize,
        max_judgments: Option<usize>,
        stop_when_top_run_found: bool,
        relevance_if_unjudged: f64,
    ) -> PyResult<Self> {
        let options = TrackerOptions {
            persistence,
            depth,
            max_judgments,
            stop_when_top_run_found,
            relevance_if_unjudged,
        };
        let qrels: Option<RelevanceTable> = qrels_path.map(load_qrels_file).transpose()?;
        let tracker = match (qrels, qids) {
            (Some(qrels), None) => JudgmentErrorTracker::from_qrels(qrels, options)?,
            (qrels, Some(qids)) => {
                let mut tracker =
                    JudgmentErrorTracker::new(qids.iter().map(|s| s.as_str()), options)?;
                if let Some(qrels) = qrels {
                    tracker.set_qrels(qrels);
                }
                tracker
            }
            (None, None) => {
                return Err(PyValueError::new_err(
                    "either a qrels file or query IDs are required",
                ))
            }
        };
        Ok(Self { tracker })
    }

    /// Adds a run file, returning its index
    fn add_run_file(&mut self, path: &str) -> PyResult<usize> {
        let run = load_run_file(path, None)?;
        Ok(self.tracker.add_run(run)?)
    }

    fn set_run_noncontributing(&mut self, runid: &str) -> PyResult<()> {
        Ok(self.tracker.set_run_noncontributing(runid)?)
    }

    /// Records a judgment, returning whether judging should continue
    fn judged(&mut self, docid: &str, qid: &str, relevance: f64) -> PyResult<bool> {
        Ok(self.tracker.judged(docid, qid, relevance)?)
    }

    /// Judges a document with the qrels
    fn judge(&mut self, docid: &str, qid: &str) -> PyResult<bool> {
        Ok(self.tracker.judge(docid, qid)?)
    }

    /// Returns (mean, std_dev, max, max_run, num_judged, num_relevant)
    #[pyo3(signature = (weighting="uniform"))]
    fn stats(&self, weighting: &str) -> PyResult<(f64, f64, f64, Option<usize>, usize, f64)> {
        let stats = self.tracker.stats_weighted(weighting.parse()?);
        Ok((
            stats.mean,
            stats.std_dev,
            stats.max,
            stats.max_run,
            stats.num_judged,
            stats.num_relevant,
        ))
    }

    #[pyo3(signature = (p_threshold=0.05, proportion=1., oracle="wilcoxon", mode="pessimal"))]
    fn significance(
        &self,
        p_threshold: f64,
        proportion: f64,
        oracle: &str,
        mode: &str,
    ) -> PyResult<f64> {
        let mut oracle = oracle_by_name(oracle)?;
        Ok(self
            .tracker
            .significance(p_threshold, proportion, oracle.as_mut(), mode.parse()?)?)
    }

    fn runids(&self) -> Vec<String> {
        self.tracker
            .runs()
            .iter()
            .map(|ri| ri.runid().to_string())
            .collect()
    }

    /// Credited scores and residuals (runs × queries)
    fn run_scores(&self, py: Python<'_>) -> (Py<PyArray2<f64>>, Py<PyArray2<f64>>) {
        let rbp = self.tracker.rbp_scores().clone().into_pyarray(py);
        let err = self.tracker.residuals().clone().into_pyarray(py);
        (rbp.into(), err.into())
    }

    /// Judges documents with the largest weighted error, returning the
    /// number of judgments and whether the tracker asked to stop
    #[pyo3(signature = (run_weighting="uniform", query_weighting="uniform", progress=false))]
    fn judge_weighted(
        &mut self,
        run_weighting: &str,
        query_weighting: &str,
        progress: bool,
    ) -> PyResult<(usize, bool)> {
        let options = WeightedJudgingOptions {
            run_weighting: run_weighting.parse()?,
            query_weighting: query_weighting.parse()?,
            progress,
            ..Default::default()
        };
        let outcome = judge_weighted(&mut self.tracker, &options)?;
        Ok((outcome.judgments, outcome.stopped_early))
    }
}

/// RBP evaluation and adaptive judging
#[pymodule]
fn rbp_eval(_py: Python, module: &PyModule) -> PyResult<()> {
    // Init logging
    pyo3_log::init();
    debug!("Loading rbp-eval extension");

    module.add_function(wrap_pyfunction!(evaluate, module)?)?;
    module.add_class::<PyJudgmentTracker>()?;
    Ok(())
}
