use std::fs::File;
use std::path::PathBuf;

use ntest::assert_about_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use temp_dir::TempDir;

use crate::runs::{create_run, docid};
use rbp_eval::formats::{write_qrels, write_run};
use rbp_eval::qrels::RelevanceTable;
use rbp_eval::rbp::{evaluate_run, RbpScorer, FULL_DEPTH};
use rbp_eval::run::{Run, ScoreOrdering};
use rbp_eval::tracker::JudgmentErrorTracker;

/// Synthetic runs and judgments, also written to a temporary directory
pub struct TestCollection {
    pub dir: TempDir,
    pub qids: Vec<String>,
    pub runs: Vec<Run>,
    pub qrels: RelevanceTable,
    pub run_paths: Vec<PathBuf>,
    pub qrels_path: PathBuf,
}

impl TestCollection {
    pub fn new(
        num_runs: usize,
        num_queries: usize,
        pool_size: usize,
        lambda_depth: f64,
        max_depth: usize,
        seed: Option<u64>,
    ) -> Self {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let mut rng = if let Some(seed) = seed {
            StdRng::seed_from_u64(seed)
        } else {
            StdRng::from_entropy()
        };

        let qids: Vec<String> = (1..=num_queries).map(|q| q.to_string()).collect();

        // Documents near the top of the pools are more often relevant
        let mut qrels = RelevanceTable::new();
        for qid in qids.iter() {
            for ix in 0..pool_size {
                let p = 0.5 * (1. - ix as f64 / pool_size as f64);
                let rel = if rng.gen_bool(p) { 1. } else { 0. };
                qrels.insert(qid, &docid(qid, ix), rel, true);
            }
        }
        let qrels_path = dir.child("qrels.txt");
        let file = File::create(&qrels_path).expect("Could not create qrels file");
        write_qrels(&qrels, file).expect("Error while writing qrels");

        let mut runs = Vec::new();
        let mut run_paths = Vec::new();
        for r in 0..num_runs {
            let mut run = create_run(
                &format!("run{}", r),
                &qids,
                lambda_depth,
                max_depth,
                pool_size,
                &mut rng,
            );
            let path = dir.child(format!("run{}.txt", r));
            let file = File::create(&path).expect("Could not create run file");
            write_run(&mut run, file).expect("Error while writing run");
            runs.push(run);
            run_paths.push(path);
        }

        Self {
            dir,
            qids,
            runs,
            qrels,
            run_paths,
            qrels_path,
        }
    }
}

/// Checks that the tracker bounds match the batch evaluation of the
/// runs at full depth
pub fn check_tracker_bounds(
    tracker: &JudgmentErrorTracker,
    runs: &mut [Run],
    qrels: &RelevanceTable,
    eps: f64,
) {
    let persist = tracker.options().persistence;
    let scorer = RbpScorer::new(&[persist], ScoreOrdering::Score).unwrap();
    for (r, run) in runs.iter_mut().enumerate() {
        let evaluation = evaluate_run(run, qrels, &scorer, &[FULL_DEPTH]).unwrap();
        for result in evaluation.queries.iter() {
            let q = tracker.query_index(&result.qid).unwrap();
            let value = &result.depths[0].values[0];
            assert_about_eq!(tracker.rbp_scores()[[r, q]], value.score, eps);
            assert_about_eq!(tracker.residuals()[[r, q]], value.residual, eps);
        }
    }
}
