use rand::{self, RngCore};
use rand_distr::{Distribution, Normal, Poisson};
use std::cmp::min;

use rbp_eval::run::Run;

/// Identifier of the `ix`-th document of a query pool
pub fn docid(qid: &str, ix: usize) -> String {
    format!("{}-d{}", qid, ix)
}

/// Creates a run retrieving documents from per-query pools
///
/// For each query, the list length follows a Poisson distribution
/// (capped at `max_depth`), documents being sampled without replacement
/// from the first `pool_size` documents of the query. Scores are
/// strictly decreasing.
pub fn create_run(
    runid: &str,
    qids: &[String],
    lambda_depth: f64,
    max_depth: usize,
    pool_size: usize,
    rng: &mut dyn RngCore,
) -> Run {
    let poi = Poisson::new(lambda_depth).unwrap();
    let normal = Normal::<f64>::new(1., 0.5).unwrap();
    let mut run = Run::new(runid);

    for qid in qids.iter() {
        let depth = min(1 + poi.sample(rng) as usize, min(max_depth, pool_size));
        let doc_ixs = rand::seq::index::sample(rng, pool_size, depth).into_vec();

        let list = run.list_or_create(qid);
        let mut score = 100.;
        for (rank, ix) in doc_ixs.iter().enumerate() {
            list.push(&docid(qid, *ix), rank + 1, score);
            score -= normal.sample(rng).abs() + 1e-3;
        }
    }
    run
}
