//! Basic types shared by the scoring and judging modules

/// Dense identifier of a run (its position in the tracker)
pub type RunIndex = usize;

/// Dense identifier of a query (given by the query interner)
pub type QueryIndex = usize;

/// 0-based position in a ranking
pub type Rank = usize;

/// Graded relevance (after adjustment by the relevance mode)
pub type Relevance = f64;

/// Tolerance absorbing floating point drift in weight accounting
pub const EPSILON: f64 = 1e-10;

/// Marks object that have a length
pub trait Len {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Weight of the 0-indexed rank `rank` for persistence `persist`,
/// that is `(1 - p) p^rank`
#[inline]
pub fn rbp_weight(persist: f64, rank: Rank) -> f64 {
    (1. - persist) * persist.powi(rank as i32)
}

/// Fills the weights of ranks `0..depth`
///
/// Weights are computed by successive multiplication so that the
/// table stays consistent with the incremental scorer.
pub fn rbp_weights(persist: f64, depth: usize) -> Vec<f64> {
    let mut weights = Vec::with_capacity(depth);
    let mut wgt = 1. - persist;
    for _ in 0..depth {
        weights.push(wgt);
        wgt *= persist;
    }
    weights
}

/// Checks that a persistence value lies in the open interval (0, 1)
pub fn check_persistence(persist: f64) -> crate::error::Result<()> {
    if persist > 0. && persist < 1. {
        Ok(())
    } else {
        Err(crate::error::Error::InvalidParameter(format!(
            "persistence {} not in range (0, 1)",
            persist
        )))
    }
}
