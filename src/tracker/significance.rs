use std::str::FromStr;

use derivative::Derivative;
use log::debug;
use ndarray::{Array1, Array2};

use super::{projected_rbp, JudgmentErrorTracker};
use crate::base::{QueryIndex, RunIndex};
use crate::error::{Error, Result};
use crate::stats::SignificanceOracle;

/// How the distribution of the lower-ranked run is built
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignificanceMode {
    /// Credited scores of both runs
    Base,
    /// Credited score plus residual for the lower-ranked run
    Conservative,
    /// Projected score for the lower-ranked run
    Projected,
    /// Unjudged documents retrieved higher by the lower-ranked run are
    /// counted as relevant for both runs, and the rest of its residual
    /// as relevant for it only
    #[default]
    Pessimal,
}

impl FromStr for SignificanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "base" => Ok(SignificanceMode::Base),
            "conservative" => Ok(SignificanceMode::Conservative),
            "projected" => Ok(SignificanceMode::Projected),
            "pessimal" => Ok(SignificanceMode::Pessimal),
            _ => Err(Error::InvalidParameter(format!(
                "unknown significance mode '{}'",
                s
            ))),
        }
    }
}

#[derive(Derivative, Clone, Copy, Debug)]
#[derivative(Default)]
pub struct SignificanceOptions {
    /// Pairs with a p-value below this threshold are significant
    #[derivative(Default(value = "0.05"))]
    pub p_threshold: f64,

    /// Proportion of the best runs compared
    #[derivative(Default(value = "1."))]
    pub proportion: f64,

    #[derivative(Default(value = "SignificanceMode::Pessimal"))]
    pub mode: SignificanceMode,
}

impl JudgmentErrorTracker {
    /// Runs sorted by decreasing credited score
    fn runs_by_score(&self) -> Vec<RunIndex> {
        let mut order: Vec<RunIndex> = (0..self.runs.len()).collect();
        order.sort_by(|a, b| self.runs[*b].rbp.total_cmp(&self.runs[*a].rbp));
        order
    }

    /// Proportion of significantly different pairs among the top runs
    ///
    /// Runs are sorted by decreasing score, and each of the
    /// `round(n * proportion)` best runs is tested against the runs
    /// below it. Returns 0 when there is no pair to compare.
    pub fn significance(
        &self,
        p_threshold: f64,
        proportion: f64,
        oracle: &mut dyn SignificanceOracle,
        mode: SignificanceMode,
    ) -> Result<f64> {
        if !(proportion > 0. && proportion <= 1.) {
            return Err(Error::InvalidParameter(format!(
                "proportion {} is not in (0, 1]",
                proportion
            )));
        }
        let num_runs = self.runs.len();
        let top = ((num_runs as f64 * proportion + 0.5) as usize).min(num_runs);
        let sorted = self.runs_by_score();

        let mut pairs = 0;
        let mut significant = 0;
        for i in 0..top {
            let a = sorted[i];
            let others = &sorted[i + 1..top];
            pairs += others.len();
            if mode == SignificanceMode::Pessimal {
                significant += self.pessimal_pairs(p_threshold, a, others, oracle);
                continue;
            }

            let rbp_a = self.rbp.row(a);
            for &b in others {
                let dist_b: Array1<f64> = match mode {
                    SignificanceMode::Base | SignificanceMode::Pessimal => {
                        self.rbp.row(b).to_owned()
                    }
                    SignificanceMode::Conservative => &self.rbp.row(b) + &self.err.row(b),
                    SignificanceMode::Projected => {
                        ndarray::Zip::from(self.rbp.row(b))
                            .and(self.err.row(b))
                            .map_collect(|base, err| projected_rbp(*base, *err))
                    }
                };
                let p = oracle.p_value(&rbp_a.to_vec(), &dist_b.to_vec());
                if p < p_threshold {
                    significant += 1;
                }
            }
        }

        debug!(
            "{} significant pairs out of {} ({})",
            significant,
            pairs,
            oracle.name()
        );
        if pairs == 0 {
            return Ok(0.);
        }
        Ok(significant as f64 / pairs as f64)
    }

    /// Number of runs of `others` from which `a` is significantly
    /// better under the pessimal assumption
    fn pessimal_pairs(
        &self,
        p_threshold: f64,
        a: RunIndex,
        others: &[RunIndex],
        oracle: &mut dyn SignificanceOracle,
    ) -> usize {
        if others.is_empty() {
            return 0;
        }
        let num_queries = self.queries.len();
        let mut b_index = vec![None; self.runs.len()];
        for (i, &b) in others.iter().enumerate() {
            b_index[b] = Some(i);
        }

        let mut rbp_a = Array2::<f64>::zeros((others.len(), num_queries));
        let mut rbp_b = Array2::<f64>::zeros((others.len(), num_queries));
        let mut err_b = Array2::<f64>::zeros((others.len(), num_queries));
        for (i, &b) in others.iter().enumerate() {
            rbp_a.row_mut(i).assign(&self.rbp.row(a));
            rbp_b.row_mut(i).assign(&self.rbp.row(b));
            err_b.row_mut(i).assign(&self.err.row(b));
        }

        for q in 0..num_queries {
            self.redistribute(a, q, &b_index, &mut rbp_a, &mut rbp_b, &mut err_b);
            for i in 0..others.len() {
                rbp_b[[i, q]] += err_b[[i, q]];
            }
        }

        (0..others.len())
            .filter(|&i| {
                let dist_a = rbp_a.row(i).to_vec();
                let dist_b = rbp_b.row(i).to_vec();
                oracle.p_value(&dist_a, &dist_b) < p_threshold
            })
            .count()
    }

    /// Walks the unjudged documents of `a` for query `q`, moving the
    /// residual weight of the compared runs into their scores
    fn redistribute(
        &self,
        a: RunIndex,
        q: QueryIndex,
        b_index: &[Option<usize>],
        rbp_a: &mut Array2<f64>,
        rbp_b: &mut Array2<f64>,
        err_b: &mut Array2<f64>,
    ) {
        let run_a = &self.runs[a];
        let list = match run_a.list(q) {
            Some(list) => list,
            None => return,
        };
        for (d, doc) in list.scores()[..run_a.judgeable_len(q)].iter().enumerate() {
            if run_a.judged[q][d] {
                continue;
            }
            let a_wgt = self.rank_weights[d];
            let occurrences = self.occurrences.get(&doc.docid, q).unwrap_or(&[]);
            for o in occurrences {
                let i = match b_index[o.run] {
                    Some(i) => i,
                    None => continue,
                };
                let b_wgt = self.rank_weights[o.rank];
                err_b[[i, q]] -= b_wgt;
                if a_wgt < b_wgt {
                    rbp_b[[i, q]] += b_wgt;
                    rbp_a[[i, q]] += a_wgt;
                }
            }
        }
    }
}
