use std::collections::HashMap;

use super::SignificanceOracle;

/// Exact one-tailed Wilcoxon signed-rank test
///
/// Tied absolute differences receive their mean rank, and a fractional
/// W+ statistic is rounded up. The distributions of outcomes are
/// cached per sample size for the lifetime of the test.
#[derive(Debug, Default)]
pub struct WilcoxonTest {
    outcomes: HashMap<usize, Vec<f64>>,
}

impl WilcoxonTest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probability of each value of W+ under the null hypothesis, for
    /// `n` non-zero differences
    ///
    /// Counts are halved with each rank, so that large samples do not
    /// overflow.
    fn outcomes(&mut self, n: usize) -> &[f64] {
        self.outcomes.entry(n).or_insert_with(|| {
            let max = n * (n + 1) / 2;
            let mut table = vec![0.; max + 1];
            table[0] = 1.;
            let mut current_max = 0;
            for rank in 1..=n {
                // Going downwards so that each rank is used at most once
                for i in (0..=current_max).rev() {
                    table[i + rank] += table[i];
                }
                current_max += rank;
                for v in table[..=current_max].iter_mut() {
                    *v *= 0.5;
                }
            }
            table
        })
    }
}

impl SignificanceOracle for WilcoxonTest {
    fn p_value(&mut self, a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        let mut diffs: Vec<f64> = a
            .iter()
            .zip(b.iter())
            .filter(|(x, y)| x != y)
            .map(|(x, y)| x - y)
            .collect();
        let n = diffs.len();
        if n == 0 {
            return 1.;
        }
        diffs.sort_by(|x, y| x.abs().total_cmp(&y.abs()));

        let mut w_plus = 0.;
        let mut i = 0;
        while i < n {
            let abs_diff = diffs[i].abs();
            let mut j = i + 1;
            while j < n && diffs[j].abs() == abs_diff {
                j += 1;
            }
            let mean_rank = (i + j + 1) as f64 / 2.;
            w_plus += mean_rank * diffs[i..j].iter().filter(|d| **d > 0.).count() as f64;
            i = j;
        }

        let table = self.outcomes(n);
        table[(w_plus.ceil() as usize).min(table.len())..]
            .iter()
            .sum::<f64>()
            .min(1.)
    }

    fn name(&self) -> &'static str {
        "wilcoxon"
    }
}
