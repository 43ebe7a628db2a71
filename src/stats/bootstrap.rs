use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::SignificanceOracle;

pub const BOOTSTRAP_NUM_TRIALS: usize = 1000;

/// Paired bootstrap test
///
/// The differences are centred on zero (the null hypothesis) and
/// resampled with replacement; the p-value is the proportion of
/// resampled means reaching the observed mean difference. Counting ties
/// gives p = 1 for identical distributions.
#[derive(Debug)]
pub struct BootstrapTest {
    rng: StdRng,
    num_trials: usize,
}

impl BootstrapTest {
    pub fn new(seed: u64, num_trials: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            num_trials,
        }
    }
}

impl Default for BootstrapTest {
    fn default() -> Self {
        Self::new(0, BOOTSTRAP_NUM_TRIALS)
    }
}

impl SignificanceOracle for BootstrapTest {
    fn p_value(&mut self, a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        let n = a.len();
        if n == 0 {
            return 1.;
        }
        let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
        let mean_diff = diffs.iter().sum::<f64>() / n as f64;
        let centred: Vec<f64> = diffs.iter().map(|d| d - mean_diff).collect();

        let mut count = 0;
        for _ in 0..self.num_trials {
            let total: f64 = (0..n).map(|_| centred[self.rng.gen_range(0..n)]).sum();
            if total / n as f64 >= mean_diff {
                count += 1;
            }
        }
        count as f64 / self.num_trials as f64
    }

    fn name(&self) -> &'static str {
        "bootstrap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap() {
        let mut test = BootstrapTest::new(42, 1000);
        let a = [0.9, 0.8, 0.85, 0.7, 0.95, 0.75, 0.8, 0.9];
        let b = [0.1, 0.2, 0.15, 0.3, 0.05, 0.25, 0.2, 0.1];
        assert!(test.p_value(&a, &b) < 0.05);
        assert!(test.p_value(&b, &a) > 0.95);
        assert_eq!(test.p_value(&a, &a), 1.);
    }
}
