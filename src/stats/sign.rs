use super::SignificanceOracle;

/// Probability of at least `successes` successes out of `trials`
/// Bernoulli trials of probability `probability`
///
/// Terms are computed in log space to stay finite for large numbers of
/// trials.
pub fn cumulative_binomial_p(trials: usize, successes: usize, probability: f64) -> f64 {
    assert!(successes <= trials);
    assert!((0. ..=1.).contains(&probability));
    if successes == 0 {
        return 1.;
    }
    if probability == 0. {
        return 0.;
    }
    if probability == 1. {
        return 1.;
    }

    // ln C(trials, successes)
    let ln_choose: f64 = (1..=successes)
        .map(|i| ((trials - successes + i) as f64 / i as f64).ln())
        .sum();
    let ln_p = probability.ln();
    let ln_q = (1. - probability).ln();
    let mut term = (ln_choose
        + successes as f64 * ln_p
        + (trials - successes) as f64 * ln_q)
        .exp();
    let ratio = probability / (1. - probability);

    let mut total = 0.;
    for k in successes..=trials {
        total += term;
        term *= ratio * (trials - k) as f64 / (k + 1) as f64;
    }
    total.min(1.)
}

/// Sign test: counts the queries where `a` beats `b`, ignoring ties
#[derive(Clone, Copy, Debug, Default)]
pub struct SignTest;

impl SignificanceOracle for SignTest {
    fn p_value(&mut self, a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        let mut greater = 0;
        let mut not_equal = 0;
        for (x, y) in a.iter().zip(b.iter()) {
            if x > y {
                greater += 1;
            }
            if x != y {
                not_equal += 1;
            }
        }
        cumulative_binomial_p(not_equal, greater, 0.5)
    }

    fn name(&self) -> &'static str {
        "sign"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::assert_about_eq;

    #[test]
    fn test_binomial() {
        assert_about_eq!(cumulative_binomial_p(0, 0, 0.5), 1.);
        assert_about_eq!(cumulative_binomial_p(3, 3, 0.5), 0.125);
        assert_about_eq!(cumulative_binomial_p(3, 2, 0.5), 0.5);
        assert_about_eq!(cumulative_binomial_p(10, 8, 0.5), 56. / 1024.);
        assert!(cumulative_binomial_p(20000, 10500, 0.5) < 1e-10);
    }

    #[test]
    fn test_sign() {
        let a = [0.5, 0.6, 0.7, 0.8, 0.2, 0.9];
        let b = [0.1, 0.2, 0.3, 0.4, 0.2, 0.5];
        // 5 wins out of 5 non-tied pairs
        assert_about_eq!(SignTest.p_value(&a, &b), 1. / 32.);
        assert_about_eq!(SignTest.p_value(&b, &a), 1.);
    }
}
