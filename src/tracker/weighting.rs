//! Run and query weighting schemes used to select documents
//!
//! A run weighting turns the (credited score, residual) pair of a run
//! into the weight of its residual; dividing by the residual gives the
//! proportional weight multiplied by a document's rank weight.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Floor of the projected weighting, so that a run whose first judged
/// documents are all irrelevant still gets some weight
pub const PROJECTED_MIN_WEIGHT: f64 = 0.01;

/// Floor of the linear query weighting, so that a query where no
/// relevant document was found yet is not starved of judgments
pub const QUERY_MIN_WEIGHT: f64 = 0.01;

/// Final score extrapolated from the judged documents, assuming the
/// unjudged weight holds relevance in the same proportion
pub fn projected_rbp(base: f64, residual: f64) -> f64 {
    if residual == 1. {
        1.
    } else {
        base + base * residual / (1. - residual)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunWeighting {
    /// The residual itself
    #[default]
    Uniform,
    /// Area under `f(x) = x` between the score and score + residual
    Linear,
    /// Area under `f(x) = x²` between the score and score + residual
    Quadratic,
    /// Residual times the projected score
    Projected,
    /// Squared residual
    Residual,
    ResidualAndMidpoint,
    ResidualAndMidpointSquared,
    ResidualAndMidpointCubed,
    ResidualAndProjected,
    ResidualAndProjectedSquared,
    MidpointSquared,
}

impl RunWeighting {
    pub const ALL: [RunWeighting; 11] = [
        RunWeighting::Uniform,
        RunWeighting::Linear,
        RunWeighting::Quadratic,
        RunWeighting::Projected,
        RunWeighting::Residual,
        RunWeighting::ResidualAndMidpoint,
        RunWeighting::ResidualAndMidpointSquared,
        RunWeighting::ResidualAndMidpointCubed,
        RunWeighting::ResidualAndProjected,
        RunWeighting::ResidualAndProjectedSquared,
        RunWeighting::MidpointSquared,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RunWeighting::Uniform => "uniform",
            RunWeighting::Linear => "linear",
            RunWeighting::Quadratic => "quadratic",
            RunWeighting::Projected => "projected",
            RunWeighting::Residual => "residual",
            RunWeighting::ResidualAndMidpoint => "residual-and-midpoint",
            RunWeighting::ResidualAndMidpointSquared => "residual-and-midpoint-squared",
            RunWeighting::ResidualAndMidpointCubed => "residual-and-midpoint-cubed",
            RunWeighting::ResidualAndProjected => "residual-and-projected",
            RunWeighting::ResidualAndProjectedSquared => "residual-and-projected-squared",
            RunWeighting::MidpointSquared => "midpoint-squared",
        }
    }

    /// Weight of the residual `err` of a run scoring `rbp`
    pub fn weight(&self, rbp: f64, err: f64) -> f64 {
        let midpoint = rbp + err / 2.;
        match self {
            RunWeighting::Uniform => err,
            RunWeighting::Linear => 0.5 * ((rbp + err).powi(2) - rbp.powi(2)),
            RunWeighting::Quadratic => 0.333333 * ((rbp + err).powi(3) - rbp.powi(3)),
            RunWeighting::Projected => {
                if err == 1. {
                    err
                } else {
                    let wgt = projected_rbp(rbp, err) * err;
                    if wgt / err < PROJECTED_MIN_WEIGHT {
                        PROJECTED_MIN_WEIGHT
                    } else {
                        wgt
                    }
                }
            }
            RunWeighting::Residual => err * err,
            RunWeighting::ResidualAndMidpoint => midpoint * err * err,
            RunWeighting::ResidualAndMidpointSquared => midpoint.powi(2) * err * err,
            RunWeighting::ResidualAndMidpointCubed => midpoint.powi(3) * err * err,
            RunWeighting::ResidualAndProjected => projected_rbp(rbp, err) * err * err,
            RunWeighting::ResidualAndProjectedSquared => {
                projected_rbp(rbp, err).powi(2) * err * err
            }
            RunWeighting::MidpointSquared => midpoint * midpoint * err,
        }
    }

    /// Weight per unit of residual; 0 for a run without residual
    pub fn proportional_weight(&self, rbp: f64, err: f64) -> f64 {
        if err <= 0. {
            0.
        } else {
            self.weight(rbp, err) / err
        }
    }
}

impl FromStr for RunWeighting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        RunWeighting::ALL
            .iter()
            .find(|w| w.name() == s)
            .copied()
            .ok_or_else(|| Error::InvalidParameter(format!("unknown run weighting '{}'", s)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryWeighting {
    #[default]
    Uniform,
    /// Proportion of relevance among the query's judgments (floored)
    Linear,
}

impl QueryWeighting {
    /// Weight of a query having `judged` judgments summing to `rel`
    ///
    /// A query without judgments gets the highest linear weight.
    pub fn weight(&self, judged: usize, rel: f64) -> f64 {
        match self {
            QueryWeighting::Uniform => 1.,
            QueryWeighting::Linear if judged == 0 => QUERY_MIN_WEIGHT + 1.,
            QueryWeighting::Linear => QUERY_MIN_WEIGHT + rel / judged as f64,
        }
    }
}

impl FromStr for QueryWeighting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(QueryWeighting::Uniform),
            "linear" => Ok(QueryWeighting::Linear),
            _ => Err(Error::InvalidParameter(format!(
                "unknown query weighting '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::assert_about_eq;
    use rstest::rstest;

    #[rstest]
    #[case(RunWeighting::Uniform, 0.3)]
    #[case(RunWeighting::Linear, 0.5 * (0.25 - 0.04))]
    #[case(RunWeighting::Quadratic, 0.333333 * (0.125 - 0.008))]
    #[case(RunWeighting::Residual, 0.09)]
    #[case(RunWeighting::ResidualAndMidpoint, 0.35 * 0.09)]
    #[case(RunWeighting::ResidualAndMidpointSquared, 0.35 * 0.35 * 0.09)]
    #[case(RunWeighting::ResidualAndMidpointCubed, 0.35 * 0.35 * 0.35 * 0.09)]
    #[case(RunWeighting::MidpointSquared, 0.35 * 0.35 * 0.3)]
    fn test_weights(#[case] weighting: RunWeighting, #[case] expected: f64) {
        assert_about_eq!(weighting.weight(0.2, 0.3), expected);
    }

    #[test]
    fn test_projected() {
        assert_eq!(projected_rbp(0.1, 1.), 1.);
        assert_about_eq!(projected_rbp(0.2, 0.5), 0.4);
        assert_eq!(RunWeighting::Projected.weight(0., 1.), 1.);
        assert_about_eq!(RunWeighting::Projected.weight(0.2, 0.5), 0.2);
        // Floored: no relevant document found yet
        assert_eq!(RunWeighting::Projected.weight(0., 0.5), PROJECTED_MIN_WEIGHT);
        assert_about_eq!(
            RunWeighting::ResidualAndProjectedSquared.weight(0.2, 0.5),
            0.16 * 0.25
        );
    }

    #[test]
    fn test_proportional() {
        assert_about_eq!(RunWeighting::Uniform.proportional_weight(0.2, 0.3), 1.);
        assert_eq!(RunWeighting::Residual.proportional_weight(0.2, 0.), 0.);
    }

    #[test]
    fn test_names() {
        for w in RunWeighting::ALL {
            assert_eq!(w.name().parse::<RunWeighting>().unwrap(), w);
        }
        assert!("cubic".parse::<RunWeighting>().is_err());
        assert_eq!("LINEAR".parse::<QueryWeighting>().unwrap(), QueryWeighting::Linear);
    }

    #[test]
    fn test_query_weights() {
        assert_eq!(QueryWeighting::Uniform.weight(0, 0.), 1.);
        assert_about_eq!(QueryWeighting::Linear.weight(4, 1.), 0.26);
        assert_about_eq!(QueryWeighting::Linear.weight(4, 0.), QUERY_MIN_WEIGHT);
    }
}
