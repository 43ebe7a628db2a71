//! One-tailed paired significance tests
//!
//! Each test compares two score distributions over the same queries and
//! returns the p-value of the hypothesis that the first one is better;
//! a small value means that `a` significantly outperforms `b`.
//!
//! - [SignTest]: exact binomial tail over the non-tied pairs
//! - [WilcoxonTest]: exact signed-rank test
//! - [TTest]: paired t-test through a critical value table
//! - [BootstrapTest]: resampling of the centred differences

mod bootstrap;
mod sign;
mod t;
mod wilcoxon;

use std::str::FromStr;

pub use bootstrap::BootstrapTest;
pub use sign::{cumulative_binomial_p, SignTest};
pub use t::{paired_t_statistic, TTest};
pub use wilcoxon::WilcoxonTest;

use crate::error::{Error, Result};

/// A paired significance test
///
/// Tests take `&mut self` so that they can keep caches or random
/// generators for the duration of an evaluation session.
pub trait SignificanceOracle {
    /// p-value of `a` being better than `b` (same length, paired by
    /// position)
    fn p_value(&mut self, a: &[f64], b: &[f64]) -> f64;

    fn name(&self) -> &'static str;
}

/// Names of the available tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OracleKind {
    #[default]
    Wilcoxon,
    Sign,
    T,
    Bootstrap,
}

impl FromStr for OracleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wilcoxon" => Ok(OracleKind::Wilcoxon),
            "sign" => Ok(OracleKind::Sign),
            "t" => Ok(OracleKind::T),
            "bootstrap" => Ok(OracleKind::Bootstrap),
            _ => Err(Error::InvalidParameter(format!(
                "unknown significance test '{}'",
                s
            ))),
        }
    }
}

impl OracleKind {
    pub fn build(&self) -> Box<dyn SignificanceOracle> {
        match self {
            OracleKind::Wilcoxon => Box::new(WilcoxonTest::new()),
            OracleKind::Sign => Box::new(SignTest),
            OracleKind::T => Box::new(TTest),
            OracleKind::Bootstrap => Box::new(BootstrapTest::default()),
        }
    }
}

/// Builds a test from its name (`wilcoxon`, `sign`, `t` or `bootstrap`)
pub fn oracle_by_name(name: &str) -> Result<Box<dyn SignificanceOracle>> {
    Ok(name.parse::<OracleKind>()?.build())
}
