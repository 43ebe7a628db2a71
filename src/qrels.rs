//! Relevance judgments

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::base::{Len, Relevance};
use crate::error::{Error, Result};

/// How raw relevance values are interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum RelevanceMode {
    /// 1 if the raw value reaches the threshold, 0 otherwise
    Binary(f64),
    /// Raw value multiplied by the scale
    Fractional(f64),
    /// `Binary(1)` if all raw values are integral, `Fractional(1)` otherwise
    #[default]
    Auto,
}

impl FromStr for RelevanceMode {
    type Err = Error;

    /// Parses `auto`, `binary[:threshold]` or `fractional[:scale]`
    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => {
                let value = arg.parse::<f64>().map_err(|_| {
                    Error::InvalidParameter(format!("invalid relevance mode argument '{}'", arg))
                })?;
                (name, Some(value))
            }
            None => (s, None),
        };
        match name.to_lowercase().as_str() {
            "auto" if arg.is_none() => Ok(RelevanceMode::Auto),
            "binary" => Ok(RelevanceMode::Binary(arg.unwrap_or(1.))),
            "fractional" => Ok(RelevanceMode::Fractional(arg.unwrap_or(1.))),
            _ => Err(Error::InvalidParameter(format!(
                "unknown relevance mode '{}'",
                s
            ))),
        }
    }
}

/// Outcome of a relevance lookup
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rel {
    Judged(Relevance),
    /// The query has judgments, but not for this document
    Unjudged,
    /// The query has no judgments at all
    UnknownQuery,
}

impl Rel {
    pub fn judged(self) -> Option<Relevance> {
        match self {
            Rel::Judged(rel) => Some(rel),
            _ => None,
        }
    }
}

/// Judgments of a single query
#[derive(Clone, Debug, Default)]
pub struct QueryRelevances {
    judgments: HashMap<String, f64>,
    raw_num_relevant: f64,
}

impl QueryRelevances {
    pub fn raw(&self, docid: &str) -> Option<f64> {
        self.judgments.get(&docid.to_lowercase()).copied()
    }

    /// Sum of the positive raw relevance values
    pub fn raw_num_relevant(&self) -> f64 {
        self.raw_num_relevant
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.judgments.iter().map(|(d, r)| (d.as_str(), *r))
    }
}

impl Len for QueryRelevances {
    fn len(&self) -> usize {
        self.judgments.len()
    }
}

/// Table of judgments keyed by (qid, docid)
#[derive(Clone, Debug, Default)]
pub struct RelevanceTable {
    queries: HashMap<String, QueryRelevances>,
    all_integral: bool,
    mode: RelevanceMode,
    max_raw: f64,
}

impl RelevanceTable {
    pub fn new() -> Self {
        Self {
            queries: HashMap::new(),
            all_integral: true,
            mode: RelevanceMode::Auto,
            max_raw: 0.,
        }
    }

    /// Adds a judgment, returning `false` (and leaving the table
    /// untouched) if the pair was already judged
    ///
    /// `integral` records whether the raw value was written as an
    /// integer, which drives the AUTO interpretation.
    pub fn insert(&mut self, qid: &str, docid: &str, raw: f64, integral: bool) -> bool {
        assert!(raw >= 0., "relevance values must be non-negative");
        let qrels = self.queries.entry(qid.to_lowercase()).or_default();
        let docid = docid.to_lowercase();
        if qrels.judgments.contains_key(&docid) {
            return false;
        }
        if raw > 0. {
            qrels.raw_num_relevant += raw;
        }
        qrels.judgments.insert(docid, raw);
        if raw > self.max_raw {
            self.max_raw = raw;
        }
        self.all_integral = self.all_integral && integral;
        true
    }

    pub fn set_mode(&mut self, mode: RelevanceMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> RelevanceMode {
        self.mode
    }

    /// The interpretation actually applied (AUTO resolved)
    pub fn effective_mode(&self) -> RelevanceMode {
        match self.mode {
            RelevanceMode::Auto if self.all_integral => RelevanceMode::Binary(1.),
            RelevanceMode::Auto => RelevanceMode::Fractional(1.),
            mode => mode,
        }
    }

    pub fn all_integral(&self) -> bool {
        self.all_integral
    }

    /// Applies the relevance mode to a raw value
    pub fn adjust(&self, raw: f64) -> Relevance {
        match self.effective_mode() {
            RelevanceMode::Binary(threshold) => {
                if raw >= threshold {
                    1.
                } else {
                    0.
                }
            }
            RelevanceMode::Fractional(scale) => raw * scale,
            RelevanceMode::Auto => unreachable!("auto mode is resolved"),
        }
    }

    /// Judgments of a query (ids are case-folded)
    pub fn query(&self, qid: &str) -> Option<&QueryRelevances> {
        self.queries.get(&qid.to_lowercase())
    }

    pub fn contains_query(&self, qid: &str) -> bool {
        self.query(qid).is_some()
    }

    /// Adjusted relevance of a document for a query
    pub fn rel(&self, qid: &str, docid: &str) -> Rel {
        match self.query(qid) {
            None => Rel::UnknownQuery,
            Some(qrels) => match qrels.raw(docid) {
                Some(raw) => Rel::Judged(self.adjust(raw)),
                None => Rel::Unjudged,
            },
        }
    }

    /// Sum of adjusted relevance for a query
    pub fn num_relevant(&self, qid: &str) -> Option<f64> {
        self.query(qid)
            .map(|q| q.judgments.values().map(|&raw| self.adjust(raw)).sum())
    }

    /// Maximum adjusted relevance
    pub fn max_relevance(&self) -> Relevance {
        self.adjust(self.max_raw)
    }

    /// Query IDs, sorted numerically when both are integers and
    /// lexicographically otherwise
    pub fn qids(&self) -> Vec<&str> {
        let mut qids: Vec<&str> = self.queries.keys().map(|s| s.as_str()).collect();
        qids.sort_by(|a, b| compare_qids(a, b));
        qids
    }
}

impl Len for RelevanceTable {
    fn len(&self) -> usize {
        self.queries.values().map(|q| q.len()).sum()
    }
}

fn compare_qids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
