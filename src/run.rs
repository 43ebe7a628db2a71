//! Runs: per-query ranked lists of scored documents

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::base::{Len, Rank};
use crate::error::Error;

/// One retrieved document as stated by the run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentScore {
    pub docid: String,
    /// Position of the row within the query's rows
    pub occurrence: usize,
    /// Rank stated in the run
    pub rank: Rank,
    /// Score stated in the run
    pub score: f64,
}

impl fmt::Display for DocumentScore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, #{}, rank {}, {})",
            self.docid, self.occurrence, self.rank, self.score
        )
    }
}

/// The key used to order a ranked list, which also defines ties
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreOrdering {
    /// Order of appearance in the run
    Occurrence,
    /// Stated rank (increasing)
    Rank,
    /// Decreasing score, ties broken by decreasing document ID
    #[default]
    Score,
}

impl ScoreOrdering {
    /// Total order used to sort a ranked list
    pub fn compare(&self, a: &DocumentScore, b: &DocumentScore) -> Ordering {
        match self {
            ScoreOrdering::Occurrence => a.occurrence.cmp(&b.occurrence),
            ScoreOrdering::Rank => a.rank.cmp(&b.rank),
            ScoreOrdering::Score => b
                .score
                .total_cmp(&a.score)
                .then_with(|| b.docid.cmp(&a.docid)),
        }
    }

    /// True if both documents share the ordering key (and are tied)
    pub fn same_key(&self, a: &DocumentScore, b: &DocumentScore) -> bool {
        match self {
            ScoreOrdering::Occurrence => a.occurrence == b.occurrence,
            ScoreOrdering::Rank => a.rank == b.rank,
            ScoreOrdering::Score => a.score == b.score,
        }
    }
}

impl FromStr for ScoreOrdering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "occurrence" | "occur" => Ok(ScoreOrdering::Occurrence),
            "rank" => Ok(ScoreOrdering::Rank),
            "score" => Ok(ScoreOrdering::Score),
            _ => Err(Error::InvalidParameter(format!("unknown ordering '{}'", s))),
        }
    }
}

/// Documents retrieved by one run for one query
#[derive(Clone, Debug)]
pub struct RankedList {
    qid: String,
    scores: Vec<DocumentScore>,
    ordering: ScoreOrdering,
}

impl RankedList {
    /// Creates an empty list (the query id is case-folded)
    pub fn new(qid: &str) -> Self {
        Self {
            qid: qid.to_lowercase(),
            scores: Vec::new(),
            ordering: ScoreOrdering::Occurrence,
        }
    }

    pub fn qid(&self) -> &str {
        &self.qid
    }

    /// Appends a document (its docid is case-folded)
    ///
    /// Appending restores the occurrence ordering.
    pub fn push(&mut self, docid: &str, rank: Rank, score: f64) {
        self.sort(ScoreOrdering::Occurrence);
        let occurrence = self.scores.len();
        self.scores.push(DocumentScore {
            docid: docid.to_lowercase(),
            occurrence,
            rank,
            score,
        });
    }

    /// Current ordering of the list
    pub fn ordering(&self) -> ScoreOrdering {
        self.ordering
    }

    /// Reorders the list
    pub fn sort(&mut self, ordering: ScoreOrdering) {
        if self.ordering != ordering {
            self.scores.sort_by(|a, b| ordering.compare(a, b));
            self.ordering = ordering;
        }
    }

    /// Reorders the list and returns the documents
    pub fn ordered(&mut self, ordering: ScoreOrdering) -> &[DocumentScore] {
        self.sort(ordering);
        &self.scores
    }

    /// Documents in the current ordering
    pub fn scores(&self) -> &[DocumentScore] {
        &self.scores
    }
}

impl Len for RankedList {
    fn len(&self) -> usize {
        self.scores.len()
    }
}

/// The ranked lists of one system, one per query
#[derive(Clone, Debug)]
pub struct Run {
    runid: String,
    lists: Vec<RankedList>,
    by_qid: HashMap<String, usize>,
}

impl Run {
    pub fn new(runid: &str) -> Self {
        Self {
            runid: runid.to_string(),
            lists: Vec::new(),
            by_qid: HashMap::new(),
        }
    }

    pub fn runid(&self) -> &str {
        &self.runid
    }

    pub fn set_runid(&mut self, runid: &str) {
        self.runid = runid.to_string();
    }

    /// Returns the list of a query, creating it if needed
    pub fn list_or_create(&mut self, qid: &str) -> &mut RankedList {
        let qid = qid.to_lowercase();
        let ix = match self.by_qid.get(&qid) {
            Some(&ix) => ix,
            None => {
                let ix = self.lists.len();
                self.lists.push(RankedList::new(&qid));
                self.by_qid.insert(qid, ix);
                ix
            }
        };
        &mut self.lists[ix]
    }

    pub fn get(&self, qid: &str) -> Option<&RankedList> {
        self.by_qid.get(&qid.to_lowercase()).map(|&ix| &self.lists[ix])
    }

    pub fn get_mut(&mut self, qid: &str) -> Option<&mut RankedList> {
        match self.by_qid.get(&qid.to_lowercase()) {
            Some(&ix) => Some(&mut self.lists[ix]),
            None => None,
        }
    }

    /// Lists in the order queries first appeared
    pub fn lists(&self) -> &[RankedList] {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> &mut [RankedList] {
        &mut self.lists
    }

    /// Reorders all the lists
    pub fn sort(&mut self, ordering: ScoreOrdering) {
        for list in self.lists.iter_mut() {
            list.sort(ordering);
        }
    }

    /// Length of the longest list
    pub fn max_depth(&self) -> usize {
        self.lists.iter().map(|l| l.len()).max().unwrap_or(0)
    }
}

impl Len for Run {
    fn len(&self) -> usize {
        self.lists.len()
    }
}
