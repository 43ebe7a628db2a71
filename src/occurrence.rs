//! Where each (document, query) pair was retrieved

use crate::base::{Len, QueryIndex, Rank, RunIndex};
use crate::keytable::CompositeKeyTable;

/// A (run, rank) pair at which a document was retrieved
///
/// Together with the query of the entry, the occurrence addresses the
/// judged flag of the retrieved document in the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Occurrence {
    pub run: RunIndex,
    pub rank: Rank,
}

/// Append-only index from (docid, query) to occurrences
#[derive(Default)]
pub struct DocumentOccurrenceIndex {
    table: CompositeKeyTable<Vec<Occurrence>>,
    num_occurrences: usize,
}

impl DocumentOccurrenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `run` retrieved `docid` at `rank` for query `qid`
    pub fn add(&mut self, docid: &str, qid: QueryIndex, run: RunIndex, rank: Rank) {
        let (occurrences, _) = self.table.update(docid, qid);
        occurrences.push(Occurrence { run, rank });
        self.num_occurrences += 1;
    }

    pub fn get(&self, docid: &str, qid: QueryIndex) -> Option<&[Occurrence]> {
        self.table.get(docid, qid).map(|v| v.as_slice())
    }

    /// Iterates over (docid, query, occurrences) in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, QueryIndex, &[Occurrence])> + '_ {
        self.table
            .iter()
            .map(|(docid, qid, occurrences)| (docid, qid, occurrences.as_slice()))
    }

    /// Total number of recorded occurrences
    pub fn num_occurrences(&self) -> usize {
        self.num_occurrences
    }
}

impl Len for DocumentOccurrenceIndex {
    /// Number of distinct (document, query) pairs
    fn len(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrences() {
        let mut index = DocumentOccurrenceIndex::new();
        index.add("d1", 0, 0, 3);
        index.add("d1", 0, 2, 0);
        index.add("d1", 1, 0, 1);
        index.add("d2", 0, 1, 0);

        assert_eq!(
            index.get("d1", 0),
            Some(&[Occurrence { run: 0, rank: 3 }, Occurrence { run: 2, rank: 0 }][..])
        );
        assert_eq!(index.get("d1", 1).map(|o| o.len()), Some(1));
        assert!(index.get("d2", 1).is_none());
        assert_eq!(index.len(), 3);
        assert_eq!(index.num_occurrences(), 4);
        assert_eq!(index.iter().next().map(|(d, q, _)| (d, q)), Some(("d1", 0)));
    }
}
