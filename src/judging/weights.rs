use crate::base::{Len, QueryIndex};
use crate::tracker::JudgmentErrorTracker;

/// A (document, query) pair with its summed rank weight
#[derive(Clone, Debug)]
pub struct WeightedDocument {
    pub docid: String,
    pub query: QueryIndex,
    pub weight: f64,
}

/// Retrieved (document, query) pairs by decreasing total rank weight
///
/// The weight of a pair is the sum of its rank weights over the
/// contributing runs. Since the weighted error of a document can only
/// shrink relative to this value (scaled by the largest proportional
/// run weight), the table gives an upper bound used to stop scanning
/// early.
pub struct DocumentWeights {
    documents: Vec<WeightedDocument>,
}

impl DocumentWeights {
    pub fn new(tracker: &JudgmentErrorTracker) -> Self {
        let rank_weights = tracker.rank_weights();
        let runs = tracker.runs();
        let mut documents: Vec<WeightedDocument> = tracker
            .occurrence_index()
            .iter()
            .filter_map(|(docid, query, occurrences)| {
                let mut contributing = occurrences
                    .iter()
                    .filter(|o| runs[o.run].contributes())
                    .peekable();
                contributing.peek()?;
                let weight = contributing.map(|o| rank_weights[o.rank]).sum();
                Some(WeightedDocument {
                    docid: docid.to_string(),
                    query,
                    weight,
                })
            })
            .collect();
        documents.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Self { documents }
    }

    pub fn get(&self, ix: usize) -> &WeightedDocument {
        &self.documents[ix]
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedDocument> {
        self.documents.iter()
    }
}

impl Len for DocumentWeights {
    fn len(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Run;
    use crate::tracker::TrackerOptions;
    use ntest::assert_about_eq;

    #[test]
    fn test_document_weights() {
        let options = TrackerOptions {
            persistence: 0.95,
            ..Default::default()
        };
        let mut tracker = JudgmentErrorTracker::new(["3", "4"], options).unwrap();
        let mut run = Run::new("a");
        run.list_or_create("3").push("d1", 1, 2.);
        run.list_or_create("3").push("d2", 2, 1.);
        run.list_or_create("4").push("x", 1, 2.);
        run.list_or_create("4").push("y", 2, 1.);
        run.list_or_create("4").push("d2", 3, 0.);
        tracker.add_run(run).unwrap();
        let mut run = Run::new("b");
        run.list_or_create("3").push("d1", 1, 1.);
        tracker.add_run(run).unwrap();
        let mut run = Run::new("c");
        run.list_or_create("3").push("d2", 1, 1.);
        tracker.add_run(run).unwrap();
        tracker.set_run_noncontributing("c").unwrap();

        let weights = DocumentWeights::new(&tracker);
        assert_eq!(weights.len(), 5);
        let first = weights.get(0);
        assert_eq!((first.docid.as_str(), first.query), ("d1", 0));
        assert_about_eq!(first.weight, 0.1);
        // Only ranks of contributing runs count
        let d2 = weights
            .iter()
            .find(|d| d.docid == "d2" && d.query == 0)
            .unwrap();
        assert_about_eq!(d2.weight, 0.05 * 0.95);
        assert!(weights
            .iter()
            .zip(weights.iter().skip(1))
            .all(|(a, b)| a.weight >= b.weight));
    }
}
