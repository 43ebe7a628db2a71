//! Rank-biased precision with tied ranks and restartable depths
//!
//! Each member of a group of tied documents receives the average weight
//! of the positions the group spans, which is the expected weight under
//! a uniformly random resolution of the tie. When an evaluation cutoff
//! falls inside a tie group, every member is credited with the fraction
//! of the group lying in the current segment; evaluating to a larger
//! cutoff afterwards credits the remaining fraction. For instance, with
//! five documents tied at position 2 and cutoffs 2, 5 and 10, each
//! member is credited with 1/5, then 3/5 and finally 1/5 of the
//! averaged weight.
//!
//! The residual at a cutoff `d` is the weight of the unjudged documents
//! seen so far plus `p^d`, whatever ties surround `d`.

use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::base::{check_persistence, Len, EPSILON};
use crate::error::{Error, Result};
use crate::qrels::{Rel, RelevanceTable};
use crate::run::{RankedList, Run, ScoreOrdering};

/// Depth standing for "the whole ranking"
pub const FULL_DEPTH: usize = usize::MAX;

/// Parses a comma-separated list of strictly increasing depths
///
/// A depth of 0 stands for the full depth of the ranking.
pub fn parse_depths(s: &str) -> Result<Vec<usize>> {
    let mut depths = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let depth = part
            .parse::<usize>()
            .map_err(|_| Error::InvalidParameter(format!("invalid depth '{}' in '{}'", part, s)))?;
        depths.push(if depth == 0 { FULL_DEPTH } else { depth });
    }
    check_depths(&depths)?;
    Ok(depths)
}

/// Checks that depths are non-empty and strictly increasing
pub fn check_depths(depths: &[usize]) -> Result<()> {
    if depths.is_empty() {
        return Err(Error::InvalidParameter("empty depth list".to_string()));
    }
    if depths.iter().any(|&d| d == 0) {
        return Err(Error::InvalidParameter(
            "depth 0 is not a valid cutoff".to_string(),
        ));
    }
    if depths.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::InvalidParameter(format!(
            "depths {:?} are not strictly increasing",
            depths
        )));
    }
    Ok(())
}

/// Accumulated values for one persistence
#[derive(Clone, Copy, Debug)]
pub struct RbpValue {
    /// Weight of the next position to be grouped
    wgt: f64,
    /// Average weight of the current tie group
    tie_wgt: f64,
    /// Credited score
    pub sum: f64,
    /// Weight of the unjudged documents seen so far
    pub cumerr: f64,
    /// Residual bound: `cumerr + p^depth`
    pub err: f64,
}

/// Resumable state of the scoring of one ranked list
///
/// A cursor is created by [RbpScorer::start] and is consumed and
/// returned by each call to [RbpScorer::advance].
#[derive(Clone, Debug)]
pub struct RbpCursor {
    qid: String,
    list_len: usize,
    depth: usize,
    num_rel_ret: f64,
    tie_pos: usize,
    tie_len: usize,
    values: Vec<RbpValue>,
}

impl RbpCursor {
    /// Last depth the list was evaluated to
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Relevance retrieved so far (tie fractions included)
    pub fn num_rel_ret(&self) -> f64 {
        self.num_rel_ret
    }

    /// One value per persistence of the scorer
    pub fn values(&self) -> &[RbpValue] {
        &self.values
    }
}

/// Scores ranked lists for a set of persistence values
#[derive(Clone, Debug)]
pub struct RbpScorer {
    persists: Vec<f64>,
    ordering: ScoreOrdering,
}

impl RbpScorer {
    pub fn new(persists: &[f64], ordering: ScoreOrdering) -> Result<Self> {
        if persists.is_empty() {
            return Err(Error::InvalidParameter(
                "no persistence value given".to_string(),
            ));
        }
        for &p in persists {
            check_persistence(p)?;
        }
        Ok(Self {
            persists: persists.to_vec(),
            ordering,
        })
    }

    pub fn persists(&self) -> &[f64] {
        &self.persists
    }

    pub fn ordering(&self) -> ScoreOrdering {
        self.ordering
    }

    /// Starts a scoring session over a list
    ///
    /// Fails if the query of the list has no judgments.
    pub fn start(&self, list: &RankedList, qrels: &RelevanceTable) -> Result<RbpCursor> {
        if !qrels.contains_query(list.qid()) {
            return Err(Error::UnknownQuery(list.qid().to_string()));
        }
        Ok(RbpCursor {
            qid: list.qid().to_string(),
            list_len: list.len(),
            depth: 0,
            num_rel_ret: 0.,
            tie_pos: 0,
            tie_len: 0,
            values: self
                .persists
                .iter()
                .map(|&p| RbpValue {
                    wgt: 1. - p,
                    tie_wgt: 0.,
                    sum: 0.,
                    cumerr: 0.,
                    err: 1.,
                })
                .collect(),
        })
    }

    /// Continues the evaluation of a list up to `depth`
    ///
    /// Panics if `depth` does not exceed the depth already reached, if
    /// the cursor was started on another list, or if the list is not in
    /// the scorer's ordering.
    pub fn advance(
        &self,
        mut cursor: RbpCursor,
        list: &RankedList,
        qrels: &RelevanceTable,
        depth: usize,
    ) -> RbpCursor {
        assert!(
            depth > cursor.depth,
            "depth {} does not exceed the depth already reached ({})",
            depth,
            cursor.depth
        );
        assert!(
            cursor.qid == list.qid() && cursor.list_len == list.len(),
            "cursor used on another list"
        );
        assert_eq!(list.ordering(), self.ordering, "list is not sorted");

        let docs = list.scores();
        let actual_depth = depth.min(docs.len());

        if cursor.tie_len > 0 || cursor.tie_pos < actual_depth {
            loop {
                if cursor.tie_len == 0 {
                    let start = cursor.tie_pos;
                    for v in cursor.values.iter_mut() {
                        v.tie_wgt = 0.;
                    }
                    let mut t = start;
                    while t < docs.len() && self.ordering.same_key(&docs[start], &docs[t]) {
                        for (v, p) in cursor.values.iter_mut().zip(self.persists.iter()) {
                            v.tie_wgt += v.wgt;
                            v.wgt *= p;
                        }
                        t += 1;
                    }
                    assert!(t > start, "empty tie group at position {}", start);
                    cursor.tie_len = t - start;
                    for v in cursor.values.iter_mut() {
                        v.tie_wgt /= cursor.tie_len as f64;
                    }
                }

                let tie_end = cursor.tie_pos + cursor.tie_len;
                let tie_frac = (tie_end.min(depth) - cursor.tie_pos.max(cursor.depth)) as f64
                    / cursor.tie_len as f64;
                for doc in &docs[cursor.tie_pos..tie_end] {
                    match qrels.rel(&cursor.qid, &doc.docid) {
                        Rel::Judged(rel) => {
                            cursor.num_rel_ret += rel * tie_frac;
                            for v in cursor.values.iter_mut() {
                                v.sum += v.tie_wgt * rel * tie_frac;
                            }
                        }
                        Rel::Unjudged => {
                            for v in cursor.values.iter_mut() {
                                v.cumerr += v.tie_wgt * tie_frac;
                            }
                        }
                        Rel::UnknownQuery => unreachable!("query checked when starting"),
                    }
                }

                if tie_end <= actual_depth {
                    cursor.tie_pos = tie_end;
                    cursor.tie_len = 0;
                }
                if tie_end >= actual_depth {
                    break;
                }
            }
        }

        let max_rel = qrels.max_relevance().max(1.);
        for (v, p) in cursor.values.iter_mut().zip(self.persists.iter()) {
            v.err = v.cumerr + p.powi(actual_depth.min(i32::MAX as usize) as i32);
            assert!(
                v.sum <= max_rel + EPSILON,
                "score {} exceeds the maximum relevance",
                v.sum
            );
            assert!(v.err >= -EPSILON, "negative residual {}", v.err);
        }
        cursor.depth = depth;
        cursor
    }

    /// Evaluates a list at each of the (strictly increasing) depths
    pub fn evaluate(
        &self,
        list: &mut RankedList,
        qrels: &RelevanceTable,
        depths: &[usize],
    ) -> Result<Vec<DepthResult>> {
        check_depths(depths)?;
        list.sort(self.ordering);
        let mut cursor = self.start(list, qrels)?;
        let mut results = Vec::with_capacity(depths.len());
        for &depth in depths {
            cursor = self.advance(cursor, list, qrels, depth);
            results.push(DepthResult {
                depth,
                num_rel_ret: cursor.num_rel_ret,
                values: self
                    .persists
                    .iter()
                    .zip(cursor.values.iter())
                    .map(|(&persist, v)| PersistResult {
                        persist,
                        score: v.sum,
                        residual: v.err,
                    })
                    .collect(),
            });
        }
        Ok(results)
    }
}

/// Score and residual for one persistence
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistResult {
    pub persist: f64,
    pub score: f64,
    pub residual: f64,
}

/// Results at one cutoff
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthResult {
    /// Requested depth ([FULL_DEPTH] for the whole ranking)
    pub depth: usize,
    pub num_rel_ret: f64,
    pub values: Vec<PersistResult>,
}

/// Results of a run for one query (or averaged over queries)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub qid: String,
    pub num_rel: f64,
    pub num_ret: usize,
    pub depths: Vec<DepthResult>,
}

/// Results of a run over all the judged queries it answers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunEvaluation {
    pub runid: String,
    pub queries: Vec<QueryResult>,
    /// Averages over the judged queries, with qid `all`
    pub average: QueryResult,
}

/// Evaluates every query of a run that has judgments
///
/// Queries of the run without judgments are skipped; averages are taken
/// over the remaining queries.
pub fn evaluate_run(
    run: &mut Run,
    qrels: &RelevanceTable,
    scorer: &RbpScorer,
    depths: &[usize],
) -> Result<RunEvaluation> {
    check_depths(depths)?;
    if qrels.max_relevance() > 1. {
        warn!(
            "maximum relevance is {}: scores may exceed 1.0",
            qrels.max_relevance()
        );
    }

    let empty_depths = || {
        depths
            .iter()
            .map(|&depth| DepthResult {
                depth,
                num_rel_ret: 0.,
                values: scorer
                    .persists()
                    .iter()
                    .map(|&persist| PersistResult {
                        persist,
                        ..Default::default()
                    })
                    .collect(),
            })
            .collect::<Vec<_>>()
    };
    let mut average = QueryResult {
        qid: "all".to_string(),
        num_rel: 0.,
        num_ret: 0,
        depths: empty_depths(),
    };

    let mut queries = Vec::new();
    for list in run.lists_mut() {
        let num_rel = match qrels.num_relevant(list.qid()) {
            Some(num_rel) => num_rel,
            None => continue,
        };
        let results = scorer.evaluate(list, qrels, depths)?;
        average.num_rel += num_rel;
        average.num_ret += list.len();
        for (ave, res) in average.depths.iter_mut().zip(results.iter()) {
            ave.num_rel_ret += res.num_rel_ret;
            for (a, r) in ave.values.iter_mut().zip(res.values.iter()) {
                a.score += r.score;
                a.residual += r.residual;
            }
        }
        queries.push(QueryResult {
            qid: list.qid().to_string(),
            num_rel,
            num_ret: list.len(),
            depths: results,
        });
    }

    if !queries.is_empty() {
        let n = queries.len() as f64;
        for ave in average.depths.iter_mut() {
            for a in ave.values.iter_mut() {
                a.score /= n;
                a.residual /= n;
            }
        }
    }

    Ok(RunEvaluation {
        runid: run.runid().to_string(),
        queries,
        average,
    })
}

/// Score as a base plus a residual
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RbpScore {
    pub base: f64,
    pub residual: f64,
    /// Relevance found
    pub num_rel: f64,
}

impl Default for RbpScore {
    fn default() -> Self {
        Self {
            base: 0.,
            residual: 1.,
            num_rel: 0.,
        }
    }
}

impl RbpScore {
    fn incr(&mut self, rel: f64, wgt: f64) {
        self.base += rel * wgt;
        self.residual -= wgt;
        self.num_rel += rel;
        assert!(self.base <= 1. + EPSILON, "score {} exceeds 1", self.base);
        assert!(self.residual >= -EPSILON, "negative residual {}", self.residual);
    }
}

/// Residual smearing parameters of [InducedRbp]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smear {
    /// Number of documents judged for the query
    pub judgments: usize,
    /// Number of those judged relevant
    pub num_relevant: f64,
}

/// RBP of the condensed ranking, where unjudged documents are dropped
///
/// Relevance is clipped to 1. With smearing, the relevance of the judged
/// documents that the run did not retrieve is spread evenly over the
/// positions following the condensed list, up to the number of
/// judgments.
#[derive(Clone, Copy, Debug)]
pub struct InducedRbp {
    persist: f64,
    smear: Option<Smear>,
}

impl InducedRbp {
    pub fn new(persist: f64, smear: Option<Smear>) -> Result<Self> {
        check_persistence(persist)?;
        Ok(Self { persist, smear })
    }

    /// Scores a list of relevance values (`None` for unjudged)
    pub fn score_rels(&self, rels: &[Option<f64>]) -> RbpScore {
        let mut score = RbpScore::default();
        let mut wgt = 1. - self.persist;
        let mut num_judged = 0;
        for rel in rels.iter().flatten() {
            score.incr(rel.min(1.), wgt);
            wgt *= self.persist;
            num_judged += 1;
        }

        if let Some(smear) = self.smear {
            assert!(num_judged <= smear.judgments, "more judged documents than judgments");
            let remaining_positions = smear.judgments - num_judged;
            if remaining_positions > 0 {
                let remaining_rel = (smear.num_relevant - score.num_rel).max(0.);
                let prop = remaining_rel / remaining_positions as f64;
                let extension = self.persist.powi(num_judged as i32)
                    - self.persist.powi(smear.judgments as i32);
                score = RbpScore {
                    base: score.base + extension * prop,
                    residual: self.persist.powi(smear.judgments as i32),
                    num_rel: smear.num_relevant,
                };
            }
        }
        score
    }

    /// Scores a ranked list (in score order) against judgments
    pub fn score(&self, list: &mut RankedList, qrels: &RelevanceTable) -> RbpScore {
        let qid = list.qid().to_string();
        let rels: Vec<Option<f64>> = list
            .ordered(ScoreOrdering::Score)
            .iter()
            .map(|doc| qrels.rel(&qid, &doc.docid).judged())
            .collect();
        self.score_rels(&rels)
    }
}

impl FromStr for Smear {
    type Err = Error;

    /// Parses `judgments:num_relevant`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParameter(format!("invalid smear '{}'", s));
        let (judgments, num_relevant) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Smear {
            judgments: judgments.parse().map_err(|_| invalid())?,
            num_relevant: num_relevant.parse().map_err(|_| invalid())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::assert_about_eq;

    fn qrels(judged: &[(&str, f64)]) -> RelevanceTable {
        let mut table = RelevanceTable::new();
        for (docid, rel) in judged {
            table.insert("1", docid, *rel, true);
        }
        table
    }

    #[test]
    fn test_parse_depths() {
        assert_eq!(parse_depths("10,100").unwrap(), vec![10, 100]);
        assert_eq!(parse_depths("10, 0").unwrap(), vec![10, FULL_DEPTH]);
        assert!(parse_depths("20,10").is_err());
        assert!(parse_depths("10,10").is_err());
        assert!(parse_depths("0,10").is_err());
        assert!(parse_depths("-1").is_err());
        assert!(parse_depths("").is_err());
    }

    #[test]
    fn test_no_query() {
        let scorer = RbpScorer::new(&[0.5], ScoreOrdering::Occurrence).unwrap();
        let list = RankedList::new("2");
        assert!(matches!(
            scorer.start(&list, &qrels(&[("a", 1.)])),
            Err(Error::UnknownQuery(_))
        ));
    }

    #[test]
    #[should_panic]
    fn test_non_increasing_depth() {
        let scorer = RbpScorer::new(&[0.5], ScoreOrdering::Occurrence).unwrap();
        let qrels = qrels(&[("a", 1.)]);
        let mut list = RankedList::new("1");
        list.push("a", 1, 1.);
        let cursor = scorer.start(&list, &qrels).unwrap();
        let cursor = scorer.advance(cursor, &list, &qrels, 5);
        scorer.advance(cursor, &list, &qrels, 5);
    }

    #[test]
    fn test_short_list() {
        let scorer = RbpScorer::new(&[0.5], ScoreOrdering::Occurrence).unwrap();
        let qrels = qrels(&[("a", 1.)]);
        let mut list = RankedList::new("1");
        list.push("a", 1, 1.);
        list.push("b", 2, 1.);
        let results = scorer.evaluate(&mut list, &qrels, &[1, 10, 20]).unwrap();
        assert_about_eq!(results[0].values[0].score, 0.5);
        assert_about_eq!(results[0].values[0].residual, 0.5);
        // b is unjudged: 0.25 of error plus 0.5^2
        assert_about_eq!(results[1].values[0].residual, 0.5);
        assert_eq!(results[2], DepthResult { depth: 20, ..results[1].clone() });
    }

    #[test]
    fn test_induced() {
        let induced = InducedRbp::new(0.5, None).unwrap();
        let score = induced.score_rels(&[None, Some(1.), Some(2.), None, Some(0.)]);
        assert_about_eq!(score.base, 0.75);
        assert_about_eq!(score.residual, 0.125);

        let smeared = InducedRbp::new(0.5, Some(Smear { judgments: 5, num_relevant: 4. })).unwrap();
        let score = smeared.score_rels(&[Some(1.), Some(0.), Some(1.)]);
        // Two relevant documents over the two remaining positions
        assert_about_eq!(score.base, 0.625 + (0.125 - 0.03125));
        assert_about_eq!(score.residual, 0.03125);
    }
}
