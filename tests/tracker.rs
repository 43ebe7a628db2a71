use std::fs::{self, File};

use ntest::assert_about_eq;
use rstest::rstest;
use temp_dir::TempDir;

use helpers::collection::{check_tracker_bounds, TestCollection};
use rbp_eval::tracker::{JudgmentErrorTracker, TrackerOptions, TrackerSnapshot};
use rbp_eval::{Error, RelevanceTable, Run};

/// Initialize the logger
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tracker(data: &TestCollection, options: TrackerOptions) -> JudgmentErrorTracker {
    let mut tracker = JudgmentErrorTracker::from_qrels(data.qrels.clone(), options).unwrap();
    for run in data.runs.iter() {
        tracker.add_run(run.clone()).unwrap();
    }
    tracker
}

/// Every (docid, qid) pair retrieved by some run
fn pool(runs: &[Run]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = runs
        .iter()
        .flat_map(|run| run.lists().iter())
        .flat_map(|list| {
            list.scores()
                .iter()
                .map(move |doc| (doc.docid.clone(), list.qid().to_string()))
        })
        .collect();
    pairs.sort();
    pairs.dedup();
    pairs
}

#[rstest]
#[case(0.5)]
#[case(0.8)]
#[case(0.95)]
fn test_bounds_after_full_judging(#[case] persistence: f64) {
    init_logger();
    let mut data = TestCollection::new(4, 5, 30, 10., 20, Some(3));
    let mut tracker = tracker(
        &data,
        TrackerOptions {
            persistence,
            ..Default::default()
        },
    );

    let pairs = pool(&data.runs);
    for (docid, qid) in pairs.iter() {
        assert!(tracker.judge(docid, qid).unwrap());
    }
    assert_eq!(tracker.num_judged(), pairs.len());
    assert_eq!(tracker.num_lacking(), 0);

    check_tracker_bounds(&tracker, &mut data.runs, &data.qrels, 1e-9);
}

#[test]
fn test_bounds_are_monotone() {
    let data = TestCollection::new(3, 4, 20, 8., 15, Some(11));
    let mut tracker = tracker(&data, TrackerOptions::default());

    let mut previous = tracker.snapshot();
    for (docid, qid) in pool(&data.runs).iter() {
        tracker.judge(docid, qid).unwrap();
        let current = tracker.snapshot();
        for (p, c) in previous.runs.iter().zip(current.runs.iter()) {
            assert!(c.rbp >= p.rbp - 1e-12);
            assert!(c.err <= p.err + 1e-12);
            assert!(c.rbp + c.err <= p.rbp + p.err + 1e-12);
        }
        previous = current;
    }
}

#[test]
fn test_duplicates_and_unknown_documents() {
    let data = TestCollection::new(2, 2, 10, 5., 10, Some(5));
    let mut tracker = tracker(&data, TrackerOptions::default());
    let (docid, qid) = pool(&data.runs).remove(0);

    tracker.judge(&docid, &qid).unwrap();
    assert!(matches!(
        tracker.judge(&docid, &qid),
        Err(Error::DuplicateJudgment { .. })
    ));
    assert!(matches!(
        tracker.judged(&docid.to_uppercase(), &qid, 1.),
        Err(Error::DuplicateJudgment { .. })
    ));
    assert!(matches!(
        tracker.judged("not-retrieved", &qid, 1.),
        Err(Error::DocumentNotRetrieved { .. })
    ));
    assert!(matches!(
        tracker.judged(&docid, "unknown", 1.),
        Err(Error::UnknownQuery(_))
    ));
    assert_eq!(tracker.num_judged(), 1);

    // Runs cannot be added once judging started
    assert!(tracker.add_run(data.runs[0].clone()).is_err());
}

#[test]
fn test_invalid_options() {
    for options in [
        TrackerOptions {
            persistence: 1.,
            ..Default::default()
        },
        TrackerOptions {
            persistence: 0.,
            ..Default::default()
        },
        TrackerOptions {
            depth: 0,
            ..Default::default()
        },
    ] {
        assert!(JudgmentErrorTracker::new(["1"], options).is_err());
    }
    let no_query = std::iter::empty::<&str>();
    assert!(JudgmentErrorTracker::new(no_query, TrackerOptions::default()).is_err());
}

#[test]
fn test_max_judgments() {
    let data = TestCollection::new(2, 3, 10, 5., 10, Some(8));
    let mut tracker = tracker(
        &data,
        TrackerOptions {
            max_judgments: Some(4),
            ..Default::default()
        },
    );
    let pairs = pool(&data.runs);
    let answers: Vec<bool> = pairs
        .iter()
        .take(4)
        .map(|(docid, qid)| tracker.judge(docid, qid).unwrap())
        .collect();
    assert_eq!(answers, vec![true, true, true, false]);
}

#[test]
fn test_top_run_found() {
    let options = TrackerOptions {
        persistence: 0.5,
        stop_when_top_run_found: true,
        ..Default::default()
    };
    let mut tracker = JudgmentErrorTracker::new(["q"], options).unwrap();
    for (runid, docids) in [("best", ["a", "b"]), ("worst", ["x", "y"])] {
        let mut run = Run::new(runid);
        let list = run.list_or_create("q");
        for (i, docid) in docids.iter().enumerate() {
            list.push(docid, i + 1, 10. - i as f64);
        }
        tracker.add_run(run).unwrap();
    }

    assert!(!tracker.top_run_found());
    assert!(tracker.judged("a", "q", 1.).unwrap());
    // worst: 0 + 0.5 is not below 0.5
    assert!(tracker.judged("x", "q", 0.).unwrap());
    // worst: 0 + 0.25 is now below 0.5
    assert!(!tracker.judged("y", "q", 0.).unwrap());
}

#[test]
fn test_logs_and_snapshot() {
    let dir = TempDir::new().unwrap();
    let data = TestCollection::new(2, 2, 10, 6., 10, Some(2));
    // Judgments for the second query only
    let kept = data.qids[1].clone();
    let mut qrels = RelevanceTable::new();
    if let Some(query) = data.qrels.query(&kept) {
        for (docid, raw) in query.iter() {
            qrels.insert(&kept, docid, raw, true);
        }
    }

    let mut tracker = JudgmentErrorTracker::new(
        data.qids.iter().map(|s| s.as_str()),
        TrackerOptions::default(),
    )
    .unwrap();
    tracker.set_qrels(qrels);
    for run in data.runs.iter() {
        tracker.add_run(run.clone()).unwrap();
    }

    let judgments_path = dir.child("judgments.txt");
    let lacking_path = dir.child("lacking.txt");
    let scores_path = dir.child("scores.txt");
    tracker.log_judgments(Box::new(File::create(&judgments_path).unwrap()));
    tracker.log_lacking_judgments(Box::new(File::create(&lacking_path).unwrap()));
    tracker.log_scores(Box::new(File::create(&scores_path).unwrap()), 2);

    let pairs = pool(&data.runs);
    for (docid, qid) in pairs.iter() {
        tracker.judge(docid, qid).unwrap();
    }

    let judgments = fs::read_to_string(&judgments_path).unwrap();
    assert_eq!(judgments.lines().count(), pairs.len());
    let lacking = fs::read_to_string(&lacking_path).unwrap();
    let num_lacking = pairs.iter().filter(|(_, qid)| *qid != kept).count();
    assert_eq!(lacking.lines().count(), num_lacking);
    assert_eq!(tracker.num_lacking(), num_lacking);
    for line in lacking.lines() {
        assert!(line.contains(&format!(" {}:", data.qids[0])));
        assert!(line.contains("(run"));
    }
    let scores = fs::read_to_string(&scores_path).unwrap();
    assert_eq!(
        scores.lines().filter(|l| l.starts_with('#')).count(),
        pairs.len() / 2
    );

    let snapshot_path = dir.child("snapshot.cbor");
    let snapshot = tracker.snapshot();
    snapshot.save(&snapshot_path).unwrap();
    let loaded = TrackerSnapshot::load(&snapshot_path).unwrap();
    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.num_judged, pairs.len());
    for (score, run) in loaded.runs.iter().zip(tracker.runs().iter()) {
        assert_eq!(score.runid, run.runid());
        assert_about_eq!(score.rbp, run.rbp());
    }
}
