use std::fs::File;
use std::io::Write;

use rstest::rstest;
use temp_dir::TempDir;

use helpers::collection::TestCollection;
use rbp_eval::base::Len;
use rbp_eval::formats::{load_qrels_file, load_run_file, write_qrels, write_run};
use rbp_eval::qrels::Rel;
use rbp_eval::rbp::{evaluate_run, RbpScorer};
use rbp_eval::{Error, ScoreOrdering};

/// Initialize the logger
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_run_files() {
    init_logger();
    let mut data = TestCollection::new(3, 4, 25, 10., 20, Some(42));

    for (run, path) in data.runs.iter_mut().zip(data.run_paths.iter()) {
        let mut loaded = load_run_file(path, None).unwrap();
        assert_eq!(loaded.runid(), run.runid());
        assert_eq!(loaded.len(), run.len());

        run.sort(ScoreOrdering::Occurrence);
        loaded.sort(ScoreOrdering::Occurrence);
        for list in run.lists() {
            let other = loaded.get(list.qid()).unwrap();
            assert_eq!(other.scores(), list.scores());
        }
    }
}

#[test]
fn test_run_filter() {
    let data = TestCollection::new(1, 3, 10, 5., 10, Some(4));
    let loaded = load_run_file(&data.run_paths[0], Some(&data.qids[2])).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(
        loaded.lists()[0].len(),
        data.runs[0].get(&data.qids[2]).unwrap().len()
    );
}

#[test]
fn test_qrels_files() {
    let dir = TempDir::new().unwrap();
    let data = TestCollection::new(1, 3, 15, 5., 10, Some(9));

    let loaded = load_qrels_file(&data.qrels_path).unwrap();
    assert_eq!(loaded.qids(), data.qrels.qids());
    for qid in data.qids.iter() {
        for (docid, raw) in data.qrels.query(qid).unwrap().iter() {
            assert_eq!(loaded.rel(qid, docid), Rel::Judged(raw));
        }
        assert_eq!(loaded.num_relevant(qid), data.qrels.num_relevant(qid));
    }

    // Writing back gives the same file
    let path = dir.child("copy.txt");
    write_qrels(&loaded, File::create(&path).unwrap()).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        std::fs::read_to_string(&data.qrels_path).unwrap()
    );
}

#[test]
fn test_evaluate_loaded_files() {
    let mut data = TestCollection::new(2, 4, 20, 10., 15, Some(21));
    let qrels = load_qrels_file(&data.qrels_path).unwrap();
    let scorer = RbpScorer::new(&[0.5, 0.8], ScoreOrdering::Score).unwrap();

    for (run, path) in data.runs.iter_mut().zip(data.run_paths.iter()) {
        let mut loaded = load_run_file(path, None).unwrap();
        let expected = evaluate_run(run, &data.qrels, &scorer, &[5, 10]).unwrap();
        let actual = evaluate_run(&mut loaded, &qrels, &scorer, &[5, 10]).unwrap();
        assert_eq!(actual, expected);
    }
}

#[rstest]
#[case("1 Q0 a 1 1.0 sys\n1 Q0 b 2 0.5\n", 2)]
#[case("1 Q0 a 1 1.0 sys\n\n1 Q0 b two 0.5 sys\n", 3)]
#[case("1 Q0 a 1 score sys\n", 1)]
fn test_malformed_run_file(#[case] text: &str, #[case] line: usize) {
    let dir = TempDir::new().unwrap();
    let path = dir.child("bad.run");
    File::create(&path)
        .unwrap()
        .write_all(text.as_bytes())
        .unwrap();

    match load_run_file(&path, None) {
        Err(Error::MalformedInput {
            source_name,
            line: l,
            ..
        }) => {
            assert_eq!(l, line);
            assert!(source_name.ends_with("bad.run"));
        }
        other => panic!("unexpected result {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        load_qrels_file("/nonexistent/qrels.txt"),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_write_run_keeps_occurrences() {
    let dir = TempDir::new().unwrap();
    let mut data = TestCollection::new(1, 2, 10, 5., 10, Some(13));
    let run = &mut data.runs[0];
    run.sort(ScoreOrdering::Score);

    let path = dir.child("run.txt");
    write_run(run, File::create(&path).unwrap()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let first = text.lines().next().unwrap();
    let fields: Vec<&str> = first.split_whitespace().collect();
    assert_eq!(fields.len(), 6);
    assert_eq!(fields[1], "Q0");
    assert_eq!(fields[3], "1");
    assert_eq!(fields[5], "run0");
}
