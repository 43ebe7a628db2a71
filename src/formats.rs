//! Run and qrels text formats
//!
//! A run row is `qid iteration docid rank score runid`, a qrels row is
//! `qid iteration docid relevance`, fields being separated by
//! whitespace.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::warn;

use crate::error::{Error, Result};
use crate::qrels::RelevanceTable;
use crate::run::{Run, ScoreOrdering};

const RUN_NUM_COLS: usize = 6;
const QRELS_NUM_COLS: usize = 4;

/// Iteration placeholder written by [write_run]
pub const ITERATION_PLACEHOLDER: &str = "Q0";

fn split_columns<'a>(
    line: &'a str,
    expected: usize,
    source_name: &str,
    line_num: usize,
) -> Result<Vec<&'a str>> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() != expected {
        return Err(Error::malformed(
            source_name,
            line_num,
            format!("wrong number of fields ({} instead of {})", cols.len(), expected),
        ));
    }
    Ok(cols)
}

/// Loads a run
///
/// When `qid_filter` is given, only rows of that (lower-cased) query are
/// kept.
pub fn load_run<R: BufRead>(reader: R, source_name: &str, qid_filter: Option<&str>) -> Result<Run> {
    let mut run = Run::new("");
    let mut runid: Option<String> = None;
    let mut warned_about_runid = false;
    let mut warned_about_commas = false;
    let qid_filter = qid_filter.map(|q| q.to_lowercase());

    for (ix, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = ix + 1;
        if line.trim().is_empty() {
            continue;
        }
        let cols = split_columns(&line, RUN_NUM_COLS, source_name, line_num)?;

        let qid = cols[0].to_lowercase();
        if let Some(filter) = &qid_filter {
            if *filter != qid {
                continue;
            }
        }

        let mut score = cols[4].parse::<f64>().map_err(|_| {
            Error::malformed(
                source_name,
                line_num,
                format!("score '{}' is not a floating point number", cols[4]),
            )
        })?;
        if score.is_nan() {
            warn!(
                "{}:{}: score for qid {}, docid {} is NaN, converting to 0.0",
                source_name, line_num, qid, cols[2]
            );
            score = 0.;
        }

        let rank_text = if cols[3].contains(',') {
            if !warned_about_commas {
                warn!("{}:{}: comma(s) in rank, stripping", source_name, line_num);
                warned_about_commas = true;
            }
            cols[3].replace(',', "")
        } else {
            cols[3].to_string()
        };
        let rank = rank_text.parse::<usize>().map_err(|_| {
            Error::malformed(source_name, line_num, "rank is not a non-negative integer")
        })?;

        match &runid {
            None => runid = Some(cols[5].to_string()),
            Some(current) if current != cols[5] && !warned_about_runid => {
                warn!(
                    "{}:{}: run id changes from '{}' to '{}'",
                    source_name, line_num, current, cols[5]
                );
                warned_about_runid = true;
            }
            _ => (),
        }

        run.list_or_create(&qid).push(cols[2], rank, score);
    }

    if let Some(runid) = runid {
        run.set_runid(&runid);
    }
    Ok(run)
}

/// Loads a run from a file, diagnostics naming the file
pub fn load_run_file<P: AsRef<Path>>(path: P, qid_filter: Option<&str>) -> Result<Run> {
    let path = path.as_ref();
    let file = File::open(path)?;
    load_run(BufReader::new(file), &path.display().to_string(), qid_filter)
}

/// Loads relevance judgments
pub fn load_qrels<R: BufRead>(reader: R, source_name: &str) -> Result<RelevanceTable> {
    let mut table = RelevanceTable::new();
    for (ix, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = ix + 1;
        if line.trim().is_empty() {
            continue;
        }
        let cols = split_columns(&line, QRELS_NUM_COLS, source_name, line_num)?;
        let raw = cols[3]
            .parse::<f64>()
            .ok()
            .filter(|r| *r >= 0.)
            .ok_or_else(|| {
                Error::malformed(
                    source_name,
                    line_num,
                    format!("relevance '{}' is not a non-negative number", cols[3]),
                )
            })?;
        let integral = !cols[3].contains('.');
        if !table.insert(cols[0], cols[2], raw, integral) {
            return Err(Error::malformed(
                source_name,
                line_num,
                format!("duplicate judgment for qid {}, docid {}", cols[0], cols[2]),
            ));
        }
    }
    Ok(table)
}

pub fn load_qrels_file<P: AsRef<Path>>(path: P) -> Result<RelevanceTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    load_qrels(BufReader::new(file), &path.display().to_string())
}

/// Writes a run in the 6-column format, documents in occurrence order
///
/// The run id must be a single non-empty column.
pub fn write_run<W: Write>(run: &mut Run, mut writer: W) -> Result<()> {
    if run.runid().is_empty() || run.runid().contains(char::is_whitespace) {
        return Err(Error::InvalidParameter(format!(
            "run id '{}' cannot be written as a single column",
            run.runid()
        )));
    }
    run.sort(ScoreOrdering::Occurrence);
    for list in run.lists() {
        for doc in list.scores() {
            writeln!(
                writer,
                "{} {} {} {} {} {}",
                list.qid(),
                ITERATION_PLACEHOLDER,
                doc.docid,
                doc.rank,
                doc.score,
                run.runid()
            )?;
        }
    }
    Ok(())
}

/// Writes raw relevance values in the 4-column qrels format, sorted by
/// query then document
pub fn write_qrels<W: Write>(qrels: &RelevanceTable, mut writer: W) -> Result<()> {
    for qid in qrels.qids() {
        if let Some(query) = qrels.query(qid) {
            let mut judgments: Vec<(&str, f64)> = query.iter().collect();
            judgments.sort_by(|a, b| a.0.cmp(b.0));
            for (docid, raw) in judgments {
                writeln!(writer, "{} 0 {} {}", qid, docid, raw)?;
            }
        }
    }
    Ok(())
}
