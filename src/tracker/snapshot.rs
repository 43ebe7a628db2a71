//! CBOR snapshots of the run scores, used to trace judging sessions

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::JudgmentErrorTracker;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunScore {
    pub runid: String,
    pub rbp: f64,
    pub err: f64,
}

/// Scores of every run after a number of judgments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub num_judged: usize,
    pub num_relevant: f64,
    pub runs: Vec<RunScore>,
}

impl TrackerSnapshot {
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        ciborium::ser::into_writer(self, writer).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn read<R: Read>(reader: R) -> Result<Self> {
        ciborium::de::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Writes the snapshot to a temporary file before moving it in place
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("cbor.tmp");
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        self.write(file)?;
        fs::rename(tmp_path, path)?;
        info!("Saved snapshot after {} judgments", self.num_judged);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::read(File::open(path)?)
    }
}

impl JudgmentErrorTracker {
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            num_judged: self.num_judged,
            num_relevant: self.num_relevant,
            runs: self
                .runs
                .iter()
                .map(|ri| RunScore {
                    runid: ri.runid().to_string(),
                    rbp: ri.rbp,
                    err: ri.err,
                })
                .collect(),
        }
    }
}
