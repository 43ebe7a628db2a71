//! Errors reported by the loaders and the judgment tracker.
//!
//! Weight-accounting defects (scores above one, negative residuals,
//! empty tie groups, cursor misuse) are not represented here: they are
//! programming errors and abort through `assert!`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A run or qrels row could not be parsed
    #[error("{source_name}:{line}: {message}")]
    MalformedInput {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An option or argument outside of its domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown query '{0}'")]
    UnknownQuery(String),

    #[error("Unknown run '{0}'")]
    UnknownRun(String),

    /// The (document, query) pair is not retrieved by any run
    #[error("Document '{docid}' is not retrieved by any run for query '{qid}'")]
    DocumentNotRetrieved { docid: String, qid: String },

    #[error("Document '{docid}' has already been judged for query '{qid}'")]
    DuplicateJudgment { docid: String, qid: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(source_name: &str, line: usize, message: impl Into<String>) -> Self {
        Error::MalformedInput {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }
}
