use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RetrieveError {
    #[error("destination already exists: {0}")]
    #[diagnostic(help("the data was already retrieved; remove it or pick another destination"))]
    DestinationExists(PathBuf),

    #[error("source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("copy failed at {path}: {source}")]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rename failed for job {job_id} at {path}: {reason}")]
    #[diagnostic(help("the destination is partially renamed; inspect or discard it"))]
    RenameFailed {
        job_id: String,
        last_path: Option<PathBuf>,
        path: PathBuf,
        reason: String,
    },

    #[error("ambiguous token set: {0}")]
    AmbiguousTokenSet(String),

    #[error("got {pseudonyms} pseudonyms but {real_ids} real ids")]
    PairCountMismatch { pseudonyms: usize, real_ids: usize },

    #[error("invalid pseudonym pair: {0}")]
    InvalidPair(String),

    #[error("invalid job id: {0:?}")]
    InvalidJobId(String),

    #[error("invalid sequencing year: {0}")]
    InvalidYear(String),

    #[error("no sample named {pseudonym} found for year 20{year}")]
    RunNotFound { pseudonym: String, year: String },

    #[error("path is not inside a run Samples folder: {0}")]
    NotInRun(PathBuf),

    #[error("missing job manifest seq-retrieve.json in current directory")]
    MissingConfig,

    #[error("failed to read job manifest at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse job manifest: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("job {0} worker panicked")]
    WorkerPanicked(String),
}
