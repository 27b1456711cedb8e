use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Version;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot read migrations from {}: {message}", .path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("invalid migration {filename}: {kind}")]
    Parse {
        filename: String,
        kind: ParseErrorKind,
    },

    #[error("duplicate migration version {version} ({first} and {second})")]
    DuplicateVersion {
        version: Version,
        first: String,
        second: String,
    },

    #[error("driver error during {op}: {message}")]
    Driver { op: &'static str, message: String },

    #[error("migration {version} failed at {step}: {message}")]
    Execution {
        version: Version,
        step: Step,
        message: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Why a migration file could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("filename must look like <14-digit version>_<name>.<ext>")]
    InvalidFilename,

    #[error("more than one `-- {0}` marker")]
    DuplicateMarker(&'static str),

    #[error("`-- down` marker appears before `-- up`")]
    DownBeforeUp,

    #[error("statements appear before the `-- up` marker")]
    StatementsBeforeUp,
}

/// Where inside a migration's transaction a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Checking whether the migration is already applied.
    Lookup,
    Begin,
    /// Zero-based index into the section being executed.
    Statement(usize),
    Record,
    Commit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Lookup => f.write_str("applied-state lookup"),
            Step::Begin => f.write_str("transaction begin"),
            Step::Statement(index) => write!(f, "statement {}", index + 1),
            Step::Record => f.write_str("version tracking"),
            Step::Commit => f.write_str("commit"),
        }
    }
}

impl Error {
    /// The migration version this error is attached to, if any.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Error::DuplicateVersion { version, .. } | Error::Execution { version, .. } => {
                Some(version)
            }
            _ => None,
        }
    }
}
