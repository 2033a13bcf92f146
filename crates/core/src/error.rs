use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T, E = DumpError> = std::result::Result<T, E>;

/// Every failure surfaced by dump, restore and retention operations.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("backup not found: {0}")]
    NotFound(String),
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {}: {stderr}", ExitCode(*.exit_code))]
    Process {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error(
        "failed to remove {} backup(s) ({} removed): {}",
        .failures.len(),
        .removed.len(),
        RemovalList(.failures)
    )]
    AggregateRemoval {
        /// Files that were deleted before the failures were reported.
        removed: Vec<String>,
        failures: Vec<RemovalFailure>,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DumpError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// One file that could not be deleted during retention pruning.
#[derive(Debug)]
pub struct RemovalFailure {
    pub filename: String,
    pub source: io::Error,
}

struct ExitCode(Option<i32>);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "status {code}"),
            None => f.write_str("no status (terminated by signal)"),
        }
    }
}

struct RemovalList<'a>(&'a [RemovalFailure]);

impl fmt::Display for RemovalList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} ({})", failure.filename, failure.source)?;
        }
        Ok(())
    }
}
