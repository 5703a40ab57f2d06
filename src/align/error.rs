use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to launch aligner '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("aligner '{program}' exited unsuccessfully ({status})")]
    Failed { program: String, status: ExitStatus },

    #[error("aligner produced no usable output at '{}' within {seconds}s", path.display())]
    TimedOut { path: PathBuf, seconds: u64 },

    #[error("I/O error on alignment file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed alignment output at '{}': {details}", path.display())]
    Malformed { path: PathBuf, details: String },

    #[error("aligned sequences disagree in shape: {details}")]
    Shape { details: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn shape(details: impl Into<String>) -> Self {
        Self::Shape {
            details: details.into(),
        }
    }
}
