use crate::align;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("alignment service failed while {context}: {source}")]
    Alignment {
        context: String,
        #[source]
        source: align::Error,
    },

    #[error("the canonical sequence set is empty; build or load it before matching")]
    EmptyStandardSet,

    #[error(
        "structure '{structure}': unassigned chain '{chain_id}' collides with destination \
         '{chain_id}' and no free identifier remains"
    )]
    NoFreeIdentifier { structure: String, chain_id: String },

    #[error("'{id}' is not a valid destination identifier: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("entity '{entity}' maps {needed} chains but only {assigned} destinations are assigned")]
    MissingDestinations {
        entity: String,
        needed: usize,
        assigned: usize,
    },

    #[error("cannot finalize: {count} conversion or concatenation entries are unconfirmed")]
    Incomplete { count: usize },

    #[error("workflow cannot move to '{requested}' from '{current}'")]
    InvalidTransition { current: String, requested: String },

    #[error(
        "structure '{structure}' chain '{chain_id}': alignment covers {aligned} residues but the \
         chain has {expected}"
    )]
    TemplateMismatch {
        structure: String,
        chain_id: String,
        aligned: usize,
        expected: usize,
    },

    #[error("conversion file '{}' line {line_number}: {details}", path.display())]
    ConversionFile {
        path: PathBuf,
        line_number: usize,
        details: String,
    },

    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode canonical sequence set '{}': {source}", path.display())]
    StandardJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn alignment(context: impl Into<String>, source: align::Error) -> Self {
        Self::Alignment {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_identifier(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn conversion_file(
        path: impl Into<PathBuf>,
        line_number: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::ConversionFile {
            path: path.into(),
            line_number,
            details: details.into(),
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
