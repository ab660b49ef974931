use std::path::PathBuf;
use thiserror::Error;

/// Every failure the localization core reports to its caller.
///
/// Row-level problems in a grid map are logged and skipped by the parser and
/// never show up here. Everything else is surfaced so the UI can turn it into
/// a prompt or a message without guessing.
#[derive(Debug, Error)]
pub enum LocError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid grid map {path:?}, line {line}: {reason}")]
    GridMap {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error(
        "grid map {path:?}, line {line}: electrode {label} has {channels} channel IDs but {contacts} contacts"
    )]
    ChannelMismatch {
        path: PathBuf,
        line: usize,
        label: String,
        channels: usize,
        contacts: usize,
    },

    #[error("cannot read volume {path:?}: {reason}")]
    Volume { path: PathBuf, reason: String },

    #[error("no CT is loaded")]
    NoCtLoaded,

    #[error("lead {0} does not exist")]
    UnknownLead(String),

    #[error("contact {contact} does not exist on lead {lead}")]
    UnknownContact { lead: String, contact: String },

    #[error(
        "lead {lead}: location {location:?} (group {group}) is already taken by contact {existing}"
    )]
    DuplicateLocation {
        lead: String,
        existing: String,
        location: (i64, i64),
        group: i32,
    },

    #[error("lead {lead}: location {location:?} is outside of lead dimensions {dimensions:?}")]
    OutOfBounds {
        lead: String,
        location: (i64, i64),
        dimensions: (usize, usize),
    },

    #[error("lead {0} has no empty contact slot left")]
    LeadFull(String),

    #[error("the current selection is empty")]
    EmptySelection,

    #[error("lead {lead}: need at least {required} localized contacts, found {found}")]
    InsufficientContacts {
        lead: String,
        required: usize,
        found: usize,
    },

    #[error("lead {lead}: {reason}")]
    DegenerateGeometry { lead: String, reason: String },

    #[error("lead {lead}: cannot add micro-contacts: {reason}")]
    MicroUnavailable { lead: String, reason: String },

    #[error("{path:?}, line {line}: {reason}")]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid leads document: {0}")]
    Document(String),

    #[error("unsupported export format '{0}', expected .json or .txt")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LocError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LocError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type LocResult<T> = std::result::Result<T, LocError>;
