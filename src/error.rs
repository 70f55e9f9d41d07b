use std::fmt;

use thiserror::Error;

use crate::object::ObjectId;

/// Result type for object store and clone operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An object or ref that was asked for is not on disk
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed ref advertisement or pkt-line framing
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Network failure, unexpected HTTP status, timeout or a fatal side-band message
    #[error("transport error: {0}")]
    Transport(String),

    /// Bad pack framing, unknown entry type or an unresolvable delta base
    #[error("corrupt pack: {0}")]
    CorruptPack(String),

    /// Trailing pack checksum does not match the pack contents
    #[error("pack checksum mismatch: expected {expected}, computed {actual}")]
    Checksum { expected: String, actual: String },

    /// Loose object file exists but cannot be inflated or parsed
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Malformed id, header, tree record or user input
    #[error("invalid: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt_pack(msg: impl Into<String>) -> Self {
        Error::CorruptPack(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub(crate) fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// True for errors that mean the data is absent rather than damaged
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Pipeline states of a clone, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStage {
    Init,
    Discover,
    Negotiate,
    Transfer,
    Ingest,
    Finalize,
}

impl fmt::Display for CloneStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloneStage::Init => "init",
            CloneStage::Discover => "discover",
            CloneStage::Negotiate => "negotiate",
            CloneStage::Transfer => "transfer",
            CloneStage::Ingest => "ingest",
            CloneStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// A clone failure tagged with the stage that aborted the pipeline
#[derive(Debug, Error)]
#[error("clone failed during {stage}: {source}")]
pub struct CloneError {
    pub stage: CloneStage,
    #[source]
    pub source: Error,
}

/// Tag a stage's result with the stage name on failure
pub(crate) trait StageContext<T> {
    fn at_stage(self, stage: CloneStage) -> std::result::Result<T, CloneError>;
}

impl<T> StageContext<T> for Result<T> {
    fn at_stage(self, stage: CloneStage) -> std::result::Result<T, CloneError> {
        self.map_err(|source| CloneError { stage, source })
    }
}
