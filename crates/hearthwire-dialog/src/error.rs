//! Error types for the dialog layer.

use crate::StepId;

/// Errors from walking a dialog graph.
///
/// None of these are fatal to a connection. The server logs them and
/// ignores the packet that caused them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogError {
    /// The graph points at a step it doesn't contain.
    #[error("step {0} does not exist")]
    UnknownStep(StepId),

    /// The client picked an answer index the current step doesn't have.
    #[error("no answer at index {0}")]
    NoSuchAnswer(usize),

    /// The session already completed; there is nothing to advance.
    #[error("dialog session is finished")]
    Finished,

    /// The graph failed validation when it was loaded.
    #[error("invalid dialog graph {key}: {reason}")]
    InvalidGraph { key: String, reason: String },
}

/// Raised by a checkpoint handler.
///
/// The interpreter catches it, logs it, and treats the checkpoint as
/// failed. The session stays where it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("no checkpoint handler named {0}")]
    Unregistered(String),
}
