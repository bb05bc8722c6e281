//! Scripted dialogs for Hearthwire.
//!
//! NPCs and popups talk to players through dialog graphs: each
//! [`Step`] shows a prompt and a list of [`Answer`]s, and each answer
//! leads to another step. A [`DialogSession`] walks one graph for one
//! connection across as many round trips as the conversation takes.
//!
//! Game state is only reachable through named checkpoints registered in
//! a [`CheckpointRegistry`]. The graph can name a checkpoint; it cannot
//! run arbitrary code.

mod checkpoint;
mod error;
mod graph;
mod session;

pub use checkpoint::{CheckpointInput, CheckpointRegistry};
pub use error::{CheckpointError, DialogError};
pub use graph::{Answer, AnswerKind, CheckpointCall, DialogGraph, Step, StepId};
pub use session::{DialogSession, Navigation, Transition};
