//! Dialog graphs: steps, answers, and the sentinels that steer between
//! them.
//!
//! Graphs are authored outside the server and arrive as data (JSON in
//! practice). At runtime they are read-only and shared behind `Arc`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::DialogError;

/// Identifier of a step within one graph.
pub type StepId = u16;

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// A named checkpoint to evaluate before an answer's transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCall {
    pub name: String,
    /// Opaque argument handed to the handler (a quest name, an item key).
    #[serde(default)]
    pub value: String,
}

/// One button on a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Display text, or one of the sentinels `back`, `next`, `close`,
    /// `complete`. Missing or empty text is an implicit completion edge.
    #[serde(default)]
    pub text: Option<String>,
    pub target: StepId,
    #[serde(default)]
    pub checkpoint: Option<CheckpointCall>,
}

/// How an answer behaves, decided by its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    Back,
    Next,
    Close,
    Complete,
    /// No text: taken by `next` when there is no `next` answer. Moves
    /// to its target; with nowhere else to go it completes the dialog.
    Implicit,
    /// An ordinary choice that moves to its target.
    Choice,
}

impl AnswerKind {
    pub fn classify(text: Option<&str>) -> Self {
        match text {
            None | Some("") => Self::Implicit,
            Some("back") => Self::Back,
            Some("next") => Self::Next,
            Some("close") => Self::Close,
            Some("complete") => Self::Complete,
            Some(_) => Self::Choice,
        }
    }

    /// `true` for kinds that always end the session when taken.
    pub fn terminates(self) -> bool {
        matches!(self, Self::Close | Self::Complete)
    }
}

impl Answer {
    pub fn kind(&self) -> AnswerKind {
        AnswerKind::classify(self.text.as_deref())
    }

    /// Whether taking this answer on step `from` ends the session
    /// outright. An implicit answer only does when it targets the step
    /// it sits on, i.e. it has no next step.
    pub fn ends_session(&self, from: StepId) -> bool {
        match self.kind() {
            AnswerKind::Implicit => self.target == from,
            kind => kind.terminates(),
        }
    }

    /// What the client shows on the button.
    pub fn label(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub prompt: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl Step {
    /// A step without answers ends the conversation once shown.
    pub fn is_terminal(&self) -> bool {
        self.answers.is_empty()
    }

    /// First answer of the given kind, in authored order.
    pub fn find(&self, kind: AnswerKind) -> Option<&Answer> {
        self.answers.iter().find(|a| a.kind() == kind)
    }

    pub fn labels(&self) -> Vec<String> {
        self.answers.iter().map(|a| a.label().to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// DialogGraph
// ---------------------------------------------------------------------------

/// A whole conversation, keyed by the template that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogGraph {
    pub key: String,
    pub start: StepId,
    pub steps: Vec<Step>,
}

impl DialogGraph {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Checks that step ids are unique and that the start step and
    /// every answer target exist.
    ///
    /// # Errors
    /// [`DialogError::InvalidGraph`] naming the first problem found.
    pub fn validate(&self) -> Result<(), DialogError> {
        let invalid = |reason: String| DialogError::InvalidGraph {
            key: self.key.clone(),
            reason,
        };

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id) {
                return Err(invalid(format!("duplicate step {}", step.id)));
            }
        }

        if !ids.contains(&self.start) {
            return Err(invalid(format!("start step {} missing", self.start)));
        }

        for step in &self.steps {
            for answer in &step.answers {
                if !ids.contains(&answer.target) {
                    return Err(invalid(format!(
                        "step {} answer {:?} targets missing step {}",
                        step.id,
                        answer.label(),
                        answer.target
                    )));
                }
            }
        }

        Ok(())
    }

    /// Checkpoint names referenced anywhere in the graph, with how many
    /// answers use each.
    pub fn checkpoint_names(&self) -> HashMap<&str, usize> {
        let mut names = HashMap::new();
        for call in self
            .steps
            .iter()
            .flat_map(|s| &s.answers)
            .filter_map(|a| a.checkpoint.as_ref())
        {
            *names.entry(call.name.as_str()).or_insert(0) += 1;
        }
        names
    }
}
