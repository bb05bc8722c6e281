//! The per-connection dialog interpreter.
//!
//! A [`DialogSession`] walks one [`DialogGraph`] on behalf of one
//! connection. It is suspended between round trips: the server shows
//! the current step, waits for the client's answer, then calls
//! [`select`](DialogSession::select) or
//! [`navigate`](DialogSession::navigate) to resolve it.
//!
//! ```text
//!             select / navigate
//! start() ──→ [step] ─────────────→ [step] ──→ ... ──→ Completed
//!               ↑                      │
//!               └──────── back ────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    Answer, AnswerKind, CheckpointRegistry, DialogError, DialogGraph, Step,
    StepId,
};

/// Navigation buttons on the dialog window, independent of which
/// answers the step defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Back,
    Close,
}

/// What happened to the session after a client action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Now showing this step.
    Moved(StepId),
    /// Nothing changed: a checkpoint failed or the action had no edge
    /// to follow.
    Stayed,
    /// The session is over. `final_step` is where the last edge
    /// pointed.
    Completed { final_step: StepId },
}

/// One running conversation.
#[derive(Debug)]
pub struct DialogSession<C> {
    graph: Arc<DialogGraph>,
    checkpoints: Arc<CheckpointRegistry<C>>,
    /// Serial of the NPC or popup that started the conversation.
    actor: u32,
    current: StepId,
    /// Steps shown before the current one, most recent last.
    history: Vec<StepId>,
    finished: bool,
    last_activity: Instant,
}

impl<C> DialogSession<C> {
    /// Enters the graph's start step.
    ///
    /// # Errors
    /// [`DialogError::UnknownStep`] if the start step is missing.
    pub fn start(
        graph: Arc<DialogGraph>,
        checkpoints: Arc<CheckpointRegistry<C>>,
        actor: u32,
    ) -> Result<Self, DialogError> {
        let start = graph
            .step(graph.start)
            .ok_or(DialogError::UnknownStep(graph.start))?;
        let finished = start.is_terminal();
        let current = start.id;

        Ok(Self {
            graph,
            checkpoints,
            actor,
            current,
            history: Vec::new(),
            finished,
            last_activity: Instant::now(),
        })
    }

    pub fn graph_key(&self) -> &str {
        &self.graph.key
    }

    pub fn actor(&self) -> u32 {
        self.actor
    }

    pub fn current_id(&self) -> StepId {
        self.current
    }

    /// The step the client is looking at.
    pub fn current_step(&self) -> Result<&Step, DialogError> {
        self.graph
            .step(self.current)
            .ok_or(DialogError::UnknownStep(self.current))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `true` if nothing happened for at least `ttl`.
    pub fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= ttl
    }

    /// Steps back through, most recent last.
    pub fn history(&self) -> &[StepId] {
        &self.history
    }

    /// Resolves the answer at `index` (zero-based) on the current step.
    ///
    /// Sentinel answers behave as their navigation would: `back` steps
    /// back, `close` and `complete` end the session. Any checkpoint on
    /// the answer is awaited before the transition; if it fails the
    /// session stays put.
    ///
    /// # Errors
    /// - [`DialogError::Finished`]: the session already completed
    /// - [`DialogError::NoSuchAnswer`]: `index` is out of range
    /// - [`DialogError::UnknownStep`]: the answer targets a missing step
    pub async fn select(
        &mut self,
        index: usize,
        input: Option<&str>,
        ctx: &mut C,
    ) -> Result<Transition, DialogError> {
        self.ensure_active()?;
        let answer = self
            .current_step()?
            .answers
            .get(index)
            .cloned()
            .ok_or(DialogError::NoSuchAnswer(index))?;

        self.follow(&answer, input, ctx).await
    }

    /// Applies a navigation button.
    ///
    /// - `Next` follows the step's `next` answer; without one it takes
    ///   the implicit (empty) answer, then `complete`.
    /// - `Back` returns to the previous step if the step offers `back`.
    ///   At the first step it does nothing.
    /// - `Close` ends the session if the step offers `close`.
    ///
    /// With no matching answer the result is [`Transition::Stayed`].
    pub async fn navigate(
        &mut self,
        nav: Navigation,
        ctx: &mut C,
    ) -> Result<Transition, DialogError> {
        self.ensure_active()?;
        let step = self.current_step()?;

        let answer = match nav {
            Navigation::Next => step
                .find(AnswerKind::Next)
                .or_else(|| step.find(AnswerKind::Implicit))
                .or_else(|| step.find(AnswerKind::Complete)),
            Navigation::Back => step.find(AnswerKind::Back),
            Navigation::Close => step.find(AnswerKind::Close),
        }
        .cloned();

        match answer {
            Some(answer) => self.follow(&answer, None, ctx).await,
            None => Ok(Transition::Stayed),
        }
    }

    fn ensure_active(&mut self) -> Result<(), DialogError> {
        if self.finished {
            return Err(DialogError::Finished);
        }
        self.last_activity = Instant::now();
        Ok(())
    }

    async fn follow(
        &mut self,
        answer: &Answer,
        input: Option<&str>,
        ctx: &mut C,
    ) -> Result<Transition, DialogError> {
        let kind = answer.kind();

        if kind == AnswerKind::Back {
            return Ok(self.go_back());
        }

        if let Some(call) = &answer.checkpoint {
            if !self.checkpoints.evaluate(call, ctx, input).await {
                tracing::debug!(
                    dialog = %self.graph.key,
                    step = self.current,
                    checkpoint = %call.name,
                    "checkpoint held the dialog"
                );
                return Ok(Transition::Stayed);
            }
        }

        if answer.ends_session(self.current) {
            self.finished = true;
            return Ok(Transition::Completed {
                final_step: answer.target,
            });
        }

        let target = self
            .graph
            .step(answer.target)
            .ok_or(DialogError::UnknownStep(answer.target))?;
        let terminal = target.is_terminal();

        self.history.push(self.current);
        self.current = answer.target;

        if terminal {
            self.finished = true;
            return Ok(Transition::Completed {
                final_step: answer.target,
            });
        }
        Ok(Transition::Moved(answer.target))
    }

    fn go_back(&mut self) -> Transition {
        match self.history.pop() {
            Some(previous) => {
                self.current = previous;
                Transition::Moved(previous)
            }
            None => Transition::Stayed,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheckpointCall, CheckpointError};

    #[derive(Default)]
    struct Player {
        has_key: bool,
    }

    fn answer(text: &str, target: StepId) -> Answer {
        Answer {
            text: if text.is_empty() {
                None
            } else {
                Some(text.into())
            },
            target,
            checkpoint: None,
        }
    }

    fn step(id: StepId, answers: Vec<Answer>) -> Step {
        Step {
            id,
            prompt: format!("step {id}"),
            answers,
        }
    }

    /// 1 --Go--> 2 --Onward--> 3 --next--> 4 (terminal)
    ///           2 --back      3 --back
    fn linear() -> Arc<DialogGraph> {
        Arc::new(DialogGraph {
            key: "guide".into(),
            start: 1,
            steps: vec![
                step(1, vec![answer("Go", 2), answer("back", 1)]),
                step(2, vec![answer("Onward", 3), answer("back", 1)]),
                step(3, vec![answer("next", 4), answer("back", 2)]),
                step(4, vec![]),
            ],
        })
    }

    fn session(graph: Arc<DialogGraph>) -> DialogSession<Player> {
        let mut registry = CheckpointRegistry::new();
        registry.register_sync("HasKey", |p: &mut Player, _| Ok(p.has_key));
        registry.register_sync("Explodes", |_: &mut Player, _| {
            Err(CheckpointError::Failed {
                name: "Explodes".into(),
                reason: "boom".into(),
            })
        });
        DialogSession::start(graph, Arc::new(registry), 500).unwrap()
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[test]
    fn test_start_missing_start_step_is_error() {
        let graph = Arc::new(DialogGraph {
            key: "broken".into(),
            start: 9,
            steps: vec![step(1, vec![])],
        });

        let result =
            DialogSession::<Player>::start(graph, Arc::new(CheckpointRegistry::new()), 1);

        assert!(matches!(result, Err(DialogError::UnknownStep(9))));
    }

    // =====================================================================
    // back
    // =====================================================================

    #[tokio::test]
    async fn test_back_returns_to_previous_step() {
        let mut s = session(linear());
        let mut p = Player::default();

        s.select(0, None, &mut p).await.unwrap();
        s.select(0, None, &mut p).await.unwrap();
        assert_eq!(s.current_id(), 3);

        let t = s.navigate(Navigation::Back, &mut p).await.unwrap();

        assert_eq!(t, Transition::Moved(2));
        assert_eq!(s.current_id(), 2);
    }

    #[tokio::test]
    async fn test_back_at_first_step_stays() {
        let mut s = session(linear());

        let t = s
            .navigate(Navigation::Back, &mut Player::default())
            .await
            .unwrap();

        assert_eq!(t, Transition::Stayed);
        assert_eq!(s.current_id(), 1);
    }

    #[tokio::test]
    async fn test_selecting_back_answer_behaves_like_back() {
        let mut s = session(linear());
        let mut p = Player::default();
        s.select(0, None, &mut p).await.unwrap();

        // Answer 1 on step 2 is "back"; its authored target is ignored.
        let t = s.select(1, None, &mut p).await.unwrap();

        assert_eq!(t, Transition::Moved(1));
    }

    // =====================================================================
    // completion
    // =====================================================================

    #[tokio::test]
    async fn test_reaching_terminal_step_completes() {
        let mut s = session(linear());
        let mut p = Player::default();
        s.select(0, None, &mut p).await.unwrap();
        s.select(0, None, &mut p).await.unwrap();

        let t = s.navigate(Navigation::Next, &mut p).await.unwrap();

        assert_eq!(t, Transition::Completed { final_step: 4 });
        assert!(s.is_finished());
    }

    #[tokio::test]
    async fn test_after_completion_navigation_is_rejected() {
        let mut s = session(linear());
        let mut p = Player::default();
        s.select(0, None, &mut p).await.unwrap();
        s.select(0, None, &mut p).await.unwrap();
        s.navigate(Navigation::Next, &mut p).await.unwrap();

        assert_eq!(
            s.navigate(Navigation::Back, &mut p).await,
            Err(DialogError::Finished)
        );
        assert_eq!(s.select(0, None, &mut p).await, Err(DialogError::Finished));
    }

    #[tokio::test]
    async fn test_next_prefers_next_then_implicit_then_complete() {
        let graph = Arc::new(DialogGraph {
            key: "fallbacks".into(),
            start: 1,
            steps: vec![
                step(1, vec![answer("complete", 3), answer("", 2)]),
                step(2, vec![answer("Fine", 3)]),
                step(3, vec![answer("Again", 1)]),
            ],
        });
        let mut s = session(graph);

        let t = s
            .navigate(Navigation::Next, &mut Player::default())
            .await
            .unwrap();

        // The implicit answer wins over "complete" and, since step 2
        // still has answers, simply moves there.
        assert_eq!(t, Transition::Moved(2));
        assert!(!s.is_finished());
    }

    #[tokio::test]
    async fn test_implicit_answer_to_own_step_completes() {
        let graph = Arc::new(DialogGraph {
            key: "farewell".into(),
            start: 1,
            steps: vec![
                step(1, vec![answer("Tell me more", 2), answer("", 1)]),
                step(2, vec![answer("back", 1)]),
            ],
        });
        let mut s = session(graph);

        let t = s
            .navigate(Navigation::Next, &mut Player::default())
            .await
            .unwrap();

        assert_eq!(t, Transition::Completed { final_step: 1 });
        assert!(s.is_finished());
    }

    #[tokio::test]
    async fn test_close_without_close_answer_stays() {
        let mut s = session(linear());

        let t = s
            .navigate(Navigation::Close, &mut Player::default())
            .await
            .unwrap();

        assert_eq!(t, Transition::Stayed);
        assert!(!s.is_finished());
    }

    #[tokio::test]
    async fn test_close_answer_completes() {
        let graph = Arc::new(DialogGraph {
            key: "closer".into(),
            start: 1,
            steps: vec![step(1, vec![answer("Stay", 1), answer("close", 1)])],
        });
        let mut s = session(graph);

        let t = s
            .navigate(Navigation::Close, &mut Player::default())
            .await
            .unwrap();

        assert_eq!(t, Transition::Completed { final_step: 1 });
    }

    // =====================================================================
    // checkpoints
    // =====================================================================

    fn gated(name: &str) -> Arc<DialogGraph> {
        let mut door = answer("Open the door", 2);
        door.checkpoint = Some(CheckpointCall {
            name: name.into(),
            value: String::new(),
        });
        Arc::new(DialogGraph {
            key: "door".into(),
            start: 1,
            steps: vec![
                step(1, vec![door]),
                step(2, vec![answer("back", 1)]),
            ],
        })
    }

    #[tokio::test]
    async fn test_checkpoint_false_stays() {
        let mut s = session(gated("HasKey"));

        let t = s.select(0, None, &mut Player::default()).await.unwrap();

        assert_eq!(t, Transition::Stayed);
        assert_eq!(s.current_id(), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_true_moves() {
        let mut s = session(gated("HasKey"));
        let mut p = Player { has_key: true };

        let t = s.select(0, None, &mut p).await.unwrap();

        assert_eq!(t, Transition::Moved(2));
    }

    #[tokio::test]
    async fn test_checkpoint_error_is_contained() {
        let mut s = session(gated("Explodes"));

        let t = s.select(0, None, &mut Player::default()).await.unwrap();

        assert_eq!(t, Transition::Stayed);
        assert!(!s.is_finished());
    }

    #[tokio::test]
    async fn test_select_out_of_range_is_error() {
        let mut s = session(linear());

        assert_eq!(
            s.select(7, None, &mut Player::default()).await,
            Err(DialogError::NoSuchAnswer(7))
        );
    }

    // =====================================================================
    // idle
    // =====================================================================

    #[test]
    fn test_is_idle_after_ttl() {
        let s = session(linear());
        let ttl = Duration::from_secs(300);

        assert!(!s.is_idle(s.last_activity + Duration::from_secs(10), ttl));
        assert!(s.is_idle(s.last_activity + ttl, ttl));
    }
}
