//! Step tracking for a single bridge attempt.
//!
//! A route owns an ordered list of [`BridgeStep`]s; presentation reads the
//! list but only the orchestrator mutates it, and only through
//! [`BridgeState`]. Step status moves strictly forward: pending →
//! in-progress → completed or failed. Once a step fails, the route halts.

use alloy::primitives::TxHash;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Forward-only ordering; both terminal statuses share a rank so
    /// neither can overwrite the other.
    pub fn can_advance_to(self, next: StepStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{text}")
    }
}

/// One named unit of progress within a bridge route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStep {
    pub id: &'static str,
    pub name: &'static str,
    pub description: String,
    pub status: StepStatus,
    pub tx_hash: Option<TxHash>,
    pub explorer_url: Option<String>,
    pub error: Option<String>,
}

impl BridgeStep {
    pub fn pending(id: &'static str, name: &'static str, description: impl Into<String>) -> Self {
        Self {
            id,
            name,
            description: description.into(),
            status: StepStatus::Pending,
            tx_hash: None,
            explorer_url: None,
            error: None,
        }
    }
}

/// Partial update applied to exactly one step. Unset fields keep their
/// current value; other steps are never touched.
#[derive(Debug, Clone, Default)]
pub struct StepUpdate {
    pub status: Option<StepStatus>,
    pub tx_hash: Option<TxHash>,
    pub explorer_url: Option<String>,
    pub error: Option<String>,
}

impl StepUpdate {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self::status(StepStatus::Completed)
    }

    pub fn completed_with_tx(tx_hash: TxHash, explorer_url: impl Into<String>) -> Self {
        Self {
            status: Some(StepStatus::Completed),
            tx_hash: Some(tx_hash),
            explorer_url: Some(explorer_url.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(StepStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },
    #[error("step {index} cannot move from {from} back to {to}")]
    StatusRegression {
        index: usize,
        from: StepStatus,
        to: StepStatus,
    },
}

/// Ordered step list with structured mutation. Pure data; no behavior
/// beyond bounds and forward-only checks.
#[derive(Debug, Clone, Default)]
pub struct StepTracker {
    steps: Vec<BridgeStep>,
    current: usize,
}

impl StepTracker {
    pub fn init_steps(&mut self, steps: Vec<BridgeStep>) {
        self.steps = steps;
        self.current = 0;
    }

    pub fn steps(&self) -> &[BridgeStep] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        if self.current + 1 < self.steps.len() {
            self.current += 1;
        }
    }

    /// Merges `update` into the step at `index`. Status changes must move
    /// forward; a regression is rejected and nothing is modified.
    pub fn update_step(&mut self, index: usize, update: StepUpdate) -> Result<(), StepError> {
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(StepError::OutOfBounds { index, len })?;

        if let Some(status) = update.status {
            if !step.status.can_advance_to(status) {
                return Err(StepError::StatusRegression {
                    index,
                    from: step.status,
                    to: status,
                });
            }
            step.status = status;
        }
        if let Some(tx_hash) = update.tx_hash {
            step.tx_hash = Some(tx_hash);
        }
        if let Some(explorer_url) = update.explorer_url {
            step.explorer_url = Some(explorer_url);
        }
        if let Some(error) = update.error {
            step.error = Some(error);
        }

        Ok(())
    }
}

/// Aggregate state of one bridge attempt, created fresh per attempt.
///
/// Invariant: `is_completed` implies no step failed, the last step is
/// completed, and `error` is unset. `error` being set implies
/// `is_loading` is false.
#[derive(Debug, Clone, Default)]
pub struct BridgeState {
    tracker: StepTracker,
    is_loading: bool,
    error: Option<String>,
    is_completed: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("cannot complete: step {index} is {status}")]
    StepNotCompleted { index: usize, status: StepStatus },
    #[error("cannot complete: error already recorded: {0}")]
    ErrorRecorded(String),
    #[error("cannot complete an empty step list")]
    NoSteps,
}

impl BridgeState {
    /// Starts a fresh attempt with the given step list.
    pub fn begin(&mut self, steps: Vec<BridgeStep>) {
        self.tracker.init_steps(steps);
        self.is_loading = true;
        self.error = None;
        self.is_completed = false;
    }

    pub fn steps(&self) -> &[BridgeStep] {
        self.tracker.steps()
    }

    pub fn current_step_index(&self) -> usize {
        self.tracker.current_step_index()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn update_step(&mut self, index: usize, update: StepUpdate) -> Result<(), StepError> {
        self.tracker.update_step(index, update)
    }

    pub fn advance(&mut self) {
        self.tracker.advance();
    }

    /// Records a validation failure that happened before any step ran.
    /// Steps from a previous attempt are cleared.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.tracker = StepTracker::default();
        self.is_loading = false;
        self.is_completed = false;
        self.error = Some(message.into());
    }

    /// Marks the currently active step failed and records the aggregate
    /// error. The active index is tracked here, not in the step objects:
    /// failures can arrive after the index has already advanced, and the
    /// message must land on the step that was running.
    ///
    /// Completed steps keep their transaction links so the user can verify
    /// on-chain state independently.
    pub fn fail_current(&mut self, message: impl Into<String>) {
        let message = message.into();
        let index = self.tracker.current_step_index();

        // A terminal step cannot regress; the aggregate error still records
        // the failure.
        let _ = self
            .tracker
            .update_step(index, StepUpdate::failed(message.clone()));

        self.is_loading = false;
        self.is_completed = false;
        self.error = Some(message);
    }

    /// Declares the attempt successful. Verifies the aggregate invariant
    /// instead of trusting the caller.
    pub fn complete(&mut self) -> Result<(), CompletionError> {
        if let Some(error) = &self.error {
            return Err(CompletionError::ErrorRecorded(error.clone()));
        }
        if self.tracker.steps().is_empty() {
            return Err(CompletionError::NoSteps);
        }
        if let Some((index, step)) = self
            .tracker
            .steps()
            .iter()
            .enumerate()
            .find(|(_, step)| step.status != StepStatus::Completed)
        {
            return Err(CompletionError::StepNotCompleted {
                index,
                status: step.status,
            });
        }

        self.is_loading = false;
        self.is_completed = true;
        Ok(())
    }

    /// Clears everything back to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    fn three_steps() -> Vec<BridgeStep> {
        vec![
            BridgeStep::pending("approve", "Approve USDC", "Approve spending"),
            BridgeStep::pending("deposit", "xReserve Bridge", "Deposit to Stacks"),
            BridgeStep::pending("attest", "Attestation & Minting", "Wait for mint"),
        ]
    }

    #[test]
    fn update_touches_only_the_named_step() {
        let mut tracker = StepTracker::default();
        tracker.init_steps(three_steps());
        let before: Vec<_> = tracker.steps().to_vec();

        tracker
            .update_step(1, StepUpdate::status(StepStatus::InProgress))
            .unwrap();
        tracker.update_step(1, StepUpdate::completed()).unwrap();

        assert_eq!(tracker.steps()[0], before[0]);
        assert_eq!(tracker.steps()[2], before[2]);
        assert_eq!(tracker.steps()[1].status, StepStatus::Completed);
        assert_eq!(tracker.steps()[1].name, before[1].name);
        assert_eq!(tracker.steps()[1].description, before[1].description);
    }

    #[test]
    fn status_never_regresses() {
        let mut tracker = StepTracker::default();
        tracker.init_steps(three_steps());

        tracker.update_step(0, StepUpdate::completed()).unwrap();

        let err = tracker
            .update_step(0, StepUpdate::status(StepStatus::InProgress))
            .unwrap_err();
        assert_eq!(
            err,
            StepError::StatusRegression {
                index: 0,
                from: StepStatus::Completed,
                to: StepStatus::InProgress,
            }
        );

        // Failed cannot overwrite completed either.
        assert!(tracker
            .update_step(0, StepUpdate::status(StepStatus::Failed))
            .is_err());
    }

    #[test]
    fn update_out_of_bounds_is_rejected() {
        let mut tracker = StepTracker::default();
        tracker.init_steps(three_steps());

        assert_eq!(
            tracker.update_step(3, StepUpdate::completed()).unwrap_err(),
            StepError::OutOfBounds { index: 3, len: 3 }
        );
    }

    #[test]
    fn completion_requires_every_step_completed() {
        let mut state = BridgeState::default();
        state.begin(three_steps());

        assert_eq!(
            state.complete().unwrap_err(),
            CompletionError::StepNotCompleted {
                index: 0,
                status: StepStatus::Pending,
            }
        );

        for index in 0..3 {
            state.update_step(index, StepUpdate::completed()).unwrap();
        }
        state.complete().unwrap();

        assert!(state.is_completed());
        assert!(!state.is_loading());
        assert!(state.error().is_none());
        assert_eq!(
            state.steps().last().map(|step| step.status),
            Some(StepStatus::Completed)
        );
    }

    #[test]
    fn completion_refused_after_failure() {
        let mut state = BridgeState::default();
        state.begin(three_steps());

        state.update_step(0, StepUpdate::completed()).unwrap();
        state.advance();
        state.fail_current("deposit reverted");

        assert_eq!(state.error(), Some("deposit reverted"));
        assert_eq!(state.steps()[1].status, StepStatus::Failed);
        assert!(!state.is_loading());
        assert!(matches!(
            state.complete().unwrap_err(),
            CompletionError::ErrorRecorded(_)
        ));
        assert!(!state.is_completed());
    }

    #[test]
    fn completed_steps_keep_links_after_a_later_failure() {
        let tx = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let mut state = BridgeState::default();
        state.begin(three_steps());

        state
            .update_step(0, StepUpdate::completed_with_tx(tx, "https://example.org/tx/0xaa"))
            .unwrap();
        state.advance();
        state.fail_current("timeout");

        assert_eq!(state.steps()[0].tx_hash, Some(tx));
        assert_eq!(
            state.steps()[0].explorer_url.as_deref(),
            Some("https://example.org/tx/0xaa")
        );
    }

    #[test]
    fn reject_reports_without_steps() {
        let mut state = BridgeState::default();
        state.reject("insufficient balance");

        assert_eq!(state.error(), Some("insufficient balance"));
        assert!(!state.is_loading());
        assert!(state.steps().is_empty());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut state = BridgeState::default();
        state.begin(three_steps());
        state.fail_current("boom");

        state.reset();

        assert!(state.steps().is_empty());
        assert!(state.error().is_none());
        assert!(!state.is_completed());
        assert!(!state.is_loading());
    }

    #[test]
    fn advance_saturates_at_the_last_step() {
        let mut tracker = StepTracker::default();
        tracker.init_steps(three_steps());

        for _ in 0..10 {
            tracker.advance();
        }
        assert_eq!(tracker.current_step_index(), 2);
    }
}
