//! The failure classifier: a pure function deciding what the engine
//! should do after a step fails, returning a plain value rather than
//! raising.

use crate::task::Step;

/// What the engine should do after a step fails, in strict priority
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyOutcome {
    /// Path A: `skip_on_failure` was non-empty. Carries the ids to mark
    /// SKIPPED and the reason to record against each.
    SkipAndContinue {
        skip_ids: Vec<String>,
        reason: String,
    },
    /// Path B: a non-critical action. The task continues past this
    /// failure.
    Continue,
    /// Path C: a critical action with no skip policy. The task aborts.
    AbortFailed,
}

/// Default skip reason for `move_shelf`/`move_to_location` failures.
pub const DEFAULT_SKIP_REASON: &str = "robot could not move to bedside";

/// Classify a failed step by the three-path priority order above.
/// Called both when `result.success == false` and for the synthesized
/// result of an unexpected exception — the two inputs are treated
/// identically once a `StepResult` exists.
pub fn classify(step: &Step) -> ClassifyOutcome {
    if !step.skip_on_failure.is_empty() {
        return ClassifyOutcome::SkipAndContinue {
            skip_ids: step.skip_on_failure.iter().cloned().collect(),
            reason: DEFAULT_SKIP_REASON.to_string(),
        };
    }

    if step.action.is_non_critical() {
        return ClassifyOutcome::Continue;
    }

    ClassifyOutcome::AbortFailed
}
