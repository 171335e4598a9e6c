//! Task/step state machines.
//!
//! A pure, side-effect-free validator for the allowed transition graph.
//! `Task`/`Step` live purely in memory, owned by a single task's engine
//! execution, so there is no compare-and-swap to do — only the graph
//! check itself.

pub mod classify;

use crate::task::TaskStatus;

/// Valid task-status transition graph: `QUEUED -> IN_PROGRESS` once the
/// engine claims the task, then exactly one of the four terminal
/// states. A still-`QUEUED` task can also be cut short before the engine
/// ever sees it — cancelled externally, or rejected by the dispatcher for
/// an unknown robot id — without ever passing through `IN_PROGRESS`.
pub fn is_valid_task_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Queued, InProgress)
            | (Queued, Cancelled)
            | (Queued, Failed)
            | (InProgress, Done)
            | (InProgress, Failed)
            | (InProgress, Cancelled)
            | (InProgress, ShelfDropped)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn queued_to_in_progress_is_valid() {
        assert!(is_valid_task_transition(Queued, InProgress));
    }

    #[test]
    fn in_progress_reaches_any_terminal_state() {
        for terminal in [Done, Failed, Cancelled, ShelfDropped] {
            assert!(is_valid_task_transition(InProgress, terminal));
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [Done, Failed, Cancelled, ShelfDropped] {
            for to in [Queued, InProgress, Done, Failed, Cancelled, ShelfDropped] {
                assert!(!is_valid_task_transition(terminal, to));
            }
        }
    }

    #[test]
    fn queued_cannot_skip_straight_to_terminal() {
        assert!(!is_valid_task_transition(Queued, Done));
        assert!(!is_valid_task_transition(Queued, ShelfDropped));
    }

    #[test]
    fn queued_can_be_cancelled_or_rejected_before_the_engine_claims_it() {
        assert!(is_valid_task_transition(Queued, Cancelled));
        assert!(is_valid_task_transition(Queued, Failed));
    }
}
