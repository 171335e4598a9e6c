//! The `Task` / `Step` / `StepResult` data model.
//!
//! A [`Task`] is an ordered, optionally robot-pinned plan made of [`Step`]s.
//! Steps mutate their own status and result in place as the engine executes
//! them; the task's ordering and step identities never change after
//! creation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Done,
    Failed,
    Cancelled,
    ShelfDropped,
}

impl TaskStatus {
    /// Terminal states end a task's execution for good.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::ShelfDropped
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::ShelfDropped => "shelf_dropped",
        };
        f.write_str(s)
    }
}

/// Status of a single [`Step`] within a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Executing,
    Success,
    Fail,
    Skipped,
}

impl StepStatus {
    /// Whether `to` is a legal move from `self` in the monotone DAG:
    /// `PENDING -> EXECUTING -> {SUCCESS, FAIL, SKIPPED}`, with `SKIPPED`
    /// also reachable directly from `PENDING`.
    pub fn can_transition_to(self, to: StepStatus) -> bool {
        matches!(
            (self, to),
            (StepStatus::Pending, StepStatus::Executing)
                | (StepStatus::Pending, StepStatus::Skipped)
                | (StepStatus::Executing, StepStatus::Success)
                | (StepStatus::Executing, StepStatus::Fail)
                | (StepStatus::Executing, StepStatus::Skipped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Fail | StepStatus::Skipped
        )
    }
}

/// The action a [`Step`] performs. Carries its own parameters as a
/// discriminated variant rather than an untyped `params` bag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum Action {
    Speak { speak_text: String },
    MoveToPose { x: f64, y: f64, yaw: f64 },
    MoveToLocation { location_id: String },
    DockShelf,
    UndockShelf,
    MoveShelf { shelf_id: String, location_id: String },
    ReturnShelf { shelf_id: String },
    ReturnHome,
    BioScan { bed_key: String },
    Wait { seconds: u64 },
    /// An action name the engine does not recognize. Always fails with
    /// `error_code = -1`.
    Unknown { name: String },
}

/// Mirrors [`Action`]'s adjacently-tagged shape for deserialization, but
/// with `#[serde(other)]` on the tag so a step with an action name this
/// binary doesn't know about still parses — it just becomes
/// `Action::Unknown` instead of failing the whole task spec.
#[derive(Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
enum ActionWire {
    Speak { speak_text: String },
    MoveToPose { x: f64, y: f64, yaw: f64 },
    MoveToLocation { location_id: String },
    DockShelf,
    UndockShelf,
    MoveShelf { shelf_id: String, location_id: String },
    ReturnShelf { shelf_id: String },
    ReturnHome,
    BioScan { bed_key: String },
    Wait { seconds: u64 },
    #[serde(other)]
    Unrecognized,
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // `#[serde(other)]` only captures the tag, not the original
        // string, so recover it from the raw value when the match falls
        // through to `Unrecognized`.
        let value = Value::deserialize(deserializer)?;
        let action_name = value.get("action").and_then(Value::as_str).map(str::to_string);

        match ActionWire::deserialize(value).map_err(serde::de::Error::custom)? {
            ActionWire::Speak { speak_text } => Ok(Action::Speak { speak_text }),
            ActionWire::MoveToPose { x, y, yaw } => Ok(Action::MoveToPose { x, y, yaw }),
            ActionWire::MoveToLocation { location_id } => Ok(Action::MoveToLocation { location_id }),
            ActionWire::DockShelf => Ok(Action::DockShelf),
            ActionWire::UndockShelf => Ok(Action::UndockShelf),
            ActionWire::MoveShelf { shelf_id, location_id } => Ok(Action::MoveShelf { shelf_id, location_id }),
            ActionWire::ReturnShelf { shelf_id } => Ok(Action::ReturnShelf { shelf_id }),
            ActionWire::ReturnHome => Ok(Action::ReturnHome),
            ActionWire::BioScan { bed_key } => Ok(Action::BioScan { bed_key }),
            ActionWire::Wait { seconds } => Ok(Action::Wait { seconds }),
            ActionWire::Unrecognized => Ok(Action::Unknown {
                name: action_name.unwrap_or_else(|| "<missing>".to_string()),
            }),
        }
    }
}

impl Action {
    /// Name used in logs and in the "non-critical action" membership
    /// test: `bio_scan`, `wait`, `speak`, `return_shelf`.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Speak { .. } => "speak",
            Action::MoveToPose { .. } => "move_to_pose",
            Action::MoveToLocation { .. } => "move_to_location",
            Action::DockShelf => "dock_shelf",
            Action::UndockShelf => "undock_shelf",
            Action::MoveShelf { .. } => "move_shelf",
            Action::ReturnShelf { .. } => "return_shelf",
            Action::ReturnHome => "return_home",
            Action::BioScan { .. } => "bio_scan",
            Action::Wait { .. } => "wait",
            Action::Unknown { .. } => "unknown",
        }
    }

    /// Non-critical actions whose failure does not abort the task.
    pub fn is_non_critical(&self) -> bool {
        matches!(
            self,
            Action::BioScan { .. } | Action::Wait { .. } | Action::Speak { .. } | Action::ReturnShelf { .. }
        )
    }
}

/// Outcome of executing a single [`Step`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    /// `0` on success, `< 0` internal/unknown-action, `> 0` robot-domain code.
    pub error_code: i32,
    pub error_message: String,
    pub data: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    pub fn ok(data: HashMap<String, Value>) -> Self {
        Self {
            success: true,
            error_code: 0,
            error_message: String::new(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error_code: i32, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code,
            error_message: error_message.into(),
            data: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Internal/unexpected-exception sentinel.
    pub fn internal_exception(message: impl Into<String>) -> Self {
        Self::failure(-1, message)
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// A single parameterized robot or sensor action with a local success/skip
/// policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub action: Action,
    /// step_ids to mark SKIPPED if this step fails.
    #[serde(default)]
    pub skip_on_failure: HashSet<String>,
    #[serde(default = "default_pending")]
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<StepResult>,
}

fn default_pending() -> StepStatus {
    StepStatus::Pending
}

impl Step {
    pub fn new(step_id: impl Into<String>, action: Action) -> Self {
        Self {
            step_id: step_id.into(),
            action,
            skip_on_failure: HashSet::new(),
            status: StepStatus::Pending,
            result: None,
        }
    }

    pub fn with_skip_on_failure(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.skip_on_failure = ids.into_iter().collect();
        self
    }

    /// Apply a transition, recording the violation as a bug rather than
    /// silently no-opping: callers are expected to have checked
    /// `can_transition_to` or to be using one of the engine's own
    /// state-setting helpers.
    pub fn set_status(&mut self, to: StepStatus) {
        debug_assert!(
            self.status.can_transition_to(to),
            "illegal step transition {:?} -> {:?} for step {}",
            self.status,
            to,
            self.step_id
        );
        self.status = to;
    }
}

/// An ordered, robot-targeted plan composed of [`Step`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub robot_id: Option<String>,
    pub status: TaskStatus,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Construct a freshly-submitted task in `QUEUED` status.
    pub fn new(task_id: impl Into<String>, robot_id: Option<String>, steps: Vec<Step>) -> Self {
        Self {
            task_id: task_id.into(),
            robot_id,
            status: TaskStatus::Queued,
            steps,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Apply a task-status transition, recording a violation as a bug
    /// rather than silently no-opping (mirrors [`Step::set_status`]).
    pub fn set_status(&mut self, to: TaskStatus) {
        debug_assert!(
            crate::state::is_valid_task_transition(self.status, to),
            "illegal task transition {:?} -> {:?} for task {}",
            self.status,
            to,
            self.task_id
        );
        self.status = to;
    }
}

/// The wire shape submitted to the runtime: a thin deserialization
/// target that is converted into a [`Task`] (with a fresh `created_at`
/// and `QUEUED` status) by [`crate::runtime::Runtime::submit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    #[serde(default)]
    pub robot_id: Option<String>,
    pub steps: Vec<Step>,
}

impl From<TaskSpec> for Task {
    fn from(spec: TaskSpec) -> Self {
        Task::new(spec.task_id, spec.robot_id, spec.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_status_allows_pending_to_skipped_directly() {
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Skipped));
    }

    #[test]
    fn step_status_rejects_backwards_transition() {
        assert!(!StepStatus::Success.can_transition_to(StepStatus::Pending));
        assert!(!StepStatus::Skipped.can_transition_to(StepStatus::Executing));
    }

    #[test]
    fn step_status_requires_executing_before_success() {
        assert!(!StepStatus::Pending.can_transition_to(StepStatus::Success));
        assert!(StepStatus::Executing.can_transition_to(StepStatus::Success));
    }

    #[test]
    fn non_critical_actions_cover_expected_set() {
        assert!(Action::BioScan { bed_key: "101-1".into() }.is_non_critical());
        assert!(Action::Wait { seconds: 1 }.is_non_critical());
        assert!(Action::Speak { speak_text: "hi".into() }.is_non_critical());
        assert!(Action::ReturnShelf { shelf_id: "S_04".into() }.is_non_critical());
        assert!(!Action::MoveShelf {
            shelf_id: "S_04".into(),
            location_id: "B_101-1".into()
        }
        .is_non_critical());
    }

    #[test]
    fn round_trip_wire_shape() {
        let json = serde_json::json!({
            "task_id": "t1",
            "robot_id": null,
            "steps": [
                { "step_id": "s1", "action": "move_shelf",
                  "params": {"shelf_id":"S_04","location_id":"B_101-1"},
                  "skip_on_failure": ["s2"] },
                { "step_id": "s2", "action": "bio_scan",
                  "params": {"bed_key":"101-1"} },
            ]
        });
        let spec: TaskSpec = serde_json::from_value(json).unwrap();
        let task: Task = spec.into();
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[0].step_id, "s1");
        assert!(task.steps[0].skip_on_failure.contains("s2"));
        assert_eq!(task.status, TaskStatus::Queued);
    }

    #[test]
    fn unrecognized_action_tag_parses_as_unknown_instead_of_failing() {
        let json = serde_json::json!({
            "task_id": "t1",
            "robot_id": null,
            "steps": [
                { "step_id": "s1", "action": "levitate_shelf", "params": {} },
            ]
        });
        let spec: TaskSpec = serde_json::from_value(json).expect("unknown action tags must still parse");
        let task: Task = spec.into();
        match &task.steps[0].action {
            Action::Unknown { name } => assert_eq!(name, "levitate_shelf"),
            other => panic!("expected Action::Unknown, got {other:?}"),
        }
    }
}
