//! Task Engine: the central state machine for one task execution.
//!
//! `run_task` iterates the step list, applies the failure classifier,
//! manages the Shelf Monitor's lifecycle, handles shelf-drop recovery,
//! and records step outcomes. It's a single free async function taking
//! everything it needs as arguments rather than a long-lived object,
//! since an engine "run" only ever exists for the duration of one task.

mod actions;
mod shelf_monitor;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::external::{BioSensorClient, Notifier, ScanRecorder};
use crate::external::scan::ScanRow;
use crate::fleet::names::NameResolver;
use crate::fleet::{Fleet, FleetData};
use crate::state::classify::{classify, ClassifyOutcome, DEFAULT_SKIP_REASON};
use crate::task::{Action, StepResult, StepStatus, Task, TaskStatus};

use actions::{dispatch_action, ActionContext, EngineState};

/// Ambient timeouts and tick periods. No file-based config loader
/// exists for this; it's a plain struct with sensible `Default`s that
/// the caller constructs directly.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub move_timeout: Duration,
    pub return_timeout: Duration,
    pub shelf_monitor_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            move_timeout: Duration::from_secs(120),
            return_timeout: Duration::from_secs(60),
            shelf_monitor_period: Duration::from_secs(3),
        }
    }
}

/// The external collaborators the engine drives but does not own.
pub struct Collaborators<'a> {
    pub bio_sensor: &'a dyn BioSensorClient,
    pub scan_recorder: &'a dyn ScanRecorder,
    pub notifier: &'a dyn Notifier,
}

/// Run one task to a terminal status, mutating `task` in place.
///
/// `task` is shared behind a lock because an external caller may call
/// `Runtime::cancel` concurrently with this execution: cancellation sets
/// `task.status = CANCELLED` and the engine only observes it at loop
/// boundaries. Locks are held only for the brief mutation itself, never
/// across a suspension point.
pub async fn run_task(
    task: Arc<RwLock<Task>>,
    fleet: Arc<dyn Fleet>,
    collab: &Collaborators<'_>,
    config: &EngineConfig,
    cancel: CancellationToken,
) {
    let task_id = task.read().await.task_id.clone();

    let mut resolver = NameResolver::new();
    refresh_name_caches(fleet.as_ref(), &mut resolver).await;

    {
        let mut guard = task.write().await;
        guard.set_status(TaskStatus::InProgress);
        guard.started_at = Some(Utc::now());
    }

    let mut state = EngineState::new();
    let mut skipped_steps: HashSet<String> = HashSet::new();
    let mut skip_reasons: HashMap<String, String> = HashMap::new();
    let mut last_executing_step: Option<String> = None;

    let step_ids: Vec<String> = task.read().await.steps.iter().map(|s| s.step_id.clone()).collect();

    for step_id in step_ids {
        // 1. Cancellation check.
        if task.read().await.status == TaskStatus::Cancelled {
            break;
        }

        // 2. Shelf-drop check.
        if state.shelf_dropped.load(Ordering::SeqCst) {
            handle_shelf_drop(&task, &mut state, fleet.as_ref(), collab, last_executing_step.as_deref()).await;
            break;
        }

        // 3. Skip check.
        if skipped_steps.contains(&step_id) {
            let reason = skip_reasons
                .get(&step_id)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SKIP_REASON.to_string());

            let mut guard = task.write().await;
            let target_bed = state.target_bed.clone();
            if let Some(step) = guard.step_mut(&step_id) {
                if let Action::BioScan { bed_key } = step.action.clone() {
                    drop(guard);
                    let _ = collab
                        .scan_recorder
                        .record(ScanRow::not_available(
                            target_bed.unwrap_or_default(),
                            bed_key,
                            reason.clone(),
                        ))
                        .await;
                    guard = task.write().await;
                }
                if let Some(step) = guard.step_mut(&step_id) {
                    step.set_status(StepStatus::Skipped);
                    step.result = Some(
                        StepResult::ok(HashMap::new())
                            .with_data("conditional_skip", json!(true))
                            .with_data("reason", json!(reason)),
                    );
                }
            }
            continue;
        }

        // 4. Execute.
        last_executing_step = Some(step_id.clone());
        let action = {
            let mut guard = task.write().await;
            let step = guard.step_mut(&step_id).expect("step_id came from this task");
            step.set_status(StepStatus::Executing);
            step.action.clone()
        };

        let ctx = ActionContext {
            fleet: fleet.clone(),
            resolver: &resolver,
            bio_sensor: collab.bio_sensor,
            config,
            cancel: &cancel,
            task_id: &task_id,
        };
        let result = dispatch_action(&action, &ctx, &mut state).await;

        if result.success {
            let mut guard = task.write().await;
            if let Some(step) = guard.step_mut(&step_id) {
                step.set_status(StepStatus::Success);
                step.result = Some(result);
            }
            continue;
        }

        let outcome = {
            let mut guard = task.write().await;
            let step = guard.step_mut(&step_id).expect("step_id came from this task");
            step.set_status(StepStatus::Fail);
            step.result = Some(result);
            classify(step)
        };

        match outcome {
            ClassifyOutcome::SkipAndContinue { skip_ids, reason } => {
                for id in skip_ids {
                    skipped_steps.insert(id.clone());
                    skip_reasons.insert(id, reason.clone());
                }
            }
            ClassifyOutcome::Continue => {}
            ClassifyOutcome::AbortFailed => {
                task.write().await.set_status(TaskStatus::Failed);
                break;
            }
        }
    }

    // Post-loop.
    {
        let mut guard = task.write().await;
        if guard.status == TaskStatus::InProgress {
            guard.set_status(TaskStatus::Done);
        }
        let poll_count = state.poll_count.load(Ordering::SeqCst);
        guard
            .metadata
            .insert("metrics".to_string(), json!({ "poll_count": poll_count }));
    }

    // Finally: always stop the monitor, best-effort cancel cleanup, notify.
    state.stop_monitor_if_running().await;

    let terminal_status = task.read().await.status;
    if terminal_status == TaskStatus::Cancelled {
        if let Some(shelf_id) = state.current_shelf_id.clone() {
            let shelf_result = fleet.return_shelf(&shelf_id, config.return_timeout).await;
            if !shelf_result.ok {
                tracing::warn!(task_id = %task_id, error_code = shelf_result.error_code, "cancel cleanup: return_shelf failed (best-effort)");
            }
            let home_result = fleet.return_home(config.return_timeout).await;
            if !home_result.ok {
                tracing::warn!(task_id = %task_id, error_code = home_result.error_code, "cancel cleanup: return_home failed (best-effort)");
            }
        }
    }

    let summary = summarize(&*task.read().await);
    collab.notifier.notify(summary).await;

    task.write().await.finished_at = Some(Utc::now());
}

async fn refresh_name_caches(fleet: &dyn Fleet, resolver: &mut NameResolver) {
    let shelves_result = fleet.list_shelves().await;
    if shelves_result.ok {
        if let FleetData::Shelves(shelves) = shelves_result.data {
            resolver.refresh_shelves(&shelves);
        }
    } else {
        tracing::warn!(error_code = shelves_result.error_code, "failed to refresh shelf name cache");
    }

    let locations_result = fleet.list_locations().await;
    if locations_result.ok {
        if let FleetData::Locations(locations) = locations_result.data {
            resolver.refresh_locations(&locations);
        }
    } else {
        tracing::warn!(error_code = locations_result.error_code, "failed to refresh location name cache");
    }
}

/// Handle a detected shelf drop: stop the monitor, resolve the shelf's
/// last pose, collect the beds that were never scanned, persist N/A
/// rows for each, and transition the task to SHELF_DROPPED.
async fn handle_shelf_drop(
    task: &Arc<RwLock<Task>>,
    state: &mut EngineState,
    fleet: &dyn Fleet,
    collab: &Collaborators<'_>,
    trigger_step_id: Option<&str>,
) {
    state.stop_monitor_if_running().await;

    let shelf_pose = lookup_shelf_pose(fleet, state.current_shelf_id.as_deref()).await;

    let mut remaining_beds: Vec<String> = Vec::new();
    {
        let guard = task.read().await;
        for step in &guard.steps {
            if let Action::BioScan { bed_key } = &step.action {
                if step.status == StepStatus::Pending {
                    remaining_beds.push(bed_key.clone());
                }
            }
        }
        if let Some(trigger_id) = trigger_step_id {
            if let Some(step) = guard.step(trigger_id) {
                if let Action::BioScan { bed_key } = &step.action {
                    if !remaining_beds.contains(bed_key) {
                        remaining_beds.insert(0, bed_key.clone());
                    }
                }
            }
        }
    }

    for bed_key in &remaining_beds {
        let _ = collab
            .scan_recorder
            .record(ScanRow::not_available(
                state.target_bed.clone().unwrap_or_default(),
                bed_key.clone(),
                "shelf dropped, patrol interrupted",
            ))
            .await;
    }

    {
        let mut guard = task.write().await;
        guard.metadata.insert("shelf_drop".to_string(), json!(true));
        guard
            .metadata
            .insert("shelf_id".to_string(), json!(state.current_shelf_id));
        guard.metadata.insert("shelf_pose".to_string(), shelf_pose);
        guard
            .metadata
            .insert("remaining_beds".to_string(), json!(remaining_beds));
        guard
            .metadata
            .insert("dropped_at".to_string(), json!(Utc::now()));
        guard.set_status(TaskStatus::ShelfDropped);
    }

    let home_result = fleet.return_home(Duration::from_secs(60)).await;
    if !home_result.ok {
        tracing::warn!(error_code = home_result.error_code, "shelf drop: return_home failed (best-effort)");
    }
}

async fn lookup_shelf_pose(fleet: &dyn Fleet, shelf_id: Option<&str>) -> Value {
    let Some(shelf_id) = shelf_id else {
        return Value::Null;
    };

    let result = fleet.list_shelves().await;
    if !result.ok {
        tracing::warn!(error_code = result.error_code, "shelf drop: failed to look up shelf pose");
        return Value::Null;
    }

    if let FleetData::Shelves(shelves) = result.data {
        if let Some(shelf) = shelves.iter().find(|s| s.id == shelf_id) {
            return json!({ "x": shelf.pose.x, "y": shelf.pose.y, "theta": shelf.pose.theta });
        }
    }

    Value::Null
}

/// The Notifier receives a summary "completed X of Y beds" on any
/// terminal state.
fn summarize(task: &Task) -> String {
    let total = task
        .steps
        .iter()
        .filter(|s| matches!(s.action, Action::BioScan { .. }))
        .count();
    let completed = task
        .steps
        .iter()
        .filter(|s| matches!(s.action, Action::BioScan { .. }) && s.status == StepStatus::Success)
        .count();
    format!(
        "task {}: completed {completed} of {total} beds (status {})",
        task.task_id, task.status
    )
}
