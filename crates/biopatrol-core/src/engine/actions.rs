//! Action dispatch: one async handler per [`Action`] variant.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::engine::shelf_monitor;
use crate::engine::EngineConfig;
use crate::external::BioSensorClient;
use crate::fleet::names::NameResolver;
use crate::fleet::{Fleet, FleetData, FleetResult};
use crate::retry::{with_retry, RetryConfig, RetryOutcome};
use crate::task::{Action, StepResult};

/// Per-execution engine state that action handlers read and mutate:
/// the shelf currently being carried, the shelf-monitor lifecycle, and
/// the bed a subsequent `bio_scan` should target. Held as one value so
/// the monitor handle and the shelf id it watches can never drift out
/// of sync with each other.
pub(crate) struct EngineState {
    pub current_shelf_id: Option<String>,
    pub target_bed: Option<String>,
    pub shelf_monitor: Option<shelf_monitor::ShelfMonitorHandle>,
    pub shelf_dropped: Arc<std::sync::atomic::AtomicBool>,
    pub poll_count: Arc<std::sync::atomic::AtomicU64>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            current_shelf_id: None,
            target_bed: None,
            shelf_monitor: None,
            shelf_dropped: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            poll_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    pub async fn stop_monitor_if_running(&mut self) {
        if let Some(handle) = self.shelf_monitor.take() {
            handle.request_stop();
            handle.join().await;
        }
    }
}

pub(crate) struct ActionContext<'a> {
    pub fleet: Arc<dyn Fleet>,
    pub resolver: &'a NameResolver,
    pub bio_sensor: &'a dyn BioSensorClient,
    pub config: &'a EngineConfig,
    pub cancel: &'a CancellationToken,
    pub task_id: &'a str,
}

fn from_fleet_result(result: FleetResult) -> StepResult {
    if result.ok {
        let mut data = HashMap::new();
        if let FleetData::MovingShelf { shelf_id } = &result.data {
            data.insert("shelf_id".to_string(), json!(shelf_id));
        }
        StepResult::ok(data)
    } else {
        StepResult::failure(result.error_code, result.error_text)
    }
}

async fn run_retried<F, Fut>(config: RetryConfig, cancel: &CancellationToken, effect: F) -> FleetResult
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = FleetResult>,
{
    match with_retry(config, cancel, effect).await {
        RetryOutcome::Completed(result) => result,
        RetryOutcome::Cancelled => FleetResult::error(-1, "cancelled during retry backoff"),
    }
}

/// Dispatch a single action to completion, returning its [`StepResult`]
/// and applying any engine-state side effects (`move_shelf` starts the
/// monitor, `return_shelf` stops it first).
pub(crate) async fn dispatch_action(action: &Action, ctx: &ActionContext<'_>, state: &mut EngineState) -> StepResult {
    match action {
        Action::Speak { speak_text } => {
            let result = ctx.fleet.speak(speak_text).await;
            let mut step_result = from_fleet_result(result);
            step_result
                .data
                .insert("speak_text".to_string(), json!(speak_text));
            step_result
        }

        Action::MoveToPose { x, y, yaw } => {
            let result = ctx.fleet.move_to_pose(*x, *y, *yaw).await;
            from_fleet_result(result)
        }

        Action::MoveToLocation { location_id } => {
            let id = ctx.resolver.resolve_location_id(location_id);
            let result = run_retried(RetryConfig::navigation(), ctx.cancel, || {
                ctx.fleet.move_to_location(&id, ctx.config.move_timeout)
            })
            .await;
            from_fleet_result(result)
        }

        Action::DockShelf => {
            let result = run_retried(RetryConfig::navigation(), ctx.cancel, || {
                ctx.fleet.dock_shelf(ctx.config.move_timeout)
            })
            .await;
            from_fleet_result(result)
        }

        Action::UndockShelf => {
            let result = run_retried(RetryConfig::navigation(), ctx.cancel, || {
                ctx.fleet.undock_shelf(ctx.config.move_timeout)
            })
            .await;
            from_fleet_result(result)
        }

        Action::MoveShelf { shelf_id, location_id } => {
            let resolved_shelf = ctx.resolver.resolve_shelf_id(shelf_id);
            let resolved_location = ctx.resolver.resolve_location_id(location_id);
            state.target_bed = Some(location_id.clone());

            let result = run_retried(RetryConfig::shelf_move(), ctx.cancel, || {
                ctx.fleet
                    .move_shelf(&resolved_shelf, &resolved_location, ctx.config.move_timeout)
            })
            .await;

            if result.ok && state.shelf_monitor.is_none() {
                state.current_shelf_id = Some(resolved_shelf.clone());
                state.shelf_dropped.store(false, Ordering::SeqCst);
                let handle = shelf_monitor::spawn(
                    ctx.fleet.clone(),
                    ctx.config.shelf_monitor_period,
                    state.shelf_dropped.clone(),
                    state.poll_count.clone(),
                );
                state.shelf_monitor = Some(handle);
            }

            from_fleet_result(result)
        }

        Action::ReturnShelf { shelf_id } => {
            // Stop the monitor first: any pending shelf-drop signal
            // from this transition is ignored.
            state.stop_monitor_if_running().await;

            let resolved = ctx.resolver.resolve_shelf_id(shelf_id);
            let result = run_retried(RetryConfig::shelf_move(), ctx.cancel, || {
                ctx.fleet.return_shelf(&resolved, ctx.config.return_timeout)
            })
            .await;
            from_fleet_result(result)
        }

        Action::ReturnHome => {
            let result = ctx.fleet.return_home(ctx.config.return_timeout).await;
            from_fleet_result(result)
        }

        Action::BioScan { bed_key } => {
            let target_bed = state.target_bed.clone().unwrap_or_else(|| bed_key.clone());
            match ctx
                .bio_sensor
                .get_valid_scan_data(&target_bed, ctx.task_id, bed_key)
                .await
            {
                Some(payload) => {
                    let mut data = HashMap::new();
                    data.insert("bpm".to_string(), json!(payload.bpm));
                    data.insert("rpm".to_string(), json!(payload.rpm));
                    StepResult::ok(data)
                }
                None => StepResult::failure(-1, "bio-sensor timed out without a valid reading"),
            }
        }

        Action::Wait { seconds } => {
            tokio::time::sleep(std::time::Duration::from_secs(*seconds)).await;
            let mut data = HashMap::new();
            data.insert("seconds".to_string(), json!(seconds));
            StepResult::ok(data)
        }

        Action::Unknown { name } => StepResult::failure(-1, format!("unknown action: {name}")),
    }
}
