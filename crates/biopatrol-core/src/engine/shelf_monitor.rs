//! Shelf Monitor: a per-active-shelf background poller that raises a
//! flag when the robot stops reporting that it carries the shelf.
//!
//! Uses the same cancellation-token idiom the engine uses elsewhere for
//! its own interruption (`tokio_util::sync::CancellationToken`): the
//! monitor reads a stop token and writes to a single `AtomicBool` cell.
//! A shelf drop is detected *only* here, never inferred from an RPC
//! error code — the main loop observes the flag at the top of its next
//! iteration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::fleet::{Fleet, FleetData};

/// A running (or just-stopped) shelf monitor task.
pub struct ShelfMonitorHandle {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

impl ShelfMonitorHandle {
    /// Request the monitor stop. Idempotent, and safe to call from
    /// multiple sites: the `return_shelf` step handler, shelf-drop
    /// handling, and the engine's cleanup block.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Wait for the monitor task to actually exit.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Start the monitor: first successful `move_shelf` in the task: only one
/// monitor at a time per task (enforced by the engine holding at most one
/// `ShelfMonitorHandle`, not by this function).
///
/// Each tick (period `period`, default 3s): query `get_moving_shelf`. A
/// query error is treated as transient and logged at DEBUG without
/// affecting `dropped`. A clean "no shelf id" response sets `dropped` and
/// issues a best-effort `cancel_command`, then the loop exits.
pub fn spawn(
    fleet: Arc<dyn Fleet>,
    period: Duration,
    dropped: Arc<AtomicBool>,
    poll_count: Arc<AtomicU64>,
) -> ShelfMonitorHandle {
    let stop = CancellationToken::new();
    let stop_for_task = stop.clone();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_for_task.cancelled() => return,
                _ = tokio::time::sleep(period) => {}
            }

            let result = fleet.get_moving_shelf().await;
            poll_count.fetch_add(1, Ordering::SeqCst);
            if !result.ok {
                tracing::debug!(error_code = result.error_code, "shelf monitor: transient query error, continuing");
                continue;
            }

            let carrying = matches!(result.data, FleetData::MovingShelf { shelf_id: Some(_) });
            if carrying {
                continue;
            }

            tracing::warn!("shelf monitor: robot no longer reports carrying a shelf");
            dropped.store(true, Ordering::SeqCst);
            let _ = fleet.cancel_command().await;
            return;
        }
    });

    ShelfMonitorHandle { stop, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetResult;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// A `Fleet` double that hands back a scripted sequence of
    /// `get_moving_shelf` results, one per tick, and records whether
    /// `cancel_command` was called.
    struct ScriptedFleet {
        responses: StdMutex<Vec<FleetResult>>,
        cancel_called: Arc<AtomicBool>,
        notify: Arc<Notify>,
    }

    #[async_trait]
    impl Fleet for ScriptedFleet {
        async fn move_to_location(&self, _l: &str, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn move_shelf(&self, _s: &str, _l: &str, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn return_shelf(&self, _s: &str, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn return_home(&self, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn dock_shelf(&self, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn undock_shelf(&self, _t: Duration) -> FleetResult {
            unimplemented!()
        }
        async fn move_to_pose(&self, _x: f64, _y: f64, _yaw: f64) -> FleetResult {
            unimplemented!()
        }
        async fn speak(&self, _t: &str) -> FleetResult {
            unimplemented!()
        }
        async fn cancel_command(&self) -> FleetResult {
            self.cancel_called.store(true, Ordering::SeqCst);
            self.notify.notify_one();
            FleetResult::success(FleetData::None)
        }
        async fn get_moving_shelf(&self) -> FleetResult {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                FleetResult::success(FleetData::MovingShelf { shelf_id: Some("S_04".into()) })
            } else {
                responses.remove(0)
            }
        }
        async fn list_shelves(&self) -> FleetResult {
            unimplemented!()
        }
        async fn list_locations(&self) -> FleetResult {
            unimplemented!()
        }
        async fn get_pose(&self) -> FleetResult {
            unimplemented!()
        }
        async fn get_battery(&self) -> FleetResult {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn sets_dropped_flag_on_clean_no_shelf_response() {
        let cancel_called = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let fleet = Arc::new(ScriptedFleet {
            responses: StdMutex::new(vec![FleetResult::success(FleetData::MovingShelf { shelf_id: None })]),
            cancel_called: cancel_called.clone(),
            notify: notify.clone(),
        });
        let dropped = Arc::new(AtomicBool::new(false));

        let handle = spawn(fleet, Duration::from_millis(1), dropped.clone(), Arc::new(AtomicU64::new(0)));
        notify.notified().await;
        handle.join().await;

        assert!(dropped.load(Ordering::SeqCst));
        assert!(cancel_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn survives_transient_errors_then_detects_drop() {
        let cancel_called = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let fleet = Arc::new(ScriptedFleet {
            responses: StdMutex::new(vec![
                FleetResult::error(crate::fleet::ERR_TRANSPORT_UNAVAILABLE, "down"),
                FleetResult::error(crate::fleet::ERR_TRANSPORT_UNAVAILABLE, "down"),
                FleetResult::success(FleetData::MovingShelf { shelf_id: None }),
            ]),
            cancel_called: cancel_called.clone(),
            notify: notify.clone(),
        });
        let dropped = Arc::new(AtomicBool::new(false));

        let handle = spawn(fleet, Duration::from_millis(1), dropped.clone(), Arc::new(AtomicU64::new(0)));
        notify.notified().await;
        handle.join().await;

        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transient_query_errors_do_not_set_dropped() {
        let fleet = Arc::new(ScriptedFleet {
            responses: StdMutex::new(vec![
                FleetResult::error(crate::fleet::ERR_TRANSPORT_UNAVAILABLE, "down"),
                FleetResult::error(crate::fleet::ERR_TRANSPORT_UNAVAILABLE, "down"),
                FleetResult::error(crate::fleet::ERR_TRANSPORT_UNAVAILABLE, "down"),
            ]),
            cancel_called: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        });
        let dropped = Arc::new(AtomicBool::new(false));

        let handle = spawn(fleet, Duration::from_millis(1), dropped.clone(), Arc::new(AtomicU64::new(0)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.request_stop();
        handle.join().await;

        assert!(!dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn explicit_stop_prevents_further_ticks() {
        let fleet = Arc::new(ScriptedFleet {
            responses: StdMutex::new(vec![]),
            cancel_called: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        });
        let dropped = Arc::new(AtomicBool::new(false));

        let handle = spawn(fleet, Duration::from_secs(60), dropped.clone(), Arc::new(AtomicU64::new(0)));
        handle.request_stop();
        handle.join().await;

        assert!(!dropped.load(Ordering::SeqCst));
    }
}
