//! Task Worker: the single-task-at-a-time loop behind one robot's
//! queue: wait for work, mark busy, run it to completion, mark
//! available, repeat.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{TaskDispatcher, TaskHandle};
use crate::engine::{run_task, Collaborators, EngineConfig};
use crate::external::{BioSensorClient, Notifier, ScanRecorder};
use crate::fleet::Fleet;
use crate::task::TaskStatus;

/// Per-task cancellation tokens, keyed by task id, so `Runtime::cancel`
/// can interrupt a task's retry backoff without reaching into the
/// worker that owns it.
pub type CancellationRegistry = Arc<RwLock<HashMap<String, CancellationToken>>>;

pub struct TaskWorker {
    robot_id: String,
    dispatcher: Arc<TaskDispatcher>,
    queue_rx: mpsc::UnboundedReceiver<TaskHandle>,
    fleet: Arc<dyn Fleet>,
    bio_sensor: Arc<dyn BioSensorClient>,
    scan_recorder: Arc<dyn ScanRecorder>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    cancellations: CancellationRegistry,
}

impl TaskWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        robot_id: String,
        dispatcher: Arc<TaskDispatcher>,
        queue_rx: mpsc::UnboundedReceiver<TaskHandle>,
        fleet: Arc<dyn Fleet>,
        bio_sensor: Arc<dyn BioSensorClient>,
        scan_recorder: Arc<dyn ScanRecorder>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
        cancellations: CancellationRegistry,
    ) -> Self {
        Self {
            robot_id,
            dispatcher,
            queue_rx,
            fleet,
            bio_sensor,
            scan_recorder,
            notifier,
            config,
            cancellations,
        }
    }

    /// Run until `shutdown` fires or the robot's queue closes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                maybe_task = self.queue_rx.recv() => {
                    let Some(task) = maybe_task else { return };
                    self.execute(task).await;
                }
            }
        }
    }

    async fn execute(&self, task: TaskHandle) {
        let task_id = task.read().await.task_id.clone();

        // A task cancelled while still queued (never dispatched to the
        // engine) is already terminal; skip it without running anything.
        if task.read().await.status == TaskStatus::Cancelled {
            return;
        }

        let task_cancel = CancellationToken::new();
        self.cancellations
            .write()
            .await
            .insert(task_id.clone(), task_cancel.clone());
        self.dispatcher.mark_busy(&self.robot_id, task.clone()).await;

        let collab = Collaborators {
            bio_sensor: self.bio_sensor.as_ref(),
            scan_recorder: self.scan_recorder.as_ref(),
            notifier: self.notifier.as_ref(),
        };

        run_task(task.clone(), self.fleet.clone(), &collab, &self.config, task_cancel).await;

        self.cancellations.write().await.remove(&task_id);
        self.dispatcher.mark_available(&self.robot_id).await;
    }
}
