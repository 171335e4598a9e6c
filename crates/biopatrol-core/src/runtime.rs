//! Runtime: the single explicit value an embedder constructs and holds.
//! Wires the fleet registry, the dispatcher, and the external
//! collaborators together and exposes the three operations a caller
//! needs: submit, cancel, get.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::TaskDispatcher;
use crate::engine::EngineConfig;
use crate::errors::RuntimeError;
use crate::external::{BioSensorClient, Notifier, ScanRecorder};
use crate::fleet::FleetRegistry;
use crate::task::{Task, TaskSpec, TaskStatus};
use crate::worker::{CancellationRegistry, TaskWorker};

/// Everything a `Runtime` needs beyond the fleet registry. Grouped so
/// `Runtime::new` doesn't take five trailing `Arc<dyn _>` parameters.
pub struct RuntimeDeps {
    pub bio_sensor: Arc<dyn BioSensorClient>,
    pub scan_recorder: Arc<dyn ScanRecorder>,
    pub notifier: Arc<dyn Notifier>,
    pub config: EngineConfig,
}

pub struct Runtime {
    fleets: FleetRegistry,
    dispatcher: Arc<TaskDispatcher>,
    tasks: RwLock<HashMap<String, Arc<RwLock<Task>>>>,
    cancellations: CancellationRegistry,
    shutdown: CancellationToken,
    deps: RuntimeDeps,
}

impl Runtime {
    /// Build a runtime over `fleets`, spawning the dispatcher loop and one
    /// worker per registered robot. `fleets` determines the robot id set;
    /// every id in it becomes a known, routable robot.
    pub fn new(fleets: FleetRegistry, deps: RuntimeDeps) -> Arc<Self> {
        let (dispatcher, dispatcher_loop) = TaskDispatcher::new();
        let shutdown = CancellationToken::new();

        let runtime = Arc::new(Self {
            fleets,
            dispatcher,
            tasks: RwLock::new(HashMap::new()),
            cancellations: Arc::new(RwLock::new(HashMap::new())),
            shutdown: shutdown.clone(),
            deps,
        });

        tokio::spawn(dispatcher_loop.run(shutdown.clone()));

        let robot_ids = runtime.fleets.robot_ids();
        for robot_id in robot_ids {
            runtime.spawn_worker(robot_id);
        }

        runtime
    }

    fn spawn_worker(self: &Arc<Self>, robot_id: String) {
        let dispatcher = self.dispatcher.clone();
        let fleet = self
            .fleets
            .get(&robot_id)
            .expect("robot_id came from fleets.robot_ids()");
        let deps = &self.deps;
        let worker_cancellations = self.cancellations.clone();
        let bio_sensor = deps.bio_sensor.clone();
        let scan_recorder = deps.scan_recorder.clone();
        let notifier = deps.notifier.clone();
        let config = deps.config;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let queue_rx = dispatcher.register_robot(robot_id.clone()).await;
            let worker = TaskWorker::new(
                robot_id,
                dispatcher,
                queue_rx,
                fleet,
                bio_sensor,
                scan_recorder,
                notifier,
                config,
                worker_cancellations,
            );
            worker.run(shutdown).await;
        });
    }

    /// Submit a new task. Returns its id immediately; the task starts
    /// QUEUED and is handed to the dispatcher in the background. An
    /// unknown pinned robot id is not rejected here — the dispatcher
    /// itself sets the task FAILED once it tries to route it, so the
    /// global queue never stalls on a bad id.
    pub async fn submit(&self, spec: TaskSpec) -> String {
        let task: Task = spec.into();
        let task_id = task.task_id.clone();
        let handle = Arc::new(RwLock::new(task));

        self.tasks.write().await.insert(task_id.clone(), handle.clone());
        self.dispatcher.submit(handle);

        task_id
    }

    /// Request cancellation. A queued task is marked CANCELLED
    /// immediately (the worker loop skips it when it's dequeued); an
    /// in-progress task is marked CANCELLED and its retry backoff
    /// interrupted so the engine notices at the next loop boundary.
    /// A no-op (not an error) if the task is already terminal.
    pub async fn cancel(&self, task_id: &str) -> Result<(), RuntimeError> {
        let handle = self
            .tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;

        let mut guard = handle.write().await;
        if guard.status.is_terminal() {
            return Ok(());
        }
        guard.set_status(TaskStatus::Cancelled);
        drop(guard);

        if let Some(token) = self.cancellations.read().await.get(task_id) {
            token.cancel();
        }

        Ok(())
    }

    /// Snapshot the current state of a task.
    pub async fn get(&self, task_id: &str) -> Result<Task, RuntimeError> {
        let handle = self
            .tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))?;
        Ok(handle.read().await.clone())
    }

    /// Stop the dispatcher and all worker loops. Tasks already running
    /// continue to completion; nothing new is dispatched.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
