//! Task Dispatcher: routes submitted tasks to per-robot queues.
//!
//! Two unbounded mpsc channels carry the two kinds of submission the
//! queue sees: pinned tasks go straight to a named robot's queue, and
//! unpinned tasks wait for an "available robot" signal. Busy robots that
//! surface on the available-robot channel get requeued at the tail
//! rather than handed a task, so a worker slot claimed out from under
//! an available-robot signal doesn't drop the task on the floor.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::task::{Task, TaskStatus};

pub type TaskHandle = Arc<RwLock<Task>>;

/// Shared dispatcher state: senders only. The receivers it reads from
/// and hands out live in [`DispatcherLoop`] and the per-robot workers,
/// never here, so no lock is needed to pull a message off a channel.
pub struct TaskDispatcher {
    global_tx: mpsc::UnboundedSender<TaskHandle>,
    robot_queues: RwLock<HashMap<String, mpsc::UnboundedSender<TaskHandle>>>,
    available_tx: mpsc::UnboundedSender<String>,
    current_tasks: RwLock<HashMap<String, TaskHandle>>,
}

/// The dispatcher's single background loop, holding the two channel
/// receivers that must never be cloned or shared.
pub struct DispatcherLoop {
    dispatcher: Arc<TaskDispatcher>,
    global_rx: mpsc::UnboundedReceiver<TaskHandle>,
    available_rx: mpsc::UnboundedReceiver<String>,
}

impl TaskDispatcher {
    pub fn new() -> (Arc<Self>, DispatcherLoop) {
        let (global_tx, global_rx) = mpsc::unbounded_channel();
        let (available_tx, available_rx) = mpsc::unbounded_channel();

        let dispatcher = Arc::new(Self {
            global_tx,
            robot_queues: RwLock::new(HashMap::new()),
            available_tx,
            current_tasks: RwLock::new(HashMap::new()),
        });

        let loop_ = DispatcherLoop {
            dispatcher: dispatcher.clone(),
            global_rx,
            available_rx,
        };

        (dispatcher, loop_)
    }

    /// Register a robot, returning the receiving end of its queue. The
    /// caller (`Runtime`) is expected to spawn a [`crate::worker::TaskWorker`]
    /// against it.
    pub async fn register_robot(&self, robot_id: String) -> mpsc::UnboundedReceiver<TaskHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.robot_queues.write().await.insert(robot_id.clone(), tx);
        let _ = self.available_tx.send(robot_id);
        rx
    }

    pub fn submit(&self, task: TaskHandle) {
        let _ = self.global_tx.send(task);
    }

    pub async fn is_known_robot(&self, robot_id: &str) -> bool {
        self.robot_queues.read().await.contains_key(robot_id)
    }

    pub async fn current_task(&self, robot_id: &str) -> Option<TaskHandle> {
        self.current_tasks.read().await.get(robot_id).cloned()
    }

    pub(crate) async fn mark_busy(&self, robot_id: &str, task: TaskHandle) {
        self.current_tasks.write().await.insert(robot_id.to_string(), task);
    }

    pub(crate) async fn mark_available(&self, robot_id: &str) {
        self.current_tasks.write().await.remove(robot_id);
        let _ = self.available_tx.send(robot_id.to_string());
    }
}

impl DispatcherLoop {
    /// Run until `cancel` fires or the submission channel closes.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                maybe_task = self.global_rx.recv() => {
                    let Some(task_handle) = maybe_task else { return };
                    self.route(task_handle).await;
                }
            }
        }
    }

    async fn route(&mut self, task_handle: TaskHandle) {
        let robot_id = task_handle.read().await.robot_id.clone();

        match robot_id {
            Some(robot_id) => self.route_pinned(task_handle, robot_id).await,
            None => self.route_unpinned(task_handle).await,
        }
    }

    async fn route_pinned(&mut self, task_handle: TaskHandle, robot_id: String) {
        let queues = self.dispatcher.robot_queues.read().await;
        match queues.get(&robot_id) {
            Some(tx) => {
                let _ = tx.send(task_handle);
            }
            None => {
                drop(queues);
                let mut guard = task_handle.write().await;
                guard.set_status(TaskStatus::Failed);
                guard.metadata.insert(
                    "failure_reason".to_string(),
                    serde_json::json!(format!("unknown robot: {robot_id}")),
                );
                tracing::warn!(robot_id = %robot_id, "dispatcher: rejecting task for unknown robot");
            }
        }
    }

    /// Wait for an available robot, requeuing any that turn out to
    /// already be busy (a race between the signal and a new assignment).
    async fn route_unpinned(&mut self, task_handle: TaskHandle) {
        loop {
            let Some(candidate) = self.available_rx.recv().await else {
                return;
            };

            let busy = self.dispatcher.current_tasks.read().await.contains_key(&candidate);
            if busy {
                let _ = self.dispatcher.available_tx.send(candidate);
                continue;
            }

            let queues = self.dispatcher.robot_queues.read().await;
            if let Some(tx) = queues.get(&candidate) {
                let _ = tx.send(task_handle);
            }
            return;
        }
    }
}
