//! A standalone [`Fleet`] implementation for running the CLI without a
//! real robot RPC connection: every command succeeds immediately against
//! a small in-memory map of shelves and locations, logging each call the
//! way a real transport's instrumentation would. This is demo/operator
//! tooling only, the role a `NoopHarness` plays for gator's CLI when no
//! live agent backend is configured.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use biopatrol_core::fleet::{Fleet, FleetData, FleetResult, Location, Pose, Shelf};

struct State {
    pose: Pose,
    carrying: Option<String>,
    battery_percent: f64,
}

pub struct StandaloneFleet {
    robot_id: String,
    state: Mutex<State>,
}

impl StandaloneFleet {
    pub fn new(robot_id: String) -> Self {
        Self {
            robot_id,
            state: Mutex::new(State {
                pose: Pose { x: 0.0, y: 0.0, theta: 0.0 },
                carrying: None,
                battery_percent: 100.0,
            }),
        }
    }

    fn known_shelves() -> Vec<Shelf> {
        vec![Shelf {
            id: "S_04".to_string(),
            name: "shelf-04".to_string(),
            pose: Pose { x: 1.0, y: 1.0, theta: 0.0 },
        }]
    }

    fn known_locations() -> Vec<Location> {
        vec![
            Location { id: "L_101".to_string(), name: "bed-101".to_string() },
            Location { id: "L_102".to_string(), name: "bed-102".to_string() },
        ]
    }
}

#[async_trait]
impl Fleet for StandaloneFleet {
    async fn move_to_location(&self, location_id: &str, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, location_id, "standalone fleet: move_to_location");
        FleetResult::success(FleetData::None)
    }

    async fn move_shelf(&self, shelf_id: &str, location_id: &str, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, shelf_id, location_id, "standalone fleet: move_shelf");
        self.state.lock().unwrap().carrying = Some(shelf_id.to_string());
        FleetResult::success(FleetData::None)
    }

    async fn return_shelf(&self, shelf_id: &str, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, shelf_id, "standalone fleet: return_shelf");
        self.state.lock().unwrap().carrying = None;
        FleetResult::success(FleetData::None)
    }

    async fn return_home(&self, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, "standalone fleet: return_home");
        self.state.lock().unwrap().pose = Pose { x: 0.0, y: 0.0, theta: 0.0 };
        FleetResult::success(FleetData::None)
    }

    async fn dock_shelf(&self, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, "standalone fleet: dock_shelf");
        FleetResult::success(FleetData::None)
    }

    async fn undock_shelf(&self, _timeout: Duration) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, "standalone fleet: undock_shelf");
        FleetResult::success(FleetData::None)
    }

    async fn move_to_pose(&self, x: f64, y: f64, yaw: f64) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, x, y, yaw, "standalone fleet: move_to_pose");
        self.state.lock().unwrap().pose = Pose { x, y, theta: yaw };
        FleetResult::success(FleetData::None)
    }

    async fn speak(&self, text: &str) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, text, "standalone fleet: speak");
        FleetResult::success(FleetData::None)
    }

    async fn cancel_command(&self) -> FleetResult {
        tracing::info!(robot_id = %self.robot_id, "standalone fleet: cancel_command");
        FleetResult::success(FleetData::None)
    }

    async fn get_moving_shelf(&self) -> FleetResult {
        let shelf_id = self.state.lock().unwrap().carrying.clone();
        FleetResult::success(FleetData::MovingShelf { shelf_id })
    }

    async fn list_shelves(&self) -> FleetResult {
        FleetResult::success(FleetData::Shelves(Self::known_shelves()))
    }

    async fn list_locations(&self) -> FleetResult {
        FleetResult::success(FleetData::Locations(Self::known_locations()))
    }

    async fn get_pose(&self) -> FleetResult {
        let pose = self.state.lock().unwrap().pose;
        FleetResult::success(FleetData::Pose(pose))
    }

    async fn get_battery(&self) -> FleetResult {
        let percent = self.state.lock().unwrap().battery_percent;
        FleetResult::success(FleetData::Battery { percent })
    }
}
