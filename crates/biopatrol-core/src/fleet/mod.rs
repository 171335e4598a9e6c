//! Fleet Gateway: a typed wrapper over the robot RPC.
//!
//! The robot RPC library itself — connection management, command
//! submission tagged with a `command_id`, and query endpoints — is an
//! external collaborator assumed to exist. This module defines the
//! [`Fleet`] contract every operation goes through and a
//! [`FleetRegistry`] to look fleets up by robot id.

pub mod names;
mod trait_def;

pub use trait_def::{
    Fleet, FleetData, FleetResult, Location, Pose, Shelf, ERR_INTERNAL, ERR_INTERRUPTED,
    ERR_MOVE_INTERRUPTED_A, ERR_MOVE_INTERRUPTED_B, ERR_TRANSPORT_UNAVAILABLE,
};

use std::collections::HashMap;
use std::sync::Arc;

/// A named collection of registered [`Fleet`] connections, keyed by
/// robot id.
#[derive(Default)]
pub struct FleetRegistry {
    fleets: HashMap<String, Arc<dyn Fleet>>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fleet connection under `robot_id`. Replaces and returns
    /// any previous registration for the same id.
    pub fn register(&mut self, robot_id: impl Into<String>, fleet: Arc<dyn Fleet>) -> Option<Arc<dyn Fleet>> {
        self.fleets.insert(robot_id.into(), fleet)
    }

    pub fn get(&self, robot_id: &str) -> Option<Arc<dyn Fleet>> {
        self.fleets.get(robot_id).cloned()
    }

    pub fn contains(&self, robot_id: &str) -> bool {
        self.fleets.contains_key(robot_id)
    }

    pub fn robot_ids(&self) -> Vec<String> {
        self.fleets.keys().cloned().collect()
    }
}

impl std::fmt::Debug for FleetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetRegistry")
            .field("robots", &self.fleets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::trait_def::tests::NullFleet;

    #[test]
    fn registry_starts_empty() {
        let reg = FleetRegistry::new();
        assert!(reg.robot_ids().is_empty());
        assert!(!reg.contains("R1"));
    }

    #[test]
    fn register_and_get() {
        let mut reg = FleetRegistry::new();
        reg.register("R1", Arc::new(NullFleet));
        assert!(reg.contains("R1"));
        assert!(reg.get("R1").is_some());
        assert!(reg.get("ghost").is_none());
    }
}
