//! The `Fleet` trait — the per-robot RPC surface the engine drives.
//!
//! Every method returns a concrete type or a boxed future via
//! `#[async_trait]`, so `Fleet` is object-safe and can be stored as
//! `Arc<dyn Fleet>` in a [`super::FleetRegistry`]. No method raises for
//! a protocol-level condition — every operation returns a
//! [`FleetResult`]; this is the single place where RPC errors surface
//! as data instead of exceptions.

use async_trait::async_trait;
use std::time::Duration;

/// `< 0` tier: internal exception or invalid argument from the RPC layer
/// itself, not a robot-reported code.
pub const ERR_INTERNAL: i32 = -1;

/// Sentinel range for transient transport failures (connection dropped,
/// deadline exceeded, resource exhausted) that the Retry Policy treats as
/// retryable. This crate has no real transport library behind it; it
/// only needs a way to tell "try again" apart from "domain error", so
/// transient failures are modeled as negative codes below
/// [`ERR_INTERNAL`] rather than as real vendor codes.
pub const ERR_TRANSPORT_UNAVAILABLE: i32 = -100;
pub const ERR_TRANSPORT_DEADLINE_EXCEEDED: i32 = -101;
pub const ERR_TRANSPORT_RESOURCE_EXHAUSTED: i32 = -102;

/// Domain codes for "robot reports interrupted" and "move interrupted".
/// These may *accompany* a shelf drop but MUST NOT be read as proof of
/// one — only the Shelf Monitor's "no moving shelf" observation does
/// that.
pub const ERR_INTERRUPTED: i32 = 10001;
pub const ERR_MOVE_INTERRUPTED_A: i32 = 14606;
pub const ERR_MOVE_INTERRUPTED_B: i32 = 11005;

/// Whether `code` falls in the transient-transport range the Retry Policy
/// is allowed to retry on.
pub fn is_transient(code: i32) -> bool {
    matches!(
        code,
        ERR_TRANSPORT_UNAVAILABLE | ERR_TRANSPORT_DEADLINE_EXCEEDED | ERR_TRANSPORT_RESOURCE_EXHAUSTED
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shelf {
    pub id: String,
    pub name: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
}

/// Typed payload carried in a [`FleetResult`]'s `data` field. One
/// variant per operation that actually returns data; operations with no
/// data return `FleetData::None`. A typed enum instead of an untyped
/// map, since the engine never needs to touch the fleet's wire types
/// directly and Rust gives us a closed, checked shape for free.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FleetData {
    #[default]
    None,
    MovingShelf {
        shelf_id: Option<String>,
    },
    Shelves(Vec<Shelf>),
    Locations(Vec<Location>),
    Pose(Pose),
    Battery {
        percent: f64,
    },
}

/// The structured result every [`Fleet`] operation returns: `{ok,
/// error_code, error_text, data}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetResult {
    pub ok: bool,
    pub error_code: i32,
    pub error_text: String,
    pub data: FleetData,
}

impl FleetResult {
    pub fn success(data: FleetData) -> Self {
        Self {
            ok: true,
            error_code: 0,
            error_text: String::new(),
            data,
        }
    }

    pub fn error(error_code: i32, error_text: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_code,
            error_text: error_text.into(),
            data: FleetData::None,
        }
    }

    pub fn is_transient(&self) -> bool {
        !self.ok && is_transient(self.error_code)
    }
}

/// Adapter interface for a single robot's command-oriented RPC.
///
/// # Object Safety
///
/// Every method returns a concrete type or a value behind `#[async_trait]`
/// boxing, so `Fleet` can be stored as `Arc<dyn Fleet>`.
#[async_trait]
pub trait Fleet: Send + Sync {
    async fn move_to_location(&self, location_id: &str, timeout: Duration) -> FleetResult;
    async fn move_shelf(&self, shelf_id: &str, location_id: &str, timeout: Duration) -> FleetResult;
    async fn return_shelf(&self, shelf_id: &str, timeout: Duration) -> FleetResult;
    async fn return_home(&self, timeout: Duration) -> FleetResult;
    async fn dock_shelf(&self, timeout: Duration) -> FleetResult;
    async fn undock_shelf(&self, timeout: Duration) -> FleetResult;
    async fn move_to_pose(&self, x: f64, y: f64, yaw: f64) -> FleetResult;
    async fn speak(&self, text: &str) -> FleetResult;
    /// Idempotent; safe to call with nothing in flight.
    async fn cancel_command(&self) -> FleetResult;
    async fn get_moving_shelf(&self) -> FleetResult;
    async fn list_shelves(&self) -> FleetResult;
    async fn list_locations(&self) -> FleetResult;
    async fn get_pose(&self) -> FleetResult;
    async fn get_battery(&self) -> FleetResult;
}

// Compile-time assertion: Fleet must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Fleet) {}
};

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A `Fleet` that fails every call with an internal error. Used only
    /// to prove the trait is object-safe and constructible.
    pub(crate) struct NullFleet;

    #[async_trait]
    impl Fleet for NullFleet {
        async fn move_to_location(&self, _location_id: &str, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn move_shelf(&self, _shelf_id: &str, _location_id: &str, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn return_shelf(&self, _shelf_id: &str, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn return_home(&self, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn dock_shelf(&self, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn undock_shelf(&self, _timeout: Duration) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn move_to_pose(&self, _x: f64, _y: f64, _yaw: f64) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn speak(&self, _text: &str) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn cancel_command(&self) -> FleetResult {
            FleetResult::success(FleetData::None)
        }
        async fn get_moving_shelf(&self) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn list_shelves(&self) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn list_locations(&self) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn get_pose(&self) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
        async fn get_battery(&self) -> FleetResult {
            FleetResult::error(ERR_INTERNAL, "null fleet")
        }
    }

    #[test]
    fn fleet_is_object_safe() {
        let fleet: Box<dyn Fleet> = Box::new(NullFleet);
        let _ = fleet;
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(ERR_TRANSPORT_UNAVAILABLE));
        assert!(is_transient(ERR_TRANSPORT_DEADLINE_EXCEEDED));
        assert!(!is_transient(ERR_INTERRUPTED));
        assert!(!is_transient(0));
    }
}
