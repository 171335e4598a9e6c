//! Interfaces to the external collaborators this crate drives but does
//! not own: the bio-sensor MQTT client, the persistent scan-history
//! store, and the Telegram notifier. Each trait ships exactly one
//! in-memory default implementation so the engine is exercisable without
//! the real collaborator.

pub mod bio_sensor;
pub mod notifier;
pub mod scan;

pub use bio_sensor::{AlwaysValidBioSensor, BioSensorClient, ScanPayload};
pub use notifier::{LoggingNotifier, Notifier};
pub use scan::{InMemoryScanRecorder, ScanRecorder, ScanRow};
