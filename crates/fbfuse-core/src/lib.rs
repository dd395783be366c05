//! Control-plane core for the FBFUSE beamformer.
//!
//! This crate owns the business logic of the master controller:
//!
//! - **[`MasterController`]** — Central facade holding the product registry,
//!   the shared worker and multicast pools and the sensor store. Commands
//!   are routed through an `mpsc` channel to a processor task via
//!   [`execute()`](MasterController::execute), or called directly.
//!
//! - **[`ProductController`]** — Per-product state machine
//!   (IDLE → PROVISIONING → READY ⇄ CAPTURING → STOPPING). Provisioning,
//!   worker start/stop and the live target subscription run as cancellable
//!   background tasks.
//!
//! - **Resource pools** ([`pool`]) — `WorkerPool` and
//!   `AddressRangeAllocator`, each behind one async mutex owned by the master.
//!
//! - **[`SensorStore`]** — Named, timestamped values (`DashMap` + `watch`
//!   version channel) that external callers read.
//!
//! - **Domain model** ([`model`]) — Antennas, multicast ranges, targets,
//!   stream descriptors and worker endpoints.

pub mod beam;
pub mod command;
pub mod config;
pub mod error;
pub mod master;
pub mod metadata;
pub mod model;
pub mod pool;
pub mod product;
pub mod sensor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use beam::{BeamValidator, CoherentBeamConfig, IncoherentBeamConfig};
pub use command::{Command, CommandResult};
pub use config::{BeamDefaults, MasterConfig};
pub use error::CoreError;
pub use master::MasterController;
pub use metadata::{StaticMetadata, TelescopeMetadata};
pub use model::{AddressRange, Antenna, Coordinates, StreamDescriptors, Target, WorkerEndpoint};
pub use product::{ObservingBand, ProductController, ProductState};
pub use sensor::{SensorReading, SensorStatus, SensorStore, SensorValue};
