//! Stage tracking for a garment line.
//!
//! Fixed BLE barcode scanners, one per production stage, are polled in
//! cycles: discover which scanners are in range, collect their scans
//! concurrently, and fold every scan into a durable per-order record whose
//! current stage is the furthest stage the order has reached.

pub mod domain;
pub mod infrastructure;
pub mod orchestration;

pub use domain::aggregation::AggregationEngine;
pub use domain::models::{CycleReport, OrderRecord, ScanEvent};
pub use domain::registry::PeripheralRegistry;
pub use domain::stages::StageSequence;
pub use orchestration::Orchestrator;
