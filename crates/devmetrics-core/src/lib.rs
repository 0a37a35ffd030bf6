//! devmetrics-core: device telemetry report builder.
//!
//! Provides:
//! - `metrics`: per-group metrics flag store and point-in-time snapshots
//! - `collector`: statistics sources (procfs, mocks) feeding the report
//! - `encoder`: two-mode structured (CBOR) encoder and a conforming reader
//! - `report`: two-pass report builder and per-group schema encoders
//! - `perfcounter`: performance counter interface used for build timing
//! - `storage`: statistics captures for deterministic replay

pub mod collector;
pub mod encoder;
pub mod metrics;
pub mod perfcounter;
pub mod report;
pub mod storage;
