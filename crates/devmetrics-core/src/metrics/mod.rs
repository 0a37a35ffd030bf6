//! Metrics groups and the flag store deciding what gets reported.
//!
//! The store is written by configuration code from any thread; the report
//! builder only ever sees it through a [`FlagSnapshot`] taken at the start of
//! a build.

mod flags;

pub use flags::{FlagSnapshot, MetricsFlagStore, MetricsGroup, kernel, tcp};
