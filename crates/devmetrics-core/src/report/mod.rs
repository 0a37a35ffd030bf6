//! Report construction: flag snapshot, two-pass sizing, schema encoding.
//!
//! ```
//! use std::sync::Arc;
//! use devmetrics_core::collector::FixtureSource;
//! use devmetrics_core::encoder::decode::decode_document;
//! use devmetrics_core::metrics::{MetricsFlagStore, MetricsGroup, tcp};
//! use devmetrics_core::report::{BuilderConfig, ReportBuilder, TagStyle};
//!
//! let store = Arc::new(MetricsFlagStore::new());
//! store.set_flags(MetricsGroup::TcpConnections, tcp::ESTABLISHED | tcp::TOTAL);
//!
//! let mut builder = ReportBuilder::new(
//!     Arc::clone(&store),
//!     FixtureSource::typical_device(),
//!     BuilderConfig {
//!         tag_style: TagStyle::Long,
//!         ..BuilderConfig::default()
//!     },
//! );
//! let report = builder.create_report().unwrap();
//! assert_eq!(report.id(), 1);
//!
//! let document = decode_document(report.as_bytes()).unwrap();
//! assert_eq!(document["metrics"]["tcp_connections"]["established_connections"]["total"], 2);
//! builder.delete_report();
//! ```

mod builder;
mod error;
mod kernel;
mod schema;
mod tags;
mod tcp;

pub use builder::{BuilderConfig, Report, ReportBuilder, ReportTiming};
pub use error::ReportError;
pub use kernel::{IDLE_TASK_NAME, KernelStatsSchema, is_idle_task, percent_of};
pub use schema::{GroupSchema, SchemaRegistry};
pub use tags::{SCHEMA_VERSION, TagStyle, Tags};
pub use tcp::TcpConnectionsSchema;
