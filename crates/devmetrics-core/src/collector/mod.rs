//! Statistics sources feeding the report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      StatsSource (trait)                 │
//! │   visit_tcp_connections()          kernel_stats()        │
//! └──────┬─────────────────────┬─────────────────────┬───────┘
//!        │                     │                     │
//! ┌──────▼──────┐       ┌──────▼──────┐       ┌──────▼──────┐
//! │ ProcfsSource│       │FixtureSource│       │ StatsCapture│
//! │ (Linux)     │       │ (Testing)   │       │ (Replay)    │
//! └──────┬──────┘       └─────────────┘       └─────────────┘
//!        │
//! ┌──────▼──────┐
//! │  FileSystem │ (trait: RealFs / MockFs)
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use devmetrics_core::collector::{MockFs, ProcfsSource, StatsSource};
//!
//! let mut source = ProcfsSource::new(MockFs::typical_device(), "/proc");
//! let stats = source.kernel_stats().unwrap();
//! assert!(stats.tasks.iter().any(|t| t.name == "IDLE"));
//! ```

pub mod mock;
pub mod procfs;
mod source;
pub mod traits;

pub use mock::{FixtureSource, MockFs};
pub use procfs::ProcfsSource;
pub use source::{
    CollectError, ConnectionRecord, HeapStats, KernelStats, MAX_TASK_NAME_LEN, StatsSource,
    TaskSample, TaskState,
};
pub use traits::{FileSystem, RealFs};
