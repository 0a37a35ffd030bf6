//! Statistics model shared by every source.

use serde::{Deserialize, Serialize};

/// Maximum task-name length including the terminator, as configured for the
/// device kernel. Stored names hold at most `MAX_TASK_NAME_LEN - 1` bytes.
pub const MAX_TASK_NAME_LEN: usize = 16;

/// Error type for statistics collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a statistics file.
    Io(std::io::Error),
    /// Parse error in a statistics file.
    Parse(String),
    /// The source could not allocate its scratch storage.
    OutOfMemory,
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
            CollectError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// One established network connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub remote_addr: String,
}

impl ConnectionRecord {
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
        }
    }
}

/// Scheduler state of a task at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Running,
    Ready,
    Blocked,
    Suspended,
    Deleted,
    Invalid,
}

impl TaskState {
    /// Numeric code carried in the report.
    pub fn code(self) -> i64 {
        match self {
            TaskState::Running => 0,
            TaskState::Ready => 1,
            TaskState::Blocked => 2,
            TaskState::Suspended => 3,
            TaskState::Deleted => 4,
            TaskState::Invalid => 5,
        }
    }
}

/// Per-task record captured at sample time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSample {
    pub id: u32,
    pub name: String,
    pub state: TaskState,
    pub priority: i32,
    /// Cumulative run time, in the same units as `KernelStats::total_run_time`.
    pub run_cycles: u64,
    pub stack_high_watermark: u32,
}

impl TaskSample {
    /// Creates a sample, truncating `name` to the kernel's name bound.
    pub fn new(id: u32, name: &str, state: TaskState, priority: i32, run_cycles: u64) -> Self {
        Self {
            id,
            name: bounded_name(name),
            state,
            priority,
            run_cycles,
            stack_high_watermark: 0,
        }
    }

    pub fn with_stack_high_watermark(mut self, watermark: u32) -> Self {
        self.stack_high_watermark = watermark;
        self
    }
}

fn bounded_name(name: &str) -> String {
    let limit = MAX_TASK_NAME_LEN - 1;
    if name.len() <= limit {
        return name.to_string();
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// Heap allocator statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub free_bytes: u64,
    pub largest_free_block: u64,
    pub smallest_free_block: u64,
    pub free_blocks: u64,
    /// Lowest free figure ever observed.
    pub low_watermark: u64,
    pub successful_allocations: u64,
    pub successful_frees: u64,
}

/// Fresh task/heap snapshot, owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    pub tasks: Vec<TaskSample>,
    /// Total elapsed run-time units. May be zero right after boot.
    pub total_run_time: u64,
    pub heap: HeapStats,
}

/// Provider of the live statistics a report describes.
///
/// Every call returns current data; a report build calls each method once
/// per pass, so values may differ between the sizing and the writing pass.
pub trait StatsSource {
    /// Invokes `visit` exactly once with the established connections, in
    /// enumeration order. The slice is only valid during the call.
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError>;

    /// Samples tasks, run time and heap statistics.
    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError>;
}

impl<S: StatsSource + ?Sized> StatsSource for Box<S> {
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError> {
        (**self).visit_tcp_connections(visit)
    }

    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError> {
        (**self).kernel_stats()
    }
}

impl<S: StatsSource + ?Sized> StatsSource for &mut S {
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError> {
        (**self).visit_tcp_connections(visit)
    }

    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError> {
        (**self).kernel_stats()
    }
}
