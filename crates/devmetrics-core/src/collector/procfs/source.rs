use std::path::Path;

use tracing::trace;

use super::parser::{
    ParseError, TCP_ESTABLISHED, parse_buddyinfo, parse_cpu_totals, parse_meminfo_free_kb,
    parse_net_tcp, parse_proc_stat, parse_status_stack_kb, parse_vmstat_alloc,
};
use crate::collector::source::{
    CollectError, ConnectionRecord, HeapStats, KernelStats, StatsSource, TaskSample, TaskState,
};
use crate::collector::traits::FileSystem;
use crate::report::IDLE_TASK_NAME;

/// Page size used to turn buddy orders into block sizes.
const DEFAULT_PAGE_SIZE: u64 = 4096;

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}

/// Collects device-style statistics from a `/proc` tree.
pub struct ProcfsSource<F: FileSystem> {
    fs: F,
    proc_path: String,
    page_size: u64,
    /// Lowest free-memory figure seen by this source.
    low_watermark: Option<u64>,
}

impl<F: FileSystem> ProcfsSource<F> {
    /// Creates a new procfs source.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            page_size: DEFAULT_PAGE_SIZE,
            low_watermark: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    fn read(&self, relative: &str) -> Result<String, CollectError> {
        let path = format!("{}/{}", self.proc_path, relative);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Like `read`, but a missing file yields `None`.
    fn read_optional(&self, relative: &str) -> Result<Option<String>, CollectError> {
        match self.read(relative) {
            Ok(content) => Ok(Some(content)),
            Err(CollectError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Established TCP connections from `net/tcp` and `net/tcp6`.
    pub fn collect_connections(&self) -> Result<Vec<ConnectionRecord>, CollectError> {
        let mut connections = Vec::new();

        for table in ["net/tcp", "net/tcp6"] {
            let Some(content) = self.read_optional(table)? else {
                continue;
            };
            connections.extend(
                parse_net_tcp(&content)?
                    .into_iter()
                    .filter(|entry| entry.state == TCP_ESTABLISHED)
                    .map(|entry| ConnectionRecord::new(entry.remote.to_string())),
            );
        }

        Ok(connections)
    }

    /// Samples every process as a task, preceded by a synthetic idle task.
    ///
    /// Returns the tasks and the total run time, both in jiffies.
    pub fn collect_tasks(&self) -> Result<(Vec<TaskSample>, u64), CollectError> {
        let cpu = parse_cpu_totals(&self.read("stat")?)?;

        let entries = self.fs.read_dir(Path::new(&self.proc_path))?;
        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|path| path.file_name()?.to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();

        let mut tasks = Vec::new();
        tasks
            .try_reserve_exact(pids.len() + 1)
            .map_err(|_| CollectError::OutOfMemory)?;

        tasks.push(TaskSample::new(
            0,
            IDLE_TASK_NAME,
            TaskState::Running,
            0,
            cpu.idle,
        ));

        for pid in pids {
            // Processes may exit between listing and reading.
            let stat = match self.read(&format!("{}/stat", pid)) {
                Ok(content) => content,
                Err(e) => {
                    trace!(pid, error = %e, "process gone during scan");
                    continue;
                }
            };
            let stat = match parse_proc_stat(&stat) {
                Ok(stat) => stat,
                Err(e) => {
                    trace!(pid, error = %e, "skipping unparsable stat");
                    continue;
                }
            };
            let stack_kb = self
                .read(&format!("{}/status", pid))
                .ok()
                .and_then(|status| parse_status_stack_kb(&status))
                .unwrap_or(0);

            tasks.push(
                TaskSample::new(
                    stat.pid,
                    &stat.comm,
                    task_state(stat.state),
                    stat.priority,
                    stat.utime + stat.stime,
                )
                .with_stack_high_watermark(u32::try_from(stack_kb).unwrap_or(u32::MAX)),
            );
        }

        Ok((tasks, cpu.total))
    }

    /// Page-allocator figures rendered as heap statistics.
    pub fn collect_heap(&mut self) -> Result<HeapStats, CollectError> {
        let free_bytes = parse_meminfo_free_kb(&self.read("meminfo")?)? * 1024;
        let low_watermark = self
            .low_watermark
            .map_or(free_bytes, |low| low.min(free_bytes));
        self.low_watermark = Some(low_watermark);

        let buddy = match self.read_optional("buddyinfo")? {
            Some(content) => parse_buddyinfo(&content)?,
            None => Default::default(),
        };
        let alloc = match self.read_optional("vmstat")? {
            Some(content) => parse_vmstat_alloc(&content)?,
            None => Default::default(),
        };

        let block_size = |order: Option<u32>| order.map_or(0, |o| self.page_size << o);

        Ok(HeapStats {
            free_bytes,
            largest_free_block: block_size(buddy.largest_order),
            smallest_free_block: block_size(buddy.smallest_order),
            free_blocks: buddy.free_blocks,
            low_watermark,
            successful_allocations: alloc.allocations,
            successful_frees: alloc.frees,
        })
    }
}

impl<F: FileSystem> StatsSource for ProcfsSource<F> {
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError> {
        let connections = self.collect_connections()?;
        visit(&connections);
        Ok(())
    }

    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError> {
        let (tasks, total_run_time) = self.collect_tasks()?;
        let heap = self.collect_heap()?;
        Ok(KernelStats {
            tasks,
            total_run_time,
            heap,
        })
    }
}

fn task_state(state: char) -> TaskState {
    match state {
        'R' => TaskState::Running,
        'S' | 'D' | 'I' => TaskState::Blocked,
        'T' | 't' => TaskState::Suspended,
        'Z' | 'X' | 'x' => TaskState::Deleted,
        _ => TaskState::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_collect_connections_established_only() {
        let source = ProcfsSource::new(MockFs::typical_device(), "/proc");
        let connections = source.collect_connections().unwrap();

        assert_eq!(
            connections,
            vec![
                ConnectionRecord::new("52.94.236.248:8883"),
                ConnectionRecord::new("192.168.1.20:22"),
                ConnectionRecord::new("[2001:db8::7]:443"),
            ]
        );
    }

    #[test]
    fn test_collect_connections_without_tcp6() {
        let mut fs = MockFs::typical_device();
        fs.remove_file("/proc/net/tcp6");
        let source = ProcfsSource::new(fs, "/proc");

        assert_eq!(source.collect_connections().unwrap().len(), 2);
    }

    #[test]
    fn test_collect_tasks() {
        let source = ProcfsSource::new(MockFs::typical_device(), "/proc");
        let (tasks, total) = source.collect_tasks().unwrap();

        assert_eq!(total, 94800);
        let ids: Vec<u32> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 812, 1033]);

        assert_eq!(tasks[0].name, IDLE_TASK_NAME);
        assert_eq!(tasks[0].run_cycles, 81000);

        let agent = &tasks[4];
        assert_eq!(agent.name, "mqtt-agent");
        assert_eq!(agent.state, TaskState::Running);
        assert_eq!(agent.run_cycles, 1200 + 300);
        assert_eq!(agent.stack_high_watermark, 132);

        let kthreadd = &tasks[2];
        assert_eq!(kthreadd.state, TaskState::Blocked);
        assert_eq!(kthreadd.stack_high_watermark, 0);
    }

    #[test]
    fn test_collect_tasks_skips_vanished_process() {
        let mut fs = MockFs::typical_device();
        fs.add_dir("/proc/4242");
        let source = ProcfsSource::new(fs, "/proc");

        let (tasks, _) = source.collect_tasks().unwrap();
        assert!(tasks.iter().all(|t| t.id != 4242));
    }

    #[test]
    fn test_collect_heap_tracks_low_watermark() {
        let mut fs = MockFs::typical_device();
        let mut source = ProcfsSource::new(fs.clone(), "/proc");

        let heap = source.collect_heap().unwrap();
        assert_eq!(heap.free_bytes, 48264 * 1024);
        assert_eq!(heap.low_watermark, heap.free_bytes);
        assert_eq!(heap.smallest_free_block, 4096);
        assert_eq!(heap.largest_free_block, 4096 << 10);
        assert_eq!(heap.free_blocks, 19);
        assert_eq!(heap.successful_allocations, 5050);
        assert_eq!(heap.successful_frees, 4800);

        fs.add_file("/proc/meminfo", "MemFree:           40000 kB\n");
        source.fs = fs.clone();
        assert_eq!(source.collect_heap().unwrap().low_watermark, 40000 * 1024);

        fs.add_file("/proc/meminfo", "MemFree:           50000 kB\n");
        source.fs = fs;
        let heap = source.collect_heap().unwrap();
        assert_eq!(heap.free_bytes, 50000 * 1024);
        assert_eq!(heap.low_watermark, 40000 * 1024);
    }

    #[test]
    fn test_page_size_scales_buddy_blocks() {
        let mut source = ProcfsSource::new(MockFs::typical_device(), "/proc").with_page_size(16384);
        let heap = source.collect_heap().unwrap();
        assert_eq!(heap.smallest_free_block, 16384);
        assert_eq!(heap.largest_free_block, 16384 << 10);
    }

    #[test]
    fn test_collect_heap_without_optional_files() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemFree: 1024 kB\n");
        let mut source = ProcfsSource::new(fs, "/proc");

        let heap = source.collect_heap().unwrap();
        assert_eq!(heap.free_bytes, 1024 * 1024);
        assert_eq!(heap.largest_free_block, 0);
        assert_eq!(heap.free_blocks, 0);
    }

    #[test]
    fn test_kernel_stats_missing_stat_is_error() {
        let mut fs = MockFs::typical_device();
        fs.remove_file("/proc/stat");
        let mut source = ProcfsSource::new(fs, "/proc");

        assert!(matches!(source.kernel_stats(), Err(CollectError::Io(_))));
    }

    #[test]
    fn test_task_state_mapping() {
        assert_eq!(task_state('R'), TaskState::Running);
        assert_eq!(task_state('D'), TaskState::Blocked);
        assert_eq!(task_state('T'), TaskState::Suspended);
        assert_eq!(task_state('Z'), TaskState::Deleted);
        assert_eq!(task_state('?'), TaskState::Invalid);
    }
}
