use crate::collector::source::{
    CollectError, ConnectionRecord, HeapStats, KernelStats, StatsSource, TaskSample, TaskState,
};

/// Statistics source serving fixed data.
///
/// Counts how often each statistic was requested so tests can check that
/// every pass reads fresh statistics.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    pub connections: Vec<ConnectionRecord>,
    pub kernel: KernelStats,
    /// When set, `kernel_stats` fails as if the sampler could not allocate.
    pub fail_kernel_stats: bool,
    connection_visits: usize,
    kernel_samples: usize,
}

impl FixtureSource {
    pub fn new(connections: Vec<ConnectionRecord>, kernel: KernelStats) -> Self {
        Self {
            connections,
            kernel,
            ..Self::default()
        }
    }

    /// Two connections, three tasks (including the idle task), busy heap.
    pub fn typical_device() -> Self {
        Self::new(
            vec![
                ConnectionRecord::new("52.94.236.248:8883"),
                ConnectionRecord::new("192.168.1.20:22"),
            ],
            KernelStats {
                tasks: vec![
                    TaskSample::new(1, "IDLE", TaskState::Ready, 0, 7500)
                        .with_stack_high_watermark(110),
                    TaskSample::new(2, "Tmr Svc", TaskState::Blocked, 6, 500)
                        .with_stack_high_watermark(210),
                    TaskSample::new(3, "MQTT", TaskState::Running, 5, 2000)
                        .with_stack_high_watermark(1420),
                ],
                total_run_time: 10000,
                heap: HeapStats {
                    free_bytes: 48264,
                    largest_free_block: 46000,
                    smallest_free_block: 16,
                    free_blocks: 5,
                    low_watermark: 41200,
                    successful_allocations: 320,
                    successful_frees: 290,
                },
            },
        )
    }

    /// Like `typical_device`, with no open connections.
    pub fn quiet_device() -> Self {
        let mut source = Self::typical_device();
        source.connections.clear();
        source
    }

    /// Run-time counter has not advanced yet: total run time is zero.
    pub fn stalled_clock() -> Self {
        let mut source = Self::typical_device();
        source.kernel.total_run_time = 0;
        for task in &mut source.kernel.tasks {
            task.run_cycles = 0;
        }
        source
    }

    pub fn connection_visits(&self) -> usize {
        self.connection_visits
    }

    pub fn kernel_samples(&self) -> usize {
        self.kernel_samples
    }
}

impl StatsSource for FixtureSource {
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError> {
        self.connection_visits += 1;
        visit(&self.connections);
        Ok(())
    }

    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError> {
        self.kernel_samples += 1;
        if self.fail_kernel_stats {
            return Err(CollectError::OutOfMemory);
        }
        Ok(self.kernel.clone())
    }
}
