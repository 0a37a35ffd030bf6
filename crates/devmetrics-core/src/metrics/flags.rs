use std::sync::Mutex;

/// Top-level reportable category.
///
/// Each group owns a private sub-flag bitmask; the meaning of its bits is
/// defined by the group's schema encoder (see [`tcp`] and [`kernel`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricsGroup {
    TcpConnections,
    KernelRuntimeStats,
}

impl MetricsGroup {
    /// Number of groups.
    pub const COUNT: usize = 2;

    /// All groups, in encoding order.
    pub const ALL: [MetricsGroup; Self::COUNT] =
        [MetricsGroup::TcpConnections, MetricsGroup::KernelRuntimeStats];

    fn index(self) -> usize {
        match self {
            MetricsGroup::TcpConnections => 0,
            MetricsGroup::KernelRuntimeStats => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MetricsGroup::TcpConnections => "tcp_connections",
            MetricsGroup::KernelRuntimeStats => "kernel_runtime_stats",
        }
    }
}

impl std::fmt::Display for MetricsGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-flags of [`MetricsGroup::TcpConnections`].
pub mod tcp {
    /// Emit the `established_connections` container.
    pub const ESTABLISHED: u32 = 0x0000_0001;
    /// Emit the `connections` array (only when at least one connection exists).
    pub const CONNECTIONS: u32 = 0x0000_0002;
    /// Emit the `total` connection count.
    pub const TOTAL: u32 = 0x0000_0004;
    /// Emit `remote_addr` inside each connection record.
    pub const REMOTE_ADDR: u32 = 0x0000_0008;

    pub const ALL: u32 = ESTABLISHED | CONNECTIONS | TOTAL | REMOTE_ADDR;
}

/// Sub-flags of [`MetricsGroup::KernelRuntimeStats`].
pub mod kernel {
    /// Emit the `kernel_metrics` container. Its shape is fixed.
    pub const RUNTIME_STATS: u32 = 0x0000_0001;

    pub const ALL: u32 = RUNTIME_STATS;
}

/// Owned, point-in-time copy of the flag table.
///
/// Once taken it never changes, so every pass of one build sees the same
/// answer to "what should be encoded".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSnapshot {
    masks: [u32; MetricsGroup::COUNT],
}

impl FlagSnapshot {
    /// Builds a snapshot directly from `(group, mask)` pairs.
    ///
    /// Later pairs for the same group win. Groups not named stay disabled.
    pub fn from_masks(masks: &[(MetricsGroup, u32)]) -> Self {
        let mut snapshot = Self::default();
        for &(group, mask) in masks {
            snapshot.masks[group.index()] = mask;
        }
        snapshot
    }

    pub fn mask(&self, group: MetricsGroup) -> u32 {
        self.masks[group.index()]
    }

    /// A group is reported iff any of its sub-flags is set.
    pub fn is_enabled(&self, group: MetricsGroup) -> bool {
        self.mask(group) != 0
    }

    /// Enabled groups in encoding order.
    pub fn enabled_groups(&self) -> impl Iterator<Item = MetricsGroup> + '_ {
        MetricsGroup::ALL
            .into_iter()
            .filter(move |group| self.is_enabled(*group))
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled_groups().count()
    }
}

/// Process-wide table of sub-flag masks, one per [`MetricsGroup`].
///
/// Starts with every group disabled. Share it behind an `Arc` between the
/// configuration side and the report builder.
#[derive(Debug, Default)]
pub struct MetricsFlagStore {
    table: Mutex<[u32; MetricsGroup::COUNT]>,
}

impl MetricsFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the sub-flag mask of `group`. A zero mask disables the group.
    pub fn set_flags(&self, group: MetricsGroup, mask: u32) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table[group.index()] = mask;
    }

    /// Current mask of `group`.
    pub fn flags(&self, group: MetricsGroup) -> u32 {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table[group.index()]
    }

    /// Copies the whole table under the lock.
    ///
    /// The lock is held for the copy only, never while encoding.
    pub fn snapshot(&self) -> FlagSnapshot {
        let masks = *self.table.lock().unwrap_or_else(|e| e.into_inner());
        FlagSnapshot { masks }
    }
}
