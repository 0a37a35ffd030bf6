/// Schema version carried in every report header.
pub const SCHEMA_VERSION: &str = "1.1";

/// Key naming variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    /// Descriptive keys, e.g. `tcp_connections`.
    Long,
    /// Terse keys for bandwidth-constrained transports, e.g. `tc`.
    Short,
}

impl Default for TagStyle {
    fn default() -> Self {
        if cfg!(feature = "short-tags") {
            TagStyle::Short
        } else {
            TagStyle::Long
        }
    }
}

/// Every key the report schema uses. The document shape is the same for
/// both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tags {
    pub header: &'static str,
    pub report_id: &'static str,
    pub version: &'static str,
    pub metrics: &'static str,

    pub tcp_connections: &'static str,
    pub established_connections: &'static str,
    pub total: &'static str,
    pub connections: &'static str,
    pub remote_addr: &'static str,

    pub kernel_metrics: &'static str,
    pub mcu_uptime: &'static str,
    pub mcu_utilization: &'static str,
    pub heap_free_size: &'static str,
    pub heap_largest_free_block: &'static str,
    pub heap_smallest_free_block: &'static str,
    pub heap_free_blocks: &'static str,
    pub heap_low_watermark: &'static str,
    pub heap_succ_alloc: &'static str,
    pub heap_succ_free: &'static str,
    pub num_of_tasks: &'static str,
    pub task_details: &'static str,
    pub task_id: &'static str,
    pub task_name: &'static str,
    pub task_status: &'static str,
    pub task_priority: &'static str,
    pub task_abs_cycles: &'static str,
    pub task_percentage: &'static str,
    pub stack_high_watermark: &'static str,
    pub device_type: &'static str,
}

impl Tags {
    pub const LONG: Tags = Tags {
        header: "header",
        report_id: "report_id",
        version: "version",
        metrics: "metrics",

        tcp_connections: "tcp_connections",
        established_connections: "established_connections",
        total: "total",
        connections: "connections",
        remote_addr: "remote_addr",

        kernel_metrics: "kernel_metrics",
        mcu_uptime: "mcu_uptime",
        mcu_utilization: "mcu_utilization",
        heap_free_size: "heap_free_size",
        heap_largest_free_block: "heap_largest_free_block",
        heap_smallest_free_block: "heap_smallest_free_block",
        heap_free_blocks: "heap_free_blocks",
        heap_low_watermark: "heap_low_watermark",
        heap_succ_alloc: "heap_succ_alloc",
        heap_succ_free: "heap_succ_free",
        num_of_tasks: "num_of_tasks",
        task_details: "task_details",
        task_id: "task_id",
        task_name: "task_name",
        task_status: "task_status",
        task_priority: "task_priority",
        task_abs_cycles: "task_abs_cycles",
        task_percentage: "task_percentage",
        stack_high_watermark: "stack_high_watermark",
        device_type: "device_type",
    };

    // Prefixes: k (kernel), m (mcu), t (task), hp (heap), st (stack), d (device).
    pub const SHORT: Tags = Tags {
        header: "hed",
        report_id: "rid",
        version: "v",
        metrics: "met",

        tcp_connections: "tc",
        established_connections: "ec",
        total: "t",
        connections: "cs",
        remote_addr: "rad",

        kernel_metrics: "km",
        mcu_uptime: "mupt",
        mcu_utilization: "mpct",
        heap_free_size: "hp",
        heap_largest_free_block: "hplg",
        heap_smallest_free_block: "hpsm",
        heap_free_blocks: "hpno",
        heap_low_watermark: "hplo",
        heap_succ_alloc: "hpal",
        heap_succ_free: "hpfr",
        num_of_tasks: "tno",
        task_details: "tdet",
        task_id: "tid",
        task_name: "tn",
        task_status: "ts",
        task_priority: "tp",
        task_abs_cycles: "tcyc",
        task_percentage: "tpct",
        stack_high_watermark: "sthi",
        device_type: "dtp",
    };

    pub fn for_style(style: TagStyle) -> &'static Tags {
        match style {
            TagStyle::Long => &Self::LONG,
            TagStyle::Short => &Self::SHORT,
        }
    }
}
