//! `kernel_metrics` schema: heap figures, per-task details and MCU load.

use super::error::ReportError;
use super::schema::GroupSchema;
use super::tags::Tags;
use crate::collector::{KernelStats, MAX_TASK_NAME_LEN, StatsSource, TaskSample};
use crate::encoder::{EncodeError, Scalar, StructuredEncoder};
use crate::metrics::MetricsGroup;

/// Name of the kernel's idle task; its cycles are the idle time.
pub const IDLE_TASK_NAME: &str = "IDLE";

/// Entries of the `kernel_metrics` map.
const KERNEL_FIELD_COUNT: usize = 12;
/// Entries of each `task_details` record.
const TASK_FIELD_COUNT: usize = 7;

/// Schema encoder of [`MetricsGroup::KernelRuntimeStats`].
///
/// The container shape is fixed; any nonzero mask enables it.
#[derive(Debug, Clone)]
pub struct KernelStatsSchema {
    device_type: String,
}

impl KernelStatsSchema {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
        }
    }
}

impl GroupSchema for KernelStatsSchema {
    fn group(&self) -> MetricsGroup {
        MetricsGroup::KernelRuntimeStats
    }

    fn encode(
        &self,
        _mask: u32,
        tags: &Tags,
        source: &mut dyn StatsSource,
        enc: &mut dyn StructuredEncoder,
    ) -> Result<(), ReportError> {
        let stats = source.kernel_stats()?;
        encode_kernel_stats(&stats, &self.device_type, tags, enc)?;
        Ok(())
    }
}

/// Whether `name` is exactly the idle task's name.
///
/// Compares at most `MAX_TASK_NAME_LEN` bytes; both names must end within
/// that bound. A NUL byte ends a name.
pub fn is_idle_task(name: &str) -> bool {
    let name = name.as_bytes();
    let idle = IDLE_TASK_NAME.as_bytes();

    for i in 0..MAX_TASK_NAME_LEN {
        let a = name.get(i).copied().unwrap_or(0);
        let b = idle.get(i).copied().unwrap_or(0);
        if a == 0 && b == 0 {
            return true;
        }
        if a != b {
            return false;
        }
    }
    false
}

/// `part * 100 / total`, or 0 when `total` is 0.
pub fn percent_of(part: u64, total: u64) -> i64 {
    if total == 0 {
        return 0;
    }
    let percent = part as u128 * 100 / total as u128;
    i64::try_from(percent).unwrap_or(i64::MAX)
}

fn encode_kernel_stats(
    stats: &KernelStats,
    device_type: &str,
    tags: &Tags,
    enc: &mut dyn StructuredEncoder,
) -> Result<(), EncodeError> {
    let heap = &stats.heap;
    let total_time = stats.total_run_time;

    enc.open_map(Some(tags.kernel_metrics), KERNEL_FIELD_COUNT)?;

    enc.append(Some(tags.heap_free_size), Scalar::uint(heap.free_bytes))?;
    enc.append(
        Some(tags.heap_largest_free_block),
        Scalar::uint(heap.largest_free_block),
    )?;
    enc.append(
        Some(tags.heap_smallest_free_block),
        Scalar::uint(heap.smallest_free_block),
    )?;
    enc.append(Some(tags.heap_free_blocks), Scalar::uint(heap.free_blocks))?;
    enc.append(Some(tags.heap_low_watermark), Scalar::uint(heap.low_watermark))?;
    enc.append(
        Some(tags.heap_succ_alloc),
        Scalar::uint(heap.successful_allocations),
    )?;
    enc.append(Some(tags.heap_succ_free), Scalar::uint(heap.successful_frees))?;

    enc.append(Some(tags.num_of_tasks), Scalar::uint(stats.tasks.len() as u64))?;
    enc.append(Some(tags.device_type), Scalar::Text(device_type))?;

    let mut idle_time = 0;
    enc.open_array(Some(tags.task_details), stats.tasks.len())?;
    for task in &stats.tasks {
        if is_idle_task(&task.name) {
            idle_time = task.run_cycles;
        }
        encode_task(task, total_time, tags, enc)?;
    }
    enc.close()?;

    enc.append(Some(tags.mcu_uptime), Scalar::uint(total_time))?;
    enc.append(
        Some(tags.mcu_utilization),
        Scalar::Int(percent_of(total_time.saturating_sub(idle_time), total_time)),
    )?;

    enc.close()
}

fn encode_task(
    task: &TaskSample,
    total_time: u64,
    tags: &Tags,
    enc: &mut dyn StructuredEncoder,
) -> Result<(), EncodeError> {
    enc.open_map(None, TASK_FIELD_COUNT)?;
    enc.append(Some(tags.task_id), Scalar::Int(task.id.into()))?;
    enc.append(Some(tags.task_name), Scalar::Text(&task.name))?;
    enc.append(Some(tags.task_status), Scalar::Int(task.state.code()))?;
    enc.append(Some(tags.task_priority), Scalar::Int(task.priority.into()))?;
    enc.append(Some(tags.task_abs_cycles), Scalar::uint(task.run_cycles))?;
    enc.append(
        Some(tags.task_percentage),
        Scalar::Int(percent_of(task.run_cycles, total_time)),
    )?;
    enc.append(
        Some(tags.stack_high_watermark),
        Scalar::Int(task.stack_high_watermark.into()),
    )?;
    enc.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{FixtureSource, HeapStats, TaskState};
    use crate::encoder::decode::decode_document;
    use crate::encoder::{SizingEncoder, WritingEncoder};
    use serde_json::{Value, json};

    fn encode(stats: &KernelStats, tags: &Tags) -> Value {
        let run = |enc: &mut dyn StructuredEncoder| {
            enc.open_map(None, 1)?;
            encode_kernel_stats(stats, "mw300", tags, enc)?;
            enc.close()
        };

        let mut sizing = SizingEncoder::sizing();
        run(&mut sizing).unwrap();
        let mut buf = vec![0u8; sizing.finish().unwrap()];
        let mut writing = WritingEncoder::writing(&mut buf);
        run(&mut writing).unwrap();
        writing.finish().unwrap();

        decode_document(&buf).unwrap()[tags.kernel_metrics].clone()
    }

    #[test]
    fn test_typical_device() {
        let stats = FixtureSource::typical_device().kernel;
        let value = encode(&stats, &Tags::LONG);

        assert_eq!(value.as_object().unwrap().len(), KERNEL_FIELD_COUNT);
        assert_eq!(value["heap_free_size"], 48264);
        assert_eq!(value["heap_largest_free_block"], 46000);
        assert_eq!(value["heap_smallest_free_block"], 16);
        assert_eq!(value["heap_free_blocks"], 5);
        assert_eq!(value["heap_low_watermark"], 41200);
        assert_eq!(value["heap_succ_alloc"], 320);
        assert_eq!(value["heap_succ_free"], 290);
        assert_eq!(value["num_of_tasks"], 3);
        assert_eq!(value["device_type"], "mw300");
        assert_eq!(value["mcu_uptime"], 10000);
        // 10000 total, 7500 idle
        assert_eq!(value["mcu_utilization"], 25);

        assert_eq!(
            value["task_details"][2],
            json!({
                "task_id": 3,
                "task_name": "MQTT",
                "task_status": 0,
                "task_priority": 5,
                "task_abs_cycles": 2000,
                "task_percentage": 20,
                "stack_high_watermark": 1420
            })
        );
        assert_eq!(value["task_details"][0]["task_percentage"], 75);
        assert_eq!(value["task_details"][1]["task_status"], 2);
    }

    #[test]
    fn test_zero_run_time_is_defined() {
        let stats = FixtureSource::stalled_clock().kernel;
        let value = encode(&stats, &Tags::LONG);

        assert_eq!(value["mcu_uptime"], 0);
        assert_eq!(value["mcu_utilization"], 0);
        for task in value["task_details"].as_array().unwrap() {
            assert_eq!(task["task_percentage"], 0);
        }
    }

    #[test]
    fn test_no_idle_task_means_fully_busy() {
        let stats = KernelStats {
            tasks: vec![
                TaskSample::new(1, "IDLE2", TaskState::Ready, 0, 600),
                TaskSample::new(2, "IDL", TaskState::Ready, 0, 400),
            ],
            total_run_time: 1000,
            heap: HeapStats::default(),
        };
        let value = encode(&stats, &Tags::LONG);
        assert_eq!(value["mcu_utilization"], 100);
    }

    #[test]
    fn test_empty_task_list() {
        let stats = KernelStats {
            tasks: Vec::new(),
            total_run_time: 50,
            heap: HeapStats::default(),
        };
        let value = encode(&stats, &Tags::LONG);
        assert_eq!(value["num_of_tasks"], 0);
        assert_eq!(value["task_details"], json!([]));
        assert_eq!(value["mcu_utilization"], 100);
    }

    #[test]
    fn test_short_tags() {
        let stats = FixtureSource::typical_device().kernel;
        let value = encode(&stats, &Tags::SHORT);
        assert_eq!(value["hp"], 48264);
        assert_eq!(value["mpct"], 25);
        assert_eq!(value["tdet"][0]["tn"], "IDLE");
    }

    #[test]
    fn test_is_idle_task() {
        assert!(is_idle_task("IDLE"));
        assert!(is_idle_task("IDLE\0garbage"));
        assert!(!is_idle_task("IDLE2"));
        assert!(!is_idle_task("IDL"));
        assert!(!is_idle_task("idle"));
        assert!(!is_idle_task(""));
        assert!(!is_idle_task(&"IDLE".repeat(8)));
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(50, 0), 0);
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(u64::MAX, u64::MAX), 100);
        assert_eq!(percent_of(u64::MAX, 1), i64::MAX);
    }
}
