use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::error::ReportError;
use super::schema::{SchemaRegistry, encode_report};
use super::tags::{SCHEMA_VERSION, TagStyle, Tags};
use crate::collector::StatsSource;
use crate::encoder::{EncodeError, SizingEncoder, WritingEncoder};
use crate::metrics::{FlagSnapshot, MetricsFlagStore};
use crate::perfcounter::{InstantCounter, PerfCounter, ticks_to_duration};

/// A finished report: exactly sized, fully encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    id: u64,
    version: &'static str,
    buffer: Vec<u8>,
}

impl Report {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Report builder settings.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub tag_style: TagStyle,
    /// Value of the `device_type` field of kernel metrics.
    pub device_type: String,
    /// Largest buffer the builder may allocate. Bigger reports fail with
    /// `OutOfMemory`.
    pub max_report_size: Option<usize>,
    /// How often the writing pass is redone when statistics grew after
    /// sizing.
    pub resize_retries: u32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            tag_style: TagStyle::default(),
            device_type: std::env::consts::OS.to_string(),
            max_report_size: None,
            resize_retries: 1,
        }
    }
}

/// Timing of the last successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTiming {
    /// Time spent in sizing passes.
    pub sizing: Duration,
    /// Time spent in writing passes.
    pub writing: Duration,
    pub total: Duration,
    /// Writing passes run; more than one means statistics grew mid-build.
    pub attempts: u32,
}

/// Builds reports from a shared flag store and a statistics source.
///
/// Every build snapshots the flags once, sizes the document in a dry pass,
/// allocates exactly that many bytes and encodes again into the buffer. At
/// most one report exists at a time; it stays owned by the builder until
/// [`delete_report`](Self::delete_report).
pub struct ReportBuilder<S: StatsSource> {
    store: Arc<MetricsFlagStore>,
    source: S,
    registry: SchemaRegistry,
    config: BuilderConfig,
    counter: Box<dyn PerfCounter>,
    last_report_id: u64,
    report: Option<Report>,
    last_timing: Option<ReportTiming>,
}

impl<S: StatsSource> ReportBuilder<S> {
    pub fn new(store: Arc<MetricsFlagStore>, source: S, config: BuilderConfig) -> Self {
        let registry = SchemaRegistry::standard(&config.device_type);
        let mut counter = InstantCounter::new();
        counter.open();

        Self {
            store,
            source,
            registry,
            config,
            counter: Box::new(counter),
            last_report_id: 0,
            report: None,
            last_timing: None,
        }
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Continues numbering after `id`; the next report gets `id + 1`.
    pub fn with_last_report_id(mut self, id: u64) -> Self {
        self.last_report_id = id;
        self
    }

    pub fn with_counter(mut self, mut counter: Box<dyn PerfCounter>) -> Self {
        self.counter.close();
        counter.open();
        self.counter = counter;
        self
    }

    /// Builds the next report.
    ///
    /// The report id is consumed even when the build fails, so ids are never
    /// reused. On failure no report is left allocated.
    pub fn create_report(&mut self) -> Result<&Report, ReportError> {
        if let Some(report) = &self.report {
            error!(
                report_id = report.id,
                "report build requested while a report is still allocated"
            );
            return Err(ReportError::AlreadyBuilt {
                report_id: report.id,
            });
        }

        let snapshot = self.store.snapshot();
        let report_id = self.next_report_id()?;

        let report = self.build(&snapshot, report_id).inspect_err(|e| {
            if e.is_recoverable() {
                warn!(report_id, error = %e, "report build failed");
            } else {
                error!(report_id, error = %e, "report build aborted");
            }
        })?;

        Ok(&*self.report.insert(report))
    }

    /// Releases the current report. Does nothing when none is allocated.
    pub fn delete_report(&mut self) {
        if let Some(report) = self.report.take() {
            debug!(report_id = report.id, bytes = report.len(), "report released");
        }
    }

    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Bytes of the current report.
    pub fn buffer(&self) -> Option<&[u8]> {
        self.report.as_ref().map(Report::as_bytes)
    }

    pub fn buffer_len(&self) -> usize {
        self.report.as_ref().map_or(0, Report::len)
    }

    pub fn last_report_id(&self) -> u64 {
        self.last_report_id
    }

    pub fn last_timing(&self) -> Option<&ReportTiming> {
        self.last_timing.as_ref()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MetricsFlagStore> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Ids are carried as signed integers in the header, so the counter
    /// stops at `i64::MAX`.
    fn next_report_id(&mut self) -> Result<u64, ReportError> {
        let id = self
            .last_report_id
            .checked_add(1)
            .filter(|id| i64::try_from(*id).is_ok())
            .ok_or(ReportError::IdExhausted)?;
        self.last_report_id = id;
        Ok(id)
    }

    fn build(&mut self, snapshot: &FlagSnapshot, report_id: u64) -> Result<Report, ReportError> {
        let tags = Tags::for_style(self.config.tag_style);
        let started = self.counter.value();
        let mut sizing_ticks = 0;
        let mut writing_ticks = 0;
        let mut attempts = 0;

        loop {
            let pass_start = self.counter.value();
            let size = self.sizing_pass(snapshot, report_id, tags)?;
            let sized_at = self.counter.value();
            sizing_ticks += sized_at.saturating_sub(pass_start);

            let mut buffer = self.allocate(size)?;
            attempts += 1;
            let written = self.writing_pass(&mut buffer, snapshot, report_id, tags);
            writing_ticks += self.counter.value().saturating_sub(sized_at);

            match written {
                Ok(written) => {
                    if written < size {
                        warn!(
                            report_id,
                            sized = size,
                            written,
                            "statistics shrank after sizing, trimming report"
                        );
                        buffer.truncate(written);
                        buffer.shrink_to_fit();
                    }

                    let freq = self.counter.frequency_hz();
                    let timing = ReportTiming {
                        sizing: ticks_to_duration(sizing_ticks, freq),
                        writing: ticks_to_duration(writing_ticks, freq),
                        total: ticks_to_duration(
                            self.counter.value().saturating_sub(started),
                            freq,
                        ),
                        attempts,
                    };
                    debug!(
                        report_id,
                        bytes = buffer.len(),
                        attempts,
                        total_us = timing.total.as_micros() as u64,
                        "report built"
                    );
                    self.last_timing = Some(timing);

                    return Ok(Report {
                        id: report_id,
                        version: SCHEMA_VERSION,
                        buffer,
                    });
                }
                Err(ReportError::Encode(EncodeError::BufferTooSmall { required, .. })) => {
                    if attempts > self.config.resize_retries {
                        return Err(ReportError::SizeDrift {
                            sized: size,
                            required,
                        });
                    }
                    warn!(
                        report_id,
                        sized = size,
                        required,
                        attempt = attempts,
                        "statistics grew after sizing, resizing report"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Dry pass: runs the schema encoders without a buffer and returns the
    /// exact size the writing pass needs.
    fn sizing_pass(
        &mut self,
        snapshot: &FlagSnapshot,
        report_id: u64,
        tags: &Tags,
    ) -> Result<usize, ReportError> {
        let mut enc = SizingEncoder::sizing();
        encode_report(
            &mut enc,
            snapshot,
            report_id,
            tags,
            &self.registry,
            &mut self.source,
        )?;
        let size = enc.finish()?;
        debug!(report_id, size, "sizing pass done");
        Ok(size)
    }

    fn writing_pass(
        &mut self,
        buffer: &mut [u8],
        snapshot: &FlagSnapshot,
        report_id: u64,
        tags: &Tags,
    ) -> Result<usize, ReportError> {
        let mut enc = WritingEncoder::writing(buffer);
        encode_report(
            &mut enc,
            snapshot,
            report_id,
            tags,
            &self.registry,
            &mut self.source,
        )?;
        let written = enc.finish()?;
        debug!(report_id, written, "writing pass done");
        Ok(written)
    }

    fn allocate(&self, size: usize) -> Result<Vec<u8>, ReportError> {
        if self.config.max_report_size.is_some_and(|max| size > max) {
            return Err(ReportError::OutOfMemory { requested: size });
        }
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| ReportError::OutOfMemory { requested: size })?;
        buffer.resize(size, 0);
        Ok(buffer)
    }
}

impl<S: StatsSource> Drop for ReportBuilder<S> {
    fn drop(&mut self) {
        self.counter.close();
    }
}

impl<S: StatsSource> std::fmt::Debug for ReportBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportBuilder")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("last_report_id", &self.last_report_id)
            .field("report", &self.report.as_ref().map(Report::id))
            .finish()
    }
}
