//! Document skeleton and the per-group schema registry.

use super::error::ReportError;
use super::kernel::KernelStatsSchema;
use super::tags::{SCHEMA_VERSION, Tags};
use super::tcp::TcpConnectionsSchema;
use crate::collector::StatsSource;
use crate::encoder::{Scalar, StructuredEncoder};
use crate::metrics::{FlagSnapshot, MetricsGroup};

/// Encodes one metrics group as a single keyed entry of the `metrics` map.
///
/// Implementations must append exactly one child to the encoder's innermost
/// container, whatever the mask and statistics.
pub trait GroupSchema: Send + Sync {
    fn group(&self) -> MetricsGroup;

    fn encode(
        &self,
        mask: u32,
        tags: &Tags,
        source: &mut dyn StatsSource,
        enc: &mut dyn StructuredEncoder,
    ) -> Result<(), ReportError>;
}

/// Maps each metrics group to the schema encoder responsible for it.
pub struct SchemaRegistry {
    schemas: Vec<Box<dyn GroupSchema>>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self {
            schemas: Vec::new(),
        }
    }

    /// Registry with the built-in encoder of every group.
    pub fn standard(device_type: &str) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TcpConnectionsSchema));
        registry.register(Box::new(KernelStatsSchema::new(device_type)));
        registry
    }

    /// Adds `schema`, replacing any encoder registered for the same group.
    pub fn register(&mut self, schema: Box<dyn GroupSchema>) {
        let group = schema.group();
        self.schemas.retain(|s| s.group() != group);
        self.schemas.push(schema);
    }

    pub fn get(&self, group: MetricsGroup) -> Option<&dyn GroupSchema> {
        self.schemas
            .iter()
            .find(|s| s.group() == group)
            .map(|s| s.as_ref())
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.schemas.iter().map(|s| s.group()))
            .finish()
    }
}

/// Encodes a whole report: `{ header: {...}, metrics: {...} }`.
///
/// Shared by the sizing and the writing pass.
pub(crate) fn encode_report(
    enc: &mut dyn StructuredEncoder,
    snapshot: &FlagSnapshot,
    report_id: u64,
    tags: &Tags,
    registry: &SchemaRegistry,
    source: &mut dyn StatsSource,
) -> Result<(), ReportError> {
    enc.open_map(None, 2)?;

    enc.open_map(Some(tags.header), 2)?;
    enc.append(Some(tags.report_id), Scalar::uint(report_id))?;
    enc.append(Some(tags.version), Scalar::Text(SCHEMA_VERSION))?;
    enc.close()?;

    enc.open_map(Some(tags.metrics), snapshot.enabled_count())?;
    for group in snapshot.enabled_groups() {
        let schema = registry
            .get(group)
            .ok_or(ReportError::MissingSchema(group))?;
        schema.encode(snapshot.mask(group), tags, source, enc)?;
    }
    enc.close()?;

    enc.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FixtureSource;
    use crate::encoder::decode::decode_document;
    use crate::encoder::{SizingEncoder, WritingEncoder};
    use crate::metrics::{kernel, tcp};
    use serde_json::json;

    /// Stand-in encoder emitting a single constant.
    struct ConstantSchema;

    impl GroupSchema for ConstantSchema {
        fn group(&self) -> MetricsGroup {
            MetricsGroup::KernelRuntimeStats
        }

        fn encode(
            &self,
            _mask: u32,
            _tags: &Tags,
            _source: &mut dyn StatsSource,
            enc: &mut dyn StructuredEncoder,
        ) -> Result<(), ReportError> {
            enc.append(Some("constant"), Scalar::Int(42))?;
            Ok(())
        }
    }

    fn encode_to_value(
        snapshot: &FlagSnapshot,
        registry: &SchemaRegistry,
    ) -> Result<serde_json::Value, ReportError> {
        let mut source = FixtureSource::typical_device();
        let mut sizing = SizingEncoder::sizing();
        encode_report(&mut sizing, snapshot, 7, &Tags::LONG, registry, &mut source)?;
        let mut buf = vec![0u8; sizing.finish()?];

        let mut writing = WritingEncoder::writing(&mut buf);
        encode_report(&mut writing, snapshot, 7, &Tags::LONG, registry, &mut source)?;
        writing.finish()?;
        Ok(decode_document(&buf).unwrap())
    }

    #[test]
    fn test_header_only_when_nothing_enabled() {
        let value = encode_to_value(&FlagSnapshot::default(), &SchemaRegistry::standard("test"))
            .unwrap();
        assert_eq!(
            value,
            json!({"header": {"report_id": 7, "version": "1.1"}, "metrics": {}})
        );
    }

    #[test]
    fn test_registered_schema_replaces_standard() {
        let mut registry = SchemaRegistry::standard("test");
        registry.register(Box::new(ConstantSchema));

        let snapshot = FlagSnapshot::from_masks(&[(MetricsGroup::KernelRuntimeStats, kernel::ALL)]);
        let value = encode_to_value(&snapshot, &registry).unwrap();
        assert_eq!(value["metrics"], json!({"constant": 42}));
    }

    #[test]
    fn test_missing_schema_fails() {
        let snapshot = FlagSnapshot::from_masks(&[(MetricsGroup::TcpConnections, tcp::ALL)]);
        let err = encode_to_value(&snapshot, &SchemaRegistry::empty()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::MissingSchema(MetricsGroup::TcpConnections)
        ));
    }

    #[test]
    fn test_registry_debug_lists_groups() {
        let registry = SchemaRegistry::standard("test");
        assert_eq!(
            format!("{:?}", registry),
            "[TcpConnections, KernelRuntimeStats]"
        );
    }
}
