//! Capture file format.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ HEADER (16 bytes, little endian)             │
//! │   magic: [u8; 4]      = b"DMC1"              │
//! │   version: u16        = 1                    │
//! │   _reserved: u16      = 0                    │
//! │   crc32: u32          (of the payload)       │
//! │   payload_len: u32                           │
//! ├──────────────────────────────────────────────┤
//! │ PAYLOAD                                      │
//! │   zstd(postcard(StatsCapture))               │
//! └──────────────────────────────────────────────┘
//! ```

use crate::collector::{CollectError, ConnectionRecord, KernelStats, StatsSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

const MAGIC: [u8; 4] = *b"DMC1";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 16;
const ZSTD_LEVEL: i32 = 3;

/// Statistics taken from a source at one point in time.
///
/// Also a [`StatsSource`] that serves the frozen statistics on every call,
/// so sizing and writing passes always see identical data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCapture {
    /// Unix timestamp (seconds) of the capture.
    pub captured_at: i64,
    pub connections: Vec<ConnectionRecord>,
    pub kernel: KernelStats,
}

impl StatsCapture {
    /// Reads connections and kernel statistics once from `source`.
    pub fn collect<S: StatsSource + ?Sized>(source: &mut S) -> Result<Self, CollectError> {
        let mut connections = Vec::new();
        source.visit_tcp_connections(&mut |records: &[ConnectionRecord]| {
            connections.extend_from_slice(records);
        })?;
        let kernel = source.kernel_stats()?;

        Ok(Self {
            captured_at: Utc::now().timestamp(),
            connections,
            kernel,
        })
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.captured_at, 0)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let raw = postcard::to_allocvec(self).map_err(io::Error::other)?;
        let payload = zstd::encode_all(&raw[..], ZSTD_LEVEL)?;
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| io::Error::other("capture too large"))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload_len.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::other("file too small for header"));
        }

        let magic = &bytes[0..4];
        if magic != MAGIC {
            return Err(io::Error::other(format!(
                "invalid magic: expected DMC1, got {:?}",
                magic
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(io::Error::other(format!(
                "unsupported version: {}",
                version
            )));
        }

        let crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + payload_len)
            .ok_or_else(|| io::Error::other("payload extends past end of file"))?;

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != crc {
            return Err(io::Error::other(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                crc, actual_crc
            )));
        }

        let raw = zstd::decode_all(payload)?;
        postcard::from_bytes(&raw).map_err(io::Error::other)
    }

    /// Writes the capture atomically via a `.tmp` file.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let bytes = self.to_bytes()?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "capture written");
        Ok(())
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl StatsSource for StatsCapture {
    fn visit_tcp_connections(
        &mut self,
        visit: &mut dyn FnMut(&[ConnectionRecord]),
    ) -> Result<(), CollectError> {
        visit(&self.connections);
        Ok(())
    }

    fn kernel_stats(&mut self) -> Result<KernelStats, CollectError> {
        Ok(self.kernel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FixtureSource;
    use crate::metrics::{MetricsFlagStore, MetricsGroup, kernel, tcp};
    use crate::report::{BuilderConfig, ReportBuilder, TagStyle};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn typical_capture() -> StatsCapture {
        let mut source = FixtureSource::typical_device();
        StatsCapture::collect(&mut source).unwrap()
    }

    #[test]
    fn test_collect_reads_each_statistic_once() {
        let mut source = FixtureSource::typical_device();
        let capture = StatsCapture::collect(&mut source).unwrap();
        assert_eq!(source.connection_visits(), 1);
        assert_eq!(source.kernel_samples(), 1);
        assert_eq!(capture.connections, source.connections);
        assert_eq!(capture.kernel, source.kernel);
        assert!(capture.captured_at().is_some());
    }

    #[test]
    fn test_collect_propagates_source_failure() {
        let mut source = FixtureSource::typical_device();
        source.fail_kernel_stats = true;
        assert!(matches!(
            StatsCapture::collect(&mut source),
            Err(CollectError::OutOfMemory)
        ));
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device.dmc");
        let capture = typical_capture();

        capture.write(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(StatsCapture::read(&path).unwrap(), capture);
    }

    #[test]
    fn test_corrupt_payload_is_rejected() {
        let mut bytes = typical_capture().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = StatsCapture::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_bad_header_is_rejected() {
        let mut bytes = typical_capture().to_bytes().unwrap();
        bytes[0] = b'X';
        let err = StatsCapture::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));

        let err = StatsCapture::from_bytes(&bytes[..8]).unwrap_err();
        assert!(err.to_string().contains("too small"));

        let bytes = typical_capture().to_bytes().unwrap();
        let err = StatsCapture::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.to_string().contains("past end"));
    }

    #[test]
    fn test_replay_builds_identical_reports() {
        let store = Arc::new(MetricsFlagStore::new());
        store.set_flags(MetricsGroup::TcpConnections, tcp::ALL);
        store.set_flags(MetricsGroup::KernelRuntimeStats, kernel::ALL);
        let config = BuilderConfig {
            tag_style: TagStyle::Long,
            device_type: "mw300".to_string(),
            ..BuilderConfig::default()
        };

        let mut live = ReportBuilder::new(
            Arc::clone(&store),
            FixtureSource::typical_device(),
            config.clone(),
        );
        let mut replay = ReportBuilder::new(Arc::clone(&store), typical_capture(), config);

        let expected = live.create_report().unwrap().as_bytes().to_vec();
        assert_eq!(replay.create_report().unwrap().as_bytes(), &expected[..]);
    }
}
