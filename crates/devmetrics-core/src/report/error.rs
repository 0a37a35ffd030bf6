use crate::collector::CollectError;
use crate::encoder::EncodeError;
use crate::metrics::MetricsGroup;

/// Error type for report construction.
#[derive(Debug)]
pub enum ReportError {
    /// A report is still allocated; it must be deleted before building again.
    AlreadyBuilt { report_id: u64 },
    /// The report buffer could not be allocated.
    OutOfMemory { requested: usize },
    /// A statistics source failed.
    Stats(CollectError),
    /// The encoder rejected an operation. Outside of a buffer overflow in the
    /// writing pass this is a schema defect.
    Encode(EncodeError),
    /// A group is enabled but no schema encoder is registered for it.
    MissingSchema(MetricsGroup),
    /// Statistics kept growing between the sizing and the writing pass.
    SizeDrift { sized: usize, required: usize },
    /// The report id counter cannot advance without reuse.
    IdExhausted,
}

impl ReportError {
    /// Whether a later attempt may succeed. Other errors are programming
    /// errors and will fail again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReportError::OutOfMemory { .. } | ReportError::Stats(_) | ReportError::SizeDrift { .. }
        )
    }
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::AlreadyBuilt { report_id } => {
                write!(f, "report {} is still allocated", report_id)
            }
            ReportError::OutOfMemory { requested } => {
                write!(f, "cannot allocate {} bytes for the report", requested)
            }
            ReportError::Stats(e) => write!(f, "statistics unavailable: {}", e),
            ReportError::Encode(e) => write!(f, "encoder error: {}", e),
            ReportError::MissingSchema(group) => {
                write!(f, "no schema encoder registered for {}", group)
            }
            ReportError::SizeDrift { sized, required } => write!(
                f,
                "report outgrew its buffer: sized {} bytes, needed at least {}",
                sized, required
            ),
            ReportError::IdExhausted => write!(f, "report id counter exhausted"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Stats(e) => Some(e),
            ReportError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CollectError> for ReportError {
    fn from(e: CollectError) -> Self {
        ReportError::Stats(e)
    }
}

impl From<EncodeError> for ReportError {
    fn from(e: EncodeError) -> Self {
        ReportError::Encode(e)
    }
}
