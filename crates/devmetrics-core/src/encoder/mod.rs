//! Structured encoder capability used by the report builder.
//!
//! The report schema is written once against the object-safe
//! [`StructuredEncoder`] trait and driven twice: through a [`SizingEncoder`]
//! that only counts bytes, then through a [`WritingEncoder`] bound to a buffer
//! of exactly that size.
//!
//! ```
//! use devmetrics_core::encoder::{Scalar, SizingEncoder, StructuredEncoder};
//!
//! let mut enc = SizingEncoder::sizing();
//! enc.open_map(None, 1).unwrap();
//! enc.append(Some("total"), Scalar::Int(3)).unwrap();
//! enc.close().unwrap();
//! assert_eq!(enc.finish().unwrap(), 8);
//! ```

mod cbor;
pub mod decode;

pub use cbor::{Encoder, Sink, SizingEncoder, SizingSink, WritingEncoder, WritingSink};

/// Leaf value appended to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar<'a> {
    Int(i64),
    Text(&'a str),
}

impl Scalar<'_> {
    /// Unsigned counter clamped into the signed integer range.
    pub fn uint(value: u64) -> Scalar<'static> {
        Scalar::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Nested-container encoder driven by the schema encoders.
///
/// `key` must be `Some` when the innermost open container is a map and `None`
/// inside arrays or at the top level. The entry count passed to `open_*` is a
/// promise: exactly that many children must be appended before `close`.
pub trait StructuredEncoder {
    fn open_map(&mut self, key: Option<&str>, entries: usize) -> Result<(), EncodeError>;

    fn open_array(&mut self, key: Option<&str>, items: usize) -> Result<(), EncodeError>;

    fn append(&mut self, key: Option<&str>, value: Scalar<'_>) -> Result<(), EncodeError>;

    /// Closes the innermost open container.
    fn close(&mut self) -> Result<(), EncodeError>;

    /// Bytes produced (or, when sizing, required) so far.
    fn encoded_len(&self) -> usize;
}

/// Error type for encoder operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The bound buffer cannot hold the next item.
    BufferTooSmall { capacity: usize, required: usize },
    /// A container was closed with a different number of children than declared.
    ChildCountMismatch { declared: usize, appended: usize },
    /// A child was appended to a container that is already full.
    TooManyChildren { declared: usize },
    /// A key was given inside an array, or omitted inside a map.
    KeyMismatch { in_map: bool },
    /// `close` was called with no open container.
    NoOpenContainer,
    /// Encoding finished while containers were still open.
    UnclosedContainers(usize),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::BufferTooSmall { capacity, required } => write!(
                f,
                "buffer too small: capacity {} bytes, at least {} required",
                capacity, required
            ),
            EncodeError::ChildCountMismatch { declared, appended } => write!(
                f,
                "container declared {} children but {} were appended",
                declared, appended
            ),
            EncodeError::TooManyChildren { declared } => {
                write!(f, "container declared {} children, got more", declared)
            }
            EncodeError::KeyMismatch { in_map: true } => write!(f, "map entry without a key"),
            EncodeError::KeyMismatch { in_map: false } => {
                write!(f, "key given outside of a map")
            }
            EncodeError::NoOpenContainer => write!(f, "close without an open container"),
            EncodeError::UnclosedContainers(n) => write!(f, "{} containers left open", n),
        }
    }
}

impl std::error::Error for EncodeError {}
