//! CBOR rendition of the structured encoder.
//!
//! Only the subset the report needs: definite-length maps and arrays,
//! integers in shortest form and UTF-8 text strings.

use super::{EncodeError, Scalar, StructuredEncoder};

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

/// Destination of encoded bytes.
pub trait Sink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError>;

    /// Bytes accepted so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sink with no backing buffer; counts the bytes a real pass will need.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizingSink {
    required: usize,
}

impl Sink for SizingSink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.required += bytes.len();
        Ok(())
    }

    fn len(&self) -> usize {
        self.required
    }
}

/// Sink bound to a caller-owned buffer of fixed capacity.
#[derive(Debug)]
pub struct WritingSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WritingSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Sink for WritingSink<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(EncodeError::BufferTooSmall {
                capacity: self.buf.len(),
                required: end,
            });
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn len(&self) -> usize {
        self.pos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Map,
    Array,
}

#[derive(Debug)]
struct Frame {
    kind: ContainerKind,
    declared: usize,
    appended: usize,
}

/// Structured encoder over any [`Sink`].
///
/// Tracks the open containers and rejects any deviation from the declared
/// child counts, so a mis-declared schema fails instead of producing a
/// malformed document.
#[derive(Debug)]
pub struct Encoder<S: Sink> {
    sink: S,
    stack: Vec<Frame>,
}

pub type SizingEncoder = Encoder<SizingSink>;
pub type WritingEncoder<'a> = Encoder<WritingSink<'a>>;

impl SizingEncoder {
    /// Dry-run encoder: no buffer, zero capacity.
    pub fn sizing() -> Self {
        Self::new(SizingSink::default())
    }
}

impl<'a> WritingEncoder<'a> {
    pub fn writing(buf: &'a mut [u8]) -> Self {
        Self::new(WritingSink::new(buf))
    }
}

impl<S: Sink> Encoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stack: Vec::new(),
        }
    }

    /// Number of currently open containers.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Checks that every container was closed and returns the encoded length.
    pub fn finish(&self) -> Result<usize, EncodeError> {
        if !self.stack.is_empty() {
            return Err(EncodeError::UnclosedContainers(self.stack.len()));
        }
        Ok(self.sink.len())
    }

    /// Accounts for a new child of the innermost container and writes its key.
    fn begin_child(&mut self, key: Option<&str>) -> Result<(), EncodeError> {
        match self.stack.last_mut() {
            Some(frame) => {
                let in_map = frame.kind == ContainerKind::Map;
                if in_map != key.is_some() {
                    return Err(EncodeError::KeyMismatch { in_map });
                }
                if frame.appended == frame.declared {
                    return Err(EncodeError::TooManyChildren {
                        declared: frame.declared,
                    });
                }
                frame.appended += 1;
            }
            None if key.is_some() => return Err(EncodeError::KeyMismatch { in_map: false }),
            None => {}
        }

        if let Some(key) = key {
            self.write_text(key)?;
        }
        Ok(())
    }

    fn open(
        &mut self,
        kind: ContainerKind,
        key: Option<&str>,
        children: usize,
    ) -> Result<(), EncodeError> {
        self.begin_child(key)?;
        let major = match kind {
            ContainerKind::Map => MAJOR_MAP,
            ContainerKind::Array => MAJOR_ARRAY,
        };
        self.write_head(major, children as u64)?;
        self.stack.push(Frame {
            kind,
            declared: children,
            appended: 0,
        });
        Ok(())
    }

    fn write_head(&mut self, major: u8, value: u64) -> Result<(), EncodeError> {
        let mut head = [0u8; 9];
        let len = encode_head(major, value, &mut head);
        self.sink.put(&head[..len])
    }

    fn write_text(&mut self, text: &str) -> Result<(), EncodeError> {
        self.write_head(MAJOR_TEXT, text.len() as u64)?;
        self.sink.put(text.as_bytes())
    }
}

impl<S: Sink> StructuredEncoder for Encoder<S> {
    fn open_map(&mut self, key: Option<&str>, entries: usize) -> Result<(), EncodeError> {
        self.open(ContainerKind::Map, key, entries)
    }

    fn open_array(&mut self, key: Option<&str>, items: usize) -> Result<(), EncodeError> {
        self.open(ContainerKind::Array, key, items)
    }

    fn append(&mut self, key: Option<&str>, value: Scalar<'_>) -> Result<(), EncodeError> {
        self.begin_child(key)?;
        match value {
            Scalar::Int(v) if v >= 0 => self.write_head(MAJOR_UNSIGNED, v as u64),
            // -1 - v, computed without overflow for i64::MIN
            Scalar::Int(v) => self.write_head(MAJOR_NEGATIVE, !(v as u64)),
            Scalar::Text(text) => self.write_text(text),
        }
    }

    fn close(&mut self) -> Result<(), EncodeError> {
        let frame = self.stack.pop().ok_or(EncodeError::NoOpenContainer)?;
        if frame.appended != frame.declared {
            return Err(EncodeError::ChildCountMismatch {
                declared: frame.declared,
                appended: frame.appended,
            });
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        self.sink.len()
    }
}

/// Writes a CBOR initial byte plus argument, returning the bytes used.
fn encode_head(major: u8, value: u64, out: &mut [u8; 9]) -> usize {
    let major = major << 5;
    if value < 24 {
        out[0] = major | value as u8;
        1
    } else if value <= u8::MAX as u64 {
        out[0] = major | 24;
        out[1] = value as u8;
        2
    } else if value <= u16::MAX as u64 {
        out[0] = major | 25;
        out[1..3].copy_from_slice(&(value as u16).to_be_bytes());
        3
    } else if value <= u32::MAX as u64 {
        out[0] = major | 26;
        out[1..5].copy_from_slice(&(value as u32).to_be_bytes());
        5
    } else {
        out[0] = major | 27;
        out[1..9].copy_from_slice(&value.to_be_bytes());
        9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_sample(enc: &mut dyn StructuredEncoder) -> Result<(), EncodeError> {
        enc.open_map(None, 3)?;
        enc.append(Some("a"), Scalar::Int(1))?;
        enc.append(Some("b"), Scalar::Text("xy"))?;
        enc.open_array(Some("c"), 2)?;
        enc.append(None, Scalar::Int(-1))?;
        enc.append(None, Scalar::Int(500))?;
        enc.close()?;
        enc.close()
    }

    #[test]
    fn test_head_widths() {
        let mut out = [0u8; 9];
        assert_eq!(encode_head(MAJOR_UNSIGNED, 23, &mut out), 1);
        assert_eq!(out[0], 0x17);
        assert_eq!(encode_head(MAJOR_UNSIGNED, 24, &mut out), 2);
        assert_eq!(&out[..2], &[0x18, 24]);
        assert_eq!(encode_head(MAJOR_UNSIGNED, 1000, &mut out), 3);
        assert_eq!(&out[..3], &[0x19, 0x03, 0xe8]);
        assert_eq!(encode_head(MAJOR_UNSIGNED, 1_000_000, &mut out), 5);
        assert_eq!(&out[..5], &[0x1a, 0x00, 0x0f, 0x42, 0x40]);
        assert_eq!(encode_head(MAJOR_UNSIGNED, u64::MAX, &mut out), 9);
        assert_eq!(out[0], 0x1b);
    }

    #[test]
    fn test_known_encoding() {
        let mut buf = [0u8; 64];
        let mut enc = WritingEncoder::writing(&mut buf);
        encode_sample(&mut enc).unwrap();
        let len = enc.finish().unwrap();

        let expected: &[u8] = &[
            0xa3, // map(3)
            0x61, b'a', 0x01, // "a": 1
            0x61, b'b', 0x62, b'x', b'y', // "b": "xy"
            0x61, b'c', 0x82, 0x20, 0x19, 0x01, 0xf4, // "c": [-1, 500]
        ];
        assert_eq!(&buf[..len], expected);
    }

    #[test]
    fn test_sizing_matches_writing() {
        let mut sizing = SizingEncoder::sizing();
        encode_sample(&mut sizing).unwrap();
        let size = sizing.finish().unwrap();

        let mut buf = vec![0u8; size];
        let mut writing = WritingEncoder::writing(&mut buf);
        encode_sample(&mut writing).unwrap();
        assert_eq!(writing.finish().unwrap(), size);
    }

    #[test]
    fn test_writing_buffer_too_small() {
        let mut buf = [0u8; 4];
        let mut enc = WritingEncoder::writing(&mut buf);
        let err = encode_sample(&mut enc).unwrap_err();
        assert!(matches!(err, EncodeError::BufferTooSmall { capacity: 4, .. }));
    }

    #[test]
    fn test_writing_sink_reports_capacity() {
        let mut buf = [0u8; 3];
        let mut sink = WritingSink::new(&mut buf);
        assert_eq!(sink.capacity(), 3);
        assert!(sink.is_empty());
        sink.put(&[1, 2]).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.put(&[3, 4]),
            Err(EncodeError::BufferTooSmall {
                capacity: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_depth_follows_open_containers() {
        let mut enc = SizingEncoder::sizing();
        assert_eq!(enc.depth(), 0);
        enc.open_map(None, 1).unwrap();
        enc.open_array(Some("items"), 0).unwrap();
        assert_eq!(enc.depth(), 2);
        assert_eq!(enc.finish(), Err(EncodeError::UnclosedContainers(2)));
        enc.close().unwrap();
        enc.close().unwrap();
        assert_eq!(enc.depth(), 0);
    }

    #[test]
    fn test_child_count_mismatch_on_close() {
        let mut enc = SizingEncoder::sizing();
        enc.open_map(None, 2).unwrap();
        enc.append(Some("only"), Scalar::Int(1)).unwrap();
        assert_eq!(
            enc.close(),
            Err(EncodeError::ChildCountMismatch {
                declared: 2,
                appended: 1
            })
        );
    }

    #[test]
    fn test_too_many_children() {
        let mut enc = SizingEncoder::sizing();
        enc.open_array(None, 1).unwrap();
        enc.append(None, Scalar::Int(1)).unwrap();
        assert_eq!(
            enc.append(None, Scalar::Int(2)),
            Err(EncodeError::TooManyChildren { declared: 1 })
        );
    }

    #[test]
    fn test_key_rules() {
        let mut enc = SizingEncoder::sizing();
        assert_eq!(
            enc.open_map(Some("top"), 1),
            Err(EncodeError::KeyMismatch { in_map: false })
        );
        enc.open_map(None, 1).unwrap();
        assert_eq!(
            enc.append(None, Scalar::Int(1)),
            Err(EncodeError::KeyMismatch { in_map: true })
        );
        enc.open_array(Some("list"), 1).unwrap();
        assert_eq!(
            enc.append(Some("k"), Scalar::Int(1)),
            Err(EncodeError::KeyMismatch { in_map: false })
        );
    }

    #[test]
    fn test_close_and_finish_balance() {
        let mut enc = SizingEncoder::sizing();
        assert_eq!(enc.close(), Err(EncodeError::NoOpenContainer));
        enc.open_map(None, 0).unwrap();
        assert_eq!(enc.finish(), Err(EncodeError::UnclosedContainers(1)));
        enc.close().unwrap();
        assert_eq!(enc.finish(), Ok(1));
    }

    #[test]
    fn test_negative_extremes() {
        let mut enc = SizingEncoder::sizing();
        enc.append(None, Scalar::Int(i64::MIN)).unwrap();
        assert_eq!(enc.encoded_len(), 9);
    }
}
