//! Reader for documents produced by the structured encoder.
//!
//! Decodes the same CBOR subset into a `serde_json::Value`, which makes
//! reports easy to inspect and compare in tests.

use serde_json::{Map, Value};

/// Nesting deeper than this is rejected.
const MAX_DEPTH: usize = 32;

/// Error type for decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended in the middle of an item.
    UnexpectedEnd(usize),
    /// Item type outside the supported subset.
    Unsupported { offset: usize, initial_byte: u8 },
    /// Map key that is not a text string.
    NonTextKey(usize),
    InvalidUtf8(usize),
    TooDeep,
    /// Bytes left after the top-level item.
    TrailingBytes(usize),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedEnd(offset) => write!(f, "unexpected end at offset {}", offset),
            DecodeError::Unsupported {
                offset,
                initial_byte,
            } => write!(
                f,
                "unsupported item 0x{:02x} at offset {}",
                initial_byte, offset
            ),
            DecodeError::NonTextKey(offset) => write!(f, "non-text map key at offset {}", offset),
            DecodeError::InvalidUtf8(offset) => write!(f, "invalid UTF-8 at offset {}", offset),
            DecodeError::TooDeep => write!(f, "nesting deeper than {}", MAX_DEPTH),
            DecodeError::TrailingBytes(n) => write!(f, "{} trailing bytes", n),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes exactly one top-level item spanning the whole input.
pub fn decode_document(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = reader.read_value(0)?;
    if reader.pos != bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - reader.pos));
    }
    Ok(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Returns (major type, argument, offset of the initial byte).
    fn read_head(&mut self) -> Result<(u8, u64, usize), DecodeError> {
        let offset = self.pos;
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let argument = match initial & 0x1f {
            info @ 0..=23 => info as u64,
            24 => self.take(1)?[0] as u64,
            25 => u16::from_be_bytes([self.take(1)?[0], self.take(1)?[0]]) as u64,
            26 => {
                let raw = self.take(4)?;
                u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64
            }
            27 => {
                let raw = self.take(8)?;
                let mut word = [0u8; 8];
                word.copy_from_slice(raw);
                u64::from_be_bytes(word)
            }
            _ => {
                return Err(DecodeError::Unsupported {
                    offset,
                    initial_byte: initial,
                });
            }
        };
        Ok((major, argument, offset))
    }

    fn read_text(&mut self, len: u64, offset: usize) -> Result<String, DecodeError> {
        let len = usize::try_from(len).map_err(|_| DecodeError::UnexpectedEnd(offset))?;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8(offset))
    }

    fn read_value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        let (major, argument, offset) = self.read_head()?;
        match major {
            0 => Ok(Value::from(argument)),
            1 => {
                let magnitude = i64::try_from(argument).map_err(|_| DecodeError::Unsupported {
                    offset,
                    initial_byte: self.bytes[offset],
                })?;
                Ok(Value::from(-1 - magnitude))
            }
            3 => self.read_text(argument, offset).map(Value::String),
            4 => {
                let remaining = self.bytes.len() - self.pos;
                let mut items = Vec::with_capacity((argument as usize).min(remaining));
                for _ in 0..argument {
                    items.push(self.read_value(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let mut entries = Map::new();
                for _ in 0..argument {
                    let (key_major, key_len, key_offset) = self.read_head()?;
                    if key_major != 3 {
                        return Err(DecodeError::NonTextKey(key_offset));
                    }
                    let key = self.read_text(key_len, key_offset)?;
                    let value = self.read_value(depth + 1)?;
                    entries.insert(key, value);
                }
                Ok(Value::Object(entries))
            }
            _ => Err(DecodeError::Unsupported {
                offset,
                initial_byte: self.bytes[offset],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Scalar, StructuredEncoder, WritingEncoder};
    use serde_json::json;

    #[test]
    fn test_decode_nested_document() {
        let mut buf = [0u8; 128];
        let mut enc = WritingEncoder::writing(&mut buf);
        enc.open_map(None, 2).unwrap();
        enc.open_map(Some("header"), 1).unwrap();
        enc.append(Some("version"), Scalar::Text("1.1")).unwrap();
        enc.close().unwrap();
        enc.open_array(Some("values"), 3).unwrap();
        enc.append(None, Scalar::Int(0)).unwrap();
        enc.append(None, Scalar::Int(-25)).unwrap();
        enc.append(None, Scalar::Int(70_000)).unwrap();
        enc.close().unwrap();
        enc.close().unwrap();
        let len = enc.finish().unwrap();

        let value = decode_document(&buf[..len]).unwrap();
        assert_eq!(
            value,
            json!({"header": {"version": "1.1"}, "values": [0, -25, 70000]})
        );
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        assert_eq!(decode_document(&[0x01, 0x02]), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        // map(1) with a key but no value
        assert_eq!(
            decode_document(&[0xa1, 0x61, b'k']),
            Err(DecodeError::UnexpectedEnd(3))
        );
        assert_eq!(decode_document(&[]), Err(DecodeError::UnexpectedEnd(0)));
    }

    #[test]
    fn test_decode_rejects_non_text_key() {
        assert_eq!(
            decode_document(&[0xa1, 0x01, 0x02]),
            Err(DecodeError::NonTextKey(1))
        );
    }

    #[test]
    fn test_decode_rejects_unsupported_items() {
        // byte string
        assert!(matches!(
            decode_document(&[0x41, 0x00]),
            Err(DecodeError::Unsupported { offset: 0, .. })
        ));
        // indefinite-length array
        assert!(matches!(
            decode_document(&[0x9f, 0xff]),
            Err(DecodeError::Unsupported { offset: 0, .. })
        ));
    }

    #[test]
    fn test_decode_depth_limit() {
        let nested = vec![0x81u8; MAX_DEPTH + 2];
        assert_eq!(decode_document(&nested), Err(DecodeError::TooDeep));
    }
}
