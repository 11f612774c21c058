//! Typed runtime values and their self-describing binary encoding.
//!
//! [`Value`] is the dynamic value type carried by rows and literals. The
//! binary form is tag-prefixed so a byte stream can be decoded without any
//! out-of-band schema; this is what makes the header-page metadata record
//! (a nested [`Value::Map`]) storable through the same tuple machinery as
//! ordinary rows.

use super::error::StorageError;

/// Encoding tags. One byte precedes every encoded value.
const TAG_NULL: u8 = 0;
const TAG_INT64: u8 = 1;
const TAG_TEXT: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_LIST: u8 = 4;
const TAG_MAP: u8 = 5;

/// A typed runtime value.
///
/// User rows only ever contain the scalar variants (`Null`, `Int64`, `Text`,
/// `Bool`); `List` and `Map` exist for the metadata record stored on each
/// table's header page.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer (INTEGER).
    Int64(i64),
    /// Variable-length text (TEXT, VARCHAR).
    Text(String),
    /// Boolean (BOOLEAN).
    Bool(bool),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// Ordered string-keyed map.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Returns the encoded size in bytes, including the tag byte.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Value::Null => 0,
            Value::Int64(_) => 8,
            Value::Bool(_) => 1,
            Value::Text(s) => 4 + s.len(),
            Value::List(items) => 4 + items.iter().map(Value::encoded_len).sum::<usize>(),
            Value::Map(entries) => {
                4 + entries
                    .iter()
                    .map(|(k, v)| 4 + k.len() + v.encoded_len())
                    .sum::<usize>()
            }
        }
    }

    /// Appends the encoded form of this value to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(TAG_NULL),
            Value::Int64(n) => {
                out.push(TAG_INT64);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Value::Text(s) => {
                out.push(TAG_TEXT);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Value::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(if *b { 1 } else { 0 });
            }
            Value::List(items) => {
                out.push(TAG_LIST);
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
            Value::Map(entries) => {
                out.push(TAG_MAP);
                out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                for (key, value) in entries {
                    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
                    out.extend_from_slice(key.as_bytes());
                    value.encode_into(out);
                }
            }
        }
    }

    /// Decodes one value from the front of `buf`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Value, usize), StorageError> {
        let (&tag, rest) = buf
            .split_first()
            .ok_or_else(|| deserialize_err("empty value"))?;
        match tag {
            TAG_NULL => Ok((Value::Null, 1)),
            TAG_INT64 => {
                let bytes = take(rest, 8)?;
                let n = i64::from_le_bytes(bytes.try_into().unwrap());
                Ok((Value::Int64(n), 9))
            }
            TAG_TEXT => {
                let (s, used) = decode_string(rest)?;
                Ok((Value::Text(s), 1 + used))
            }
            TAG_BOOL => {
                let bytes = take(rest, 1)?;
                Ok((Value::Bool(bytes[0] != 0), 2))
            }
            TAG_LIST => {
                let count = decode_u32(rest)? as usize;
                let mut used = 4;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let (item, n) = Value::decode(&rest[used..])?;
                    items.push(item);
                    used += n;
                }
                Ok((Value::List(items), 1 + used))
            }
            TAG_MAP => {
                let count = decode_u32(rest)? as usize;
                let mut used = 4;
                let mut entries = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let (key, n) = decode_raw_string(&rest[used..])?;
                    used += n;
                    let (value, n) = Value::decode(&rest[used..])?;
                    used += n;
                    entries.push((key, value));
                }
                Ok((Value::Map(entries), 1 + used))
            }
            other => Err(deserialize_err(format!("unknown value tag {}", other))),
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders this value as PostgreSQL text-format output.
    ///
    /// Returns `None` for NULL, which the wire layer encodes as length -1.
    pub fn render_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int64(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bool(true) => Some("t".to_string()),
            Value::Bool(false) => Some("f".to_string()),
            Value::List(_) | Value::Map(_) => None,
        }
    }
}

fn deserialize_err(msg: impl Into<String>) -> StorageError {
    StorageError::Deserialize(msg.into())
}

fn take(buf: &[u8], n: usize) -> Result<&[u8], StorageError> {
    buf.get(..n)
        .ok_or_else(|| deserialize_err(format!("need {} bytes, have {}", n, buf.len())))
}

fn decode_u32(buf: &[u8]) -> Result<u32, StorageError> {
    let bytes = take(buf, 4)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

/// Decodes a u32-length-prefixed UTF-8 string; returns (string, bytes consumed).
fn decode_raw_string(buf: &[u8]) -> Result<(String, usize), StorageError> {
    let len = decode_u32(buf)? as usize;
    let bytes = take(&buf[4..], len)?;
    let s = String::from_utf8(bytes.to_vec())
        .map_err(|e| deserialize_err(format!("invalid UTF-8: {}", e)))?;
    Ok((s, 4 + len))
}

fn decode_string(buf: &[u8]) -> Result<(String, usize), StorageError> {
    decode_raw_string(buf)
}
