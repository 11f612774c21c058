//! Tuple encoding.
//!
//! A tuple is one encoded row: a `row_id` plus a list of typed values. The
//! binary form is `row_id: u64 (LE)`, `value count: u16 (LE)`, then each
//! value in the self-describing encoding of [`Value`]. The same blob format
//! carries ordinary rows on data pages and the metadata record on page 0.

use super::error::StorageError;
use super::value::Value;

/// One decoded row: a row identifier and its column values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    /// Monotonic per-table row identifier. Row 0 is reserved for the header
    /// page's metadata record.
    pub row_id: u64,
    /// Column values in schema order.
    pub values: Vec<Value>,
}

impl Tuple {
    /// Creates a tuple.
    pub fn new(row_id: u64, values: Vec<Value>) -> Self {
        Self { row_id, values }
    }

    /// Encodes this tuple to its binary blob.
    pub fn encode(&self) -> Vec<u8> {
        Self::encode_parts(self.row_id, &self.values)
    }

    /// Encodes a `(row_id, values)` pair without constructing a `Tuple`.
    pub fn encode_parts(row_id: u64, values: &[Value]) -> Vec<u8> {
        let len = 8 + 2 + values.iter().map(Value::encoded_len).sum::<usize>();
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&row_id.to_le_bytes());
        out.extend_from_slice(&(values.len() as u16).to_le_bytes());
        for value in values {
            value.encode_into(&mut out);
        }
        out
    }

    /// Returns the encoded size in bytes, row-id header included.
    pub fn encoded_len(values: &[Value]) -> usize {
        8 + 2 + values.iter().map(Value::encoded_len).sum::<usize>()
    }

    /// Decodes a tuple from a blob sliced out of a page.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Deserialize`] on truncated or malformed input,
    /// or when trailing bytes remain after the declared values.
    pub fn decode(buf: &[u8]) -> Result<Self, StorageError> {
        if buf.len() < 10 {
            return Err(StorageError::Deserialize(format!(
                "tuple blob too short: {} bytes",
                buf.len()
            )));
        }
        let row_id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let count = u16::from_le_bytes([buf[8], buf[9]]) as usize;

        let mut values = Vec::with_capacity(count);
        let mut pos = 10;
        for _ in 0..count {
            let (value, used) = Value::decode(&buf[pos..])?;
            values.push(value);
            pos += used;
        }
        if pos != buf.len() {
            return Err(StorageError::Deserialize(format!(
                "{} trailing bytes after tuple",
                buf.len() - pos
            )));
        }
        Ok(Self { row_id, values })
    }
}
