//! Slotted 8 KiB page.
//!
//! Every page, header page 0 included, shares one layout:
//!
//! ```text
//! +--------------------+ offset 0
//! | PageHeader (24B)   |
//! +--------------------+ offset 24
//! | Line pointers      | (grow downward in memory, upward in offset)
//! +--------------------+ free_start
//! | Free space         |
//! +--------------------+ free_end
//! | Tuple data         | (grows upward from the bottom)
//! +--------------------+ offset 8192
//! ```
//!
//! Tuples are appended at the low end of the tuple area while line pointers
//! are appended after the header, the two regions growing toward each other
//! through the shrinking free-space middle.

use super::error::StorageError;
use super::tuple::Tuple;
use super::value::Value;

/// 8 KiB page size (aligned with the PostgreSQL standard).
pub const PAGE_SIZE: usize = 8192;

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 24;

/// Size of one line pointer in bytes.
pub const LINE_POINTER_SIZE: usize = 4;

/// Current page layout version, recorded in every table's metadata record.
pub const PAGE_FORMAT_VERSION: u16 = 1;

/// Page header stored at the beginning of each page.
///
/// Layout (24 bytes, little-endian):
/// - `page_id`: u64
/// - `tuple_count`: u32
/// - `free_start`: u32 - offset where free space starts (end of line pointers)
/// - `free_end`: u32 - offset where free space ends (start of tuple data)
/// - `flags`: u16
/// - `checksum`: u16 - 16-bit sum of the tuple data region, informational
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_id: u64,
    pub tuple_count: u32,
    pub free_start: u32,
    pub free_end: u32,
    pub flags: u16,
    pub checksum: u16,
}

impl PageHeader {
    /// Creates the header of an empty page.
    pub fn new(page_id: u64) -> Self {
        Self {
            page_id,
            tuple_count: 0,
            free_start: PAGE_HEADER_SIZE as u32,
            free_end: PAGE_SIZE as u32,
            flags: 0,
            checksum: 0,
        }
    }

    /// Returns the contiguous free space between the two growing regions.
    pub fn free_space(&self) -> u32 {
        self.free_end.saturating_sub(self.free_start)
    }

    /// Reads a header from the first 24 bytes of a page buffer.
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            page_id: u64::from_le_bytes(data[0..8].try_into().unwrap()),
            tuple_count: u32::from_le_bytes(data[8..12].try_into().unwrap()),
            free_start: u32::from_le_bytes(data[12..16].try_into().unwrap()),
            free_end: u32::from_le_bytes(data[16..20].try_into().unwrap()),
            flags: u16::from_le_bytes(data[20..22].try_into().unwrap()),
            checksum: u16::from_le_bytes(data[22..24].try_into().unwrap()),
        }
    }

    /// Writes the header to the first 24 bytes of a page buffer.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0..8].copy_from_slice(&self.page_id.to_le_bytes());
        data[8..12].copy_from_slice(&self.tuple_count.to_le_bytes());
        data[12..16].copy_from_slice(&self.free_start.to_le_bytes());
        data[16..20].copy_from_slice(&self.free_end.to_le_bytes());
        data[20..22].copy_from_slice(&self.flags.to_le_bytes());
        data[22..24].copy_from_slice(&self.checksum.to_le_bytes());
    }
}

/// A line pointer locating one tuple within the page.
///
/// Layout (4 bytes): `offset: u16`, `length: u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePointer {
    /// Offset of the tuple data from the start of the page.
    pub offset: u16,
    /// Length of the tuple data in bytes.
    pub length: u16,
}

impl LinePointer {
    fn read_from(data: &[u8]) -> Self {
        Self {
            offset: u16::from_le_bytes([data[0], data[1]]),
            length: u16::from_le_bytes([data[2], data[3]]),
        }
    }

    fn write_to(&self, data: &mut [u8]) {
        data[0..2].copy_from_slice(&self.offset.to_le_bytes());
        data[2..4].copy_from_slice(&self.length.to_le_bytes());
    }
}

/// An in-memory 8 KiB slotted page.
///
/// The page owns its full serialized image; the header is kept in sync with
/// the byte buffer on every mutation, so [`serialize`](Page::serialize) is a
/// plain copy.
#[derive(Clone)]
pub struct Page {
    header: PageHeader,
    data: Box<[u8; PAGE_SIZE]>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.data[..] == other.data[..]
    }
}

impl Page {
    /// Creates an empty page with the given identifier.
    pub fn new(page_id: u64) -> Self {
        let header = PageHeader::new(page_id);
        let mut data = Box::new([0u8; PAGE_SIZE]);
        header.write_to(&mut data[..PAGE_HEADER_SIZE]);
        Self { header, data }
    }

    /// Returns the page header.
    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// Returns the page identifier.
    pub fn page_id(&self) -> u64 {
        self.header.page_id
    }

    /// Returns the number of tuples stored on this page.
    pub fn tuple_count(&self) -> u32 {
        self.header.tuple_count
    }

    /// Returns the contiguous free space in bytes.
    pub fn free_space(&self) -> u32 {
        self.header.free_space()
    }

    /// Checks whether a tuple of `size_bytes` encoded bytes fits, accounting
    /// for the line pointer it would need.
    pub fn has_space_for(&self, size_bytes: usize) -> bool {
        size_bytes + LINE_POINTER_SIZE <= self.header.free_space() as usize
    }

    /// Appends a tuple to this page.
    ///
    /// The tuple bytes are placed at the low end of the tuple area and a new
    /// line pointer is appended after the existing ones, preserving insertion
    /// order. The checksum over the tuple area is recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSpace`] if the encoded tuple plus its line
    /// pointer does not fit in the free space.
    pub fn add_tuple(&mut self, row_id: u64, values: &[Value]) -> Result<(), StorageError> {
        let encoded = Tuple::encode_parts(row_id, values);
        if !self.has_space_for(encoded.len()) {
            return Err(StorageError::NoSpace);
        }

        let mut header = self.header;
        header.free_end -= encoded.len() as u32;
        let offset = header.free_end as usize;
        self.data[offset..offset + encoded.len()].copy_from_slice(&encoded);

        let pointer = LinePointer {
            offset: offset as u16,
            length: encoded.len() as u16,
        };
        let lp_offset = header.free_start as usize;
        pointer.write_to(&mut self.data[lp_offset..lp_offset + LINE_POINTER_SIZE]);
        header.free_start += LINE_POINTER_SIZE as u32;
        header.tuple_count += 1;

        self.header = header;
        self.header.checksum = self.compute_checksum();
        self.sync_header();
        Ok(())
    }

    /// Decodes all tuples in insertion order.
    pub fn tuples(&self) -> Result<Vec<Tuple>, StorageError> {
        let mut tuples = Vec::with_capacity(self.header.tuple_count as usize);
        for i in 0..self.header.tuple_count {
            let pointer = self.line_pointer(i);
            let start = pointer.offset as usize;
            let end = start + pointer.length as usize;
            tuples.push(Tuple::decode(&self.data[start..end])?);
        }
        Ok(tuples)
    }

    /// Serializes the page to its exact on-disk image.
    pub fn serialize(&self) -> [u8; PAGE_SIZE] {
        *self.data
    }

    /// Deserializes a page from an 8192-byte buffer, validating the layout
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPageSize`] for a wrong-sized buffer and
    /// [`StorageError::Deserialize`] for a malformed header or line pointers
    /// reaching outside the tuple area.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }

        let header = PageHeader::read_from(bytes);
        if header.free_start < PAGE_HEADER_SIZE as u32
            || header.free_start > header.free_end
            || header.free_end > PAGE_SIZE as u32
        {
            return Err(StorageError::Deserialize(format!(
                "invalid free space bounds: start={} end={}",
                header.free_start, header.free_end
            )));
        }

        let lp_bytes = (header.free_start as usize) - PAGE_HEADER_SIZE;
        if lp_bytes % LINE_POINTER_SIZE != 0
            || lp_bytes / LINE_POINTER_SIZE != header.tuple_count as usize
        {
            return Err(StorageError::Deserialize(format!(
                "tuple count {} does not match line pointer area",
                header.tuple_count
            )));
        }

        let mut data = Box::new([0u8; PAGE_SIZE]);
        data.copy_from_slice(bytes);
        let page = Self { header, data };

        for i in 0..header.tuple_count {
            let pointer = page.line_pointer(i);
            let start = pointer.offset as u32;
            let end = start + pointer.length as u32;
            if start < header.free_end || end > PAGE_SIZE as u32 {
                return Err(StorageError::Deserialize(format!(
                    "line pointer {} outside tuple area: {}..{}",
                    i, start, end
                )));
            }
        }

        Ok(page)
    }

    fn line_pointer(&self, index: u32) -> LinePointer {
        let offset = PAGE_HEADER_SIZE + index as usize * LINE_POINTER_SIZE;
        LinePointer::read_from(&self.data[offset..offset + LINE_POINTER_SIZE])
    }

    /// 16-bit sum of the tuple data region. Informational; not enforced on
    /// read.
    fn compute_checksum(&self) -> u16 {
        self.data[self.header.free_end as usize..]
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }

    fn sync_header(&mut self) {
        let header = self.header;
        header.write_to(&mut self.data[..PAGE_HEADER_SIZE]);
    }
}
