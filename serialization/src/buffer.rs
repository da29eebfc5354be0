//! Growable little-endian byte buffer.
//!
//! [`SerializeData`] is random-access: every accessor takes an explicit
//! byte offset. Writes past the physical capacity reallocate to
//! `max(needed, capacity * 2)` and copy the old contents. The reported
//! [`byte_length`](SerializeData::byte_length) is the high-water mark of all
//! writes, never the physical capacity.

use crate::error::ArchiveError;

/// Initial physical capacity of a fresh buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Resizable binary buffer with typed little-endian accessors.
#[derive(Debug, Clone)]
pub struct SerializeData {
    bytes: Vec<u8>,
    data_length: usize,
}

macro_rules! typed_accessors {
    ($($set:ident, $get:ident, $ty:ty;)*) => {
        $(
            #[doc = concat!("Write a little-endian `", stringify!($ty), "` at `offset`.")]
            pub fn $set(&mut self, offset: usize, value: $ty) {
                self.write_bytes(offset, &value.to_le_bytes());
            }

            #[doc = concat!("Read a little-endian `", stringify!($ty), "` at `offset`.")]
            pub fn $get(&self, offset: usize) -> Result<$ty, ArchiveError> {
                let raw = self.read_bytes(offset, std::mem::size_of::<$ty>())?;
                let mut arr = [0u8; std::mem::size_of::<$ty>()];
                arr.copy_from_slice(raw);
                Ok(<$ty>::from_le_bytes(arr))
            }
        )*
    };
}

impl SerializeData {
    /// Create an empty buffer with [`DEFAULT_BUFFER_SIZE`] bytes of capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create an empty buffer with the given physical capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            data_length: 0,
        }
    }

    /// Wrap existing bytes for reading. The whole slice counts as written.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let data_length = bytes.len();
        Self { bytes, data_length }
    }

    /// High-water mark of bytes written.
    pub fn byte_length(&self) -> usize {
        self.data_length
    }

    /// Physical size of the backing allocation.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.data_length]
    }

    /// Consume the buffer, returning exactly the written bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bytes.truncate(self.data_length);
        self.bytes
    }

    fn expand_if_needed(&mut self, offset: usize, size: usize) {
        let needed = offset + size;
        if needed > self.bytes.len() {
            let old = self.bytes.len();
            let new_len = needed.max(old * 2);
            self.bytes.resize(new_len, 0);
            log::debug!("expand serialize buffer from {old} to {new_len}");
        }
    }

    /// Copy raw bytes to `offset`, growing the buffer when needed.
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        self.expand_if_needed(offset, src.len());
        self.bytes[offset..offset + src.len()].copy_from_slice(src);
        self.data_length = self.data_length.max(offset + src.len());
    }

    /// Borrow `len` written bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8], ArchiveError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data_length => Ok(&self.bytes[offset..end]),
            _ => Err(ArchiveError::OutOfBounds {
                offset,
                len: self.data_length,
            }),
        }
    }

    typed_accessors! {
        set_int8, get_int8, i8;
        set_uint8, get_uint8, u8;
        set_int16, get_int16, i16;
        set_uint16, get_uint16, u16;
        set_int32, get_int32, i32;
        set_uint32, get_uint32, u32;
        set_float32, get_float32, f32;
        set_float64, get_float64, f64;
    }

    /// Write `value` as `u32 byte length` + UTF-8 bytes + a null terminator.
    ///
    /// Returns the number of bytes written.
    pub fn set_string(&mut self, offset: usize, value: &str) -> usize {
        let utf8 = value.as_bytes();
        let total = 4 + utf8.len() + 1;
        self.expand_if_needed(offset, total);
        self.set_uint32(offset, utf8.len() as u32);
        self.write_bytes(offset + 4, utf8);
        self.set_uint8(offset + 4 + utf8.len(), 0);
        total
    }

    /// Read a string written by [`set_string`](Self::set_string).
    ///
    /// Returns the string and the number of bytes it occupies.
    pub fn get_string(&self, offset: usize) -> Result<(String, usize), ArchiveError> {
        let byte_len = self.get_uint32(offset)? as usize;
        let raw = self.read_bytes(offset + 4, byte_len + 1)?;
        let (utf8, terminator) = raw.split_at(byte_len);
        if terminator != [0] {
            return Err(ArchiveError::StructuralAssertion(format!(
                "string at offset {offset} is not null-terminated"
            )));
        }
        let s = std::str::from_utf8(utf8).map_err(|_| ArchiveError::InvalidUtf8 { offset })?;
        Ok((s.to_owned(), 4 + byte_len + 1))
    }
}

impl Default for SerializeData {
    fn default() -> Self {
        Self::new()
    }
}
