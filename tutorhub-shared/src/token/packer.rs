//! Little-endian byte packing used by the AccessToken2 wire format
//!
//! # Layout
//!
//! - `u16` / `u32` / `i16`: little-endian, fixed width
//! - string / bytes: `u16` length followed by the raw bytes
//! - privilege map: `u16` entry count, then `{u16 key}{u32 value}` pairs in
//!   ascending key order

use std::collections::BTreeMap;

/// Error type for reading packed data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// Input ended before a complete value could be read
    #[error("Unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A packed string was not valid UTF-8
    #[error("Invalid UTF-8 in packed string at offset {0}")]
    InvalidUtf8(usize),

    /// A value does not fit in its length prefix
    #[error("Value too long to pack: {0} bytes")]
    TooLong(usize),
}

/// Append-only writer for the packed format
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_i16(&mut self, value: i16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes a length-prefixed byte string
    ///
    /// # Errors
    ///
    /// Returns `PackError::TooLong` when `bytes` exceeds `u16::MAX`.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, PackError> {
        let len = u16::try_from(bytes.len()).map_err(|_| PackError::TooLong(bytes.len()))?;
        self.put_u16(len);
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn put_string(&mut self, value: &str) -> Result<&mut Self, PackError> {
        self.put_bytes(value.as_bytes())
    }

    /// Writes a privilege map; `BTreeMap` iteration keeps keys ascending
    pub fn put_privileges(&mut self, map: &BTreeMap<u16, u32>) -> Result<&mut Self, PackError> {
        let len = u16::try_from(map.len()).map_err(|_| PackError::TooLong(map.len()))?;
        self.put_u16(len);
        for (key, value) in map {
            self.put_u16(*key);
            self.put_u32(*value);
        }
        Ok(self)
    }

    /// Appends already-packed bytes without a length prefix
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over packed data
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], PackError> {
        let available = self.data.len() - self.offset;
        if available < needed {
            return Err(PackError::UnexpectedEof {
                offset: self.offset,
                needed,
                available,
            });
        }
        let slice = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    pub fn get_u16(&mut self) -> Result<u16, PackError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32, PackError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_i16(&mut self) -> Result<i16, PackError> {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_bytes(&mut self) -> Result<&'a [u8], PackError> {
        let len = self.get_u16()? as usize;
        self.take(len)
    }

    pub fn get_string(&mut self) -> Result<String, PackError> {
        let start = self.offset;
        let bytes = self.get_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| PackError::InvalidUtf8(start))
    }

    pub fn get_privileges(&mut self) -> Result<BTreeMap<u16, u32>, PackError> {
        let count = self.get_u16()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = self.get_u16()?;
            let value = self.get_u32()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset == self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let mut writer = ByteWriter::new();
        writer.put_u16(0x0102).put_u32(0x0304_0506).put_i16(-2);
        assert_eq!(
            writer.as_bytes(),
            &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0xFE, 0xFF]
        );
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut writer = ByteWriter::new();
        writer.put_string("abc").unwrap();
        assert_eq!(writer.as_bytes(), &[3, 0, b'a', b'b', b'c']);

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.get_string().unwrap(), "abc");
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_privileges_are_sorted_by_key() {
        let mut map = BTreeMap::new();
        map.insert(3u16, 30u32);
        map.insert(1u16, 10u32);

        let mut writer = ByteWriter::new();
        writer.put_privileges(&map).unwrap();
        assert_eq!(
            writer.as_bytes(),
            &[2, 0, 1, 0, 10, 0, 0, 0, 3, 0, 30, 0, 0, 0]
        );

        let mut reader = ByteReader::new(writer.as_bytes());
        assert_eq!(reader.get_privileges().unwrap(), map);
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut reader = ByteReader::new(&[5, 0, b'a']);
        let err = reader.get_string().unwrap_err();
        assert_eq!(
            err,
            PackError::UnexpectedEof {
                offset: 2,
                needed: 5,
                available: 1,
            }
        );
    }

    #[test]
    fn test_oversized_string_is_rejected() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let mut writer = ByteWriter::new();
        assert!(matches!(
            writer.put_string(&long),
            Err(PackError::TooLong(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = ByteReader::new(&[2, 0, 0xC3, 0x28]);
        assert_eq!(reader.get_string().unwrap_err(), PackError::InvalidUtf8(0));
    }
}
