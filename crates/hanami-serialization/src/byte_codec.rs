// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Little-endian writer/reader pair used by every persisted structure.
//!
//! Fields are written one at a time in a fixed order; nothing is ever
//! reinterpreted from raw memory.

use crate::error::{Result, SerializationError};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bytes.push(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        // Writes into a Vec cannot fail
        let _ = self.bytes.write_u16::<LittleEndian>(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        let _ = self.bytes.write_u32::<LittleEndian>(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let _ = self.bytes.write_i32::<LittleEndian>(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        let _ = self.bytes.write_u64::<LittleEndian>(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        let _ = self.bytes.write_f32::<LittleEndian>(value);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
    }

    /// Length-prefixed (u32) byte string
    pub fn write_len_prefixed(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.write_bytes(value);
    }

    /// Fixed-width, zero-padded field; longer input is truncated
    pub fn write_fixed(&mut self, value: &[u8], width: usize) {
        let used = value.len().min(width);
        self.bytes.extend_from_slice(&value[..used]);
        self.bytes.resize(self.bytes.len() + (width - used), 0);
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) {
        self.write_u32(values.len() as u32);
        for value in values {
            self.write_f32(*value);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        if self.remaining() < needed {
            return Err(SerializationError::UnexpectedEnd {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerializationError::InvalidValue {
                field: "bool",
                value: other as u64,
            }),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Fixed-width field with trailing zero padding stripped
    pub fn read_fixed(&mut self, width: usize) -> Result<&'a [u8]> {
        let raw = self.take(width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(width);
        Ok(&raw[..end])
    }

    pub fn read_f32_vec(&mut self) -> Result<Vec<f32>> {
        let len = self.read_u32()? as usize;
        if self.remaining() < len.saturating_mul(4) {
            return Err(SerializationError::UnexpectedEnd {
                offset: self.offset,
                needed: len.saturating_mul(4),
                available: self.remaining(),
            });
        }
        (0..len).map(|_| self.read_f32()).collect()
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_little_endian() {
        let mut writer = ByteWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        assert_eq!(writer.as_bytes(), &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);
    }

    #[test]
    fn test_mixed_fields_read_back_in_order() {
        let mut writer = ByteWriter::new();
        writer.write_i8(-3);
        writer.write_bool(true);
        writer.write_f32(0.25);
        writer.write_fixed(b"abc", 8);
        writer.write_f32_slice(&[1.0, -2.0]);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_i8().unwrap(), -3);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_f32().unwrap(), 0.25);
        assert_eq!(reader.read_fixed(8).unwrap(), b"abc");
        assert_eq!(reader.read_f32_vec().unwrap(), vec![1.0, -2.0]);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_short_read_reports_position() {
        let bytes = [1u8, 2, 3];
        let mut reader = ByteReader::new(&bytes);
        reader.read_u8().unwrap();
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            SerializationError::UnexpectedEnd {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let bytes = [7u8];
        assert!(ByteReader::new(&bytes).read_bool().is_err());
    }
}
