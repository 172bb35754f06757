// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed 256-byte header at the start of every cluster snapshot.
//!
//! | offset | size | field          |
//! |--------|------|----------------|
//! | 0      | 8    | magic          |
//! | 8      | 4    | version        |
//! | 12     | 16   | cluster uuid   |
//! | 28     | 128  | name (zero padded UTF-8) |
//! | 156    | 4    | segment count  |
//! | 160    | 8    | random seed    |
//! | 168    | 8    | cycle counter  |
//! | 176    | 80   | reserved (zero) |

use crate::byte_codec::{ByteReader, ByteWriter};
use crate::error::{Result, SerializationError};

pub const CLUSTER_HEADER_SIZE: usize = 256;
pub const CLUSTER_MAGIC: [u8; 8] = *b"HNMCLSTR";
pub const SNAPSHOT_VERSION: u32 = 1;
pub const CLUSTER_NAME_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHeader {
    pub version: u32,
    pub uuid: [u8; 16],
    pub name: String,
    pub segment_count: u32,
    pub random_seed: u64,
    pub cycle_count: u64,
}

impl ClusterHeader {
    pub fn new(uuid: [u8; 16], name: impl Into<String>, segment_count: u32, random_seed: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            uuid,
            name: name.into(),
            segment_count,
            random_seed,
            cycle_count: 0,
        }
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        let start = writer.len();
        writer.write_bytes(&CLUSTER_MAGIC);
        writer.write_u32(self.version);
        writer.write_bytes(&self.uuid);
        writer.write_fixed(truncate_utf8(&self.name, CLUSTER_NAME_SIZE), CLUSTER_NAME_SIZE);
        writer.write_u32(self.segment_count);
        writer.write_u64(self.random_seed);
        writer.write_u64(self.cycle_count);
        let used = writer.len() - start;
        writer.write_fixed(&[], CLUSTER_HEADER_SIZE - used);
    }

    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let header = reader.read_bytes(CLUSTER_HEADER_SIZE)?;
        let mut fields = ByteReader::new(header);

        if fields.read_bytes(CLUSTER_MAGIC.len())? != CLUSTER_MAGIC {
            return Err(SerializationError::InvalidMagic);
        }
        let version = fields.read_u32()?;
        if version != SNAPSHOT_VERSION {
            return Err(SerializationError::UnsupportedVersion(version));
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(fields.read_bytes(16)?);
        let name = String::from_utf8(fields.read_fixed(CLUSTER_NAME_SIZE)?.to_vec())
            .map_err(|e| SerializationError::Decode(format!("cluster name: {e}")))?;

        Ok(Self {
            version,
            uuid,
            name,
            segment_count: fields.read_u32()?,
            random_seed: fields.read_u64()?,
            cycle_count: fields.read_u64()?,
        })
    }
}

/// Longest prefix of `value` that fits `max` bytes on a char boundary
fn truncate_utf8(value: &str, max: usize) -> &[u8] {
    if value.len() <= max {
        return value.as_bytes();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value.as_bytes()[..end]
}
