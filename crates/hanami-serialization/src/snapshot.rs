// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot container: header followed by typed, size-prefixed records.

use crate::byte_codec::{ByteReader, ByteWriter};
use crate::cluster_header::{ClusterHeader, CLUSTER_HEADER_SIZE};
use crate::error::Result;
use crate::segment_record::{SegmentRecord, SegmentRecordType, RECORD_PREFIX_SIZE};
use tracing::warn;

/// Result of scanning a snapshot blob
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    pub header: ClusterHeader,
    /// Records of known type, in stored order
    pub records: Vec<SegmentRecord>,
    /// Records dropped because of an unknown type or truncation
    pub skipped: usize,
    /// The scan stopped early on a record whose size exceeds the blob
    pub truncated: bool,
}

pub fn encode_snapshot(header: &ClusterHeader, records: &[SegmentRecord]) -> Vec<u8> {
    let body: usize = records
        .iter()
        .map(|r| RECORD_PREFIX_SIZE + r.bytes.len())
        .sum();
    let mut writer = ByteWriter::with_capacity(CLUSTER_HEADER_SIZE + body);
    header.encode(&mut writer);
    for record in records {
        writer.write_u8(record.record_type as u8);
        writer.write_u64(record.bytes.len() as u64);
        writer.write_bytes(&record.bytes);
    }
    writer.into_bytes()
}

/// Decode a snapshot blob.
///
/// Fails only when the header itself is unusable. Unknown record types are
/// skipped by their declared size; a record that runs past the end of the
/// blob stops the scan and counts as skipped.
pub fn decode_snapshot(blob: &[u8]) -> Result<DecodedSnapshot> {
    let mut reader = ByteReader::new(blob);
    let header = ClusterHeader::decode(&mut reader)?;

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut truncated = false;

    while !reader.is_exhausted() {
        let offset = reader.offset();
        let (raw_type, size) = match (reader.read_u8(), reader.read_u64()) {
            (Ok(t), Ok(s)) => (t, s),
            _ => {
                warn!(target: "hanami-serialization", offset, "Truncated record prefix");
                skipped += 1;
                truncated = true;
                break;
            }
        };
        let size = match usize::try_from(size) {
            Ok(size) if size <= reader.remaining() => size,
            _ => {
                warn!(
                    target: "hanami-serialization",
                    offset, size, remaining = reader.remaining(),
                    "Record size exceeds snapshot, stopping scan"
                );
                skipped += 1;
                truncated = true;
                break;
            }
        };

        match SegmentRecordType::try_from(raw_type) {
            Ok(record_type) => {
                let bytes = reader.read_bytes(size)?.to_vec();
                records.push(SegmentRecord::new(record_type, bytes));
            }
            Err(_) => {
                warn!(
                    target: "hanami-serialization",
                    offset, raw_type, size, "Skipping record of unknown type"
                );
                reader.skip(size)?;
                skipped += 1;
            }
        }
    }

    Ok(DecodedSnapshot {
        header,
        records,
        skipped,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn header() -> ClusterHeader {
        ClusterHeader::new([1u8; 16], "snap", 2, 9)
    }

    #[test]
    fn test_records_survive_in_order() {
        let records = vec![
            SegmentRecord::new(SegmentRecordType::Input, vec![1, 2, 3]),
            SegmentRecord::new(SegmentRecordType::Dynamic, vec![]),
            SegmentRecord::new(SegmentRecordType::Output, vec![9; 40]),
        ];
        let blob = encode_snapshot(&header(), &records);
        let decoded = decode_snapshot(&blob).unwrap();

        assert_eq!(decoded.header, header());
        assert_eq!(decoded.records, records);
        assert_eq!(decoded.skipped, 0);
        assert!(!decoded.truncated);
    }

    #[test]
    fn test_unknown_type_is_skipped_and_stream_stays_aligned() {
        let mut blob = encode_snapshot(
            &header(),
            &[SegmentRecord::new(SegmentRecordType::Input, vec![5, 5])],
        );
        blob.push(77);
        blob.write_u64::<LittleEndian>(3).unwrap();
        blob.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        blob.push(SegmentRecordType::Output as u8);
        blob.write_u64::<LittleEndian>(1).unwrap();
        blob.push(0x42);

        let decoded = decode_snapshot(&blob).unwrap();

        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.records[1].record_type, SegmentRecordType::Output);
        assert_eq!(decoded.records[1].bytes, vec![0x42]);
    }

    #[test]
    fn test_truncated_record_stops_scan() {
        let mut blob = encode_snapshot(
            &header(),
            &[SegmentRecord::new(SegmentRecordType::Input, vec![1])],
        );
        blob.push(SegmentRecordType::Dynamic as u8);
        blob.write_u64::<LittleEndian>(1000).unwrap();
        blob.extend_from_slice(&[0u8; 10]);

        let decoded = decode_snapshot(&blob).unwrap();

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.skipped, 1);
        assert!(decoded.truncated);
    }

    #[test]
    fn test_short_blob_fails_on_header() {
        assert!(decode_snapshot(&[0u8; 10]).is_err());
    }
}
