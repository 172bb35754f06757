// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Segment <-> snapshot record conversion.
//!
//! Record body layout (little-endian):
//!
//! ```text
//! name          u32 length + UTF-8
//! 12 x side     in_use u8, size u32, target u32 (u32::MAX = none), target_side u8, direction u8
//! kind body     see InputSegment / OutputSegment / DynamicSegment
//! ```
//!
//! Transfer buffer positions and ready flags are not stored; they are
//! rebuilt from the side table on decode.

use crate::border::{BorderState, SegmentCell};
use crate::error::{EngineError, Result};
use crate::segment::{DynamicSegment, InputSegment, OutputSegment, Segment, SegmentKind};
use hanami_npu_neural::{
    decode_optional_id, encode_optional_id, FlowDirection, SegmentId, SegmentNeighborList, NUMBER_OF_SIDES,
};
use hanami_serialization::{ByteReader, ByteWriter, SegmentRecord, SerializationError};

pub fn encode_segment(cell: &SegmentCell) -> SegmentRecord {
    let mut writer = ByteWriter::with_capacity(256);
    writer.write_len_prefixed(cell.name().as_bytes());
    for neighbor in cell.neighbors().iter() {
        writer.write_bool(neighbor.in_use);
        writer.write_u32(neighbor.size);
        writer.write_u32(encode_optional_id(neighbor.target_segment_id.map(|id| id.0)));
        writer.write_u8(neighbor.target_side);
        writer.write_u8(neighbor.direction.to_u8());
    }
    cell.body().lock().encode_body(&mut writer);
    SegmentRecord::new(cell.kind().record_type(), writer.into_bytes())
}

/// Rebuild a segment cell; `id` is the record's position in the snapshot
pub fn decode_segment(record: &SegmentRecord, id: SegmentId) -> Result<SegmentCell> {
    let mut reader = ByteReader::new(&record.bytes);
    let name = String::from_utf8(reader.read_len_prefixed()?.to_vec())
        .map_err(|e| SerializationError::Decode(format!("segment name: {e}")))?;

    let mut neighbors = SegmentNeighborList::default();
    for (side, neighbor) in neighbors.iter_mut().enumerate() {
        neighbor.in_use = reader.read_bool()?;
        neighbor.size = reader.read_u32()?;
        neighbor.target_segment_id = decode_optional_id(reader.read_u32()?).map(SegmentId);
        neighbor.target_side = reader.read_u8()?;
        let raw_direction = reader.read_u8()?;
        neighbor.direction = FlowDirection::from_u8(raw_direction).ok_or(SerializationError::InvalidValue {
            field: "side direction",
            value: raw_direction as u64,
        })?;
        if neighbor.in_use && neighbor.target_side as usize >= NUMBER_OF_SIDES {
            return Err(EngineError::InvalidTopology(format!(
                "segment '{name}' side {side} targets side {}",
                neighbor.target_side
            )));
        }
    }
    let border = BorderState::new(neighbors);
    let transfer_size = border.transfer_size();

    let body: Box<dyn Segment> = match SegmentKind::from_record_type(record.record_type) {
        SegmentKind::Input => Box::new(InputSegment::decode_body(id, &mut reader, transfer_size)?),
        SegmentKind::Output => Box::new(OutputSegment::decode_body(id, &mut reader, transfer_size)?),
        SegmentKind::Dynamic => {
            let segment = DynamicSegment::decode_body(id, &mut reader, transfer_size)?;
            segment.validate_border(&border.neighbors)?;
            Box::new(segment)
        }
    };
    Ok(SegmentCell::new(id, name, border, body))
}
