// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Direct-mode frames: packed little-endian `f32` values

use crate::types::{ServiceError, ServiceResult};
use hanami_serialization::{ByteReader, ByteWriter};

const VALUE_SIZE: usize = std::mem::size_of::<f32>();

pub fn decode_frame(bytes: &[u8]) -> ServiceResult<Vec<f32>> {
    if bytes.len() % VALUE_SIZE != 0 {
        return Err(ServiceError::InvalidInput(format!(
            "direct frame of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    let mut reader = ByteReader::new(bytes);
    let mut values = Vec::with_capacity(bytes.len() / VALUE_SIZE);
    while !reader.is_exhausted() {
        values.push(reader.read_f32()?);
    }
    Ok(values)
}

pub fn encode_frame(values: &[f32]) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(values.len() * VALUE_SIZE);
    for value in values {
        writer.write_f32(*value);
    }
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let bytes = encode_frame(&[1.0, -0.5]);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_frame(&bytes).unwrap(), vec![1.0, -0.5]);
        assert!(decode_frame(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_ragged_frame_rejected() {
        assert!(matches!(decode_frame(&[0, 0, 0]), Err(ServiceError::InvalidInput(_))));
    }
}
