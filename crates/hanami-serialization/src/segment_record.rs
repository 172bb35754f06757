// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::SerializationError;
use std::fmt::{Display, Formatter};

/// `type: u8` + `byte_size: u64`
pub const RECORD_PREFIX_SIZE: usize = 9;

/// Kind of segment stored in a snapshot record.
///
/// The discriminant is the first byte of each record.
#[repr(u8)]
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum SegmentRecordType {
    Input = 0u8,
    Output = 1u8,
    Dynamic = 2u8,
}

impl TryFrom<u8> for SegmentRecordType {
    type Error = SerializationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SegmentRecordType::Input),
            1 => Ok(SegmentRecordType::Output),
            2 => Ok(SegmentRecordType::Dynamic),
            _ => Err(SerializationError::UnknownRecordType(value)),
        }
    }
}

impl Display for SegmentRecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentRecordType::Input => write!(f, "input"),
            SegmentRecordType::Output => write!(f, "output"),
            SegmentRecordType::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// One segment's raw bytes inside a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub record_type: SegmentRecordType,
    pub bytes: Vec<u8>,
}

impl SegmentRecord {
    pub fn new(record_type: SegmentRecordType, bytes: Vec<u8>) -> Self {
        Self { record_type, bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(SegmentRecordType::Dynamic as u8, 2);
        assert_eq!(SegmentRecordType::try_from(1), Ok(SegmentRecordType::Output));
        assert_eq!(
            SegmentRecordType::try_from(200),
            Err(SerializationError::UnknownRecordType(200))
        );
    }
}
