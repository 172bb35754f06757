// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializationError {
    #[error("Unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEnd {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid magic bytes in cluster header")]
    InvalidMagic,

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("Unknown segment record type {0}")]
    UnknownRecordType(u8),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: u64 },

    #[error("Decode failed: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SerializationError>;
