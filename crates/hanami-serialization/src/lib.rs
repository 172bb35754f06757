// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Hanami Serialization
//!
//! Explicit little-endian encode/decode of the cluster snapshot blob:
//!
//! ```text
//! +----------------------+--------------------------------------------------+
//! | ClusterHeader (256B) | record | record | ... (declaration order)         |
//! +----------------------+--------------------------------------------------+
//! record = type: u8 | byte_size: u64 LE | raw bytes (byte_size)
//! ```
//!
//! Records with an unknown type are skipped using their declared size, so a
//! newer writer never breaks an older reader. A truncated record ends the scan.

pub mod byte_codec;
pub mod cluster_header;
pub mod error;
pub mod segment_record;
pub mod snapshot;

pub use byte_codec::{ByteReader, ByteWriter};
pub use cluster_header::{ClusterHeader, CLUSTER_HEADER_SIZE, CLUSTER_MAGIC, CLUSTER_NAME_SIZE, SNAPSHOT_VERSION};
pub use error::{Result, SerializationError};
pub use segment_record::{SegmentRecord, SegmentRecordType, RECORD_PREFIX_SIZE};
pub use snapshot::{decode_snapshot, encode_snapshot, DecodedSnapshot};
