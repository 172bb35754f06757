// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Implementations of the collaborator traits.
*/

pub mod channel_stream_session;
pub mod file_snapshot_store;
pub mod memory_metadata_store;
pub mod memory_snapshot_store;

pub use channel_stream_session::*;
pub use file_snapshot_store::*;
pub use memory_metadata_store::*;
pub use memory_snapshot_store::*;
