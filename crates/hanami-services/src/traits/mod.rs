// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Collaborator boundaries of a cluster.

Persistence, metadata and streaming live outside the core; a cluster only
talks to them through these traits.
*/

pub mod metadata_store;
pub mod snapshot_store;
pub mod stream_session;

pub use metadata_store::*;
pub use snapshot_store::*;
pub use stream_session::*;
