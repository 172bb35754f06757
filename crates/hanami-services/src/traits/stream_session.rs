// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byte channel bound to one cluster in direct mode

use crate::types::ServiceResult;

pub trait StreamSession: Send + Sync {
    /// Send one outbound frame
    fn send_stream_message(&self, bytes: &[u8]) -> ServiceResult<()>;

    /// Next inbound frame, if one is waiting
    fn try_receive(&self) -> Option<Vec<u8>>;
}
