// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Types shared across the cluster layer.
*/

pub mod errors;
pub mod task;
pub mod topology;

pub use errors::{ServiceError, ServiceResult};
pub use task::*;
pub use topology::*;
