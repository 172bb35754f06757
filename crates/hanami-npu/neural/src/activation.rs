// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Saturating nonlinearity used by output bricks and by synapse signals

/// Logistic function
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of [`sigmoid`] expressed through its output value
#[inline]
pub fn sigmoid_derivative(output: f32) -> f32 {
    output * (1.0 - output)
}
