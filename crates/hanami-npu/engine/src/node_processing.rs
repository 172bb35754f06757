// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-node potential updates shared by all processing backends.

use hanami_npu_neural::{Node, SegmentSettings};

/// Consume the accumulated input of a normal-brick node.
///
/// Returns whether the node is active this cycle.
#[inline]
pub fn update_node_potential(node: &mut Node, settings: &SegmentSettings) -> bool {
    node.potential = settings.potential_overflow * node.input;
    node.input = 0.0;
    node.delta = 0.0;

    if node.refraction_time > 0 {
        node.refraction_time -= 1;
        node.active = false;
        return false;
    }

    node.active = node.potential > node.border;
    if node.active {
        node.refraction_time = settings.refraction_time;
    }
    node.active
}

/// Apply an externally supplied value to an input-brick node.
///
/// The border of the node is derived once, from the first nonzero value.
#[inline]
pub fn apply_input_value(node: &mut Node, value: f32, settings: &SegmentSettings) -> bool {
    node.potential = settings.potential_overflow * value;
    node.input = 0.0;
    node.delta = 0.0;
    if !node.border_initialized && value != 0.0 {
        node.border = value.abs() * settings.input_border_factor;
        node.border_initialized = true;
    }
    node.active = node.potential > node.border;
    node.active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_potential_consumes_input() {
        let settings = SegmentSettings::default();
        let mut node = Node::new(0.5);
        node.input = 0.8;
        assert!(update_node_potential(&mut node, &settings));
        assert_eq!(node.input, 0.0);
        assert_eq!(node.potential, 0.8);

        node.input = 0.2;
        assert!(!update_node_potential(&mut node, &settings));
    }

    #[test]
    fn test_refraction_suppresses_activity() {
        let settings = SegmentSettings {
            refraction_time: 2,
            ..Default::default()
        };
        let mut node = Node::new(0.0);
        node.input = 1.0;
        assert!(update_node_potential(&mut node, &settings));
        node.input = 1.0;
        assert!(!update_node_potential(&mut node, &settings));
        node.input = 1.0;
        assert!(!update_node_potential(&mut node, &settings));
        node.input = 1.0;
        assert!(update_node_potential(&mut node, &settings));
    }

    #[test]
    fn test_input_border_initialized_once() {
        let settings = SegmentSettings {
            input_border_factor: 0.5,
            ..Default::default()
        };
        let mut node = Node::new(0.0);
        apply_input_value(&mut node, 0.0, &settings);
        assert!(!node.border_initialized);

        assert!(!apply_input_value(&mut node, -0.8, &settings));
        assert!(node.border_initialized);
        assert!((node.border - 0.4).abs() < 1e-6);

        apply_input_value(&mut node, 2.0, &settings);
        assert!((node.border - 0.4).abs() < 1e-6);
        assert!(node.active);
    }
}
