// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Declarative Hierarchical State Machine
//!
//! The machine is described by a table built with [`StateMachineBuilder`]:
//!
//! - **states** and their **parent** (composite states)
//! - **initial child**: entering a composite state descends into it,
//!   recursively; every composite state must declare one
//! - **transitions** `(state, event) -> target`
//! - **bubbling events**: looked up on the current state first, then on each
//!   ancestor; every other event fires only from the exact current state
//!
//! The active path (root to leaf) is kept as an explicit stack. A failed
//! [`StateMachine::fire`] never changes it.

use crate::error::{Result, StateError};
use ahash::{AHashMap, AHashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use tracing::{trace, warn};

/// Bound shared by state and event types
pub trait MachineSymbol: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> MachineSymbol for T where T: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {}

#[derive(Debug, Clone)]
pub struct StateMachineBuilder<S: MachineSymbol, E: MachineSymbol> {
    states: Vec<S>,
    parents: AHashMap<S, S>,
    initial_children: AHashMap<S, S>,
    transitions: AHashMap<(S, E), S>,
    bubbling: AHashSet<E>,
    initial: Option<S>,
}

impl<S: MachineSymbol, E: MachineSymbol> Default for StateMachineBuilder<S, E> {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            parents: AHashMap::new(),
            initial_children: AHashMap::new(),
            transitions: AHashMap::new(),
            bubbling: AHashSet::new(),
            initial: None,
        }
    }
}

impl<S: MachineSymbol, E: MachineSymbol> StateMachineBuilder<S, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: S) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    /// Declare `child` as a sub-state of `parent`
    pub fn child(mut self, parent: S, child: S) -> Self {
        self = self.state(parent).state(child);
        self.parents.insert(child, parent);
        self
    }

    /// Sub-state entered whenever `parent` is entered
    pub fn initial_child(mut self, parent: S, child: S) -> Self {
        self = self.child(parent, child);
        self.initial_children.insert(parent, child);
        self
    }

    pub fn transition(mut self, from: S, event: E, to: S) -> Self {
        self = self.state(from).state(to);
        self.transitions.insert((from, event), to);
        self
    }

    /// Let `event` fire from descendants of the state that declares it
    pub fn bubbling(mut self, event: E) -> Self {
        self.bubbling.insert(event);
        self
    }

    pub fn initial(mut self, state: S) -> Self {
        self = self.state(state);
        self.initial = Some(state);
        self
    }

    /// Validate the table and create the machine in its initial state
    pub fn build(self) -> Result<StateMachine<S, E>> {
        let initial = self
            .initial
            .ok_or_else(|| StateError::InvalidDefinition("no initial state".to_string()))?;

        for &state in &self.states {
            let mut seen = AHashSet::new();
            let mut cursor = Some(state);
            while let Some(s) = cursor {
                if !seen.insert(s) {
                    return Err(StateError::InvalidDefinition(format!(
                        "parent cycle through '{state}'"
                    )));
                }
                cursor = self.parents.get(&s).copied();
            }
        }

        for (&parent, &child) in &self.initial_children {
            if self.parents.get(&child) != Some(&parent) {
                return Err(StateError::InvalidDefinition(format!(
                    "initial child '{child}' is not a child of '{parent}'"
                )));
            }
        }

        for &state in &self.states {
            let composite = self.parents.values().any(|&parent| parent == state);
            if composite && !self.initial_children.contains_key(&state) {
                return Err(StateError::InvalidDefinition(format!(
                    "composite state '{state}' has no initial child"
                )));
            }
        }

        let mut machine = StateMachine {
            parents: self.parents,
            initial_children: self.initial_children,
            transitions: self.transitions,
            bubbling: self.bubbling,
            stack: Vec::new(),
        };
        machine.stack = machine.entry_path(initial);
        Ok(machine)
    }
}

#[derive(Debug, Clone)]
pub struct StateMachine<S: MachineSymbol, E: MachineSymbol> {
    parents: AHashMap<S, S>,
    initial_children: AHashMap<S, S>,
    transitions: AHashMap<(S, E), S>,
    bubbling: AHashSet<E>,
    /// Active states, root first
    stack: Vec<S>,
}

impl<S: MachineSymbol, E: MachineSymbol> StateMachine<S, E> {
    /// Innermost active state
    pub fn current(&self) -> S {
        // `build` always leaves at least the initial state on the stack
        self.stack[self.stack.len() - 1]
    }

    /// Active path, root first
    pub fn active_path(&self) -> &[S] {
        &self.stack
    }

    /// `state` is the current state or one of its ancestors
    pub fn is_in(&self, state: S) -> bool {
        self.stack.contains(&state)
    }

    pub fn parent_of(&self, state: S) -> Option<S> {
        self.parents.get(&state).copied()
    }

    /// Target state for `event` without firing it
    pub fn target_for(&self, event: E) -> Option<S> {
        let current = self.current();
        if let Some(&to) = self.transitions.get(&(current, event)) {
            return Some(to);
        }
        if !self.bubbling.contains(&event) {
            return None;
        }
        self.stack
            .iter()
            .rev()
            .skip(1)
            .find_map(|&ancestor| self.transitions.get(&(ancestor, event)).copied())
    }

    pub fn can_fire(&self, event: E) -> bool {
        self.target_for(event).is_some()
    }

    /// Fire `event`; returns the new innermost state
    pub fn fire(&mut self, event: E) -> Result<S> {
        let from = self.current();
        let Some(target) = self.target_for(event) else {
            warn!(target: "hanami-state-manager", state = %from, %event, "Invalid transition");
            return Err(StateError::InvalidTransition {
                state: from.to_string(),
                event: event.to_string(),
            });
        };
        self.stack = self.entry_path(target);
        let to = self.current();
        trace!(target: "hanami-state-manager", %from, %event, %to, "Transition");
        Ok(to)
    }

    /// Root-first path to `state`, extended through initial children
    fn entry_path(&self, state: S) -> Vec<S> {
        let mut path = vec![state];
        let mut cursor = state;
        while let Some(&parent) = self.parents.get(&cursor) {
            path.push(parent);
            cursor = parent;
        }
        path.reverse();

        let mut cursor = state;
        while let Some(&child) = self.initial_children.get(&cursor) {
            path.push(child);
            cursor = child;
        }
        path
    }
}
