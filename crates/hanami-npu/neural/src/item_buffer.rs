// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Item Buffer
//!
//! Growable, block-allocated arena with stable slot ids.
//!
//! - Slots are allocated in blocks of `block_size` up to `max_items`
//! - Deleting a slot only marks it free; no other slot ever moves
//! - A new block hands out its slots lowest-id-first; freed slots go on top
//!   of the free list and are reused most-recently-freed first. Allocation
//!   order is deterministic for a given sequence of operations
//!
//! When the buffer is full, [`ItemBuffer::add_new_item`] returns `None` and
//! callers degrade instead of failing.

use std::vec::Vec;

/// Block-allocated arena with a free list
#[derive(Debug, Clone)]
pub struct ItemBuffer<T> {
    items: Vec<T>,
    active: Vec<bool>,
    free_slots: Vec<u32>,
    block_size: usize,
    max_items: usize,
    active_count: usize,
}

impl<T: Default + Clone> ItemBuffer<T> {
    /// Create an empty buffer; nothing is allocated until the first insert
    pub fn new(block_size: usize, max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            active: Vec::new(),
            free_slots: Vec::new(),
            block_size: block_size.max(1),
            max_items,
            active_count: 0,
        }
    }

    /// Store `item` in a free slot, growing by one block if needed.
    ///
    /// Returns `None` when `max_items` slots are already in use.
    pub fn add_new_item(&mut self, item: T) -> Option<u32> {
        if self.free_slots.is_empty() && !self.grow() {
            return None;
        }
        let id = self.free_slots.pop()?;
        let idx = id as usize;
        self.items[idx] = item;
        self.active[idx] = true;
        self.active_count += 1;
        Some(id)
    }

    /// Mark a slot free. Returns `false` for unknown or already free slots.
    pub fn delete_item(&mut self, id: u32) -> bool {
        let idx = id as usize;
        match self.active.get(idx) {
            Some(true) => {
                self.active[idx] = false;
                self.items[idx] = T::default();
                self.free_slots.push(id);
                self.active_count -= 1;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&T> {
        let idx = id as usize;
        if self.active.get(idx).copied().unwrap_or(false) {
            self.items.get(idx)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        let idx = id as usize;
        if self.active.get(idx).copied().unwrap_or(false) {
            self.items.get_mut(idx)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_active(&self, id: u32) -> bool {
        self.active.get(id as usize).copied().unwrap_or(false)
    }

    /// Number of slots currently holding an item
    pub fn number_of_items(&self) -> usize {
        self.active_count
    }

    /// Number of allocated slots (active + free)
    pub fn allocated(&self) -> usize {
        self.items.len()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// True when no further item can be stored
    pub fn is_full(&self) -> bool {
        self.free_slots.is_empty() && self.items.len() >= self.max_items
    }

    /// Iterate over active slots in id order
    pub fn iter_active(&self) -> impl Iterator<Item = (u32, &T)> {
        self.items
            .iter()
            .zip(self.active.iter())
            .enumerate()
            .filter(|(_, (_, active))| **active)
            .map(|(idx, (item, _))| (idx as u32, item))
    }

    /// Rebuild a buffer from persisted slots (`None` = free slot)
    pub fn from_slots(block_size: usize, max_items: usize, slots: Vec<Option<T>>) -> Self {
        let mut buffer = Self::new(block_size, max_items.max(slots.len()));
        buffer.items.reserve(slots.len());
        for slot in slots {
            match slot {
                Some(item) => {
                    buffer.items.push(item);
                    buffer.active.push(true);
                    buffer.active_count += 1;
                }
                None => {
                    buffer.items.push(T::default());
                    buffer.active.push(false);
                }
            }
        }
        buffer.free_slots = (0..buffer.items.len() as u32)
            .rev()
            .filter(|id| !buffer.active[*id as usize])
            .collect();
        buffer
    }

    /// Snapshot of all allocated slots (`None` = free slot)
    pub fn slots(&self) -> impl Iterator<Item = Option<&T>> {
        self.items
            .iter()
            .zip(self.active.iter())
            .map(|(item, active)| if *active { Some(item) } else { None })
    }

    fn grow(&mut self) -> bool {
        let current = self.items.len();
        if current >= self.max_items {
            return false;
        }
        let new_len = (current + self.block_size).min(self.max_items);
        self.items.resize(new_len, T::default());
        self.active.resize(new_len, false);
        // Highest id first so that `pop` hands out the lowest id
        self.free_slots
            .extend((current as u32..new_len as u32).rev());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_lowest_id_first() {
        let mut buffer: ItemBuffer<u64> = ItemBuffer::new(4, 16);
        assert_eq!(buffer.add_new_item(10), Some(0));
        assert_eq!(buffer.add_new_item(11), Some(1));
        assert_eq!(buffer.allocated(), 4);
        assert_eq!(buffer.number_of_items(), 2);
    }

    #[test]
    fn test_delete_and_reuse_without_moving_others() {
        let mut buffer: ItemBuffer<u64> = ItemBuffer::new(4, 16);
        let a = buffer.add_new_item(1).unwrap();
        let b = buffer.add_new_item(2).unwrap();
        let c = buffer.add_new_item(3).unwrap();

        assert!(buffer.delete_item(b));
        assert!(!buffer.delete_item(b));
        assert_eq!(buffer.get(b), None);
        assert_eq!(buffer.get(a), Some(&1));
        assert_eq!(buffer.get(c), Some(&3));

        let reused = buffer.add_new_item(4).unwrap();
        assert_eq!(reused, b);
        assert_eq!(buffer.get(reused), Some(&4));
    }

    #[test]
    fn test_freed_slots_reused_most_recent_first() {
        let mut buffer: ItemBuffer<u64> = ItemBuffer::new(8, 16);
        for v in 0..4 {
            buffer.add_new_item(v);
        }
        buffer.delete_item(0);
        buffer.delete_item(2);

        assert_eq!(buffer.add_new_item(20), Some(2));
        assert_eq!(buffer.add_new_item(21), Some(0));
        assert_eq!(buffer.add_new_item(22), Some(4));
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut buffer: ItemBuffer<u8> = ItemBuffer::new(2, 3);
        assert!(buffer.add_new_item(1).is_some());
        assert!(buffer.add_new_item(2).is_some());
        assert!(buffer.add_new_item(3).is_some());
        assert!(buffer.is_full());
        assert_eq!(buffer.add_new_item(4), None);
        assert_eq!(buffer.allocated(), 3);
    }

    #[test]
    fn test_slots_round_trip() {
        let mut buffer: ItemBuffer<u32> = ItemBuffer::new(4, 8);
        for v in 0..4 {
            buffer.add_new_item(v * 10);
        }
        buffer.delete_item(1);

        let slots: Vec<Option<u32>> = buffer.slots().map(|s| s.copied()).collect();
        let restored = ItemBuffer::from_slots(4, 8, slots);

        assert_eq!(restored.number_of_items(), 3);
        assert_eq!(restored.get(2), Some(&20));
        assert!(!restored.is_active(1));
        let mut restored = restored;
        assert_eq!(restored.add_new_item(99), Some(1));
    }

    #[test]
    fn test_iter_active_skips_free_slots() {
        let mut buffer: ItemBuffer<u32> = ItemBuffer::new(8, 8);
        for v in 0..5 {
            buffer.add_new_item(v);
        }
        buffer.delete_item(0);
        buffer.delete_item(3);
        let ids: Vec<u32> = buffer.iter_active().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }
}
