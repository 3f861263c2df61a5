// Recursion Registry
//
// A fixed-capacity table mapping a task identity to the number of times that
// task currently holds the lock in one role (reader or writer). Backed by a
// small `Vec` with linear scan rather than a hash map: capacities are tiny
// (often one writer, at most a few dozen readers) so the mutex that guards
// the whole monitor dominates the cost regardless of lookup strategy, and a
// linear scan needs no `Hash` bound on the key.

use crate::diagnostics::{misuse, MisuseKind, Role};

#[derive(Debug, Clone, Copy)]
struct Slot<K> {
    holder: Option<K>,
    count: u32,
}

impl<K> Slot<K> {
    const fn empty() -> Self {
        Self {
            holder: None,
            count: 0,
        }
    }
}

/// Bounded `(task_id, count)` table for one role (reader or writer).
///
/// Invariant: a slot's `count > 0` iff its `holder`
/// currently acquires the lock in this role `count` times; `count == 0`
/// (and `holder == None`) means the slot is free and reusable. The number of
/// non-free slots always equals the role's `active_*` counter maintained by
/// [`crate::state::MonitorState`].
#[derive(Debug)]
pub(crate) struct Registry<K> {
    role: Role,
    slots: Vec<Slot<K>>,
    insert_cursor: usize,
}

impl<K: Copy + PartialEq> Registry<K> {
    pub(crate) fn with_capacity(role: Role, capacity: usize) -> Self {
        Self {
            role,
            slots: vec![Slot::empty(); capacity],
            insert_cursor: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Linear scan for `holder`'s slot. `O(capacity)`, deliberately: see
    /// module docs for why that is the right trade here.
    pub(crate) fn find(&self, holder: K) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.count > 0 && slot.holder == Some(holder))
    }

    /// Claim the next free slot for `holder`, starting the scan at
    /// `insert_cursor` and wrapping. Callers must already have verified
    /// `find(holder)` returned `None` and that capacity is not exceeded;
    /// failing to find a free slot here means `active_*` and the registry
    /// have drifted out of sync, which is a monitor bug, not caller misuse.
    pub(crate) fn insert(&mut self, holder: K) -> usize {
        let capacity = self.slots.len();
        for offset in 0..capacity {
            let index = (self.insert_cursor + offset) % capacity;
            if self.slots[index].count == 0 {
                self.slots[index].holder = Some(holder);
                self.insert_cursor = (index + 1) % capacity;
                return index;
            }
        }
        misuse(MisuseKind::RegistryCapacityExceeded { role: self.role })
    }

    pub(crate) fn increment(&mut self, index: usize) {
        self.slots[index].count += 1;
    }

    pub(crate) fn decrement(&mut self, index: usize) {
        debug_assert!(self.slots[index].count > 0);
        self.slots[index].count -= 1;
    }

    pub(crate) fn is_zero(&self, index: usize) -> bool {
        self.slots[index].count == 0
    }

    /// Free `index`'s slot for reuse. Must only be called once its count
    /// has reached zero.
    pub(crate) fn clear(&mut self, index: usize) {
        debug_assert_eq!(self.slots[index].count, 0);
        self.slots[index].holder = None;
    }

    pub(crate) fn all_zero(&self) -> bool {
        self.slots.iter().all(|slot| slot.count == 0)
    }

    /// Number of slots currently held (non-zero count). Used by debug
    /// assertions to cross-check against the monitor's `active_*` counter.
    pub(crate) fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.count > 0).count()
    }
}
