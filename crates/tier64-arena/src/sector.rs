//! A single operator's slab pool: a dense `Vec` of slots plus a LIFO free
//! list, so released slots are reused before the backing vector grows.

use thiserror::Error;

struct Slot<T> {
    value: Option<T>,
    ref_count: u32,
}

/// One operator code's slab allocator.
pub struct Sector<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    page_size: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectorError {
    #[error("slot index {0} out of range")]
    OutOfRange(usize),
    #[error("slot index {0} is not occupied")]
    NotOccupied(usize),
}

impl<T> Sector<T> {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Allocate one slot holding `value`, with an initial reference count of
    /// one. Reuses a freed slot from the free list (LIFO) before growing.
    pub fn alloc(&mut self, value: T) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Slot { value: Some(value), ref_count: 1 };
            idx
        } else {
            self.reserve_for(1);
            self.slots.push(Slot { value: Some(value), ref_count: 1 });
            self.slots.len() - 1
        }
    }

    /// Allocate a whole batch of values as an all-or-nothing operation: the
    /// backing storage is reserved up front for the full batch before any
    /// slot is written, so a batch either fully succeeds or (on allocator
    /// failure, which in safe Rust only means an allocation panic) leaves no
    /// partially-applied state for the caller to have to unwind.
    pub fn alloc_batch(&mut self, values: Vec<T>) -> Vec<usize> {
        let needed = values.len();
        self.reserve_for(needed);
        let mut out = Vec::with_capacity(needed);
        for value in values {
            out.push(self.alloc(value));
        }
        out
    }

    /// Growth policy: reserve `max(existing spare capacity, page_size)` when
    /// the batch fits within one page, or `needed + page_size` when the
    /// batch itself is larger than a page — so a single oversized batch
    /// still leaves room for the next page-sized allocation after it.
    fn reserve_for(&mut self, needed: usize) {
        let spare = self.slots.capacity() - self.slots.len();
        if spare >= needed {
            return;
        }
        let shortfall = needed - spare;
        let growth = if needed > self.page_size {
            needed + self.page_size
        } else {
            self.page_size.max(shortfall)
        };
        self.slots.reserve(growth);
    }

    /// Reserve capacity for `additional` more occupied slots without
    /// allocating any of them yet — the first half of the batch-reservation
    /// protocol when a caller wants to compute ids for an entire batch
    /// before deciding how many are genuinely new (see
    /// `tier64-kernel::UniverseState::intern_batch`).
    pub fn reserve(&mut self, additional: usize) {
        self.reserve_for(additional);
    }

    pub fn retain(&mut self, idx: usize) -> Result<(), SectorError> {
        let slot = self.slots.get_mut(idx).ok_or(SectorError::OutOfRange(idx))?;
        if slot.value.is_none() {
            return Err(SectorError::NotOccupied(idx));
        }
        slot.ref_count += 1;
        Ok(())
    }

    /// Decrement the slot's reference count. Returns the freed value once
    /// the count reaches zero, `None` if other owners remain.
    pub fn release(&mut self, idx: usize) -> Result<Option<T>, SectorError> {
        let slot = self.slots.get_mut(idx).ok_or(SectorError::OutOfRange(idx))?;
        if slot.value.is_none() {
            return Err(SectorError::NotOccupied(idx));
        }
        slot.ref_count -= 1;
        if slot.ref_count == 0 {
            let value = slot.value.take();
            self.free_list.push(idx);
            Ok(value)
        } else {
            Ok(None)
        }
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).and_then(|s| s.value.as_ref())
    }

    #[must_use]
    pub fn ref_count(&self, idx: usize) -> Option<u32> {
        self.slots.get(idx).filter(|s| s.value.is_some()).map(|s| s.ref_count)
    }
}
