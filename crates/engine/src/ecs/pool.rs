use thiserror::Error;

/// A value that can be handed out again after being returned to a [`Pool`].
///
/// `reset` must bring the value back to the state of a freshly constructed one. The pool
/// calls it on every release; callers never have to remember to.
pub trait Poolable: Default {
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool exhausted: all {capacity} slots are checked out")]
    Exhausted { capacity: usize },
    #[error("stale pool handle: slot {index} generation {generation} is no longer checked out")]
    StaleHandle { index: u32, generation: u32 },
}

#[derive(Debug)]
struct PoolSlot<T> {
    value: T,
    generation: u32,
    checked_out: bool,
}

/// Fixed-capacity arena. Slots are allocated lazily up to `capacity`; released slots are
/// reused most-recently-released first.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    slots: Vec<PoolSlot<T>>,
    free: Vec<u32>,
    capacity: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn checked_out_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.checked_out).count()
    }

    pub fn checkout(&mut self) -> Result<PoolHandle, PoolError> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.checked_out = true;
            return Ok(PoolHandle {
                index,
                generation: slot.generation,
            });
        }
        if self.slots.len() >= self.capacity {
            return Err(PoolError::Exhausted {
                capacity: self.capacity,
            });
        }
        let index = self.slots.len() as u32;
        self.slots.push(PoolSlot {
            value: T::default(),
            generation: 0,
            checked_out: true,
        });
        Ok(PoolHandle {
            index,
            generation: 0,
        })
    }

    /// Returns the value behind `handle` to the pool. The value is reset before the slot
    /// becomes available again and the generation bump invalidates every copy of `handle`.
    pub fn release(&mut self, handle: PoolHandle) -> Result<(), PoolError> {
        let slot = self
            .slot_mut(handle)
            .ok_or(PoolError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            })?;
        slot.value.reset();
        slot.checked_out = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(())
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.checked_out && slot.generation == handle.generation)
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slot_mut(handle).map(|slot| &mut slot.value)
    }

    fn slot_mut(&mut self, handle: PoolHandle) -> Option<&mut PoolSlot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.checked_out && slot.generation == handle.generation)
    }
}
