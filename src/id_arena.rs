pub trait IdGenerator {
    type Id;

    /// Acquires a new id
    fn acquire(&mut self) -> Option<Self::Id>;

    /// Releases the specified Id
    fn release(&mut self, id: Self::Id);

    /// Returns the number of Ids allocated
    fn len(&self) -> usize;
}

pub trait IdArena: IdGenerator {
    /// Returns the maximum capacity of the arena
    fn capacity(&self) -> usize;
}

/// Hands out `usize` ids up to a fixed capacity, recycling released ids first.
pub struct SimpleIdArena {
    counter: usize,
    free: Vec<usize>,
    capacity: usize,
}

impl SimpleIdArena {
    pub fn with_capacity(capacity: usize) -> SimpleIdArena {
        SimpleIdArena {
            counter: 0,
            free: Vec::new(),
            capacity,
        }
    }
}

impl IdGenerator for SimpleIdArena {
    type Id = usize;

    fn acquire(&mut self) -> Option<Self::Id> {
        self.free.pop().or_else(|| {
            if self.counter >= self.capacity {
                None
            } else {
                self.counter += 1;
                Some(self.counter - 1)
            }
        })
    }

    fn release(&mut self, id: Self::Id) {
        debug_assert!(id < self.counter && !self.free.contains(&id));
        self.free.push(id);
    }

    fn len(&self) -> usize {
        self.counter - self.free.len()
    }
}

impl IdArena for SimpleIdArena {
    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Slot storage addressed by integer handles. Removed slots are reused by later inserts.
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    ids: SimpleIdArena,
}

impl<T> Arena<T> {
    pub fn new() -> Arena<T> {
        Arena {
            slots: Vec::new(),
            ids: SimpleIdArena::with_capacity(usize::MAX),
        }
    }

    pub fn insert(&mut self, value: T) -> usize {
        // Capacity is unbounded so acquire always yields an id
        let id = self.ids.acquire().unwrap_or(self.slots.len());
        if id == self.slots.len() {
            self.slots.push(Some(value));
        } else {
            self.slots[id] = Some(value);
        }
        id
    }

    pub fn remove(&mut self, id: usize) -> Option<T> {
        let value = self.slots.get_mut(id).and_then(Option::take);
        if value.is_some() {
            self.ids.release(id);
        }
        value
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_arena_respects_capacity() {
        let mut arena = SimpleIdArena::with_capacity(2);
        assert_eq!(arena.acquire(), Some(0));
        assert_eq!(arena.acquire(), Some(1));
        assert_eq!(arena.acquire(), None);
        assert_eq!(arena.len(), 2);

        arena.release(0);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.acquire(), Some(0));
        assert_eq!(arena.capacity(), 2);
    }

    #[test]
    fn arena_reuses_removed_slots() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_ne!(a, b);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);

        let c = arena.insert("c");
        assert_eq!(c, a);
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.len(), 2);
    }
}
