//! Identifier space shared by entities and factors.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an entity or factor within a world model.
///
/// Ids are lightweight handles: factors reference the entities they
/// constrain by id only, never by pointer, and resolving an id to an actual
/// object is the world model's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(pub u64);

/// Sentinel meaning "no entity" / "unset". Never handed out by an [`IdAllocator`].
pub const INVALID_ID: Id = Id(u64::MAX);

impl Id {
    pub const INVALID: Id = INVALID_ID;

    /// Create a new Id with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn is_valid(self) -> bool {
        self != INVALID_ID
    }
}

impl Default for Id {
    fn default() -> Self {
        INVALID_ID
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#invalid")
        }
    }
}

/// Hands out monotonically increasing ids.
///
/// Allocation only needs `&self`, so one allocator can be shared between
/// threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id.
    ///
    /// Panics once the id space is exhausted rather than wrapping onto
    /// [`INVALID_ID`] or a previously issued id.
    pub fn allocate(&self) -> Id {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(raw < INVALID_ID.0, "identifier space exhausted");
        Id(raw)
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> Id {
        Id(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_id_equality_and_ordering() {
        let id1 = Id::new(42);
        let id2 = Id::new(42);
        let id3 = Id::new(43);

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert!(id1 < id3);
        assert!(id3 < INVALID_ID);
    }

    #[test]
    fn test_invalid_id_display_and_default() {
        assert_eq!(format!("{}", Id::new(7)), "#7");
        assert_eq!(format!("{}", INVALID_ID), "#invalid");
        assert_eq!(Id::default(), Id::INVALID);
        assert!(!Id::default().is_valid());
    }

    #[test]
    fn test_allocator_is_sequential() {
        let alloc = IdAllocator::starting_at(5);

        assert_eq!(alloc.peek(), Id::new(5));
        assert_eq!(alloc.allocate(), Id::new(5));
        assert_eq!(alloc.allocate(), Id::new(6));
        assert_eq!(alloc.peek(), Id::new(7));
    }

    #[test]
    #[should_panic(expected = "identifier space exhausted")]
    fn test_allocator_never_yields_invalid() {
        let alloc = IdAllocator::starting_at(u64::MAX - 1);
        let last = alloc.allocate();
        assert!(last.is_valid());
        alloc.allocate();
    }

    #[test]
    fn test_allocator_unique_across_threads() {
        let alloc = Arc::new(IdAllocator::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                thread::spawn(move || (0..250).map(|_| alloc.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
