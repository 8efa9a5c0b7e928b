//! Free-list pool for rule sets and selectors

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Values that can be reset and handed out again
pub trait Reusable: Default {
    /// Resets every field to its zero value
    fn clear(&mut self);
}

/// Bounded free list of cleared values
///
/// `release` clears a value before storing it, so `acquire` always returns an
/// instance equal to `T::default()`.
#[derive(Debug)]
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Reusable> Pool<T> {
    /// Creates an empty pool that keeps at most `capacity` idle values
    pub const fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes an idle value, or creates a new one when the pool is empty
    pub fn acquire(&self) -> T {
        self.lock().pop().unwrap_or_default()
    }

    /// Clears `item` and returns it to the pool
    pub fn release(&self, mut item: T) {
        // Clearing may release nested values into other pools; do it unlocked.
        item.clear();

        let mut free = self.lock();
        if free.len() < self.capacity {
            free.push(item);
        }
    }

    /// Number of idle values
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        hits: u32,
        tags: Vec<String>,
    }

    impl Reusable for Counter {
        fn clear(&mut self) {
            self.hits = 0;
            self.tags.clear();
        }
    }

    #[test]
    fn test_acquire_from_empty_pool() {
        let pool: Pool<Counter> = Pool::new(4);
        assert_eq!(pool.acquire(), Counter::default());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_release_clears_before_reuse() {
        let pool: Pool<Counter> = Pool::new(4);
        let mut counter = pool.acquire();
        counter.hits = 9;
        counter.tags.push("x".to_string());

        pool.release(counter);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.acquire(), Counter::default());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let pool: Pool<Counter> = Pool::new(1);
        pool.release(Counter::default());
        pool.release(Counter::default());
        assert_eq!(pool.idle(), 1);
    }
}
