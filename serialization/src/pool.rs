//! Object pooling with scoped checkout.
//!
//! A [`Pool<T>`] keeps released values around so their allocations (e.g.
//! `Vec` capacity) are reused by the next checkout. [`Pool::checkout`]
//! hands out a [`PoolGuard`] that resets the value and returns it to the
//! pool when dropped, on every exit path.
//!
//! # Example
//!
//! ```
//! use redlilium_serialization::pool::{Pool, Poolable};
//!
//! #[derive(Debug, Default)]
//! struct Buffer {
//!     data: Vec<u8>,
//! }
//!
//! impl Poolable for Buffer {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.data.clear();
//!     }
//! }
//!
//! let pool = Pool::<Buffer>::new();
//! {
//!     let mut buf = pool.checkout();
//!     buf.data.extend_from_slice(&[1, 2, 3]);
//! } // returned here, cleared but with capacity kept
//!
//! assert_eq!(pool.available(), 1);
//! let buf = pool.checkout();
//! assert!(buf.data.is_empty());
//! assert!(buf.data.capacity() >= 3);
//! ```

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Trait for types that can be pooled and reused.
pub trait Poolable {
    /// Create a new empty instance for pool initialization.
    fn new_empty() -> Self;

    /// Reset the value to an empty state, preserving allocated capacity.
    fn reset(&mut self);
}

/// A free list of reusable values.
pub struct Pool<T: Poolable> {
    free: Mutex<Vec<T>>,
    max_retained: usize,
}

impl<T: Poolable> Pool<T> {
    /// Default upper bound on values kept for reuse.
    pub const DEFAULT_MAX_RETAINED: usize = 8;

    pub fn new() -> Self {
        Self::with_max_retained(Self::DEFAULT_MAX_RETAINED)
    }

    /// Create a pool that keeps at most `max_retained` released values.
    pub fn with_max_retained(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_retained,
        }
    }

    /// Take a value out of the pool, creating one if the pool is empty.
    pub fn checkout(&self) -> PoolGuard<'_, T> {
        let value = self.free.lock().pop().unwrap_or_else(T::new_empty);
        PoolGuard {
            pool: self,
            value: Some(value),
        }
    }

    /// Number of values currently waiting for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    fn put(&self, mut value: T) {
        value.reset();
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(value);
        }
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A value checked out of a [`Pool`]. Returned to the pool on drop.
pub struct PoolGuard<'p, T: Poolable> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Poolable> Deref for PoolGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(v) => v,
            None => unreachable!("pool guard accessed after release"),
        }
    }
}

impl<T: Poolable> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(v) => v,
            None => unreachable!("pool guard accessed after release"),
        }
    }
}

impl<T: Poolable> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}
