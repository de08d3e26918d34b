//! Free list of reusable [`Context`] objects.
//!
//! Acquire and release lock briefly; between the two, a context belongs to
//! exactly one request task. Contexts are rebound by the engine after
//! acquisition, never here.

use std::sync::{Mutex, PoisonError};

use crate::context::Context;

pub(crate) const DEFAULT_MAX_IDLE: usize = 1024;

pub(crate) struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
    max_idle: usize,
}

impl ContextPool {
    pub(crate) fn new(max_idle: usize) -> Self {
        Self { free: Mutex::new(Vec::new()), max_idle }
    }

    pub(crate) fn set_max_idle(&mut self, max_idle: usize) {
        self.max_idle = max_idle;
    }

    /// Pops an idle context, or allocates one when the list is empty.
    pub(crate) fn acquire(&self) -> Box<Context> {
        let idle = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        idle.unwrap_or_default()
    }

    /// Returns a context to the list. Dropped instead once `max_idle` are idle.
    pub(crate) fn release(&self, c: Box<Context>) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(c);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_contexts() {
        let pool = ContextPool::new(4);
        let mut c = pool.acquire();
        c.set("marker", 1_u8);
        let addr = &*c as *const Context;
        pool.release(c);
        assert_eq!(pool.idle(), 1);

        let c = pool.acquire();
        assert_eq!(&*c as *const Context, addr);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn caps_idle_contexts() {
        let pool = ContextPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = std::sync::Arc::new(ContextPool::new(64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = std::sync::Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let c = pool.acquire();
                        pool.release(c);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
