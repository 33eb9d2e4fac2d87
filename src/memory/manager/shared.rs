/*!
 * Shared Heap Handle
 *
 * Cloneable handle for a heap used from both the main context and deferred
 * callbacks. Every operation, diagnostics included, runs under one lock, so a
 * snapshot never observes a half-applied allocation.
 *
 * The `try_*` variants never wait: contention surfaces as
 * [`HeapError::HeapLocked`], the same error a held heap lock produces.
 */

use super::TieredHeap;
use crate::core::errors::{HeapError, HeapResult};
use crate::core::types::{Address, AllocFlags, Size};
use crate::memory::traits::{HeapInfo, InternalTier};
use crate::memory::types::HeapSnapshot;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

pub struct SharedHeap<I: InternalTier> {
    inner: Arc<Mutex<TieredHeap<I>>>,
}

impl<I: InternalTier> SharedHeap<I> {
    pub fn new(heap: TieredHeap<I>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(heap)),
        }
    }

    /// Run `f` with exclusive access, batching several operations under one lock
    pub fn with<R>(&self, f: impl FnOnce(&mut TieredHeap<I>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    fn try_guard(&self) -> HeapResult<MutexGuard<'_, TieredHeap<I>>> {
        self.inner.try_lock().ok_or(HeapError::HeapLocked)
    }

    pub fn allocate(&self, n_bytes: Size, flags: AllocFlags) -> HeapResult<Address> {
        self.inner.lock().allocate(n_bytes, flags)
    }

    pub fn free(&self, address: Address) -> HeapResult<()> {
        self.inner.lock().free(address)
    }

    pub fn realloc(&self, address: Address, new_size: Size, allow_move: bool) -> HeapResult<Address> {
        self.inner.lock().realloc(address, new_size, allow_move)
    }

    /// Allocate without waiting for the lock
    pub fn try_allocate(&self, n_bytes: Size, flags: AllocFlags) -> HeapResult<Address> {
        self.try_guard()?.allocate(n_bytes, flags)
    }

    /// Free without waiting for the lock
    pub fn try_free(&self, address: Address) -> HeapResult<()> {
        self.try_guard()?.free(address)
    }

    pub fn lock_heap(&self) {
        self.inner.lock().lock();
    }

    pub fn unlock_heap(&self) {
        self.inner.lock().unlock();
    }

    pub fn validate(&self) -> HeapResult<()> {
        self.inner.lock().validate()
    }

    pub fn read_bytes(&self, address: Address, size: Size) -> HeapResult<Vec<u8>> {
        self.inner.lock().read_bytes(address, size)
    }

    pub fn write_bytes(&self, address: Address, data: &[u8]) -> HeapResult<()> {
        self.inner.lock().write_bytes(address, data)
    }

    pub fn free_bytes(&self) -> Size {
        self.inner.lock().free_bytes()
    }
}

impl<I: InternalTier> HeapInfo for SharedHeap<I> {
    fn snapshot(&self) -> HeapSnapshot {
        self.inner.lock().snapshot()
    }
}

impl<I: InternalTier> Clone for SharedHeap<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
