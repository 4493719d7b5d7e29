//! Reusable byte buffers.
//!
//! # Responsibilities
//! - Hand out byte buffers exclusively to one request at a time
//! - Clear every buffer before it becomes visible to another request
//! - Keep the idle set bounded in both count and per-buffer capacity
//!
//! A checked-out buffer is a [`PooledBuffer`] guard; dropping it (on success,
//! error, or cancellation of the owning future) returns the buffer.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use crate::config::BufferConfig;
use crate::observability::metrics;

/// Initial capacity of a response scratch buffer.
const SCRATCH_CAPACITY: usize = 512;
/// Scratch buffers that grew past this are shrunk before reuse.
const SCRATCH_MAX_RETAINED: usize = 64 * 1024;

/// A checkout/return registry of `Vec<u8>` buffers.
#[derive(Debug)]
pub struct BufferPool {
    name: &'static str,
    idle: Mutex<Vec<Vec<u8>>>,
    initial_capacity: usize,
    max_retained_capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Create an empty pool. Buffers are allocated lazily on first checkout.
    pub fn new(
        name: &'static str,
        initial_capacity: usize,
        max_retained_capacity: usize,
        max_idle: usize,
    ) -> Self {
        Self {
            name,
            idle: Mutex::new(Vec::new()),
            initial_capacity,
            max_retained_capacity: max_retained_capacity.max(initial_capacity),
            max_idle,
        }
    }

    /// Borrow an empty buffer. It goes back to the pool when the guard drops.
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        metrics::record_buffer_checkout(self.name, reused.is_some());

        let buf = reused.unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));
        debug_assert!(buf.is_empty());

        PooledBuffer { pool: self, buf }
    }

    /// Number of buffers currently waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.max_retained_capacity {
            buf.shrink_to(self.max_retained_capacity);
        }

        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

/// The two pools used by the scan pipeline.
#[derive(Debug)]
pub struct BufferPools {
    /// Holds uploaded content while it is fed to the engine.
    pub content: BufferPool,
    /// Scratch space for building response bodies.
    pub scratch: BufferPool,
}

impl BufferPools {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            content: BufferPool::new(
                "content",
                config.content_capacity,
                config.max_retained_capacity,
                config.max_pooled,
            ),
            scratch: BufferPool::new(
                "scratch",
                SCRATCH_CAPACITY,
                SCRATCH_MAX_RETAINED,
                config.max_pooled,
            ),
        }
    }
}
