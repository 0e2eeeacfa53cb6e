//! Owned byte cells and the outbound buffer pool.
//!
//! A [`BufferCell`] is an owned byte region plus the length of its usable
//! prefix. Ownership transfers with the cell: enqueueing one hands it to the
//! consumer, and dropping it releases the storage — back to its pool for
//! rented cells, to the allocator for owned ones. Release-exactly-once is
//! structural, not a convention.
//!
//! Outbound traffic rents cells from a [`BufferPool`]; inbound cells are
//! freshly allocated by the read loop so the decoder never aliases reused
//! storage.

use std::sync::{
    Arc,
    Mutex,
    Weak,
    atomic::{AtomicUsize, Ordering},
};

/// An owned byte region with a usable-prefix length.
///
/// # Examples
///
/// ```
/// use tether::buffer::BufferCell;
///
/// let cell = BufferCell::owned(vec![1, 2, 3]);
/// assert_eq!(cell.bytes(), &[1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct BufferCell {
    data: Vec<u8>,
    len: usize,
    pool: Weak<PoolInner>,
}

impl BufferCell {
    /// Wrap an allocation whose whole extent is usable.
    #[must_use]
    pub fn owned(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data,
            len,
            pool: Weak::new(),
        }
    }

    /// The usable prefix.
    #[must_use]
    pub fn bytes(&self) -> &[u8] { &self.data[..self.len] }

    /// Length of the usable prefix in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.len }

    /// Whether the usable prefix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Total capacity of the underlying region.
    #[must_use]
    pub fn capacity(&self) -> usize { self.data.len() }

    /// The whole region, for filling before [`set_len`](Self::set_len).
    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.data }

    /// Mark the first `len` bytes as usable.
    ///
    /// # Panics
    ///
    /// Panics when `len` exceeds the region's capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.data.len(), "usable length exceeds capacity");
        self.len = len;
    }
}

impl AsRef<[u8]> for BufferCell {
    fn as_ref(&self) -> &[u8] { self.bytes() }
}

impl Drop for BufferCell {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.put_back(std::mem::take(&mut self.data));
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    buffer_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
}

impl PoolInner {
    fn put_back(&self, data: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.free.lock().expect("pool lock poisoned").push(data);
    }
}

/// A pool of equally sized byte regions rented out as [`BufferCell`]s.
///
/// The pool grows on demand and never shrinks; dropping a rented cell
/// returns its storage. [`outstanding`](Self::outstanding) counts cells
/// currently in flight, which the conservation tests use to prove that
/// every enqueued cell is released across success, failure, and shutdown
/// paths.
///
/// # Examples
///
/// ```
/// use tether::buffer::BufferPool;
///
/// let pool = BufferPool::new(1024);
/// let mut cell = pool.rent();
/// cell.as_mut_slice()[..2].copy_from_slice(&[0xC0, 0x00]);
/// cell.set_len(2);
/// assert_eq!(pool.outstanding(), 1);
/// drop(cell);
/// assert_eq!(pool.outstanding(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool handing out regions of `buffer_size` bytes.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_size,
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Rent a cell with zero usable length and full capacity writable.
    #[must_use]
    pub fn rent(&self) -> BufferCell {
        let data = self
            .inner
            .free
            .lock()
            .expect("pool lock poisoned")
            .pop()
            .unwrap_or_else(|| vec![0; self.inner.buffer_size]);
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        BufferCell {
            data,
            len: 0,
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Size of each region handed out by the pool.
    #[must_use]
    pub fn buffer_size(&self) -> usize { self.inner.buffer_size }

    /// Number of rented cells not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize { self.inner.outstanding.load(Ordering::Acquire) }

    /// Number of returned regions waiting to be rented again.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.free.lock().expect("pool lock poisoned").len()
    }
}
