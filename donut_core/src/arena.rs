//! Slab arena backing all transient buffers of a command invocation.
//!
//! Every buffer used during a check-in (hash scratch space, dedup index
//! pages) comes from one [`Arena`] created at the start of the command and
//! dropped at the end, so a run can never leak piecemeal allocations.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;

/// Size every slab request is rounded up to.
pub const PAGE_SIZE: usize = 4096;

/// Alignment guaranteed for every slab's base address.
pub const CACHE_LINE: usize = 64;

/// Number of bookkeeping slots added at each table expansion.
const SLAB_GROWTH: usize = 10;

/// Stable identifier of a slab issued by an [`Arena`].
///
/// Handles stay valid across later acquisitions and releases of other
/// slabs; a released handle simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlabHandle(u64);

/// A single zeroed, cache-line-aligned allocation.
pub struct Slab {
    ptr: NonNull<u8>,
    size: usize,
}

impl Slab {
    fn new(size: usize) -> Self {
        let size = size.max(PAGE_SIZE);
        let layout = match Layout::from_size_align(size, CACHE_LINE) {
            Ok(layout) => layout,
            Err(_) => panic!("slab request of {size} bytes is unrepresentable"),
        };
        // Allocation failure is fatal for the whole process: there is no
        // recoverable out-of-memory path in this allocator.
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout)
        };
        Slab { ptr, size }
    }

    /// Usable size in bytes (the rounded-up request).
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the slab holds zero bytes (never true; requests are rounded
    /// up to [`PAGE_SIZE`]).
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Base address, for alignment checks.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// View the slab as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        // Sound: the allocation lives as long as `self`, and the borrow
        // checker serializes access through the arena.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// View the slab as a mutable byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        // Layout was validated in `new`.
        let layout = unsafe { Layout::from_size_align_unchecked(self.size, CACHE_LINE) };
        unsafe { dealloc(self.ptr.as_ptr(), layout) };
    }
}

impl std::fmt::Debug for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slab").field("size", &self.size).finish()
    }
}

/// Region allocator with bulk release.
///
/// Issued slabs are tracked in a table that is dense from index 0: a
/// release removes the entry and shifts later entries down. The table's
/// slot capacity grows in fixed batches rather than per allocation.
#[derive(Debug, Default)]
pub struct Arena {
    slabs: Vec<(SlabHandle, Slab)>,
    next_id: u64,
    capacity: usize,
}

impl Arena {
    /// Create a new, empty arena. No allocations happen yet.
    pub fn new() -> Self {
        Arena::default()
    }

    /// Acquire a zeroed slab of at least `max(size, PAGE_SIZE)` bytes,
    /// aligned to [`CACHE_LINE`].
    pub fn acquire(&mut self, size: usize) -> SlabHandle {
        if self.remaining_capacity() == 0 {
            self.capacity += SLAB_GROWTH;
            self.slabs.reserve(self.capacity - self.slabs.len());
        }

        let handle = SlabHandle(self.next_id);
        self.next_id += 1;
        self.slabs.push((handle, Slab::new(size)));
        handle
    }

    /// Release one slab. Unknown (or already released) handles are a
    /// silent no-op; callers get no use-after-release detection.
    pub fn release(&mut self, handle: SlabHandle) {
        if let Some(pos) = self.position(handle) {
            // Vec::remove shifts the tail down, keeping the table dense.
            self.slabs.remove(pos);
        }
    }

    /// Number of slabs currently issued.
    pub fn issued(&self) -> usize {
        self.slabs.len()
    }

    /// Bookkeeping slots still unused in the current table.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.slabs.len()
    }

    /// Total bookkeeping slots reserved so far.
    pub fn total_capacity(&self) -> usize {
        self.capacity
    }

    /// Borrow an issued slab.
    ///
    /// Panics on an unknown handle: resolving a slab that was never issued
    /// (or was released) is an internal bookkeeping bug, not user input.
    pub fn slab(&self, handle: SlabHandle) -> &Slab {
        match self.position(handle) {
            Some(pos) => &self.slabs[pos].1,
            None => panic!("unknown slab handle {handle:?}"),
        }
    }

    /// Mutably borrow an issued slab. Panics on an unknown handle.
    pub fn slab_mut(&mut self, handle: SlabHandle) -> &mut Slab {
        match self.position(handle) {
            Some(pos) => &mut self.slabs[pos].1,
            None => panic!("unknown slab handle {handle:?}"),
        }
    }

    fn position(&self, handle: SlabHandle) -> Option<usize> {
        self.slabs.iter().position(|(h, _)| *h == handle)
    }
}
