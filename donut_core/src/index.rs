//! Dedup index: the set of content identifiers already present in a
//! data directory.
//!
//! Identifiers live in fixed-width, NUL-padded slots grouped into arena
//! pages. Slots fill in append order and are never reordered, so slot
//! `i` is always at page `i / SLOTS_PER_PAGE`, offset
//! `(i % SLOTS_PER_PAGE) * SLOT_WIDTH`.

use crate::arena::{Arena, PAGE_SIZE, SlabHandle};
use crate::error::Result;
use std::fs;
use std::path::Path;

/// Width of one identifier slot in bytes. Stored names occupy at most
/// `SLOT_WIDTH - 1` bytes; the rest is NUL padding.
pub const SLOT_WIDTH: usize = 32;

/// Identifier slots per arena page.
pub const SLOTS_PER_PAGE: usize = PAGE_SIZE / SLOT_WIDTH;

/// Pages acquired from the arena per growth step.
const PAGE_BATCH: usize = 4;

/// A name NUL-padded to exactly one slot.
fn slot_key(name: &str) -> [u8; SLOT_WIDTH] {
    let bytes = name.as_bytes();
    let take = bytes.len().min(SLOT_WIDTH - 1);

    let mut key = [0u8; SLOT_WIDTH];
    key[..take].copy_from_slice(&bytes[..take]);
    key
}

/// Growable sequence of fixed-width content identifiers.
#[derive(Debug, Default)]
pub struct DataIndex {
    pages: Vec<SlabHandle>,
    len: usize,
    free: usize,
}

impl DataIndex {
    /// Create an empty index. Pages are acquired lazily on first append.
    pub fn new() -> Self {
        DataIndex::default()
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no identifiers have been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free slots remaining in the current page set.
    pub fn free_slots(&self) -> usize {
        self.free
    }

    /// Total slots across all pages.
    pub fn capacity(&self) -> usize {
        self.pages.len() * SLOTS_PER_PAGE
    }

    fn grow(&mut self, arena: &mut Arena) {
        for _ in 0..PAGE_BATCH {
            self.pages.push(arena.acquire(PAGE_SIZE));
        }
        self.free += PAGE_BATCH * SLOTS_PER_PAGE;
    }

    /// Append an identifier, copying up to `SLOT_WIDTH - 1` bytes of it
    /// into the next free slot. Grows the page set first if none remain.
    pub fn append(&mut self, arena: &mut Arena, name: &str) {
        if self.free == 0 {
            self.grow(arena);
        }

        let key = slot_key(name);
        let page = self.pages[self.len / SLOTS_PER_PAGE];
        let offset = (self.len % SLOTS_PER_PAGE) * SLOT_WIDTH;
        arena.slab_mut(page).as_bytes_mut()[offset..offset + SLOT_WIDTH].copy_from_slice(&key);

        self.len += 1;
        self.free -= 1;
    }

    /// Membership test, byte-exact up to the slot width.
    ///
    /// Scans slots in order; the first empty slot (leading NUL) means no
    /// more entries, so trailing unused capacity is never touched.
    pub fn contains(&self, arena: &Arena, name: &str) -> bool {
        let key = slot_key(name);

        for &page in &self.pages {
            let data = arena.slab(page).as_bytes();
            for slot in data.chunks_exact(SLOT_WIDTH).take(SLOTS_PER_PAGE) {
                if slot[0] == 0 {
                    return false;
                }
                if slot == key {
                    return true;
                }
            }
        }
        false
    }

    /// Borrow the raw bytes of a populated slot.
    ///
    /// Panics when `index` is out of range: that is an internal
    /// bookkeeping bug, not recoverable user input.
    pub fn slot_at<'a>(&self, arena: &'a Arena, index: usize) -> &'a [u8] {
        if index >= self.len {
            panic!("slot {index} out of range (index holds {})", self.len);
        }

        let page = self.pages[index / SLOTS_PER_PAGE];
        let offset = (index % SLOTS_PER_PAGE) * SLOT_WIDTH;
        &arena.slab(page).as_bytes()[offset..offset + SLOT_WIDTH]
    }

    /// Seed the index with the name of every regular file directly
    /// inside `path`. Returns how many entries were appended.
    pub fn populate_from_dir(&mut self, arena: &mut Arena, path: &Path) -> Result<usize> {
        let mut count = 0;

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                self.append(arena, name);
                count += 1;
            }
        }

        Ok(count)
    }
}
