//! The contract between the orchestrator and an archive decoding engine.
//!
//! An engine owns index parsing, decompression and checksum verification.
//! The orchestrator only walks entries in index order, asks for names and
//! asks for decoded bytes, threading one [`BlockCache`] through every
//! `extract` call on the same handle so a solid block is decoded once no
//! matter how many entries it holds.

use std::fs::File;

use crate::buffer::{AllocError, GrowBuffer};
use crate::error::EngineError;

#[cfg(feature = "sevenz")]
mod sevenz;

#[cfg(feature = "sevenz")]
pub use self::sevenz::{SevenZipArchive, SevenZipEngine};

pub trait ArchiveEngine {
    type Handle: ArchiveHandle;

    /// Parses the archive index from `stream`. The handle is closed when it
    /// is dropped.
    fn open(&self, stream: File) -> Result<Self::Handle, EngineError>;
}

pub trait ArchiveHandle {
    fn entry_count(&self) -> usize;

    fn entry(&self, index: usize) -> EntryDescriptor;

    /// Length of the entry's name in UTF-16 code units, terminator included.
    fn decoded_name_len(&self, index: usize) -> usize;

    /// Fills `dest`, which is exactly `decoded_name_len(index)` units long,
    /// with the NUL-terminated name.
    fn decoded_name(&self, index: usize, dest: &mut [u16]);

    /// Decodes the entry's data into `cache`, reusing the block it already
    /// holds when `index` belongs to it.
    fn extract(&mut self, index: usize, cache: &mut BlockCache) -> Result<Extracted, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub index: usize,
    pub is_directory: bool,
    /// `None` when the archive defines no attributes for the entry.
    pub attributes: Option<u32>,
}

/// Where an extracted entry's bytes sit inside [`BlockCache::staging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extracted {
    pub offset: usize,
    pub len: usize,
}

/// The last decoded solid block, carried from one `extract` call to the next.
///
/// A fresh cache is unset and owns no storage. It belongs to the traversal of
/// a single handle; reusing it for another handle requires [`reset`].
///
/// [`reset`]: BlockCache::reset
#[derive(Debug, Default)]
pub struct BlockCache {
    block: Option<usize>,
    staging: GrowBuffer<u8>,
    size: usize,
}

impl BlockCache {
    pub fn new() -> BlockCache {
        Self::default()
    }

    #[inline(always)]
    pub fn block(&self) -> Option<usize> {
        self.block
    }

    #[inline(always)]
    pub fn holds(&self, block: usize) -> bool {
        self.block == Some(block)
    }

    pub fn is_unset(&self) -> bool {
        self.block.is_none() && self.staging.capacity() == 0
    }

    /// The decoded bytes of the held block.
    pub fn staging(&self) -> &[u8] {
        &self.staging.as_slice()[..self.size]
    }

    /// The bytes of one extracted entry, or `None` if the range does not lie
    /// inside the held block.
    pub fn bytes(&self, extracted: Extracted) -> Option<&[u8]> {
        let end = extracted.offset.checked_add(extracted.len)?;
        self.staging().get(extracted.offset..end)
    }

    /// Replaces the held block with `block`, decoded by `decode` into a slice
    /// of exactly `size` bytes.
    ///
    /// The cache is unset while decoding, so a failed decode is never
    /// mistaken for a cached block afterwards.
    pub fn load<E, D>(&mut self, block: usize, size: usize, decode: D) -> Result<(), E>
    where
        E: From<AllocError>,
        D: FnOnce(&mut [u8]) -> Result<(), E>,
    {
        self.block = None;
        self.size = 0;
        self.staging.ensure_capacity(size)?;
        decode(&mut self.staging.as_mut_slice()[..size])?;
        self.block = Some(block);
        self.size = size;
        Ok(())
    }

    /// Returns the cache to its initial unset state, releasing the staging
    /// buffer.
    pub fn reset(&mut self) {
        *self = BlockCache::new();
    }

    pub fn allocations(&self) -> usize {
        self.staging.allocations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    #[test]
    fn fresh_cache_is_unset() {
        let cache = BlockCache::new();
        assert!(cache.is_unset());
        assert_eq!(cache.block(), None);
        assert!(cache.staging().is_empty());
    }

    #[test]
    fn load_holds_block() {
        let mut cache = BlockCache::new();
        cache
            .load::<EngineError, _>(3, 5, |buf| {
                buf.copy_from_slice(b"abcde");
                Ok(())
            })
            .unwrap();

        assert!(cache.holds(3));
        assert_eq!(cache.bytes(Extracted { offset: 1, len: 3 }), Some(&b"bcd"[..]));
        assert_eq!(cache.bytes(Extracted { offset: 4, len: 2 }), None);
    }

    #[test]
    fn failed_load_leaves_cache_unheld() {
        let mut cache = BlockCache::new();
        let err = cache
            .load(1, 4, |_| Err(EngineError::new(Status::Data, "corrupt")))
            .unwrap_err();

        assert_eq!(err.status(), Status::Data);
        assert_eq!(cache.block(), None);
        assert!(cache.staging().is_empty());
    }

    #[test]
    fn smaller_block_reuses_staging() {
        let mut cache = BlockCache::new();
        cache.load::<EngineError, _>(0, 16, |_| Ok(())).unwrap();
        cache.load::<EngineError, _>(1, 8, |_| Ok(())).unwrap();

        assert_eq!(cache.allocations(), 1);
        assert_eq!(cache.staging().len(), 8);

        cache.reset();
        assert!(cache.is_unset());
    }
}
