//! Growable staging buffers.
//!
//! Names and decoded blocks vary in size from entry to entry but are usually
//! close to each other, so each purpose gets one buffer that only ever grows.
//! A request that fits the current capacity never reallocates.

use std::collections::TryReserveError;

#[derive(Debug, thiserror::Error)]
#[error("cannot allocate {requested} elements")]
pub struct AllocError {
    pub requested: usize,
    #[source]
    source: TryReserveError,
}

#[derive(Debug)]
pub struct GrowBuffer<T> {
    data: Vec<T>,
    allocations: usize,
}

impl<T> Default for GrowBuffer<T> {
    fn default() -> Self {
        GrowBuffer {
            data: Vec::new(),
            allocations: 0,
        }
    }
}

impl<T: Copy + Default> GrowBuffer<T> {
    pub fn new() -> GrowBuffer<T> {
        Self::default()
    }

    /// Number of elements currently addressable without growing.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of times this buffer has acquired fresh storage.
    #[inline(always)]
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Makes at least `size` elements available.
    ///
    /// Growing drops the old storage first and allocates exactly `size`
    /// zeroed elements, so callers must not rely on content surviving a grow.
    pub fn ensure_capacity(&mut self, size: usize) -> Result<(), AllocError> {
        if self.data.len() >= size {
            return Ok(());
        }

        self.data = Vec::new();

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|source| AllocError {
                requested: size,
                source,
            })?;
        data.resize(size, T::default());

        self.data = data;
        self.allocations += 1;

        tracing::trace!(size, allocations = self.allocations, "grew buffer");
        Ok(())
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}
