/*
 * Created on Tue Feb 06 2024
 *
 * This file is a part of libfast
 * libfast is a library of reusable, high-performance data structures
 * and storage primitives written by Sayan Nandan ("the Author") to
 * serve as the common foundation for building fast systems software
 *
 * Copyright (c) 2024, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

/*!
    # Fixed size pool

    O(1) alloc and free of uniform blocks. Freed blocks go onto a LIFO free
    list threaded through the blocks themselves, so the most recently freed
    (cache hot) block is served first. Fresh blocks are carved from the tail
    of the newest chunk; chunks come from the backing [`MemoryDriver`] unless
    the pool was built over caller supplied memory, in which case it is
    clamped to whatever fits.

    A pool is itself a [`MemoryDriver`], so pools stack on arenas or other
    pools.
*/

use {
    super::{align_up, MemoryDriver, SysDriver, SCALAR_ALIGN},
    crate::error::{Error, RuntimeResult},
    core::{cell::Cell, marker::PhantomData, ptr, ptr::NonNull},
};

/// Blocks per chunk when the caller neither clamps nor asks for a specific
/// allocation granularity
pub const MIN_ALLOC_UNITS: usize = 4096;

#[repr(C)]
struct FreeLink {
    next: *mut FreeLink,
}

#[repr(C)]
struct PoolChunk {
    next: *mut PoolChunk,
    free: *mut u8,
    end: *mut u8,
}

pub struct MemPool<'b, M: MemoryDriver = SysDriver> {
    mru: Cell<*mut FreeLink>,
    chunks: Cell<*mut PoolChunk>,
    block_size: usize,
    max_blocks: usize,
    min_units: usize,
    driver: Option<M>,
    _buf: PhantomData<&'b mut [u8]>,
}

impl MemPool<'static, SysDriver> {
    /// A pool over the system allocator. `max_blocks == 0` means unclamped;
    /// `min_units == 0` picks [`MIN_ALLOC_UNITS`]
    pub fn new(block_size: usize, max_blocks: usize, min_units: usize) -> RuntimeResult<Self> {
        Self::with_driver(SysDriver, block_size, max_blocks, min_units)
    }
    /// Install the pool over caller supplied memory. No further allocation
    /// ever happens; the pool is clamped to the block count that fits
    pub fn from_buffer(
        block_size: usize,
        buf: &mut [u8],
    ) -> RuntimeResult<MemPool<'_, SysDriver>> {
        let block_size = Self::round_block(block_size);
        let base = buf.as_mut_ptr();
        let start = align_up(base as usize, SCALAR_ALIGN) - base as usize;
        let need = start + sizeof!(PoolChunk) + SCALAR_ALIGN + block_size;
        if buf.len() < need {
            return Err(Error::InsufficientBuffer);
        }
        unsafe {
            // UNSAFE(@ohsayan): bounds verified right above
            let ch = base.add(start) as *mut PoolChunk;
            let area = align_up(ch as usize + sizeof!(PoolChunk), SCALAR_ALIGN) as *mut u8;
            let end = base.add(buf.len());
            let nblocks = (end as usize - area as usize) / block_size;
            if nblocks == 0 {
                return Err(Error::InsufficientBuffer);
            }
            ch.write(PoolChunk {
                next: ptr::null_mut(),
                free: area,
                end: area.add(nblocks * block_size),
            });
            Ok(MemPool {
                mru: Cell::new(ptr::null_mut()),
                chunks: Cell::new(ch),
                block_size,
                max_blocks: nblocks,
                min_units: nblocks,
                driver: None,
                _buf: PhantomData,
            })
        }
    }
}

impl<'b, M: MemoryDriver> MemPool<'b, M> {
    /// A pool stacked on an arbitrary backing driver
    pub fn with_driver(
        driver: M,
        block_size: usize,
        max_blocks: usize,
        min_units: usize,
    ) -> RuntimeResult<Self> {
        let slf = Self {
            mru: Cell::new(ptr::null_mut()),
            chunks: Cell::new(ptr::null_mut()),
            block_size: Self::round_block(block_size),
            max_blocks,
            min_units: if max_blocks != 0 {
                max_blocks
            } else if min_units == 0 {
                MIN_ALLOC_UNITS
            } else {
                min_units
            },
            driver: Some(driver),
            _buf: PhantomData,
        };
        if !slf.grow() {
            return Err(Error::OutOfMemory);
        }
        Ok(slf)
    }
    fn round_block(block_size: usize) -> usize {
        align_up(block_size.max(sizeof!(FreeLink)), SCALAR_ALIGN)
    }
    /// Serve one block: free list first, then the newest chunk, then (for
    /// unclamped pools only) a fresh chunk. `None` means exhausted
    pub fn alloc(&self) -> Option<NonNull<u8>> {
        unsafe {
            // UNSAFE(@ohsayan): links live inside blocks we own
            let top = self.mru.get();
            if !top.is_null() {
                self.mru.set((*top).next);
                return Some(NonNull::new_unchecked(top as *mut u8));
            }
        }
        if let Some(p) = self.carve() {
            return Some(p);
        }
        if self.max_blocks != 0 {
            // clamped: never ask the driver for more
            return None;
        }
        if !self.grow() {
            return None;
        }
        self.carve()
    }
    /// Return a block to the pool (it goes to the head of the free list).
    ///
    /// ## Safety
    /// `ptr` must come from this pool's `alloc` and must not be freed twice
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        let link = ptr.as_ptr() as *mut FreeLink;
        (*link).next = self.mru.get();
        self.mru.set(link);
    }
    /// Effective (post rounding) block size
    pub fn block_size(&self) -> usize {
        self.block_size
    }
    /// The clamp, if one was set (0 otherwise)
    pub fn total_blocks(&self) -> usize {
        self.max_blocks
    }
    fn carve(&self) -> Option<NonNull<u8>> {
        let ch = self.chunks.get();
        if ch.is_null() {
            return None;
        }
        unsafe {
            // UNSAFE(@ohsayan): chunk bounds were set up on creation
            if (*ch).free < (*ch).end {
                let p = (*ch).free;
                (*ch).free = p.add(self.block_size);
                Some(NonNull::new_unchecked(p))
            } else {
                None
            }
        }
    }
    fn grow(&self) -> bool {
        let Some(driver) = self.driver.as_ref() else {
            return false;
        };
        let Some(chunk_size) = self.block_size.checked_mul(self.min_units) else {
            return false;
        };
        let Some(base) =
            driver.alloc(sizeof!(PoolChunk) + chunk_size + SCALAR_ALIGN)
        else {
            return false;
        };
        unsafe {
            // UNSAFE(@ohsayan): allocation is large enough for header + slack + blocks
            let ch = base.as_ptr() as *mut PoolChunk;
            let area =
                align_up(base.as_ptr() as usize + sizeof!(PoolChunk), SCALAR_ALIGN) as *mut u8;
            ch.write(PoolChunk {
                next: self.chunks.get(),
                free: area,
                end: area.add(chunk_size),
            });
            self.chunks.set(ch);
        }
        true
    }
}

impl<'b, M: MemoryDriver> MemoryDriver for MemPool<'b, M> {
    fn alloc(&self, n: usize) -> Option<NonNull<u8>> {
        debug_assert!(n <= self.block_size, "request exceeds pool block size");
        MemPool::alloc(self)
    }
    unsafe fn free(&self, ptr: NonNull<u8>) {
        MemPool::free(self, ptr)
    }
}

impl<'b, M: MemoryDriver> Drop for MemPool<'b, M> {
    fn drop(&mut self) {
        let Some(driver) = self.driver.as_ref() else {
            // caller owns the memory
            return;
        };
        let mut ch = self.chunks.get();
        while !ch.is_null() {
            unsafe {
                // UNSAFE(@ohsayan): chunk base is exactly what the driver returned
                let next = (*ch).next;
                driver.free(NonNull::new_unchecked(ch as *mut u8));
                ch = next;
            }
        }
    }
}
