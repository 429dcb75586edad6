/*
 * Created on Mon Feb 05 2024
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
    # Memory primitives

    Region based allocation (the [`Arena`]), fixed size block pools
    ([`MemPool`]), intrusive lists, a growable vector and the
    [`MemoryDriver`] interface that lets the higher structures pick their
    allocation strategy.
*/

pub mod arena;
mod ll;
pub mod list;
pub mod pool;
pub(crate) mod unsafe_apis;
pub mod vec;
#[cfg(test)]
mod tests;

pub use {arena::Arena, ll::CachePadded, pool::MemPool, vec::TVec};

use core::{alloc::Layout, ptr::NonNull};

/// The maximum scalar alignment on every target we care about. Every pointer
/// a [`MemoryDriver`] hands out honors this
pub const SCALAR_ALIGN: usize = 16;

#[inline(always)]
pub const fn align_up(v: usize, align: usize) -> usize {
    (v + align - 1) & !(align - 1)
}

#[inline(always)]
pub const fn align_up_u64(v: u64, align: u64) -> u64 {
    (v + align - 1) & !(align - 1)
}

/// Allocator polymorphism for the pool and the hash tables.
///
/// Implementations return [`SCALAR_ALIGN`]ed blocks and reclaim them given
/// nothing but the pointer (an arena reclaims nothing at all until it is
/// dropped)
pub trait MemoryDriver {
    /// Allocate at least `n` bytes. `None` means the driver is exhausted
    fn alloc(&self, n: usize) -> Option<NonNull<u8>>;
    /// Return a block previously obtained from [`MemoryDriver::alloc`] on `self`.
    ///
    /// ## Safety
    /// `ptr` must come from this driver and must not be freed twice
    unsafe fn free(&self, ptr: NonNull<u8>);
}

impl<M: MemoryDriver + ?Sized> MemoryDriver for &M {
    fn alloc(&self, n: usize) -> Option<NonNull<u8>> {
        M::alloc(self, n)
    }
    unsafe fn free(&self, ptr: NonNull<u8>) {
        M::free(self, ptr)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// The global allocator exposed as a [`MemoryDriver`]. A length header is
/// stashed ahead of every block so that `free` can reconstitute the layout
pub struct SysDriver;

impl SysDriver {
    const HDR: usize = SCALAR_ALIGN;
    fn layout(total: usize) -> Option<Layout> {
        Layout::from_size_align(total, SCALAR_ALIGN).ok()
    }
}

impl MemoryDriver for SysDriver {
    fn alloc(&self, n: usize) -> Option<NonNull<u8>> {
        let total = n.checked_add(Self::HDR)?;
        let layout = Self::layout(total)?;
        unsafe {
            // UNSAFE(@ohsayan): valid layout; null is checked below
            let base = unsafe_apis::try_alloc_layout(layout);
            if base.is_null() {
                return None;
            }
            (base as *mut usize).write(total);
            Some(NonNull::new_unchecked(base.add(Self::HDR)))
        }
    }
    unsafe fn free(&self, ptr: NonNull<u8>) {
        let base = ptr.as_ptr().sub(Self::HDR);
        let total = (base as *const usize).read();
        unsafe_apis::dealloc_layout(
            base,
            Layout::from_size_align_unchecked(total, SCALAR_ALIGN),
        )
    }
}
