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
    # Arena

    A lifetime based memory manager. Individual objects are never freed;
    the storage of every object is released in one shot when the arena is
    dropped. Allocation is a pointer bump in the common case, which makes
    for simpler algorithms in anything that builds short-lived object
    graphs (parse trees, symbol tables and the like).
*/

use {
    super::{align_up, unsafe_apis, MemoryDriver, SCALAR_ALIGN},
    core::{alloc::Layout, cell::Cell, ptr, ptr::NonNull, slice, str},
};

/// Chunk size used when the caller passes 0
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;
/// An oversized request allocates a chunk big enough for this many more of
/// the same so that repeated oversized requests keep amortizing
const OVERSIZE_MULTIPLIER: usize = 128;

#[repr(C)]
struct Chunk {
    next: *mut Chunk,
    free: *mut u8,
    end: *mut u8,
    total: usize,
}

impl Chunk {
    #[inline(always)]
    fn avail(&self) -> usize {
        self.end as usize - self.free as usize
    }
}

pub struct Arena {
    head: Cell<*mut Chunk>,
    chunk_size: usize,
}

impl Arena {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            head: Cell::new(ptr::null_mut()),
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                align_up(chunk_size, SCALAR_ALIGN)
            },
        }
    }
    /// Allocate `n` bytes (rounded up to [`SCALAR_ALIGN`]; zero byte requests
    /// still bump by one alignment unit so every returned pointer is unique).
    /// The block lives until the arena is dropped. `None` on exhaustion
    pub fn alloc(&self, n: usize) -> Option<NonNull<u8>> {
        let n = align_up(n.max(1), SCALAR_ALIGN);
        unsafe {
            // UNSAFE(@ohsayan): chunk list links are only written here and in drop
            let mut c = self.head.get();
            while !c.is_null() {
                if (*c).avail() >= n {
                    return Some(Self::carve(c, n));
                }
                c = (*c).next;
            }
        }
        let total = if n < self.chunk_size {
            self.chunk_size
        } else {
            n.checked_mul(OVERSIZE_MULTIPLIER)?
        };
        let c = Self::chunk_new(total)?;
        unsafe {
            // UNSAFE(@ohsayan): fresh chunk with avail >= n
            (*c).next = self.head.get();
            self.head.set(c);
            Some(Self::carve(c, n))
        }
    }
    /// Copy `s` into the arena, terminator included, and return the arena
    /// backed string
    pub fn alloc_str<'a>(&'a self, s: &str) -> Option<&'a str> {
        unsafe {
            // UNSAFE(@ohsayan): the copied bytes are valid UTF-8 since s is
            let b = self.alloc_bytes_terminated(s.as_bytes())?;
            Some(str::from_utf8_unchecked(b))
        }
    }
    /// Copy `b` plus a trailing NUL into the arena; the returned slice covers
    /// the payload only
    pub fn alloc_bytes_terminated<'a>(&'a self, b: &[u8]) -> Option<&'a [u8]> {
        let p = self.alloc(b.len() + 1)?.as_ptr();
        unsafe {
            // UNSAFE(@ohsayan): allocation is at least len + 1 bytes
            ptr::copy_nonoverlapping(b.as_ptr(), p, b.len());
            p.add(b.len()).write(0);
            Some(slice::from_raw_parts(p, b.len()))
        }
    }
    #[inline(always)]
    unsafe fn carve(c: *mut Chunk, n: usize) -> NonNull<u8> {
        let p = (*c).free;
        (*c).free = p.add(n);
        NonNull::new_unchecked(p)
    }
    fn chunk_new(total: usize) -> Option<*mut Chunk> {
        let layout =
            Layout::from_size_align(sizeof!(Chunk).checked_add(total)?, SCALAR_ALIGN).ok()?;
        unsafe {
            // UNSAFE(@ohsayan): layout verified right above
            let base = unsafe_apis::try_alloc_layout(layout);
            if base.is_null() {
                return None;
            }
            let c = base as *mut Chunk;
            let start = base.add(sizeof!(Chunk));
            c.write(Chunk {
                next: ptr::null_mut(),
                free: start,
                end: start.add(total),
                total,
            });
            Some(c)
        }
    }
}

impl MemoryDriver for Arena {
    fn alloc(&self, n: usize) -> Option<NonNull<u8>> {
        Arena::alloc(self, n)
    }
    unsafe fn free(&self, _: NonNull<u8>) {
        // individual blocks are never reclaimed; drop releases everything
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let mut c = self.head.get();
        while !c.is_null() {
            unsafe {
                // UNSAFE(@ohsayan): layout mirrors chunk_new exactly
                let next = (*c).next;
                let total = (*c).total;
                unsafe_apis::dealloc_layout(
                    c as *mut u8,
                    Layout::from_size_align_unchecked(sizeof!(Chunk) + total, SCALAR_ALIGN),
                );
                c = next;
            }
        }
    }
}
