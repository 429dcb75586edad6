/*
 * Created on Wed Feb 07 2024
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

use {
    super::unsafe_apis,
    crate::rand::Random64,
    core::{cmp::Ordering, fmt, ops, ptr, ptr::NonNull, slice},
};

/// A growable vector with amortised doubling, front operations and the
/// randomized helpers (shuffle, reservoir sample, random element) the
/// filter construction paths lean on
pub struct TVec<T> {
    p: NonNull<T>,
    l: usize,
    c: usize,
}

impl<T> TVec<T> {
    const SEED_CAP: usize = 4;
    pub const fn new() -> Self {
        Self {
            p: NonNull::dangling(),
            l: 0,
            c: 0,
        }
    }
    pub fn with_capacity(n: usize) -> Self {
        let mut slf = Self::new();
        slf.reserve(n);
        slf
    }
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.l
    }
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.c
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.l == 0
    }
    /// Grow (never shrink) the backing array so it can hold `total` elements
    pub fn reserve(&mut self, total: usize) {
        if total <= self.c {
            return;
        }
        let mut ncap = if self.c == 0 { Self::SEED_CAP } else { self.c };
        while ncap < total {
            ncap *= 2;
        }
        unsafe {
            // UNSAFE(@ohsayan): fresh block; old block copied over then released
            let nb: *mut T = unsafe_apis::alloc_array(ncap);
            ptr::copy_nonoverlapping(self.p.as_ptr(), nb, self.l);
            unsafe_apis::dealloc_array(self.p.as_ptr(), self.c);
            self.p = NonNull::new_unchecked(nb);
        }
        self.c = ncap;
    }
    /// Make room for `extra` more elements
    pub fn ensure(&mut self, extra: usize) {
        self.reserve(self.l + extra)
    }
    pub fn push_back(&mut self, v: T) {
        self.ensure(1);
        unsafe {
            // UNSAFE(@ohsayan): ensure made the room
            self.p.as_ptr().add(self.l).write(v);
        }
        self.l += 1;
    }
    pub fn pop_back(&mut self) -> Option<T> {
        if self.l == 0 {
            return None;
        }
        self.l -= 1;
        unsafe {
            // UNSAFE(@ohsayan): index was the last live element
            Some(self.p.as_ptr().add(self.l).read())
        }
    }
    /// O(n): every element shifts right
    pub fn push_front(&mut self, v: T) {
        self.ensure(1);
        unsafe {
            // UNSAFE(@ohsayan): capacity verified; overlapping move is intended
            ptr::copy(self.p.as_ptr(), self.p.as_ptr().add(1), self.l);
            self.p.as_ptr().write(v);
        }
        self.l += 1;
    }
    /// O(n): every element shifts left
    pub fn pop_front(&mut self) -> Option<T> {
        if self.l == 0 {
            return None;
        }
        unsafe {
            // UNSAFE(@ohsayan): front is live; the move repairs the hole
            let v = self.p.as_ptr().read();
            self.l -= 1;
            ptr::copy(self.p.as_ptr().add(1), self.p.as_ptr(), self.l);
            Some(v)
        }
    }
    /// Drop every element; capacity is retained
    pub fn reset(&mut self) {
        unsafe {
            // UNSAFE(@ohsayan): length is exact
            unsafe_apis::drop_slice_in_place(self.p.as_ptr(), self.l);
        }
        self.l = 0;
    }
    /// Move every element of `other` to the back of `self`
    pub fn append(&mut self, other: &mut TVec<T>) {
        self.ensure(other.l);
        unsafe {
            // UNSAFE(@ohsayan): disjoint blocks; other's length zeroed before drop
            ptr::copy_nonoverlapping(other.p.as_ptr(), self.p.as_ptr().add(self.l), other.l);
        }
        self.l += other.l;
        other.l = 0;
    }
    pub fn sort(&mut self, cmp: impl FnMut(&T, &T) -> Ordering) {
        self.as_slice_mut().sort_unstable_by(cmp)
    }
    /// Fisher-Yates over the full vector
    pub fn shuffle(&mut self, rng: &mut impl Random64) {
        let s = self.as_slice_mut();
        let mut i = s.len();
        while i > 1 {
            i -= 1;
            let j = (rng.next_u64() % (i as u64 + 1)) as usize;
            s.swap(i, j);
        }
    }
    /// Reservoir sample `k` elements. Returns `None` unless `k < self.len()`
    pub fn sample(&self, k: usize, rng: &mut impl Random64) -> Option<TVec<T>>
    where
        T: Clone,
    {
        if k >= self.l {
            return None;
        }
        let mut out = TVec::with_capacity(k);
        for v in &self.as_slice()[..k] {
            out.push_back(v.clone());
        }
        for i in k..self.l {
            let j = (rng.next_u64() % (i as u64 + 1)) as usize;
            if j < k {
                out[j] = self.as_slice()[i].clone();
            }
        }
        Some(out)
    }
    pub fn random_element(&self, rng: &mut impl Random64) -> Option<&T> {
        if self.l == 0 {
            return None;
        }
        Some(&self.as_slice()[(rng.next_u64() % self.l as u64) as usize])
    }
    #[inline(always)]
    fn as_slice(&self) -> &[T] {
        unsafe {
            // UNSAFE(@ohsayan): ptr and len are kept consistent by every mutator
            slice::from_raw_parts(self.p.as_ptr(), self.l)
        }
    }
    #[inline(always)]
    fn as_slice_mut(&mut self) -> &mut [T] {
        unsafe {
            // UNSAFE(@ohsayan): ptr and len are kept consistent by every mutator
            slice::from_raw_parts_mut(self.p.as_ptr(), self.l)
        }
    }
}

impl<T> ops::Deref for TVec<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> ops::DerefMut for TVec<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_slice_mut()
    }
}

impl<T> Drop for TVec<T> {
    fn drop(&mut self) {
        self.reset();
        unsafe {
            // UNSAFE(@ohsayan): dealloc matches the alloc in reserve
            unsafe_apis::dealloc_array(self.p.as_ptr(), self.c);
        }
    }
}

impl<T> Default for TVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for TVec<T> {
    fn clone(&self) -> Self {
        let mut new = Self::with_capacity(self.l);
        for v in self.as_slice() {
            new.push_back(v.clone());
        }
        new
    }
}

impl<T: fmt::Debug> fmt::Debug for TVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for TVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        iter.into_iter().for_each(|item| self.push_back(item))
    }
}

impl<T> FromIterator<T> for TVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut slf = Self::new();
        slf.extend(iter);
        slf
    }
}

impl<T: PartialEq, A: ops::Deref<Target = [T]>> PartialEq<A> for TVec<T> {
    fn eq(&self, other: &A) -> bool {
        self.as_slice() == ops::Deref::deref(other)
    }
}
