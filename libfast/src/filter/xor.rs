/*
 * Created on Wed Feb 14 2024
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
    # Xor filters

    An implementation of "Xor Filters: Faster and Smaller Than Bloom and
    Cuckoo Filters" (<https://arxiv.org/abs/1912.08258>). A filter over `n`
    keys is a linear array of `3 * size` fingerprint cells
    (`size = floor((32 + ceil(1.23 n)) / 3)`); three hash derived positions,
    one per third of the array, xor together to the key's fingerprint.

    Construction "peels" cells with exactly one resident key until every key
    is accounted for, retrying under a fresh seed (up to a million times)
    when the random hypergraph turns out cyclic. Unlike the blooms, a built
    filter is immutable.
*/

use {
    super::hash_val,
    crate::idx::{mix64, seed64},
    core::fmt,
    memmap2::Mmap,
    std::sync::Arc,
};

const MAX_TRIES: u32 = 1_000_000;

/// A fingerprint cell width. The filter's false positive rate is
/// `2^-width`, its cost is `width` bits per cell
pub trait Fingerprint: Copy + Eq + fmt::Debug {
    /// The on-disk width tag (0 = 8-bit, 1 = 16-bit)
    const WIDTH_FLAG: u8;
    const BYTES: usize;
    const ZERO: Self;
    /// Truncate `h ^ (h >> 32)` to this width
    fn of(h: u64) -> Self;
    fn bxor(self, o: Self) -> Self;
    fn to_le(self, out: &mut [u8]);
    fn from_le(b: &[u8]) -> Self;
}

impl Fingerprint for u8 {
    const WIDTH_FLAG: u8 = 0;
    const BYTES: usize = 1;
    const ZERO: Self = 0;
    fn of(h: u64) -> Self {
        (h ^ (h >> 32)) as u8
    }
    fn bxor(self, o: Self) -> Self {
        self ^ o
    }
    fn to_le(self, out: &mut [u8]) {
        out[0] = self;
    }
    fn from_le(b: &[u8]) -> Self {
        b[0]
    }
}

impl Fingerprint for u16 {
    const WIDTH_FLAG: u8 = 1;
    const BYTES: usize = 2;
    const ZERO: Self = 0;
    fn of(h: u64) -> Self {
        (h ^ (h >> 32)) as u16
    }
    fn bxor(self, o: Self) -> Self {
        self ^ o
    }
    fn to_le(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }
    fn from_le(b: &[u8]) -> Self {
        u16::from_le_bytes([b[0], b[1]])
    }
}

/// Fingerprint cells: private heap array or a window into a shared mapping
pub(crate) enum FpStore<F> {
    Owned(Box<[F]>),
    Mapped { map: Arc<Mmap>, off: usize },
}

pub struct XorFilter<F: Fingerprint> {
    pub(crate) seed: u64,
    pub(crate) size: u32,
    pub(crate) n: u32,
    pub(crate) fp: FpStore<F>,
}

pub type Xor8 = XorFilter<u8>;
pub type Xor16 = XorFilter<u16>;

// cell index triple for one key hash
struct FpIdx {
    i: usize,
    j: usize,
    k: usize,
}

#[inline(always)]
fn hash3(h: u64, size: usize) -> FpIdx {
    let s = size as u64;
    FpIdx {
        i: (h % s) as usize,
        j: (mix64(h) % s) as usize + size,
        k: (mix64(mix64(h)) % s) as usize + 2 * size,
    }
}

// hash-mask accumulator and occupancy for one cell
#[derive(Clone, Copy, Default)]
struct XorSet {
    mask: u64,
    n: u64,
}

// a peeled key and the cell it was the sole resident of
#[derive(Clone, Copy)]
struct KeyIdx {
    hash: u64,
    idx: usize,
}

impl<F: Fingerprint> XorFilter<F> {
    /// Per-element cell budget: `floor((32 + ceil(1.23 n)) / 3)`
    pub(crate) fn calc_size(n: usize) -> usize {
        ((32.0 + (1.23 * n as f64).ceil()) as usize) / 3
    }
    /// Build a filter over `keys` (64-bit hashes; duplicates make
    /// construction impossible). `None` when peeling failed even after the
    /// retry cap
    pub fn build(keys: &[u64]) -> Option<Self> {
        use crate::mem::TVec;
        let n = keys.len();
        if n > u32::MAX as usize {
            return None;
        }
        let size = Self::calc_size(n);
        let cap = size * 3;
        let mut h = vec![XorSet::default(); cap];
        let mut q: TVec<KeyIdx> = TVec::with_capacity(cap);
        let mut stack: TVec<KeyIdx> = TVec::with_capacity(n);
        let mut tries = 0;
        let mut seed;
        loop {
            h.fill(XorSet::default());
            seed = seed64();
            for key in keys {
                let kh = hash_val(*key, seed);
                let z = hash3(kh, size);
                for p in [z.i, z.j, z.k] {
                    h[p].mask ^= kh;
                    h[p].n += 1;
                }
            }
            q.reset();
            for (i, cell) in h.iter().enumerate() {
                if cell.n == 1 {
                    q.push_back(KeyIdx {
                        hash: cell.mask,
                        idx: i,
                    });
                }
            }
            stack.reset();
            while let Some(ki) = q.pop_back() {
                if h[ki.idx].n != 1 {
                    continue;
                }
                // sole resident: peel it out of all three cells
                stack.push_back(ki);
                let z = hash3(ki.hash, size);
                for p in [z.i, z.j, z.k] {
                    let cell = &mut h[p];
                    cell.mask ^= ki.hash;
                    cell.n -= 1;
                    if cell.n == 1 {
                        q.push_back(KeyIdx {
                            hash: cell.mask,
                            idx: p,
                        });
                    }
                }
            }
            if stack.len() == n {
                break;
            }
            tries += 1;
            if tries > MAX_TRIES {
                return None;
            }
        }
        // unwind the peel stack, placing fingerprints newest-first
        let mut fp = vec![F::ZERO; cap].into_boxed_slice();
        while let Some(ki) = stack.pop_back() {
            let z = hash3(ki.hash, size);
            fp[ki.idx] = F::of(ki.hash)
                .bxor(fp[z.i])
                .bxor(fp[z.j])
                .bxor(fp[z.k]);
        }
        Some(Self {
            seed,
            size: size as u32,
            n: n as u32,
            fp: FpStore::Owned(fp),
        })
    }
    pub fn contains(&self, key: u64) -> bool {
        let h = hash_val(key, self.seed);
        let z = hash3(h, self.size as usize);
        F::of(h) == self.cell(z.i).bxor(self.cell(z.j)).bxor(self.cell(z.k))
    }
    /// Number of keys the filter was built over
    pub fn len(&self) -> u64 {
        self.n as u64
    }
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
    /// Total fingerprint bytes
    pub fn byte_size(&self) -> u64 {
        (3 * self.size as usize * F::BYTES) as u64
    }
    /// Storage efficiency in bits per indexed key
    pub fn bits_per_entry(&self) -> f64 {
        (8 * self.byte_size()) as f64 / self.n as f64
    }
    #[inline(always)]
    fn cell(&self, i: usize) -> F {
        match &self.fp {
            FpStore::Owned(b) => b[i],
            FpStore::Mapped { map, off } => F::from_le(&map[off + i * F::BYTES..]),
        }
    }
    /// Serialize every cell little-endian into `out`
    pub(crate) fn write_cells(&self, out: &mut [u8]) {
        let cells = 3 * self.size as usize;
        for i in 0..cells {
            self.cell(i).to_le(&mut out[i * F::BYTES..]);
        }
    }
}

impl<F: Fingerprint> fmt::Debug for XorFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XorFilter")
            .field("seed", &self.seed)
            .field("size", &self.size)
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}

impl<F: Fingerprint> PartialEq for XorFilter<F> {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed
            && self.size == other.size
            && self.n == other.n
            && (0..3 * self.size as usize).all(|i| self.cell(i) == other.cell(i))
    }
}

impl<F: Fingerprint> fmt::Display for XorFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "xor{}: {} keys in {} cells ({:.2} bits/entry)",
            F::BYTES * 8,
            self.n,
            3 * self.size,
            self.bits_per_entry()
        )
    }
}
