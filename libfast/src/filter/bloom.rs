/*
 * Created on Tue Feb 13 2024
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
    # Partitioned bloom filters

    Notation (the math is the classic treatment with a hardcoded 50% fill
    target per partition):

    - `e`: desired false positive rate
    - `n`: element capacity the filter is designed for
    - `k = ceil(-ln e / ln 2)`: hash partitions
    - `m`: slots *per partition* (this is what the `m` field stores)

    Each probe derives its `k` positions from one salted 64-bit hash using
    the Kirsch-Mitzenmacher two-halves trick: position `i` is
    `(h1 + i * h2) mod m` inside partition `i`.

    The scalable flavor chains standard filters, growing capacity by
    `s = 2` and tightening the error by `r = 0.9` whenever the active
    filter's estimated fill crosses one half (per Almeida et al., "Scalable
    Bloom Filters").
*/

use {
    super::hash_val,
    crate::{
        error::{Error, RuntimeResult},
        idx::seed64,
        mem::{align_up_u64, TVec},
    },
    core::fmt,
    memmap2::Mmap,
    std::{f64::consts::LN_2, sync::Arc},
};

/// Scale factor for successive scalable-bloom filters
pub const SCALE: u32 = 2;
/// Error tightening ratio for successive scalable-bloom filters
pub const TIGHTENING: f64 = 0.9;
/// The fill estimate past which the scalable flavor adds a filter
const GROW_AT: f64 = 0.5;
pub(crate) const F64_EPSILON: f64 = 2.2204460492503131e-16;

pub(crate) fn make_k(e: f64) -> u64 {
    (-e.ln() / LN_2).ceil() as u64
}

pub(crate) fn make_m(n: u64, e: f64) -> u64 {
    n * ((-e.ln() / (LN_2 * LN_2)).ceil() as u64)
}

pub(crate) fn make_n(m: u64, e: f64) -> u64 {
    ((m as f64) * (LN_2 * LN_2) / -e.ln()).ceil() as u64
}

/// Reconstitute the error rate a filter with `k` partitions was built for
pub(crate) fn make_e(k: u64) -> f64 {
    (-(k as f64) * LN_2).exp()
}

/// Filter slots: either a private heap block or a window into a shared
/// read-only mapping (the unmarshal zero-copy mode)
pub(crate) enum SlotStore {
    Owned(Box<[u8]>),
    Mapped {
        map: Arc<Mmap>,
        off: usize,
        len: usize,
    },
}

impl SlotStore {
    pub(crate) fn zeroed(len: usize) -> Self {
        Self::Owned(vec![0u8; len].into_boxed_slice())
    }
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Self::Owned(b) => b,
            Self::Mapped { map, off, len } => &map[*off..*off + *len],
        }
    }
    /// Mutation promotes a mapped store to a private heap copy (the mapping
    /// stays read-only)
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        if let Self::Mapped { .. } = self {
            let copy = self.bytes().to_vec().into_boxed_slice();
            *self = Self::Owned(copy);
        }
        match self {
            Self::Owned(b) => b,
            Self::Mapped { .. } => unreachable!(),
        }
    }
}

fn validate(n: u64, e: f64) -> RuntimeResult<()> {
    if n == 0 || !(e > 0.0 && e < 1.0) {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

#[inline(always)]
fn split(z: u64) -> (u64, u64) {
    (z & 0xffffffff, z >> 32)
}

/// The standard (bit per slot) partitioned filter
pub struct StandardBloom {
    pub(crate) m: u64,
    pub(crate) k: u64,
    pub(crate) salt: u64,
    pub(crate) size: u64,
    pub(crate) e: f64,
    pub(crate) n: u64,
    pub(crate) bitmap: SlotStore,
}

impl StandardBloom {
    /// Size the filter for `n` elements at false positive rate `e`
    pub fn new(n: u64, e: f64) -> RuntimeResult<Self> {
        validate(n, e)?;
        let k = make_k(e);
        let m = make_m(n, e);
        let msub = m / k + ((m % k > 0) as u64);
        let nbits = align_up_u64(msub * k, 64);
        Ok(Self {
            m: msub,
            k,
            salt: seed64(),
            size: 0,
            e,
            n,
            bitmap: SlotStore::zeroed((nbits / 8) as usize),
        })
    }
    /// Set all `k` positions for the (pre-hashed) value
    pub fn probe(&mut self, hv: u64) {
        let (h1, h2) = split(hash_val(hv, self.salt));
        let (m, k) = (self.m, self.k);
        let bm = self.bitmap.bytes_mut();
        for i in 0..k {
            let pos = h1.wrapping_add(i.wrapping_mul(h2)) % m + i * m;
            bm[(pos / 8) as usize] |= 1 << (pos % 8);
        }
        self.size += 1;
    }
    /// False means definitely absent; true means "maybe"
    pub fn find(&self, hv: u64) -> bool {
        let (h1, h2) = split(hash_val(hv, self.salt));
        let bm = self.bitmap.bytes();
        for i in 0..self.k {
            let pos = h1.wrapping_add(i.wrapping_mul(h2)) % self.m + i * self.m;
            if bm[(pos / 8) as usize] & (1 << (pos % 8)) == 0 {
                return false;
            }
        }
        true
    }
    /// `1 - exp(-size / m)`: the expected fraction of set bits per partition
    pub fn fill_ratio_est(&self) -> f64 {
        1.0 - (-(self.size as f64) / (self.m as f64)).exp()
    }
    /// Elements inserted so far
    pub fn len(&self) -> u64 {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
    pub(crate) fn bmsize(&self) -> u64 {
        self.bitmap.bytes().len() as u64
    }
}

impl fmt::Debug for StandardBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardBloom")
            .field("m", &self.m)
            .field("k", &self.k)
            .field("salt", &self.salt)
            .field("size", &self.size)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

impl PartialEq for StandardBloom {
    fn eq(&self, other: &Self) -> bool {
        // capacity/error params are advisory; the placement state is what
        // must agree
        okay!(
            self.m == other.m,
            self.k == other.k,
            self.salt == other.salt,
            self.size == other.size,
            self.bitmap.bytes() == other.bitmap.bytes(),
        )
    }
}

impl fmt::Display for StandardBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "standard-bloom: FP-prob: {:.4}: {} partitions x {} slots/partition = {}B; {} elem (est fill ratio {:.4})",
            self.e,
            self.k,
            self.m,
            self.bmsize(),
            self.size,
            self.fill_ratio_est()
        )
    }
}

/// The counting flavor: a byte counter per slot so that removes are
/// possible. Counters wrap at 255 by design (tracking saturation is the
/// caller's concern)
pub struct CountingBloom {
    pub(crate) m: u64,
    pub(crate) k: u64,
    pub(crate) salt: u64,
    pub(crate) size: u64,
    pub(crate) e: f64,
    pub(crate) n: u64,
    pub(crate) counters: SlotStore,
}

impl CountingBloom {
    pub fn new(n: u64, e: f64) -> RuntimeResult<Self> {
        validate(n, e)?;
        let k = make_k(e);
        let m = make_m(n, e);
        let msub = m / k + ((m % k > 0) as u64);
        Ok(Self {
            m: msub,
            k,
            salt: seed64(),
            size: 0,
            e,
            n,
            counters: SlotStore::zeroed((msub * k) as usize),
        })
    }
    /// Bump all `k` counters for the (pre-hashed) value
    pub fn probe(&mut self, hv: u64) {
        let (h1, h2) = split(hash_val(hv, self.salt));
        let (m, k) = (self.m, self.k);
        let ctr = self.counters.bytes_mut();
        for i in 0..k {
            let pos = (h1.wrapping_add(i.wrapping_mul(h2)) % m + i * m) as usize;
            ctr[pos] = ctr[pos].wrapping_add(1);
        }
        self.size += 1;
    }
    pub fn find(&self, hv: u64) -> bool {
        let (h1, h2) = split(hash_val(hv, self.salt));
        let ctr = self.counters.bytes();
        for i in 0..self.k {
            let pos = (h1.wrapping_add(i.wrapping_mul(h2)) % self.m + i * self.m) as usize;
            if ctr[pos] == 0 {
                return false;
            }
        }
        true
    }
    /// Decrement every non-zero counter for the value. Reports whether any
    /// counter actually moved
    pub fn remove(&mut self, hv: u64) -> bool {
        let (h1, h2) = split(hash_val(hv, self.salt));
        let (m, k) = (self.m, self.k);
        let ctr = self.counters.bytes_mut();
        let mut hit = false;
        for i in 0..k {
            let pos = (h1.wrapping_add(i.wrapping_mul(h2)) % m + i * m) as usize;
            if ctr[pos] != 0 {
                ctr[pos] -= 1;
                hit = true;
            }
        }
        self.size = self.size.saturating_sub(1);
        hit
    }
    pub fn fill_ratio_est(&self) -> f64 {
        1.0 - (-(self.size as f64) / (self.m as f64)).exp()
    }
    pub fn len(&self) -> u64 {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
    pub(crate) fn bmsize(&self) -> u64 {
        self.counters.bytes().len() as u64
    }
}

impl fmt::Debug for CountingBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingBloom")
            .field("m", &self.m)
            .field("k", &self.k)
            .field("salt", &self.salt)
            .field("size", &self.size)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CountingBloom {
    fn eq(&self, other: &Self) -> bool {
        okay!(
            self.m == other.m,
            self.k == other.k,
            self.salt == other.salt,
            self.size == other.size,
            self.counters.bytes() == other.counters.bytes(),
        )
    }
}

impl fmt::Display for CountingBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "counting-bloom: FP-prob: {:.4}: {} partitions x {} slots/partition = {}B; {} elem (est fill ratio {:.4})",
            self.e,
            self.k,
            self.m,
            self.bmsize(),
            self.size,
            self.fill_ratio_est()
        )
    }
}

/// An ordered chain of standard filters: inserts always land in the newest
/// filter, lookups scan newest to oldest
pub struct ScalableBloom {
    pub(crate) filters: TVec<StandardBloom>,
    pub(crate) scale: u32,
    pub(crate) r: f64,
    pub(crate) n: u64,
    pub(crate) e: f64,
}

impl ScalableBloom {
    pub fn new(n: u64, e: f64) -> RuntimeResult<Self> {
        validate(n, e)?;
        let mut filters = TVec::with_capacity(8);
        filters.push_back(StandardBloom::new(n, e)?);
        Ok(Self {
            filters,
            scale: SCALE,
            r: TIGHTENING,
            n,
            e,
        })
    }
    fn active(&self) -> &StandardBloom {
        &self.filters[self.filters.len() - 1]
    }
    /// Insert, first appending a tighter, larger filter if the active one
    /// looks half full
    pub fn probe(&mut self, hv: u64) -> RuntimeResult<()> {
        if self.active().fill_ratio_est() > GROW_AT {
            let f = self.active();
            let e = f.e * self.r;
            let m = f.m * f.k * self.scale as u64;
            let n = make_n(m, e);
            let next = StandardBloom::new(n, e)?;
            self.filters.push_back(next);
        }
        let last = self.filters.len() - 1;
        self.filters[last].probe(hv);
        Ok(())
    }
    pub fn find(&self, hv: u64) -> bool {
        self.filters.iter().rev().any(|f| f.find(hv))
    }
    /// Number of chained filters
    pub fn depth(&self) -> usize {
        self.filters.len()
    }
    pub fn len(&self) -> u64 {
        self.filters.iter().map(StandardBloom::len).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ScalableBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalableBloom")
            .field("filters", &self.filters.len())
            .field("scale", &self.scale)
            .field("r", &self.r)
            .field("n", &self.n)
            .field("e", &self.e)
            .finish()
    }
}

impl PartialEq for ScalableBloom {
    fn eq(&self, other: &Self) -> bool {
        okay!(
            self.filters.len() == other.filters.len(),
            self.scale == other.scale,
            (self.r - other.r).abs() <= F64_EPSILON,
            self.filters
                .iter()
                .zip(other.filters.iter())
                .all(|(a, b)| a == b),
        )
    }
}

impl fmt::Display for ScalableBloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scalable-bloom: {} filters (scale {}, err tightening factor {:.4})",
            self.filters.len(),
            self.scale,
            self.r
        )?;
        for (i, flt) in self.filters.iter().enumerate() {
            writeln!(f, "    [{i:02}] {flt}")?;
        }
        Ok(())
    }
}

/// Any of the three bloom flavors behind one face; this is what the marshal
/// framework reads and writes
pub enum Bloom {
    Standard(StandardBloom),
    Counting(CountingBloom),
    Scalable(ScalableBloom),
}

impl Bloom {
    pub fn standard(n: u64, e: f64) -> RuntimeResult<Self> {
        StandardBloom::new(n, e).map(Self::Standard)
    }
    pub fn counting(n: u64, e: f64) -> RuntimeResult<Self> {
        CountingBloom::new(n, e).map(Self::Counting)
    }
    pub fn scalable(n: u64, e: f64) -> RuntimeResult<Self> {
        ScalableBloom::new(n, e).map(Self::Scalable)
    }
    pub fn probe(&mut self, hv: u64) -> RuntimeResult<()> {
        match self {
            Self::Standard(f) => {
                f.probe(hv);
                Ok(())
            }
            Self::Counting(f) => {
                f.probe(hv);
                Ok(())
            }
            Self::Scalable(f) => f.probe(hv),
        }
    }
    pub fn find(&self, hv: u64) -> bool {
        match self {
            Self::Standard(f) => f.find(hv),
            Self::Counting(f) => f.find(hv),
            Self::Scalable(f) => f.find(hv),
        }
    }
    /// Remove is meaningful for the counting flavor only; the others
    /// cheerfully pretend it worked
    pub fn remove(&mut self, hv: u64) -> bool {
        match self {
            Self::Counting(f) => f.remove(hv),
            Self::Standard(_) | Self::Scalable(_) => true,
        }
    }
    /// The element capacity this filter was created for
    pub fn capacity(&self) -> u64 {
        match self {
            Self::Standard(f) => f.n,
            Self::Counting(f) => f.n,
            Self::Scalable(f) => f.n,
        }
    }
    /// The error rate this filter was created for
    pub fn error_rate(&self) -> f64 {
        match self {
            Self::Standard(f) => f.e,
            Self::Counting(f) => f.e,
            Self::Scalable(f) => f.e,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard(_) => "standard-bloom",
            Self::Counting(_) => "counting-bloom",
            Self::Scalable(_) => "scalable-standard-bloom",
        }
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(x) => fmt::Debug::fmt(x, f),
            Self::Counting(x) => fmt::Debug::fmt(x, f),
            Self::Scalable(x) => fmt::Debug::fmt(x, f),
        }
    }
}

impl PartialEq for Bloom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Standard(a), Self::Standard(b)) => a == b,
            (Self::Counting(a), Self::Counting(b)) => a == b,
            (Self::Scalable(a), Self::Scalable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(x) => fmt::Display::fmt(x, f),
            Self::Counting(x) => fmt::Display::fmt(x, f),
            Self::Scalable(x) => fmt::Display::fmt(x, f),
        }
    }
}
