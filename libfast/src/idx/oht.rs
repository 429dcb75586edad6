/*
 * Created on Sun Feb 11 2024
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
    # Open-addressed table with an overflow zone

    The primary array holds [`BUCKET_WIDTH`] inline `{hash, value}` entries
    per bucket. When a bucket fills up, entries land in a secondary overflow
    array which is probed linearly from the mixed start position *to its
    end* (no wrap-around). The hash value **zero is reserved**: it marks a
    free (or deleted) slot, so callers must map it away before probing;
    debug builds assert on it.
*/

use {
    super::{seed64, FILL_PCT},
    crate::{
        error::{Error, RuntimeResult},
        mem::{MemoryDriver, SysDriver, SCALAR_ALIGN},
    },
    core::{mem, mem::MaybeUninit, ptr, ptr::NonNull},
};

/// Inline entries per primary bucket
pub const BUCKET_WIDTH: usize = 8;
const MIN_OVF: u64 = 128;
const DEFAULT_SIZE: u64 = 1024;

#[repr(C)]
struct Ent<V> {
    h: u64,
    v: MaybeUninit<V>,
}

#[repr(C)]
struct OhtBucket<V> {
    a: [Ent<V>; BUCKET_WIDTH],
    n: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OhtMetrics {
    splits: u32,
    max_bucket: u32,
}

impl OhtMetrics {
    /// Number of times the primary array doubled
    pub fn splits(&self) -> u32 {
        self.splits
    }
    /// Most entries ever resident in one primary bucket
    pub fn max_bucket(&self) -> u32 {
        self.max_bucket
    }
}

enum Probe<V> {
    Present(*mut Ent<V>),
    Free {
        slot: *mut Ent<V>,
        in_ovf: bool,
        bucket: *mut OhtBucket<V>,
    },
    Exhausted,
}

/// The overflow table, keyed directly by non-zero 64-bit hash values
pub struct OhtMap<V, M: MemoryDriver = SysDriver> {
    b: *mut OhtBucket<V>,
    ovf: *mut Ent<V>,
    n: u64,
    novf: u64,
    seed: u64,
    nodes: u64,
    fill: u64,
    povf: u64,
    metrics: OhtMetrics,
    driver: M,
}

impl<V> OhtMap<V, SysDriver> {
    pub fn new() -> RuntimeResult<Self> {
        Self::with_capacity_in(DEFAULT_SIZE as usize, SysDriver)
    }
    pub fn with_capacity(n: usize) -> RuntimeResult<Self> {
        Self::with_capacity_in(n, SysDriver)
    }
}

impl<V, M: MemoryDriver> OhtMap<V, M> {
    pub fn with_capacity_in(n: usize, driver: M) -> RuntimeResult<Self> {
        let size = if n == 0 {
            DEFAULT_SIZE
        } else {
            (n as u64).next_power_of_two()
        };
        let novf = Self::ovf_len(size);
        let b = Self::alloc_primary(&driver, size).ok_or(Error::OutOfMemory)?;
        let ovf = match Self::alloc_ovf(&driver, novf) {
            Some(ovf) => ovf,
            None => {
                unsafe {
                    // UNSAFE(@ohsayan): primary was just allocated by us
                    driver.free(NonNull::new_unchecked(b as *mut u8));
                }
                return Err(Error::OutOfMemory);
            }
        };
        Ok(Self {
            b,
            ovf,
            n: size,
            novf,
            seed: seed64(),
            nodes: 0,
            fill: 0,
            povf: 0,
            metrics: OhtMetrics::default(),
            driver,
        })
    }
    fn ovf_len(n: u64) -> u64 {
        (n / 16).max(MIN_OVF)
    }
    /// Live entries
    pub fn len(&self) -> u64 {
        self.nodes
    }
    pub fn is_empty(&self) -> bool {
        self.nodes == 0
    }
    /// Primary bucket count; always a power of two
    pub fn capacity(&self) -> u64 {
        self.n
    }
    /// Occupied primary buckets
    pub fn occupied(&self) -> u64 {
        self.fill
    }
    /// Live entries currently parked in the overflow zone
    pub fn overflow_live(&self) -> u64 {
        self.povf
    }
    pub fn metrics(&self) -> &OhtMetrics {
        &self.metrics
    }
    /// Insert `(h, v)` unless `h` is already present. `h` must be non-zero.
    /// Returns `(true, existing)` when found (the supplied value is
    /// dropped), `(false, inserted)` otherwise
    pub fn probe(&mut self, h: u64, v: V) -> RuntimeResult<(bool, &mut V)> {
        debug_assert_ne!(h, 0, "the zero hash is the free-slot marker");
        let mut v = Some(v);
        loop {
            match self.locate(h) {
                Probe::Present(x) => {
                    return Ok((true, unsafe {
                        // UNSAFE(@ohsayan): live entry
                        (*x).v.assume_init_mut()
                    }))
                }
                Probe::Free {
                    slot,
                    in_ovf,
                    bucket,
                } => unsafe {
                    // UNSAFE(@ohsayan): free slot inside arrays we own
                    (*slot).h = h;
                    (*slot).v.write(v.take().unwrap());
                    self.nodes += 1;
                    if in_ovf {
                        self.povf += 1;
                    } else {
                        (*bucket).n += 1;
                        if (*bucket).n == 1 {
                            self.fill += 1;
                        }
                        if (*bucket).n > self.metrics.max_bucket {
                            self.metrics.max_bucket = (*bucket).n;
                        }
                    }
                    let mut cur = slot;
                    if (self.fill * 100) / self.n > FILL_PCT {
                        self.resize()?;
                        self.metrics.splits += 1;
                        // the entry moved with the rebuild
                        match self.locate(h) {
                            Probe::Present(x) => cur = x,
                            _ => unreachable!("entry lost across resize"),
                        }
                    }
                    return Ok((false, (*cur).v.assume_init_mut()));
                },
                Probe::Exhausted => {
                    // neither the bucket nor the overflow tail had room
                    self.resize()?;
                    self.metrics.splits += 1;
                }
            }
        }
    }
    pub fn find(&self, h: u64) -> Option<&V> {
        debug_assert_ne!(h, 0, "the zero hash is the free-slot marker");
        match self.locate(h) {
            Probe::Present(x) => Some(unsafe {
                // UNSAFE(@ohsayan): live entry
                (*x).v.assume_init_ref()
            }),
            _ => None,
        }
    }
    pub fn find_mut(&mut self, h: u64) -> Option<&mut V> {
        debug_assert_ne!(h, 0, "the zero hash is the free-slot marker");
        match self.locate(h) {
            Probe::Present(x) => Some(unsafe {
                // UNSAFE(@ohsayan): live entry, unique borrow via &mut self
                (*x).v.assume_init_mut()
            }),
            _ => None,
        }
    }
    pub fn contains(&self, h: u64) -> bool {
        self.find(h).is_some()
    }
    /// Remove `h`, handing the value back. The slot's hash reverts to the
    /// zero marker
    pub fn remove(&mut self, h: u64) -> Option<V> {
        debug_assert_ne!(h, 0, "the zero hash is the free-slot marker");
        match self.locate(h) {
            Probe::Present(x) => unsafe {
                // UNSAFE(@ohsayan): live entry being vacated
                let v = (*x).v.assume_init_read();
                (*x).h = 0;
                self.nodes -= 1;
                if self.in_ovf(x) {
                    self.povf -= 1;
                } else {
                    let b = self.bucket_of_slot(x);
                    (*b).n -= 1;
                    if (*b).n == 0 {
                        self.fill -= 1;
                    }
                }
                Some(v)
            },
            _ => None,
        }
    }
    fn locate(&self, h: u64) -> Probe<V> {
        unsafe {
            // UNSAFE(@ohsayan): masked/bounded walks over arrays we own
            let b = self.b.add(((h ^ self.seed) & (self.n - 1)) as usize);
            let mut free: *mut Ent<V> = ptr::null_mut();
            for i in 0..BUCKET_WIDTH {
                let x = &mut (*b).a[i] as *mut Ent<V>;
                if (*x).h == h {
                    return Probe::Present(x);
                }
                if (*x).h == 0 && free.is_null() {
                    free = x;
                }
            }
            let mut in_ovf = false;
            let mut x = self.ovf.add(((h ^ self.seed) & (self.novf - 1)) as usize);
            let end = self.ovf.add(self.novf as usize);
            while x < end {
                if (*x).h == h {
                    return Probe::Present(x);
                }
                if (*x).h == 0 && free.is_null() {
                    free = x;
                    in_ovf = true;
                }
                x = x.add(1);
            }
            if free.is_null() {
                Probe::Exhausted
            } else {
                Probe::Free {
                    slot: free,
                    in_ovf,
                    bucket: b,
                }
            }
        }
    }
    unsafe fn in_ovf(&self, x: *mut Ent<V>) -> bool {
        x >= self.ovf && x < self.ovf.add(self.novf as usize)
    }
    unsafe fn bucket_of_slot(&self, x: *mut Ent<V>) -> *mut OhtBucket<V> {
        let off = (x as usize) - (self.b as usize);
        self.b.add(off / sizeof!(OhtBucket<V>))
    }
    /// Rebuild into a doubled primary array (re-doubling if the rebuild
    /// itself runs out of room) under a fresh seed
    fn resize(&mut self) -> RuntimeResult<()> {
        let mut nsize = self.n * 2;
        loop {
            if self.try_rebuild(nsize)? {
                return Ok(());
            }
            nsize *= 2;
        }
    }
    fn try_rebuild(&mut self, nsize: u64) -> RuntimeResult<bool> {
        let nseed = seed64();
        let novf = Self::ovf_len(nsize);
        let nb = Self::alloc_primary(&self.driver, nsize).ok_or(Error::OutOfMemory)?;
        let novf_arr = match Self::alloc_ovf(&self.driver, novf) {
            Some(a) => a,
            None => {
                unsafe {
                    // UNSAFE(@ohsayan): fresh primary being discarded
                    self.driver.free(NonNull::new_unchecked(nb as *mut u8));
                }
                return Err(Error::OutOfMemory);
            }
        };
        let mut fill = 0u64;
        let mut povf = 0u64;
        let mut max_bucket = 0u32;
        let mut place = |h: u64, src: *mut Ent<V>| -> bool {
            unsafe {
                // UNSAFE(@ohsayan): masked/bounded placement into fresh arrays
                let bucket = nb.add(((h ^ nseed) & (nsize - 1)) as usize);
                for i in 0..BUCKET_WIDTH {
                    let x = &mut (*bucket).a[i] as *mut Ent<V>;
                    if (*x).h == 0 {
                        (*x).h = h;
                        ptr::copy_nonoverlapping(&(*src).v, &mut (*x).v, 1);
                        (*bucket).n += 1;
                        if (*bucket).n == 1 {
                            fill += 1;
                        }
                        if (*bucket).n > max_bucket {
                            max_bucket = (*bucket).n;
                        }
                        return true;
                    }
                }
                let mut x = novf_arr.add(((h ^ nseed) & (novf - 1)) as usize);
                let end = novf_arr.add(novf as usize);
                while x < end {
                    if (*x).h == 0 {
                        (*x).h = h;
                        ptr::copy_nonoverlapping(&(*src).v, &mut (*x).v, 1);
                        povf += 1;
                        return true;
                    }
                    x = x.add(1);
                }
                false
            }
        };
        let mut ok = true;
        unsafe {
            // UNSAFE(@ohsayan): non-destructive scan of the current arrays
            'scan: {
                for i in 0..self.n as usize {
                    let bucket = self.b.add(i);
                    for j in 0..BUCKET_WIDTH {
                        let x = &mut (*bucket).a[j] as *mut Ent<V>;
                        if (*x).h != 0 && !place((*x).h, x) {
                            ok = false;
                            break 'scan;
                        }
                    }
                }
                for i in 0..self.novf as usize {
                    let x = self.ovf.add(i);
                    if (*x).h != 0 && !place((*x).h, x) {
                        ok = false;
                        break 'scan;
                    }
                }
            }
            if !ok {
                // values were only copied bitwise; the old arrays stay live
                self.driver.free(NonNull::new_unchecked(nb as *mut u8));
                self.driver
                    .free(NonNull::new_unchecked(novf_arr as *mut u8));
                return Ok(false);
            }
            // commit: old arrays go away without dropping the moved values
            self.driver.free(NonNull::new_unchecked(self.b as *mut u8));
            self.driver
                .free(NonNull::new_unchecked(self.ovf as *mut u8));
        }
        self.b = nb;
        self.ovf = novf_arr;
        self.n = nsize;
        self.novf = novf;
        self.seed = nseed;
        self.fill = fill;
        self.povf = povf;
        self.metrics.max_bucket = max_bucket;
        Ok(true)
    }
    fn alloc_primary(driver: &M, size: u64) -> Option<*mut OhtBucket<V>> {
        debug_assert!(mem::align_of::<OhtBucket<V>>() <= SCALAR_ALIGN);
        let bytes = sizeof!(OhtBucket<V>).checked_mul(size as usize)?;
        let p = driver.alloc(bytes)?.as_ptr();
        unsafe {
            // UNSAFE(@ohsayan): zeroed hash == every slot free
            ptr::write_bytes(p, 0, bytes);
        }
        Some(p as *mut OhtBucket<V>)
    }
    fn alloc_ovf(driver: &M, novf: u64) -> Option<*mut Ent<V>> {
        let bytes = sizeof!(Ent<V>).checked_mul(novf as usize)?;
        let p = driver.alloc(bytes)?.as_ptr();
        unsafe {
            // UNSAFE(@ohsayan): zeroed hash == every slot free
            ptr::write_bytes(p, 0, bytes);
        }
        Some(p as *mut Ent<V>)
    }
}

impl<V, M: MemoryDriver> Drop for OhtMap<V, M> {
    fn drop(&mut self) {
        unsafe {
            // UNSAFE(@ohsayan): final teardown; drop every live value
            for i in 0..self.n as usize {
                let bucket = self.b.add(i);
                for j in 0..BUCKET_WIDTH {
                    let x = &mut (*bucket).a[j];
                    if x.h != 0 {
                        x.v.assume_init_drop();
                    }
                }
            }
            for i in 0..self.novf as usize {
                let x = &mut *self.ovf.add(i);
                if x.h != 0 {
                    x.v.assume_init_drop();
                }
            }
            self.driver.free(NonNull::new_unchecked(self.b as *mut u8));
            self.driver
                .free(NonNull::new_unchecked(self.ovf as *mut u8));
        }
    }
}
