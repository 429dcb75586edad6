/*
 * Created on Sat Feb 10 2024
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
    # Bag-chain hash table

    Buckets hold a singly linked chain of *bags*; a bag is a fixed array of
    [`BAG_SIZE`] node pointers. Lookups touch whole bags at a time, deleted
    entries leave nil holes that the next insert reuses, and the table
    doubles (with a fresh placement seed) when more than 75% of the buckets
    are occupied. Bags emptied by removals are kept; they are only released
    on resize and drop.
*/

use {
    super::{seed64, seed_fold, FILL_PCT},
    crate::{
        error::{Error, RuntimeResult},
        mem::{MemoryDriver, SysDriver, SCALAR_ALIGN},
    },
    core::{mem, ptr, ptr::NonNull},
};

/// Nodes per bag
pub const BAG_SIZE: usize = 4;
const DEFAULT_SIZE: u64 = 128;

struct Node<K, V> {
    hash: u64,
    key: K,
    value: V,
}

struct Bag<K, V> {
    slots: [*mut Node<K, V>; BAG_SIZE],
    next: *mut Bag<K, V>,
}

struct Bucket<K, V> {
    bags: *mut Bag<K, V>,
    nitems: u32,
    nbags: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BagMetrics {
    splits: u32,
    max_bags: u32,
    max_chain: u32,
}

impl BagMetrics {
    /// Number of times the table doubled
    pub fn splits(&self) -> u32 {
        self.splits
    }
    /// Most bags ever chained off one bucket
    pub fn max_bags(&self) -> u32 {
        self.max_bags
    }
    /// Most items ever resident in one bucket
    pub fn max_chain(&self) -> u32 {
        self.max_chain
    }
}

/// The bag-chain table. `hasher` computes the caller's 64-bit hash once per
/// operation; the per-instance seed is folded in on top of it
pub struct BagMap<K, V, M: MemoryDriver = SysDriver> {
    tab: *mut Bucket<K, V>,
    size: u64,
    seed: u64,
    hasher: fn(&K) -> u64,
    nodes: u64,
    fill: u64,
    metrics: BagMetrics,
    driver: M,
}

impl<K, V> BagMap<K, V, SysDriver> {
    pub fn new(hasher: fn(&K) -> u64) -> RuntimeResult<Self> {
        Self::with_capacity_in(hasher, DEFAULT_SIZE as usize, SysDriver)
    }
    pub fn with_capacity(hasher: fn(&K) -> u64, n: usize) -> RuntimeResult<Self> {
        Self::with_capacity_in(hasher, n, SysDriver)
    }
}

impl<K, V, M: MemoryDriver> BagMap<K, V, M> {
    pub fn with_capacity_in(hasher: fn(&K) -> u64, n: usize, driver: M) -> RuntimeResult<Self> {
        let size = if n == 0 {
            DEFAULT_SIZE
        } else {
            (n as u64).next_power_of_two()
        };
        let tab = Self::alloc_table(&driver, size).ok_or(Error::OutOfMemory)?;
        Ok(Self {
            tab,
            size,
            seed: seed64(),
            hasher,
            nodes: 0,
            fill: 0,
            metrics: BagMetrics::default(),
            driver,
        })
    }
    /// Number of live nodes
    pub fn len(&self) -> u64 {
        self.nodes
    }
    pub fn is_empty(&self) -> bool {
        self.nodes == 0
    }
    /// Bucket count; always a power of two
    pub fn capacity(&self) -> u64 {
        self.size
    }
    /// Occupied buckets
    pub fn occupied(&self) -> u64 {
        self.fill
    }
    /// Percentage of occupied buckets
    pub fn fill_pct(&self) -> f64 {
        (100.0 * self.fill as f64) / self.size as f64
    }
    pub fn metrics(&self) -> &BagMetrics {
        &self.metrics
    }
    /// Insert `(key, value)` unless the key is already present. Returns
    /// `(true, existing)` when the key was found (the supplied value is
    /// dropped) and `(false, inserted)` otherwise
    pub fn probe(&mut self, key: K, value: V) -> RuntimeResult<(bool, &mut V)>
    where
        K: Eq,
    {
        let h = (self.hasher)(&key);
        let b = self.bucket_of(h, self.tab, self.size, self.seed);
        unsafe {
            // UNSAFE(@ohsayan): bucket walk over structures we own
            let mut pos: *mut *mut Node<K, V> = ptr::null_mut();
            let mut g = (*b).bags;
            while !g.is_null() {
                for slot in (*g).slots.iter_mut() {
                    let x = *slot;
                    if x.is_null() {
                        if pos.is_null() {
                            pos = slot;
                        }
                    } else if (*x).hash == h && (*x).key == key {
                        return Ok((true, &mut (*x).value));
                    }
                }
                g = (*g).next;
            }
            let node = self.node_new(h, key, value)?;
            if pos.is_null() {
                // every slot in the chain is busy: prepend a fresh bag
                match self.bag_new() {
                    Some(bag) => {
                        (*bag).slots[0] = node;
                        (*bag).next = (*b).bags;
                        (*b).bags = bag;
                        (*b).nbags += 1;
                    }
                    None => {
                        self.node_free(node);
                        return Err(Error::OutOfMemory);
                    }
                }
            } else {
                *pos = node;
            }
            (*b).nitems += 1;
            self.nodes += 1;
            let mut split = false;
            if (*b).nitems == 1 {
                self.fill += 1;
                if (self.fill * 100) / self.size > FILL_PCT {
                    self.resize()?;
                    self.metrics.splits += 1;
                    split = true;
                }
            }
            if !split {
                if (*b).nbags > self.metrics.max_bags {
                    self.metrics.max_bags = (*b).nbags;
                }
                if (*b).nitems > self.metrics.max_chain {
                    self.metrics.max_chain = (*b).nitems;
                }
            }
            // nodes move across resize by pointer, so this stays valid
            Ok((false, &mut (*node).value))
        }
    }
    pub fn find(&self, key: &K) -> Option<&V>
    where
        K: Eq,
    {
        self.lookup(key).map(|n| unsafe {
            // UNSAFE(@ohsayan): live node
            &(*n).value
        })
    }
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V>
    where
        K: Eq,
    {
        self.lookup(key).map(|n| unsafe {
            // UNSAFE(@ohsayan): live node, unique borrow via &mut self
            &mut (*n).value
        })
    }
    pub fn contains(&self, key: &K) -> bool
    where
        K: Eq,
    {
        self.lookup(key).is_some()
    }
    /// Remove `key`. The bag the node sat in is retained even if it became
    /// empty. Returns whether the key existed
    pub fn remove(&mut self, key: &K) -> bool
    where
        K: Eq,
    {
        let h = (self.hasher)(key);
        let b = self.bucket_of(h, self.tab, self.size, self.seed);
        unsafe {
            // UNSAFE(@ohsayan): bucket walk over structures we own
            let mut g = (*b).bags;
            while !g.is_null() {
                for slot in (*g).slots.iter_mut() {
                    let x = *slot;
                    if !x.is_null() && (*x).hash == h && (*x).key == *key {
                        self.node_free(x);
                        *slot = ptr::null_mut();
                        (*b).nitems -= 1;
                        if (*b).nitems == 0 {
                            self.fill -= 1;
                        }
                        self.nodes -= 1;
                        return true;
                    }
                }
                g = (*g).next;
            }
        }
        false
    }
    /// Consistency check: every node hashes back to the bucket it sits in
    /// and the node counter is exact
    pub fn verify(&self) {
        let mut n = 0;
        unsafe {
            // UNSAFE(@ohsayan): full walk over structures we own
            for i in 0..self.size {
                let b = self.tab.add(i as usize);
                let mut g = (*b).bags;
                while !g.is_null() {
                    for &x in (*g).slots.iter() {
                        if !x.is_null() {
                            n += 1;
                            let j = seed_fold((*x).hash, self.seed) & (self.size - 1);
                            assert_eq!(j, i);
                        }
                    }
                    g = (*g).next;
                }
            }
        }
        assert_eq!(n, self.nodes);
    }
    fn lookup(&self, key: &K) -> Option<*mut Node<K, V>>
    where
        K: Eq,
    {
        let h = (self.hasher)(key);
        let b = self.bucket_of(h, self.tab, self.size, self.seed);
        unsafe {
            // UNSAFE(@ohsayan): bucket walk over structures we own
            let mut g = (*b).bags;
            while !g.is_null() {
                for &x in (*g).slots.iter() {
                    if !x.is_null() && (*x).hash == h && (*x).key == *key {
                        return Some(x);
                    }
                }
                g = (*g).next;
            }
        }
        None
    }
    #[inline(always)]
    fn bucket_of(
        &self,
        h: u64,
        tab: *mut Bucket<K, V>,
        size: u64,
        seed: u64,
    ) -> *mut Bucket<K, V> {
        unsafe {
            // UNSAFE(@ohsayan): masked index is always in range
            tab.add((seed_fold(h, seed) & (size - 1)) as usize)
        }
    }
    /// Double the table under a fresh seed. Node pointers are reused; only
    /// bags and the bucket array are reallocated. The old structure is left
    /// intact until the rebuild fully succeeds
    fn resize(&mut self) -> RuntimeResult<()> {
        let nsize = self.size * 2;
        let nseed = seed64();
        let ntab = Self::alloc_table(&self.driver, nsize).ok_or(Error::OutOfMemory)?;
        let mut fill = 0;
        let mut max_bags = 0;
        let mut max_chain = 0;
        unsafe {
            // UNSAFE(@ohsayan): non-destructive walk; commit happens at the end
            for i in 0..self.size {
                let mut g = (*self.tab.add(i as usize)).bags;
                while !g.is_null() {
                    for &node in (*g).slots.iter() {
                        if node.is_null() {
                            continue;
                        }
                        let nb = self.bucket_of((*node).hash, ntab, nsize, nseed);
                        if !self.insert_quick(nb, node) {
                            self.dismantle_buckets(ntab, nsize, false);
                            return Err(Error::OutOfMemory);
                        }
                        if (*nb).nbags > max_bags {
                            max_bags = (*nb).nbags;
                        }
                        if (*nb).nitems > max_chain {
                            max_chain = (*nb).nitems;
                        }
                        if (*nb).nitems == 1 {
                            fill += 1;
                        }
                    }
                    g = (*g).next;
                }
            }
            // commit: release the old bags and table (nodes moved over)
            self.dismantle_buckets(self.tab, self.size, false);
        }
        self.tab = ntab;
        self.size = nsize;
        self.seed = nseed;
        self.fill = fill;
        self.metrics.max_bags = max_bags;
        self.metrics.max_chain = max_chain;
        Ok(())
    }
    /// Insert a live node into a bucket of a fresh table (no duplicate
    /// checks). False means a bag allocation failed
    unsafe fn insert_quick(&self, b: *mut Bucket<K, V>, node: *mut Node<K, V>) -> bool {
        let mut g = (*b).bags;
        while !g.is_null() {
            for slot in (*g).slots.iter_mut() {
                if slot.is_null() {
                    *slot = node;
                    (*b).nitems += 1;
                    return true;
                }
            }
            g = (*g).next;
        }
        let Some(bag) = self.bag_new() else {
            return false;
        };
        (*bag).slots[0] = node;
        (*bag).next = (*b).bags;
        (*b).bags = bag;
        (*b).nbags += 1;
        (*b).nitems += 1;
        true
    }
    /// Free every bag chained off `nbuckets` buckets plus the bucket array
    /// itself; nodes are released too when `free_nodes`
    unsafe fn dismantle_buckets(&self, tab: *mut Bucket<K, V>, nbuckets: u64, free_nodes: bool) {
        for i in 0..nbuckets {
            let mut g = (*tab.add(i as usize)).bags;
            while !g.is_null() {
                let next = (*g).next;
                if free_nodes {
                    for &x in (*g).slots.iter() {
                        if !x.is_null() {
                            self.node_free(x);
                        }
                    }
                }
                self.driver.free(NonNull::new_unchecked(g as *mut u8));
                g = next;
            }
        }
        self.driver
            .free(NonNull::new_unchecked(tab as *mut u8));
    }
    fn alloc_table(driver: &M, size: u64) -> Option<*mut Bucket<K, V>> {
        debug_assert!(mem::align_of::<Bucket<K, V>>() <= SCALAR_ALIGN);
        let tab = driver
            .alloc(sizeof!(Bucket<K, V>).checked_mul(size as usize)?)?
            .as_ptr() as *mut Bucket<K, V>;
        for i in 0..size as usize {
            unsafe {
                // UNSAFE(@ohsayan): in-bounds init of the fresh array
                tab.add(i).write(Bucket {
                    bags: ptr::null_mut(),
                    nitems: 0,
                    nbags: 0,
                });
            }
        }
        Some(tab)
    }
    fn node_new(&self, hash: u64, key: K, value: V) -> RuntimeResult<*mut Node<K, V>> {
        debug_assert!(mem::align_of::<Node<K, V>>() <= SCALAR_ALIGN);
        let node = self
            .driver
            .alloc(sizeof!(Node<K, V>))
            .ok_or(Error::OutOfMemory)?
            .as_ptr() as *mut Node<K, V>;
        unsafe {
            // UNSAFE(@ohsayan): fresh allocation
            node.write(Node { hash, key, value });
        }
        Ok(node)
    }
    unsafe fn node_free(&self, node: *mut Node<K, V>) {
        ptr::drop_in_place(node);
        self.driver.free(NonNull::new_unchecked(node as *mut u8));
    }
    fn bag_new(&self) -> Option<*mut Bag<K, V>> {
        let bag = self.driver.alloc(sizeof!(Bag<K, V>))?.as_ptr() as *mut Bag<K, V>;
        unsafe {
            // UNSAFE(@ohsayan): fresh allocation
            bag.write(Bag {
                slots: [ptr::null_mut(); BAG_SIZE],
                next: ptr::null_mut(),
            });
        }
        Some(bag)
    }
}

impl<K, V, M: MemoryDriver> Drop for BagMap<K, V, M> {
    fn drop(&mut self) {
        unsafe {
            // UNSAFE(@ohsayan): final teardown
            self.dismantle_buckets(self.tab, self.size, true);
        }
    }
}
