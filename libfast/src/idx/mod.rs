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
    # Hash tables

    Two open tables keyed by caller supplied 64-bit hashes: [`BagMap`]
    chains fixed-width bags of nodes off each bucket, [`OhtMap`] keeps
    8-wide inline buckets with a linearly probed overflow zone. Both fold a
    per-instance random seed into bucket selection (and draw a fresh one on
    every doubling) so that no two table instances share a placement, and
    both accept a [`crate::mem::MemoryDriver`] to pick their allocation
    strategy.

    Neither table is thread safe.
*/

pub mod bag;
pub mod oht;
#[cfg(test)]
mod tests;

pub use {bag::BagMap, oht::OhtMap};

/// Doubling threshold: grow when `100 * fill / size` crosses this
pub(crate) const FILL_PCT: u64 = 75;

/// Compression function from fasthash (Zilong Tan)
#[inline(always)]
pub(crate) const fn mix64(mut h: u64) -> u64 {
    h ^= h >> 23;
    h = h.wrapping_mul(0x2127599bf4325c37);
    h ^= h >> 47;
    h
}

/// One round of fasthash64 folding the instance seed into the key hash, so
/// each table gets an independent placement
#[inline(always)]
pub(crate) const fn seed_fold(k: u64, seed: u64) -> u64 {
    const M: u64 = 0x880355f21e6d1965;
    let mut h = M.wrapping_mul(8);
    h ^= mix64(k);
    h = h.wrapping_mul(M);
    h ^= mix64(seed);
    h.wrapping_mul(M)
}

/// One non-zero word of table seed entropy
pub(crate) fn seed64() -> u64 {
    use rand::RngCore;
    rand::rngs::OsRng.next_u64()
}
