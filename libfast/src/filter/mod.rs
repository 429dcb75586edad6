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
    # Approximate membership filters

    Partitioned bloom filters (standard, counting and scalable flavors) and
    xor filters (8 and 16-bit fingerprints). None of them hash your keys:
    callers supply a well mixed 64-bit hash and the filters work on top of
    that, folding in a per-instance random salt so that independent filter
    instances disagree about their false positives.

    Both families marshal to a checksummed on-disk format; see
    [`crate::storage`].
*/

pub mod bloom;
pub mod xor;
#[cfg(test)]
mod tests;

pub use {
    bloom::{Bloom, CountingBloom, ScalableBloom, StandardBloom},
    xor::{Fingerprint, Xor16, Xor8, XorFilter},
};

use crate::idx::mix64;

/// fasthash64 (Zilong Tan) tuned for exactly one round and one 64-bit word,
/// with the instance salt xored into the output
#[inline(always)]
pub(crate) const fn hash_val(v: u64, salt: u64) -> u64 {
    const M: u64 = 0x880355f21e6d1965;
    let mut h = M.wrapping_mul(8);
    h ^= mix64(v);
    h = h.wrapping_mul(M);
    mix64(h) ^ salt
}
