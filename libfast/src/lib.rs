/*
 * Created on Sun Feb 04 2024
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
    # libfast

    A library of reusable, interlocking systems primitives: region based memory
    management, intrusive containers, lock-free bounded queues, hash tables keyed
    by caller supplied 64-bit hashes, approximate membership filters (bloom and
    xor) with a checksummed on-disk format, and a family of xorshift PRNGs.

    Except for the queues in [`sync`], nothing here is thread safe; callers
    serialise access themselves. Nothing here locks.
*/

#[macro_use]
mod macros;
pub mod error;
pub mod filter;
pub mod idx;
pub mod mem;
pub mod rand;
pub mod storage;
pub mod sync;
mod util;

pub use error::{Error, RuntimeResult};
