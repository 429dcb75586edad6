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

/// The alignment boundary for filter bodies inside marshalled files
pub const CACHE_LINE: usize = 64;

#[cfg(unix)]
/// Size of one VM page; xor filter bodies start on this boundary on disk
pub fn page_size() -> usize {
    let pg = unsafe {
        // UNSAFE(@ohsayan): just a sysconf lookup
        libc::sysconf(libc::_SC_PAGESIZE)
    };
    if pg <= 0 {
        4096
    } else {
        pg as usize
    }
}

#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}
