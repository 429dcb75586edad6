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

use std::{fmt, io};

pub type RuntimeResult<T> = Result<T, Error>;

#[derive(Debug)]
/// Errors surfaced across the library boundary. Capacity exhaustion on the
/// queues and clamped pools is *not* an error; those paths report through
/// their return types
pub enum Error {
    /// impossible parameters (zero-size table, mis-sized MPMC ring, ...)
    InvalidArgument,
    /// the supplied region is too small to be useful
    InsufficientBuffer,
    /// bad magic, mangled header or checksum mismatch
    CorruptData,
    /// the on-disk format version (or variant) is not one we speak
    UnsupportedVersion,
    /// the backing allocator gave up
    OutOfMemory,
    /// a size field exceeds what we are willing to touch
    TooLarge,
    /// an OS level I/O failure
    Io(io::Error),
}

enum_impls! {
    Error => {
        io::Error as Io,
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (a, b) => core::mem::discriminant(a) == core::mem::discriminant(b),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InsufficientBuffer => write!(f, "insufficient buffer"),
            Self::CorruptData => write!(f, "corrupt data"),
            Self::UnsupportedVersion => write!(f, "unsupported version"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::TooLarge => write!(f, "too large"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
