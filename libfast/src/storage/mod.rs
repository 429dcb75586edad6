/*
 * Created on Thu Feb 15 2024
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
    # Marshal framework

    Versioned, checksummed, cache-line-aligned on-disk formats for the
    filters in [`crate::filter`]. Writers fill an exclusive temp file
    through a writable mapping, checksum everything but the trailing digest
    and atomically rename into place; readers map the file, verify the
    checksum in constant time *before* trusting any field, then rebuild the
    filter either by copying ([`UnmarshalMode::Heap`]) or by holding onto
    the mapping ([`UnmarshalMode::Mapped`], zero copy; the map lives as
    long as the filter does).
*/

mod bloom;
pub mod checksum;
mod interface;
mod xor;
#[cfg(test)]
mod tests;

pub use self::{
    bloom::{bloom_marshal, bloom_marshal_with, bloom_unmarshal},
    xor::{xor_marshal, xor_unmarshal},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How unmarshal materializes filter bodies
pub enum UnmarshalMode {
    /// Copy the body out of the file into private heap memory
    Heap,
    /// Keep a shared read-only mapping and read the body in place. Mutating
    /// a filter loaded this way (bloom `probe`/`remove`) promotes the body
    /// to a private copy first
    Mapped,
}
