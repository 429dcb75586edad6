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

//! # Checksum utils
//!
//! The two checksum algorithms the marshal framework speaks, behind one
//! wrapper so the algorithm byte in a file header can reconstitute the
//! right digest at read time.

use {
    crate::util::compiler::TaggedEnum,
    blake2::Blake2b,
    sha2::{digest::consts::U32, Digest, Sha256},
};

type Blake2b256 = Blake2b<U32>;

/// Both algorithms are used at 32 bytes of output
pub const CHECKSUM_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// The checksum algorithm tag as it appears on disk
pub enum ChecksumKind {
    Sha256 = 0,
    Blake2b = 1,
}

impl TaggedEnum for ChecksumKind {
    type Dscr = u8;
    const MAX_DSCR: u8 = 1;
    fn dscr(&self) -> u8 {
        *self as u8
    }
    unsafe fn from_raw(d: u8) -> Self {
        core::mem::transmute(d)
    }
}

enum State {
    Sha256(Sha256),
    Blake2b(Blake2b256),
}

/// A running checksum. Every [`Checksummer::update`] also folds the chunk's
/// big-endian length into the digest, which binds chunk boundaries and is
/// good length extension hygiene
pub struct Checksummer {
    kind: ChecksumKind,
    state: State,
}

impl Checksummer {
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            kind,
            state: match kind {
                ChecksumKind::Sha256 => State::Sha256(Sha256::new()),
                ChecksumKind::Blake2b => State::Blake2b(Blake2b256::new()),
            },
        }
    }
    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }
    pub fn update(&mut self, buf: &[u8]) {
        let len = (buf.len() as u64).to_be_bytes();
        match &mut self.state {
            State::Sha256(st) => {
                st.update(buf);
                st.update(len);
            }
            State::Blake2b(st) => {
                st.update(buf);
                st.update(len);
            }
        }
    }
    pub fn finish(self) -> [u8; CHECKSUM_SIZE] {
        match self.state {
            State::Sha256(st) => st.finalize().into(),
            State::Blake2b(st) => st.finalize().into(),
        }
    }
}

/// Constant-time equality: fold the xor of every byte pair with no early
/// exit, so a mismatch's position leaks nothing through timing
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    core::hint::black_box(acc) == 0
}

#[cfg(test)]
mod tests {
    use super::{ct_eq, Checksummer, ChecksumKind, CHECKSUM_SIZE};

    #[test]
    fn deterministic_and_distinct() {
        let digest = |kind, data: &[u8]| {
            let mut ck = Checksummer::new(kind);
            ck.update(data);
            ck.finish()
        };
        let a = digest(ChecksumKind::Sha256, b"hello");
        assert_eq!(a, digest(ChecksumKind::Sha256, b"hello"));
        assert_ne!(a, digest(ChecksumKind::Sha256, b"hellp"));
        assert_ne!(a, digest(ChecksumKind::Blake2b, b"hello"));
        assert_eq!(a.len(), CHECKSUM_SIZE);
    }

    #[test]
    fn chunk_boundaries_are_bound() {
        let mut one = Checksummer::new(ChecksumKind::Sha256);
        one.update(b"ab");
        one.update(b"c");
        let mut two = Checksummer::new(ChecksumKind::Sha256);
        two.update(b"a");
        two.update(b"bc");
        assert_ne!(one.finish(), two.finish());
    }

    #[test]
    fn ct_compare() {
        assert!(ct_eq(b"same", b"same"));
        assert!(!ct_eq(b"same", b"sama"));
        assert!(!ct_eq(b"same", b"sam"));
    }
}
