/*
 * Created on Fri Feb 16 2024
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

/*
    Xor filter on-disk format (little endian throughout)
    ---
    - header:
        - magic "XORF" (4B)
        - version (1B, = 1)
        - width flag (1B: 0 = 8-bit, 1 = 16-bit)
        - reserved (2B)
        - seed (8B)
        - size (4B)
        - n (4B)
    - padding to one VM page (so the body can be used straight out of a
      mapping)
    - fingerprint cells
    - trailing SHA-256 (32B) over the total file size (8B, little endian)
      followed by everything above
*/

use {
    super::{
        checksum::{ct_eq, CHECKSUM_SIZE},
        interface::{open_mapped, AtomicMappedFile},
        UnmarshalMode,
    },
    crate::{
        error::{Error, RuntimeResult},
        filter::xor::{FpStore, Fingerprint, XorFilter},
        mem::unsafe_apis::memcpy,
        util::os::page_size,
    },
    log::warn,
    sha2::{Digest, Sha256},
    std::path::Path,
};

const MAGIC: [u8; 4] = *b"XORF";
const VERSION: u8 = 1;
const OFF_VERSION: usize = 4;
const OFF_WIDTH: usize = 5;
const OFF_SEED: usize = 8;
const OFF_SIZE: usize = 16;
const OFF_N: usize = 20;

fn file_digest(total: u64, payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let mut h = Sha256::new();
    h.update(total.to_le_bytes());
    h.update(payload);
    h.finalize().into()
}

/// Marshal `x` into `path`. The body starts on a page boundary; the file
/// appears atomically or not at all
pub fn xor_marshal<F: Fingerprint>(x: &XorFilter<F>, path: impl AsRef<Path>) -> RuntimeResult<()> {
    let pg = page_size();
    let xsz = x.byte_size() as usize;
    let total = (pg + xsz + CHECKSUM_SIZE) as u64;
    let mut mf = AtomicMappedFile::create(path.as_ref(), total)?;
    let buf = mf.bytes_mut();
    buf[0..4].copy_from_slice(&MAGIC);
    buf[OFF_VERSION] = VERSION;
    buf[OFF_WIDTH] = F::WIDTH_FLAG;
    buf[OFF_SEED..OFF_SEED + 8].copy_from_slice(&x.seed.to_le_bytes());
    buf[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&x.size.to_le_bytes());
    buf[OFF_N..OFF_N + 4].copy_from_slice(&x.n.to_le_bytes());
    x.write_cells(&mut buf[pg..pg + xsz]);
    let sum = file_digest(total, &buf[..pg + xsz]);
    buf[pg + xsz..].copy_from_slice(&sum);
    mf.publish()
}

/// Unmarshal a filter of fingerprint width `F` from `path`. Asking for the
/// wrong width is an [`Error::InvalidArgument`]; everything else that does
/// not add up is corruption
pub fn xor_unmarshal<F: Fingerprint>(
    path: impl AsRef<Path>,
    mode: UnmarshalMode,
) -> RuntimeResult<XorFilter<F>> {
    let path = path.as_ref();
    let pg = page_size();
    let map = open_mapped(path)?;
    let total = map.len();
    if total < pg + CHECKSUM_SIZE {
        return Err(Error::CorruptData);
    }
    let sum = file_digest(total as u64, &map[..total - CHECKSUM_SIZE]);
    if !ct_eq(&sum, &map[total - CHECKSUM_SIZE..]) {
        warn!("xor unmarshal: checksum mismatch in {}", path.display());
        return Err(Error::CorruptData);
    }
    if map[0..4] != MAGIC {
        return Err(Error::CorruptData);
    }
    if map[OFF_VERSION] != VERSION {
        return Err(Error::UnsupportedVersion);
    }
    if map[OFF_WIDTH] != F::WIDTH_FLAG {
        // a valid file, but not the width the caller asked for
        return Err(Error::InvalidArgument);
    }
    let seed = u64::from_le_bytes(unsafe {
        // UNSAFE(@ohsayan): in bounds per the minimum size check
        memcpy(&map[OFF_SEED..OFF_SEED + 8])
    });
    let size = u32::from_le_bytes(unsafe {
        // UNSAFE(@ohsayan): in bounds per the minimum size check
        memcpy(&map[OFF_SIZE..OFF_SIZE + 4])
    });
    let n = u32::from_le_bytes(unsafe {
        // UNSAFE(@ohsayan): in bounds per the minimum size check
        memcpy(&map[OFF_N..OFF_N + 4])
    });
    if size as usize != XorFilter::<F>::calc_size(n as usize) {
        return Err(Error::CorruptData);
    }
    let xsz = 3 * size as usize * F::BYTES;
    if total - CHECKSUM_SIZE < pg + xsz {
        return Err(Error::CorruptData);
    }
    let fp = match mode {
        UnmarshalMode::Heap => {
            let body = &map[pg..pg + xsz];
            FpStore::Owned(
                (0..3 * size as usize)
                    .map(|i| F::from_le(&body[i * F::BYTES..]))
                    .collect(),
            )
        }
        UnmarshalMode::Mapped => FpStore::Mapped {
            map: map.clone(),
            off: pg,
        },
    };
    Ok(XorFilter { seed, size, n, fp })
}
