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
    Bloom on-disk format (little endian throughout)
    ---
    - 64B header:
        - magic "BLOM" (4B)
        - version (1B, = 0)
        - filter type (1B: counting = 0, standard = 1, scalable = 2)
        - hash family (1B, = 0: one round of fasthash64)
        - checksum algorithm (1B: sha256 = 0, blake2b = 1)
        - expected element count n (8B)
        - target error rate e (8B, IEEE-754 bits)
        - marshalled size excluding the checksum tail (8B)
        - zero padding to 64B
    - directory:
        - filter count (4B; 1 for the non-scalable flavors)
        - scale (4B; 0 for the non-scalable flavors)
        - tightening ratio r (8B; 0 bits for the non-scalable flavors)
        - filter count x filter-header offsets (8B each)
    - per filter, cache line aligned:
        - 40B header: m, k, salt, size, bmsize (8B each)
        - the body, again cache line aligned, bmsize bytes
    - trailing checksum (32B) over everything above
*/

use {
    super::{
        checksum::{ct_eq, Checksummer, ChecksumKind, CHECKSUM_SIZE},
        interface::{open_mapped, AtomicMappedFile},
        UnmarshalMode,
    },
    crate::{
        error::{Error, RuntimeResult},
        filter::bloom::{
            make_e, make_n, Bloom, CountingBloom, ScalableBloom, SlotStore, StandardBloom, SCALE,
        },
        mem::{align_up_u64, unsafe_apis::memcpy, TVec},
        util::{compiler::TaggedEnum, os::CACHE_LINE},
    },
    core::ops::Range,
    log::warn,
    std::path::Path,
};

const MAGIC: [u8; 4] = *b"BLOM";
const VERSION: u8 = 0;
/// one round of fasthash64 over one word; the only family we speak
const HASH_FASTHALF: u8 = 0;
const HDR_SIZE: u64 = 64;
const DIR_FIXED: u64 = 16;
const FILT_HDR_SIZE: u64 = 40;
const CLINE: u64 = CACHE_LINE as u64;
/// sanity cap on the filter count of a scalable directory
const MAX_FILTERS: u32 = 1 << 20;

const SEG_MAGIC: Range<usize> = 0..4;
const OFF_VERSION: usize = 4;
const OFF_TYPE: usize = 5;
const OFF_HASH: usize = 6;
const OFF_CKSUM: usize = 7;
const SEG_N: Range<usize> = 8..16;
const SEG_E: Range<usize> = 16..24;
const SEG_MSIZE: Range<usize> = 24..32;
const OFF_DIR: usize = HDR_SIZE as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum BloomType {
    Counting = 0,
    Standard = 1,
    Scalable = 2,
}

impl TaggedEnum for BloomType {
    type Dscr = u8;
    const MAX_DSCR: u8 = 2;
    fn dscr(&self) -> u8 {
        *self as u8
    }
    unsafe fn from_raw(d: u8) -> Self {
        core::mem::transmute(d)
    }
}

impl BloomType {
    fn of(b: &Bloom) -> Self {
        match b {
            Bloom::Counting(_) => Self::Counting,
            Bloom::Standard(_) => Self::Standard,
            Bloom::Scalable(_) => Self::Scalable,
        }
    }
}

// the marshal view of one concrete filter
struct FilterView<'a> {
    m: u64,
    k: u64,
    salt: u64,
    size: u64,
    bytes: &'a [u8],
}

impl<'a> FilterView<'a> {
    fn of_standard(f: &'a StandardBloom) -> Self {
        Self {
            m: f.m,
            k: f.k,
            salt: f.salt,
            size: f.size,
            bytes: f.bitmap.bytes(),
        }
    }
    fn collect(b: &'a Bloom) -> Vec<Self> {
        match b {
            Bloom::Standard(f) => vec![Self::of_standard(f)],
            Bloom::Counting(f) => vec![Self {
                m: f.m,
                k: f.k,
                salt: f.salt,
                size: f.size,
                bytes: f.counters.bytes(),
            }],
            Bloom::Scalable(sb) => sb.filters.iter().map(Self::of_standard).collect(),
        }
    }
}

#[derive(Clone, Copy)]
struct OffPair {
    hdr: u64,
    data: u64,
}

/// Walk the layout: header, directory, then per filter a 40B header and a
/// cache line aligned body, everything padded back up to a cache line.
/// Returns the payload size (checksum excluded) and the offset table
fn calc_offsets(views: &[FilterView<'_>]) -> (u64, Vec<OffPair>) {
    let mut sz = HDR_SIZE + DIR_FIXED + views.len() as u64 * 8;
    sz = align_up_u64(sz, CLINE);
    let mut offs = Vec::with_capacity(views.len());
    for v in views {
        let hdr = sz;
        sz = align_up_u64(hdr + FILT_HDR_SIZE, CLINE);
        let data = sz;
        sz = align_up_u64(data + v.bytes.len() as u64, CLINE);
        offs.push(OffPair { hdr, data });
    }
    (sz, offs)
}

fn pu32(b: &mut [u8], off: usize, v: u32) {
    b[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn pu64(b: &mut [u8], off: usize, v: u64) {
    b[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

fn gu32(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(unsafe {
        // UNSAFE(@ohsayan): callers bounds-check off + 4
        memcpy(&b[off..off + 4])
    })
}

fn gu64(b: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(unsafe {
        // UNSAFE(@ohsayan): callers bounds-check off + 8
        memcpy(&b[off..off + 8])
    })
}

/// Marshal `b` into `path` (SHA-256 checksum)
pub fn bloom_marshal(b: &Bloom, path: impl AsRef<Path>) -> RuntimeResult<()> {
    bloom_marshal_with(b, path, ChecksumKind::Sha256)
}

/// Marshal `b` into `path` under the given checksum algorithm. The file
/// appears atomically or not at all
pub fn bloom_marshal_with(
    b: &Bloom,
    path: impl AsRef<Path>,
    kind: ChecksumKind,
) -> RuntimeResult<()> {
    let views = FilterView::collect(b);
    let (dsize, offs) = calc_offsets(&views);
    let mut mf = AtomicMappedFile::create(path.as_ref(), dsize + CHECKSUM_SIZE as u64)?;
    let buf = mf.bytes_mut();
    // header
    buf[SEG_MAGIC].copy_from_slice(&MAGIC);
    buf[OFF_VERSION] = VERSION;
    buf[OFF_TYPE] = BloomType::of(b).dscr();
    buf[OFF_HASH] = HASH_FASTHALF;
    buf[OFF_CKSUM] = kind.dscr();
    pu64(buf, SEG_N.start, b.capacity());
    pu64(buf, SEG_E.start, b.error_rate().to_bits());
    pu64(buf, SEG_MSIZE.start, dsize);
    // directory
    let (count, scale, r) = match b {
        Bloom::Scalable(sb) => (sb.filters.len() as u32, sb.scale, sb.r),
        _ => (1, 0, 0.0),
    };
    pu32(buf, OFF_DIR, count);
    pu32(buf, OFF_DIR + 4, scale);
    pu64(buf, OFF_DIR + 8, r.to_bits());
    for (i, o) in offs.iter().enumerate() {
        pu64(buf, OFF_DIR + DIR_FIXED as usize + i * 8, o.hdr);
    }
    // filter headers and bodies
    for (v, o) in views.iter().zip(offs.iter()) {
        let hdr = o.hdr as usize;
        pu64(buf, hdr, v.m);
        pu64(buf, hdr + 8, v.k);
        pu64(buf, hdr + 16, v.salt);
        pu64(buf, hdr + 24, v.size);
        pu64(buf, hdr + 32, v.bytes.len() as u64);
        buf[o.data as usize..o.data as usize + v.bytes.len()].copy_from_slice(v.bytes);
    }
    // checksum over everything written so far
    let mut ck = Checksummer::new(kind);
    ck.update(&buf[..dsize as usize]);
    let sum = ck.finish();
    buf[dsize as usize..].copy_from_slice(&sum);
    mf.publish()
}

/// Unmarshal a bloom filter from `path`, verifying the checksum before any
/// field is believed
pub fn bloom_unmarshal(path: impl AsRef<Path>, mode: UnmarshalMode) -> RuntimeResult<Bloom> {
    let path = path.as_ref();
    let map = open_mapped(path)?;
    let total = map.len();
    if total < (HDR_SIZE + DIR_FIXED) as usize + CHECKSUM_SIZE {
        return Err(Error::CorruptData);
    }
    // byte 7 is the checksum tag; it has to be read before verification
    // (chicken and egg), everything else only after
    let kind = ChecksumKind::try_from_raw(map[OFF_CKSUM]).ok_or(Error::CorruptData)?;
    let dsize = total - CHECKSUM_SIZE;
    let mut ck = Checksummer::new(kind);
    ck.update(&map[..dsize]);
    if !ct_eq(&ck.finish(), &map[dsize..]) {
        warn!("bloom unmarshal: checksum mismatch in {}", path.display());
        return Err(Error::CorruptData);
    }
    if map[SEG_MAGIC] != MAGIC {
        return Err(Error::CorruptData);
    }
    if map[OFF_VERSION] != VERSION {
        return Err(Error::UnsupportedVersion);
    }
    let typ = BloomType::try_from_raw(map[OFF_TYPE]).ok_or(Error::CorruptData)?;
    if map[OFF_HASH] != HASH_FASTHALF {
        return Err(Error::CorruptData);
    }
    let n = gu64(&map, SEG_N.start);
    let e = f64::from_bits(gu64(&map, SEG_E.start));
    if gu64(&map, SEG_MSIZE.start) != dsize as u64 {
        return Err(Error::CorruptData);
    }
    // directory
    let count = gu32(&map, OFF_DIR);
    let scale = gu32(&map, OFF_DIR + 4);
    let r = f64::from_bits(gu64(&map, OFF_DIR + 8));
    let dir_end = OFF_DIR + DIR_FIXED as usize;
    let offs: Vec<OffPair> = match typ {
        BloomType::Scalable => {
            if count > MAX_FILTERS {
                return Err(Error::TooLarge);
            }
            if count == 0 || scale == 0 {
                return Err(Error::CorruptData);
            }
            if (dsize - dir_end) as u64 / 8 < count as u64 {
                return Err(Error::CorruptData);
            }
            (0..count as usize)
                .map(|i| decode_offpair(gu64(&map, dir_end + i * 8), dsize as u64))
                .collect::<RuntimeResult<_>>()?
        }
        _ => {
            if count != 1 {
                return Err(Error::CorruptData);
            }
            vec![decode_offpair(gu64(&map, dir_end), dsize as u64)?]
        }
    };
    // rebuild the concrete filters
    let mut filters = Vec::with_capacity(offs.len());
    for o in &offs {
        let hdr = o.hdr as usize;
        let m = gu64(&map, hdr);
        let k = gu64(&map, hdr + 8);
        let salt = gu64(&map, hdr + 16);
        let size = gu64(&map, hdr + 24);
        let bmsize = gu64(&map, hdr + 32);
        if m == 0 || k == 0 {
            return Err(Error::CorruptData);
        }
        match o.data.checked_add(bmsize) {
            Some(end) if end <= dsize as u64 => {}
            _ => return Err(Error::CorruptData),
        }
        // the body must cover every slot the geometry implies
        let slots = m.checked_mul(k).ok_or(Error::CorruptData)?;
        let enough = match typ {
            BloomType::Counting => bmsize >= slots,
            _ => bmsize.checked_mul(8).ok_or(Error::CorruptData)? >= slots,
        };
        if !enough {
            return Err(Error::CorruptData);
        }
        let body = o.data as usize..(o.data + bmsize) as usize;
        let store = match mode {
            UnmarshalMode::Heap => SlotStore::Owned(map[body].to_vec().into_boxed_slice()),
            UnmarshalMode::Mapped => SlotStore::Mapped {
                map: map.clone(),
                off: body.start,
                len: bmsize as usize,
            },
        };
        filters.push((m, k, salt, size, store));
    }
    Ok(match typ {
        BloomType::Standard => {
            let (m, k, salt, size, bitmap) = filters.pop().unwrap();
            Bloom::Standard(StandardBloom {
                m,
                k,
                salt,
                size,
                e,
                n,
                bitmap,
            })
        }
        BloomType::Counting => {
            let (m, k, salt, size, counters) = filters.pop().unwrap();
            Bloom::Counting(CountingBloom {
                m,
                k,
                salt,
                size,
                e,
                n,
                counters,
            })
        }
        BloomType::Scalable => {
            let chain: TVec<StandardBloom> = filters
                .into_iter()
                .map(|(m, k, salt, size, bitmap)| {
                    let fe = make_e(k);
                    StandardBloom {
                        m,
                        k,
                        salt,
                        size,
                        e: fe,
                        n: make_n(m * k, fe),
                        bitmap,
                    }
                })
                .collect();
            Bloom::Scalable(ScalableBloom {
                filters: chain,
                scale,
                r,
                n,
                e,
            })
        }
    })
}

fn decode_offpair(hdr: u64, dsize: u64) -> RuntimeResult<OffPair> {
    let hdr_end = hdr.checked_add(FILT_HDR_SIZE).ok_or(Error::CorruptData)?;
    if hdr_end > dsize {
        return Err(Error::CorruptData);
    }
    let data = align_up_u64(hdr_end, CLINE);
    if data > dsize {
        return Err(Error::CorruptData);
    }
    Ok(OffPair { hdr, data })
}

// keep the wire constants honest
const _: () = {
    assert!(SCALE == 2);
    assert!(HDR_SIZE as usize == OFF_DIR);
};
