/*
 * Created on Sat Feb 17 2024
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

use {
    super::{
        bloom_marshal, bloom_marshal_with, bloom_unmarshal,
        checksum::{Checksummer, ChecksumKind, CHECKSUM_SIZE},
        xor_marshal, xor_unmarshal, UnmarshalMode,
    },
    crate::{
        error::Error,
        filter::{Bloom, Xor16, Xor8},
        rand::{Random64, Xs128Plus},
    },
    std::{fs, path::Path},
};

fn corpus(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = Xs128Plus::new(seed);
    let mut v = std::collections::HashSet::with_capacity(n);
    while v.len() < n {
        v.insert(rng.next_u64());
    }
    v.into_iter().collect()
}

fn flip_byte(path: &Path, off: usize) {
    let mut raw = fs::read(path).unwrap();
    raw[off] ^= 0xff;
    fs::write(path, raw).unwrap();
}

mod bloom_files {
    use super::*;

    #[test]
    fn standard_roundtrip() {
        const E: f64 = 0.005;
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("standard.bloom");
        let keys = corpus(0xb100, 20_000);
        let (inserted, probes) = keys.split_at(10_000);
        let mut f = Bloom::standard(10_000, E).unwrap();
        for k in inserted {
            f.probe(*k).unwrap();
        }
        assert!(inserted.iter().all(|k| f.find(*k)));
        let fp = probes.iter().filter(|k| f.find(**k)).count() as f64 / probes.len() as f64;
        assert!(fp <= 2.0 * E, "fp rate {fp} over budget");
        bloom_marshal(&f, &file).unwrap();
        let g = bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap();
        assert!(f == g);
        assert!(inserted.iter().all(|k| g.find(*k)));
        let fp2 = probes.iter().filter(|k| g.find(**k)).count() as f64 / probes.len() as f64;
        assert_eq!(fp, fp2);
        // re-marshalling the loaded filter reproduces the file bit for bit
        let file2 = dir.path().join("standard2.bloom");
        bloom_marshal(&g, &file2).unwrap();
        assert_eq!(fs::read(&file).unwrap(), fs::read(&file2).unwrap());
    }

    #[test]
    fn counting_roundtrip_with_removes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("counting.bloom");
        let keys = corpus(0xc0u64, 4_096);
        let mut f = Bloom::counting(4_096, 0.01).unwrap();
        for k in &keys {
            f.probe(*k).unwrap();
        }
        for k in keys.iter().skip(1).step_by(2) {
            assert!(f.remove(*k));
        }
        for k in keys.iter().step_by(2) {
            assert!(f.find(*k));
        }
        bloom_marshal(&f, &file).unwrap();
        let g = bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap();
        assert!(f == g);
        for k in keys.iter().step_by(2) {
            assert!(g.find(*k));
        }
    }

    #[test]
    fn scalable_roundtrip_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scalable.bloom");
        let keys = corpus(0x5ca1e, 30_000);
        let mut f = Bloom::scalable(1_000, 0.01).unwrap();
        for k in &keys {
            f.probe(*k).unwrap();
        }
        bloom_marshal(&f, &file).unwrap();
        for mode in [UnmarshalMode::Heap, UnmarshalMode::Mapped] {
            let g = bloom_unmarshal(&file, mode).unwrap();
            assert!(f == g, "mismatch in {mode:?}");
            assert!(keys.iter().all(|k| g.find(*k)));
        }
    }

    #[test]
    fn mapped_filter_promotes_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("promote.bloom");
        let mut f = Bloom::standard(1_000, 0.01).unwrap();
        f.probe(11).unwrap();
        bloom_marshal(&f, &file).unwrap();
        let mut g = bloom_unmarshal(&file, UnmarshalMode::Mapped).unwrap();
        // writing through a mapped filter copies the body first
        g.probe(22).unwrap();
        assert!(g.find(11));
        assert!(g.find(22));
        // the on-disk copy is untouched
        let h = bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap();
        assert!(h == f);
    }

    #[test]
    fn blake2b_tagged_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blake.bloom");
        let mut f = Bloom::standard(1_000, 0.01).unwrap();
        f.probe(7).unwrap();
        bloom_marshal_with(&f, &file, ChecksumKind::Blake2b).unwrap();
        let g = bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap();
        assert!(f == g);
    }

    #[test]
    fn corruption_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("corrupt.bloom");
        let mut f = Bloom::standard(1_000, 0.01).unwrap();
        for k in 0..100u64 {
            f.probe(k).unwrap();
        }
        bloom_marshal(&f, &file).unwrap();
        let len = fs::read(&file).unwrap().len();
        // a flip anywhere (header, directory, body, tail) must be caught
        for off in [0, 5, 70, len / 2, len - 1] {
            let pristine = fs::read(&file).unwrap();
            flip_byte(&file, off);
            assert_eq!(
                bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap_err(),
                Error::CorruptData,
                "flip at {off} slipped through"
            );
            fs::write(&file, pristine).unwrap();
        }
        // still loadable after restoration
        assert!(bloom_unmarshal(&file, UnmarshalMode::Heap).is_ok());
    }

    #[test]
    fn version_rejected_with_valid_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("future.bloom");
        let mut f = Bloom::standard(100, 0.01).unwrap();
        f.probe(1).unwrap();
        bloom_marshal(&f, &file).unwrap();
        // bump the version byte and re-seal the file so only the version
        // check can object
        let mut raw = fs::read(&file).unwrap();
        raw[4] = 0xee;
        let dsize = raw.len() - CHECKSUM_SIZE;
        let mut ck = Checksummer::new(ChecksumKind::Sha256);
        ck.update(&raw[..dsize]);
        let sum = ck.finish();
        raw[dsize..].copy_from_slice(&sum);
        fs::write(&file, raw).unwrap();
        assert_eq!(
            bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap_err(),
            Error::UnsupportedVersion
        );
    }

    #[test]
    fn short_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.bloom");
        fs::write(&file, b"BLOM").unwrap();
        assert_eq!(
            bloom_unmarshal(&file, UnmarshalMode::Heap).unwrap_err(),
            Error::CorruptData
        );
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bloom");
        assert!(matches!(
            bloom_unmarshal(&missing, UnmarshalMode::Heap).unwrap_err(),
            Error::Io(_)
        ));
    }
}

mod xor_files {
    use super::*;

    #[test]
    fn roundtrip_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keys.xor8");
        let keys = corpus(0xf11e, 10_000);
        let f = Xor8::build(&keys).unwrap();
        assert!(keys.iter().all(|k| f.contains(*k)));
        xor_marshal(&f, &file).unwrap();
        let g: Xor8 = xor_unmarshal(&file, UnmarshalMode::Mapped).unwrap();
        assert!(f == g);
        assert!(keys.iter().all(|k| g.contains(*k)));
    }

    #[test]
    fn roundtrip_heap_16bit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keys.xor16");
        let keys = corpus(0xf12e, 5_000);
        let f = Xor16::build(&keys).unwrap();
        xor_marshal(&f, &file).unwrap();
        let g: Xor16 = xor_unmarshal(&file, UnmarshalMode::Heap).unwrap();
        assert!(f == g);
        assert!(keys.iter().all(|k| g.contains(*k)));
    }

    #[test]
    fn width_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keys.xor8");
        let f = Xor8::build(&[1, 2, 3]).unwrap();
        xor_marshal(&f, &file).unwrap();
        assert_eq!(
            xor_unmarshal::<u16>(&file, UnmarshalMode::Heap).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn corruption_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("corrupt.xor8");
        let keys = corpus(0xdead, 1_000);
        let f = Xor8::build(&keys).unwrap();
        xor_marshal(&f, &file).unwrap();
        let len = fs::read(&file).unwrap().len();
        for off in [0, 9, len / 2, len - 1] {
            let pristine = fs::read(&file).unwrap();
            flip_byte(&file, off);
            assert_eq!(
                xor_unmarshal::<u8>(&file, UnmarshalMode::Heap).unwrap_err(),
                Error::CorruptData,
                "flip at {off} slipped through"
            );
            fs::write(&file, pristine).unwrap();
        }
    }

    #[test]
    fn truncation_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("trunc.xor8");
        let keys = corpus(0xbeef, 1_000);
        let f = Xor8::build(&keys).unwrap();
        xor_marshal(&f, &file).unwrap();
        let raw = fs::read(&file).unwrap();
        fs::write(&file, &raw[..raw.len() / 2]).unwrap();
        assert_eq!(
            xor_unmarshal::<u8>(&file, UnmarshalMode::Heap).unwrap_err(),
            Error::CorruptData
        );
    }
}
