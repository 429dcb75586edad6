/*
 * Created on Wed Feb 14 2024
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
    super::{Bloom, CountingBloom, ScalableBloom, StandardBloom, Xor16, Xor8},
    crate::rand::{Random64, Xs128Plus},
};

fn corpus(rng: &mut impl Random64, n: usize) -> Vec<u64> {
    let mut v = std::collections::HashSet::with_capacity(n);
    while v.len() < n {
        v.insert(rng.next_u64());
    }
    v.into_iter().collect()
}

mod standard_bloom {
    use super::*;

    #[test]
    fn bad_params() {
        assert!(StandardBloom::new(0, 0.01).is_err());
        assert!(StandardBloom::new(100, 0.0).is_err());
        assert!(StandardBloom::new(100, 1.0).is_err());
    }

    #[test]
    fn zero_false_negatives() {
        let mut rng = Xs128Plus::new(0x5eed);
        let keys = corpus(&mut rng, 10_000);
        let mut f = StandardBloom::new(10_000, 0.005).unwrap();
        keys.iter().for_each(|k| f.probe(*k));
        assert!(keys.iter().all(|k| f.find(*k)));
        assert_eq!(f.len(), 10_000);
    }

    #[test]
    fn false_positive_rate_within_budget() {
        const E: f64 = 0.005;
        let mut rng = Xs128Plus::new(0xbad5eed);
        let keys = corpus(&mut rng, 20_000);
        let (inserted, probes) = keys.split_at(10_000);
        let mut f = StandardBloom::new(10_000, E).unwrap();
        inserted.iter().for_each(|k| f.probe(*k));
        let hits = probes.iter().filter(|k| f.find(**k)).count();
        // disjoint probes must come back mostly negative
        assert!(
            (hits as f64) / (probes.len() as f64) <= 2.0 * E,
            "fp rate {} over budget",
            (hits as f64) / (probes.len() as f64)
        );
    }

    #[test]
    fn independent_salts() {
        let a = StandardBloom::new(1000, 0.01).unwrap();
        let b = StandardBloom::new(1000, 0.01).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a, b);
    }
}

mod counting_bloom {
    use super::*;

    #[test]
    fn remove_undoes_probe() {
        let mut rng = Xs128Plus::new(0xc0);
        let keys = corpus(&mut rng, 4_096);
        let mut f = CountingBloom::new(4_096, 0.01).unwrap();
        keys.iter().for_each(|k| f.probe(*k));
        // drop every odd indexed key
        for k in keys.iter().skip(1).step_by(2) {
            assert!(f.remove(*k));
        }
        // even indexed keys must still be present
        for k in keys.iter().step_by(2) {
            assert!(f.find(*k));
        }
        assert_eq!(f.len(), (keys.len() / 2) as u64);
    }

    #[test]
    fn remove_on_absent_is_noop_per_counter() {
        let mut f = CountingBloom::new(128, 0.01).unwrap();
        f.probe(42);
        assert!(f.find(42));
        // a removal only decrements live counters
        f.remove(9000);
        assert!(f.find(42));
    }
}

mod scalable_bloom {
    use super::*;

    #[test]
    fn grows_without_losing_elements() {
        let mut rng = Xs128Plus::new(0x5ca1ab1e);
        let keys = corpus(&mut rng, 50_000);
        // deliberately undersized so the chain must grow
        let mut f = ScalableBloom::new(1_000, 0.01).unwrap();
        for k in &keys {
            f.probe(*k).unwrap();
        }
        assert!(f.depth() > 1, "expected growth past the first filter");
        assert!(keys.iter().all(|k| f.find(*k)));
    }

    #[test]
    fn facade_dispatch() {
        let mut f = Bloom::scalable(1_000, 0.01).unwrap();
        f.probe(1).unwrap();
        assert!(f.find(1));
        // remove is a polite no-op for non-counting flavors
        assert!(f.remove(1));
        assert!(f.find(1));
        assert_eq!(f.name(), "scalable-standard-bloom");
    }
}

mod xor_filter {
    use super::*;

    #[test]
    fn contains_every_key() {
        let mut rng = Xs128Plus::new(0xf00d);
        let keys = corpus(&mut rng, 10_000);
        let f = Xor8::build(&keys).unwrap();
        assert!(keys.iter().all(|k| f.contains(*k)));
        assert_eq!(f.len(), 10_000);
    }

    #[test]
    fn fp_rate_tracks_width() {
        let mut rng = Xs128Plus::new(0xfee1);
        let keys = corpus(&mut rng, 20_000);
        let (indexed, probes) = keys.split_at(10_000);
        let f8 = Xor8::build(indexed).unwrap();
        let f16 = Xor16::build(indexed).unwrap();
        let fp8 = probes.iter().filter(|k| f8.contains(**k)).count() as f64;
        let fp16 = probes.iter().filter(|k| f16.contains(**k)).count() as f64;
        // 2^-8 and 2^-16, each with generous slack
        assert!(fp8 / probes.len() as f64 <= 3.0 / 256.0);
        assert!(fp16 / probes.len() as f64 <= 3.0 / 65_536.0);
    }

    #[test]
    fn empty_filter() {
        let f = Xor8::build(&[]).unwrap();
        assert!(f.is_empty());
    }

    #[test]
    fn duplicate_keys_fail_construction() {
        // two equal keys can never peel
        assert!(Xor8::build(&[7, 7]).is_none());
    }

    #[test]
    fn tiny_filters() {
        for n in 1..32u64 {
            let keys: Vec<u64> = (1..=n).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
            let f = Xor8::build(&keys).unwrap();
            assert!(keys.iter().all(|k| f.contains(*k)), "n = {n}");
        }
    }
}
