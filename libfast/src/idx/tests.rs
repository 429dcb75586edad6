/*
 * Created on Sun Feb 11 2024
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

use super::*;

mod bag_map {
    use {
        super::{mix64, BagMap},
        crate::mem::Arena,
    };

    #[cfg(not(miri))]
    const SPAM_CNT: usize = 65_536;
    #[cfg(miri)]
    const SPAM_CNT: usize = 128;

    fn h_u64(k: &u64) -> u64 {
        mix64(*k)
    }
    fn h_str(k: &String) -> u64 {
        // FNV-1a
        k.bytes()
            .fold(0xcbf29ce484222325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100000001b3)
            })
    }

    #[test]
    fn empty_drop() {
        let m = BagMap::<u64, u64>::new(h_u64).unwrap();
        assert!(m.is_empty());
        drop(m);
    }

    #[test]
    fn simple_crud() {
        let mut m = BagMap::<String, String>::new(h_str).unwrap();
        let (present, _) = m.probe(s("hello"), s("world")).unwrap();
        assert!(!present);
        assert_eq!(m.find(&s("hello")).unwrap(), "world");
        // probing again keeps the first value
        let (present, v) = m.probe(s("hello"), s("world2")).unwrap();
        assert!(present);
        assert_eq!(v.as_str(), "world");
        *m.find_mut(&s("hello")).unwrap() = s("world3");
        assert_eq!(m.find(&s("hello")).unwrap(), "world3");
        assert!(m.remove(&s("hello")));
        assert!(!m.remove(&s("hello")));
        assert_eq!(m.len(), 0);
        m.verify();
    }

    fn s(x: &str) -> String {
        x.to_owned()
    }

    #[test]
    fn spam_crud() {
        let mut m = BagMap::<u64, u64>::new(h_u64).unwrap();
        for i in 0..SPAM_CNT as u64 {
            let (present, _) = m.probe(i, i + 1).unwrap();
            assert!(!present);
        }
        assert_eq!(m.len(), SPAM_CNT as u64);
        m.verify();
        for i in 0..SPAM_CNT as u64 {
            assert_eq!(*m.find(&i).unwrap(), i + 1);
        }
        for i in (0..SPAM_CNT as u64).step_by(2) {
            assert!(m.remove(&i));
        }
        for i in 0..SPAM_CNT as u64 {
            assert_eq!(m.find(&i).is_some(), i & 1 == 1);
        }
        m.verify();
    }

    #[test]
    fn growth_from_tiny_table() {
        // start at 4 buckets, pour 1000 keys in
        let mut m = BagMap::<u64, u64>::with_capacity(h_u64, 4).unwrap();
        for i in 1..=1000u64 {
            m.probe(i, i).unwrap();
        }
        assert_eq!(m.len(), 1000);
        assert!(m.metrics().splits() > 0);
        // the table stopped doubling once the fill predicate held
        assert!(100 * m.occupied() / m.capacity() <= 75);
        for i in 1..=1000u64 {
            assert_eq!(*m.find(&i).unwrap(), i);
        }
        m.verify();
    }

    #[test]
    fn slot_reuse_after_remove() {
        let mut m = BagMap::<u64, u64>::with_capacity(h_u64, 4).unwrap();
        m.probe(1, 1).unwrap();
        m.probe(2, 2).unwrap();
        assert!(m.remove(&1));
        m.probe(3, 3).unwrap();
        assert_eq!(m.len(), 2);
        m.verify();
    }

    #[test]
    fn arena_backed() {
        let arena = Arena::new(0);
        {
            let mut m = BagMap::<u64, u64, _>::with_capacity_in(h_u64, 16, &arena).unwrap();
            for i in 0..512u64 {
                m.probe(i, i * 2).unwrap();
            }
            for i in 0..512u64 {
                assert_eq!(*m.find(&i).unwrap(), i * 2);
            }
            m.verify();
        }
        // dropping the map "freed" into the arena; real release happens here
        drop(arena);
    }
}

mod oht_map {
    use {super::mix64, crate::idx::OhtMap};

    #[cfg(not(miri))]
    const SPAM_CNT: u64 = 65_536;
    #[cfg(miri)]
    const SPAM_CNT: u64 = 128;

    // keys must avoid the reserved zero hash
    fn h(i: u64) -> u64 {
        let h = mix64(i);
        h | 1
    }

    #[test]
    fn empty_drop() {
        let m = OhtMap::<String>::new().unwrap();
        assert!(m.is_empty());
        drop(m);
    }

    #[test]
    fn simple_crud() {
        let mut m = OhtMap::<String>::new().unwrap();
        let (present, _) = m.probe(h(1), "one".to_owned()).unwrap();
        assert!(!present);
        let (present, v) = m.probe(h(1), "uno".to_owned()).unwrap();
        assert!(present);
        assert_eq!(v.as_str(), "one");
        assert_eq!(m.remove(h(1)).unwrap(), "one");
        assert!(m.remove(h(1)).is_none());
        assert!(m.is_empty());
    }

    #[test]
    fn spam_crud() {
        let mut m = OhtMap::<u64>::with_capacity(64).unwrap();
        for i in 0..SPAM_CNT {
            let (present, _) = m.probe(h(i), i).unwrap();
            assert!(!present);
        }
        assert_eq!(m.len(), SPAM_CNT);
        assert!(m.metrics().splits() > 0);
        for i in 0..SPAM_CNT {
            assert_eq!(*m.find(h(i)).unwrap(), i);
        }
        for i in (0..SPAM_CNT).step_by(2) {
            assert_eq!(m.remove(h(i)).unwrap(), i);
        }
        for i in 0..SPAM_CNT {
            assert_eq!(m.find(h(i)).is_some(), i & 1 == 1);
        }
        assert_eq!(m.len(), SPAM_CNT / 2);
    }

    #[test]
    fn tombstone_reuse() {
        let mut m = OhtMap::<u64>::with_capacity(16).unwrap();
        for i in 0..8 {
            m.probe(h(i), i).unwrap();
        }
        let before = m.len();
        m.remove(h(3)).unwrap();
        m.probe(h(100), 100).unwrap();
        assert_eq!(m.len(), before);
        assert_eq!(*m.find(h(100)).unwrap(), 100);
        assert!(m.find(h(3)).is_none());
    }

    #[test]
    fn overflow_zone_is_used() {
        // keys sharing their low bits land in the same bucket no matter the
        // seed (the seed is xor-folded, the mask only sees the low bits), so
        // entries 8.. must spill into the overflow zone
        let mut m = OhtMap::<u64>::with_capacity(1024).unwrap();
        let key = |i: u64| (i << 32) | 1;
        for i in 0..20 {
            m.probe(key(i), i).unwrap();
        }
        assert_eq!(m.occupied(), 1);
        assert_eq!(m.overflow_live(), 20 - super::super::oht::BUCKET_WIDTH as u64);
        for i in 0..20 {
            assert_eq!(*m.find(key(i)).unwrap(), i);
        }
        // draining the bucket frees the overflow slots too
        for i in 0..20 {
            assert_eq!(m.remove(key(i)).unwrap(), i);
        }
        assert_eq!(m.overflow_live(), 0);
        assert_eq!(m.occupied(), 0);
    }
}
