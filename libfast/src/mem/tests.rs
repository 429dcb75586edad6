/*
 * Created on Wed Feb 07 2024
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

use super::{align_up, Arena, MemPool, MemoryDriver, TVec, SCALAR_ALIGN};

mod arena {
    use super::*;

    #[test]
    fn aligned_and_disjoint() {
        let a = Arena::new(4096);
        let mut blocks = vec![];
        for n in [1usize, 7, 16, 100, 5000, 0] {
            let p = a.alloc(n).unwrap();
            assert_eq!(p.as_ptr() as usize % SCALAR_ALIGN, 0);
            blocks.push((p.as_ptr() as usize, align_up(n.max(1), SCALAR_ALIGN)));
        }
        // pairwise disjoint
        for (i, (start, len)) in blocks.iter().enumerate() {
            for (other, olen) in blocks.iter().skip(i + 1) {
                assert!(start + len <= *other || other + olen <= *start);
            }
        }
    }

    #[test]
    fn strings_survive_until_drop() {
        // retain every pointer, then verify every byte (plus terminator)
        let a = Arena::new(0);
        let mut held = Vec::with_capacity(100_000);
        for i in 0..100_000u32 {
            let s = format!("string-{i}");
            held.push((a.alloc_str(&s).unwrap(), s));
        }
        for (copy, original) in &held {
            assert_eq!(copy, original);
            unsafe {
                // UNSAFE(@ohsayan): alloc_str wrote a NUL right past the copy
                assert_eq!(*copy.as_ptr().add(copy.len()), 0);
            }
        }
        drop(held);
        drop(a);
        // memory went back to the OS; a big fresh chunk must still work
        let big = Arena::new(64 * 1024 * 1024);
        assert!(big.alloc(1024).is_some());
    }

    #[test]
    fn oversized_requests() {
        let a = Arena::new(64);
        // larger than the chunk size: gets its own (multiplied) chunk
        let p = a.alloc(1024).unwrap();
        let q = a.alloc(1024).unwrap();
        assert_ne!(p, q);
    }

    #[test]
    fn driver_free_is_noop() {
        let a = Arena::new(0);
        let p = MemoryDriver::alloc(&a, 64).unwrap();
        unsafe {
            // UNSAFE(@ohsayan): same driver, same pointer
            MemoryDriver::free(&a, p);
        }
        // still dereferenceable until the arena goes away
        unsafe {
            p.as_ptr().write_bytes(0xab, 64);
        }
    }
}

mod pool {
    use super::*;

    #[test]
    fn block_size_is_rounded() {
        let p = MemPool::new(1, 0, 0).unwrap();
        assert_eq!(p.block_size() % SCALAR_ALIGN, 0);
        assert!(p.block_size() >= sizeof!(usize));
    }

    #[test]
    fn alloc_free_reuse() {
        let p = MemPool::new(32, 0, 16).unwrap();
        let a = p.alloc().unwrap();
        let b = p.alloc().unwrap();
        assert_ne!(a, b);
        unsafe {
            p.free(a);
        }
        // LIFO: the most recently freed block comes back first
        let c = p.alloc().unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn clamped_pool_exhausts() {
        let p = MemPool::new(64, 10, 0).unwrap();
        assert_eq!(p.total_blocks(), 10);
        let mut held = vec![];
        for _ in 0..10 {
            held.push(p.alloc().unwrap());
        }
        assert!(p.alloc().is_none());
        unsafe {
            p.free(held.pop().unwrap());
        }
        assert!(p.alloc().is_some());
    }

    #[test]
    fn unclamped_pool_grows() {
        let p = MemPool::new(64, 0, 8).unwrap();
        let mut held = vec![];
        // way past the first chunk's 8 blocks
        for _ in 0..100 {
            held.push(p.alloc().unwrap());
        }
        let uniq: std::collections::HashSet<_> = held.iter().collect();
        assert_eq!(uniq.len(), 100);
    }

    #[test]
    fn caller_buffer_pool() {
        let mut buf = vec![0u8; 4096];
        let p = MemPool::from_buffer(64, &mut buf).unwrap();
        let cap = p.total_blocks();
        assert!(cap > 0);
        let mut held = vec![];
        for _ in 0..cap {
            held.push(p.alloc().unwrap());
        }
        // clamped to the buffer, no backing allocator to fall back on
        assert!(p.alloc().is_none());
    }

    #[test]
    fn tiny_buffer_rejected() {
        let mut buf = [0u8; 8];
        assert!(MemPool::from_buffer(64, &mut buf).is_err());
    }

    #[test]
    fn stacked_on_arena() {
        let arena = Arena::new(0);
        let pool = MemPool::with_driver(&arena, 48, 0, 8).unwrap();
        let a = pool.alloc().unwrap();
        unsafe {
            a.as_ptr().write_bytes(0x7f, pool.block_size());
            pool.free(a);
        }
        assert_eq!(pool.alloc().unwrap(), a);
        drop(pool);
        drop(arena);
    }
}

mod tvec {
    use {super::TVec, crate::rand::Xs128Plus};

    #[test]
    fn push_pop_both_ends() {
        let mut v: TVec<u32> = TVec::new();
        v.push_back(2);
        v.push_back(3);
        v.push_front(1);
        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(v.pop_front(), Some(1));
        assert_eq!(v.pop_back(), Some(3));
        assert_eq!(v.pop_back(), Some(2));
        assert_eq!(v.pop_back(), None);
        assert_eq!(v.pop_front(), None);
    }

    #[test]
    fn growth_preserves_contents() {
        let mut v: TVec<String> = TVec::with_capacity(2);
        for i in 0..1000 {
            v.push_back(format!("{i}"));
        }
        assert_eq!(v.len(), 1000);
        assert!(v.capacity() >= 1000);
        for (i, s) in v.iter().enumerate() {
            assert_eq!(s, &format!("{i}"));
        }
    }

    #[test]
    fn reset_and_reuse() {
        let mut v: TVec<String> = TVec::new();
        v.push_back("a".into());
        let cap = v.capacity();
        v.reset();
        assert!(v.is_empty());
        assert_eq!(v.capacity(), cap);
        v.push_back("b".into());
        assert_eq!(v[0], "b");
    }

    #[test]
    fn append_moves_everything() {
        let mut a: TVec<u64> = (0..5).collect();
        let mut b: TVec<u64> = (5..10).collect();
        a.append(&mut b);
        assert!(b.is_empty());
        assert_eq!(a, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn sort_and_shuffle() {
        let mut rng = Xs128Plus::new(0x7e57);
        let mut v: TVec<u64> = (0..512).collect();
        v.shuffle(&mut rng);
        assert_ne!(v, (0..512).collect::<Vec<_>>());
        v.sort(|a, b| a.cmp(b));
        assert_eq!(v, (0..512).collect::<Vec<_>>());
    }

    #[test]
    fn reservoir_sample() {
        let mut rng = Xs128Plus::new(0x5a5a);
        let v: TVec<u64> = (0..1000).collect();
        // k must be strictly smaller than the source
        assert!(v.sample(1000, &mut rng).is_none());
        let s = v.sample(64, &mut rng).unwrap();
        assert_eq!(s.len(), 64);
        let uniq: std::collections::HashSet<_> = s.iter().collect();
        assert_eq!(uniq.len(), 64);
        assert!(s.iter().all(|x| *x < 1000));
    }

    #[test]
    fn random_element() {
        let mut rng = Xs128Plus::new(0xe1e);
        let empty: TVec<u64> = TVec::new();
        assert!(empty.random_element(&mut rng).is_none());
        let v: TVec<u64> = (10..20).collect();
        for _ in 0..100 {
            let x = *v.random_element(&mut rng).unwrap();
            assert!((10..20).contains(&x));
        }
    }
}

mod lists {
    use crate::mem::list::{DlHead, DlLink, DlNode, SlHead, SlLink, SlNode};

    // one node type on two independent doubly linked lists plus one singly
    // linked list
    struct All;
    struct Odd;
    struct Work;
    struct Item {
        v: u64,
        all: DlLink<Item, All>,
        odd: DlLink<Item, Odd>,
        work: SlLink<Item, Work>,
    }
    impl Item {
        fn new(v: u64) -> Box<Self> {
            Box::new(Self {
                v,
                all: DlLink::new(),
                odd: DlLink::new(),
                work: SlLink::new(),
            })
        }
    }
    impl DlNode<All> for Item {
        fn link(&mut self) -> &mut DlLink<Self, All> {
            &mut self.all
        }
    }
    impl DlNode<Odd> for Item {
        fn link(&mut self) -> &mut DlLink<Self, Odd> {
            &mut self.odd
        }
    }
    impl SlNode<Work> for Item {
        fn link(&mut self) -> &mut SlLink<Self, Work> {
            &mut self.work
        }
    }

    #[test]
    fn singly_linked_basics() {
        let mut nodes: Vec<Box<Item>> = (0..4).map(Item::new).collect();
        let mut head: SlHead<Item, Work> = SlHead::new();
        unsafe {
            // UNSAFE(@ohsayan): nodes outlive the head and join exactly once
            for n in nodes.iter_mut() {
                head.insert_head(&mut **n);
            }
            let mut seen = vec![];
            head.for_each(|n| seen.push(n.v));
            assert_eq!(seen, vec![3, 2, 1, 0]);
            // insert_after the current head
            let mut extra = Item::new(99);
            SlHead::<Item, Work>::insert_after(head.first(), &mut *extra);
            assert_eq!((*SlHead::<Item, Work>::next(head.first())).v, 99);
            let popped = head.remove_head();
            assert_eq!((*popped).v, 3);
            assert_eq!((*head.first()).v, 99);
        }
    }

    #[test]
    fn doubly_linked_multi_membership() {
        let mut nodes: Vec<Box<Item>> = (0..8).map(Item::new).collect();
        let mut all: DlHead<Item, All> = DlHead::new();
        let mut odd: DlHead<Item, Odd> = DlHead::new();
        unsafe {
            // UNSAFE(@ohsayan): nodes outlive both heads; each link joins
            // one list only
            for n in nodes.iter_mut() {
                all.insert_tail(&mut **n);
                if n.v & 1 == 1 {
                    odd.insert_tail(&mut **n);
                }
            }
            let mut fwd = vec![];
            all.for_each(|n| fwd.push(n.v));
            assert_eq!(fwd, (0..8).collect::<Vec<u64>>());
            let mut rev = vec![];
            all.for_each_reverse(|n| rev.push(n.v));
            assert_eq!(rev, (0..8).rev().collect::<Vec<u64>>());
            let mut odds = vec![];
            odd.for_each(|n| odds.push(n.v));
            assert_eq!(odds, vec![1, 3, 5, 7]);
            // O(1) unlink from the middle of one list leaves the other alone
            let three = odd.first();
            let three = DlHead::<Item, Odd>::next(three); // -> 3
            odd.remove(three);
            let mut odds = vec![];
            odd.for_each(|n| odds.push(n.v));
            assert_eq!(odds, vec![1, 5, 7]);
            let mut fwd = vec![];
            all.for_each(|n| fwd.push(n.v));
            assert_eq!(fwd.len(), 8);
        }
    }

    #[test]
    fn splice_lists() {
        let mut left: Vec<Box<Item>> = (0..3).map(Item::new).collect();
        let mut right: Vec<Box<Item>> = (10..13).map(Item::new).collect();
        let mut a: DlHead<Item, All> = DlHead::new();
        let mut b: DlHead<Item, All> = DlHead::new();
        unsafe {
            // UNSAFE(@ohsayan): nodes outlive both heads
            for n in left.iter_mut() {
                a.insert_tail(&mut **n);
            }
            for n in right.iter_mut() {
                b.insert_tail(&mut **n);
            }
            a.append_list(&mut b);
            assert!(b.is_empty());
            let mut seen = vec![];
            a.for_each(|n| seen.push(n.v));
            assert_eq!(seen, vec![0, 1, 2, 10, 11, 12]);
            // move everything back in front
            b.prepend_list(&mut a);
            assert!(a.is_empty());
            let mut seen = vec![];
            b.for_each(|n| seen.push(n.v));
            assert_eq!(seen, vec![0, 1, 2, 10, 11, 12]);
            assert_eq!((*b.remove_tail()).v, 12);
            assert_eq!((*b.remove_head()).v, 0);
        }
    }
}
