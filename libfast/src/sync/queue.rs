/*
 * Created on Fri Feb 09 2024
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
    # MPMC bounded sequence queue

    A fixed-size, lock-free (not wait-free) multi-producer multi-consumer
    queue. Each slot carries a `turn` counter: for the ring generation
    `g = ticket / capacity`, a producer may fill the slot when
    `turn == 2g` and a consumer may drain it when `turn == 2g + 1`.
    Completing either move bumps the counter, re-arming the slot for the
    other side (and, after a full wraparound, the next generation).

    `head` and `tail` hand out tickets; the non-blocking paths claim one by
    CAS, the blocking paths by `fetch_add` followed by a spin on the slot
    turn.
*/

use {
    crate::{
        error::{Error, RuntimeResult},
        mem::CachePadded,
    },
    core::{
        cell::UnsafeCell,
        mem::MaybeUninit,
        sync::atomic::{AtomicU64, Ordering},
    },
};

struct Slot<T> {
    turn: AtomicU64,
    data: UnsafeCell<MaybeUninit<T>>,
}

pub struct MpmcQueue<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    cap: u64,
    mask: u64,
    slots: Box<[CachePadded<Slot<T>>]>,
}

// the turn counter serialises the producer's write against the consumer's
// read on every slot
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Create a queue with exactly `cap` slots. `cap` must be a nonzero
    /// power of two (the modulo becomes a mask)
    pub fn new(cap: usize) -> RuntimeResult<Self> {
        if cap == 0 || !cap.is_power_of_two() {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            cap: cap as u64,
            mask: cap as u64 - 1,
            slots: (0..cap)
                .map(|_| {
                    CachePadded::new(Slot {
                        turn: AtomicU64::new(0),
                        data: UnsafeCell::new(MaybeUninit::uninit()),
                    })
                })
                .collect(),
        })
    }
    #[inline(always)]
    fn slot(&self, ticket: u64) -> &Slot<T> {
        &self.slots[(ticket & self.mask) as usize]
    }
    #[inline(always)]
    fn producer_turn(&self, ticket: u64) -> u64 {
        (ticket / self.cap) * 2
    }
    #[inline(always)]
    fn consumer_turn(&self, ticket: u64) -> u64 {
        (ticket / self.cap) * 2 + 1
    }
    /// Non-blocking enqueue; hands the value back if the queue is full
    pub fn try_enqueue(&self, v: T) -> Result<(), T> {
        let mut hd = self.head.load(Ordering::Acquire);
        loop {
            let slot = self.slot(hd);
            let turn = self.producer_turn(hd);
            if slot.turn.load(Ordering::Acquire) == turn {
                match self
                    .head
                    .compare_exchange(hd, hd + 1, Ordering::SeqCst, Ordering::SeqCst)
                {
                    Ok(_) => {
                        unsafe {
                            // UNSAFE(@ohsayan): the CAS won us this slot for this turn
                            (*slot.data.get()).write(v);
                        }
                        slot.turn.store(turn + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => hd = current,
                }
            } else {
                // slot not ready: either the queue is full or head moved on
                let prev = hd;
                hd = self.head.load(Ordering::Acquire);
                if prev == hd {
                    return Err(v);
                }
            }
        }
    }
    /// Non-blocking dequeue; `None` if the queue is empty
    pub fn try_dequeue(&self) -> Option<T> {
        let mut tl = self.tail.load(Ordering::Acquire);
        loop {
            let slot = self.slot(tl);
            let turn = self.consumer_turn(tl);
            if slot.turn.load(Ordering::Acquire) == turn {
                match self
                    .tail
                    .compare_exchange(tl, tl + 1, Ordering::SeqCst, Ordering::SeqCst)
                {
                    Ok(_) => {
                        let v = unsafe {
                            // UNSAFE(@ohsayan): the CAS won us this slot for this turn
                            (*slot.data.get()).assume_init_read()
                        };
                        slot.turn.store(turn + 1, Ordering::Release);
                        return Some(v);
                    }
                    Err(current) => tl = current,
                }
            } else {
                let prev = tl;
                tl = self.tail.load(Ordering::Acquire);
                if prev == tl {
                    return None;
                }
            }
        }
    }
    /// Blocking enqueue: claim a ticket, then spin until the slot comes
    /// around.
    ///
    /// There is no cancellation: a thread that stalls forever after claiming
    /// its ticket blocks every future occupant of that slot. Known hazard;
    /// use the non-blocking variant if that is unacceptable
    pub fn enqueue(&self, v: T) {
        let hd = self.head.fetch_add(1, Ordering::SeqCst);
        let slot = self.slot(hd);
        let turn = self.producer_turn(hd);
        while slot.turn.load(Ordering::Acquire) != turn {
            core::hint::spin_loop();
        }
        unsafe {
            // UNSAFE(@ohsayan): our ticket, our turn
            (*slot.data.get()).write(v);
        }
        slot.turn.store(turn + 1, Ordering::Release);
    }
    /// Blocking dequeue; same ticket discipline and the same hazard as
    /// [`MpmcQueue::enqueue`]
    pub fn dequeue(&self) -> T {
        let tl = self.tail.fetch_add(1, Ordering::SeqCst);
        let slot = self.slot(tl);
        let turn = self.consumer_turn(tl);
        while slot.turn.load(Ordering::Acquire) != turn {
            core::hint::spin_loop();
        }
        let v = unsafe {
            // UNSAFE(@ohsayan): our ticket, our turn
            (*slot.data.get()).assume_init_read()
        };
        slot.turn.store(turn + 1, Ordering::Release);
        v
    }
    /// Best-effort occupancy under concurrency
    pub fn len(&self) -> usize {
        let hd = self.head.load(Ordering::Relaxed);
        let tl = self.tail.load(Ordering::Relaxed);
        hd.wrapping_sub(tl) as usize
    }
    pub fn capacity(&self) -> usize {
        self.cap as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            // an odd turn means a producer filled it and no consumer drained it
            if slot.turn.load(Ordering::Relaxed) & 1 == 1 {
                unsafe {
                    // UNSAFE(@ohsayan): odd turn == initialized payload
                    (*slot.data.get()).assume_init_drop();
                }
            }
        }
    }
}
