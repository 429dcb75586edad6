/*
 * Created on Thu Feb 08 2024
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
    # SPSC bounded ring

    A lock-free circular queue for exactly one producer thread and one
    consumer thread. The producer owns the write index and only ever reads
    the read index; the consumer mirrors that. Queue-full and queue-empty
    share the `rd == wr` comparison, so one slot always goes unused.

    The two endpoints are separate owned handles, which makes the
    "exactly one of each" contract a compile time property instead of a
    comment.
*/

use {
    crate::{
        error::{Error, RuntimeResult},
        mem::CachePadded,
    },
    core::{
        cell::UnsafeCell,
        mem::MaybeUninit,
        sync::atomic::{AtomicU32, Ordering},
    },
    std::sync::Arc,
};

struct RawRing<T> {
    rd: CachePadded<AtomicU32>,
    wr: CachePadded<AtomicU32>,
    sz: u32,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// one endpoint per thread; slot handoff is ordered by the index stores
unsafe impl<T: Send> Send for RawRing<T> {}
unsafe impl<T: Send> Sync for RawRing<T> {}

impl<T> RawRing<T> {
    fn len(&self) -> u32 {
        let rd = self.rd.load(Ordering::Acquire);
        let wr = self.wr.load(Ordering::Acquire);
        if rd <= wr {
            wr - rd
        } else {
            self.sz - rd + wr
        }
    }
    fn is_empty(&self) -> bool {
        self.rd.load(Ordering::Acquire) == self.wr.load(Ordering::Acquire)
    }
    fn is_full(&self) -> bool {
        let mut wr = self.wr.load(Ordering::Acquire) + 1;
        if wr == self.sz {
            wr = 0;
        }
        wr == self.rd.load(Ordering::Acquire)
    }
}

impl<T> Drop for RawRing<T> {
    fn drop(&mut self) {
        // both endpoints are gone; plain loads are exact now
        let mut rd = self.rd.load(Ordering::Relaxed);
        let wr = self.wr.load(Ordering::Relaxed);
        while rd != wr {
            unsafe {
                // UNSAFE(@ohsayan): every slot in [rd, wr) holds a live value
                (*self.slots[rd as usize].get()).assume_init_drop();
            }
            rd += 1;
            if rd == self.sz {
                rd = 0;
            }
        }
    }
}

/// Constructor facade for the SPSC ring
pub struct SpscRing;

impl SpscRing {
    /// Create a ring with `n` slots (`n >= 2`; one slot stays unused by
    /// convention) and hand back its two endpoints
    pub fn create<T>(n: usize) -> RuntimeResult<(RingProducer<T>, RingConsumer<T>)> {
        if n < 2 || n > u32::MAX as usize {
            return Err(Error::InvalidArgument);
        }
        let ring = Arc::new(RawRing {
            rd: CachePadded::new(AtomicU32::new(0)),
            wr: CachePadded::new(AtomicU32::new(0)),
            sz: n as u32,
            slots: (0..n).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect(),
        });
        Ok((
            RingProducer { ring: ring.clone() },
            RingConsumer { ring },
        ))
    }
}

/// The write endpoint. Not clonable; keep it on one thread
pub struct RingProducer<T> {
    ring: Arc<RawRing<T>>,
}

impl<T> RingProducer<T> {
    /// Push `v`; hands it back if the ring is full
    pub fn enqueue(&mut self, v: T) -> Result<(), T> {
        let q = &*self.ring;
        let wr = q.wr.load(Ordering::Relaxed);
        let mut nwr = wr + 1;
        if nwr == q.sz {
            nwr = 0;
        }
        if nwr == q.rd.load(Ordering::Acquire) {
            return Err(v);
        }
        unsafe {
            // UNSAFE(@ohsayan): slot wr is ours until the release store below
            (*q.slots[wr as usize].get()).write(v);
        }
        q.wr.store(nwr, Ordering::Release);
        Ok(())
    }
    /// Best-effort occupancy; exact only in steady state
    pub fn len(&self) -> usize {
        self.ring.len() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

/// The read endpoint. Not clonable; keep it on one thread
pub struct RingConsumer<T> {
    ring: Arc<RawRing<T>>,
}

impl<T> RingConsumer<T> {
    pub fn dequeue(&mut self) -> Option<T> {
        let q = &*self.ring;
        let rd = q.rd.load(Ordering::Relaxed);
        if rd == q.wr.load(Ordering::Acquire) {
            return None;
        }
        let v = unsafe {
            // UNSAFE(@ohsayan): the producer published this slot before moving wr
            (*q.slots[rd as usize].get()).assume_init_read()
        };
        let mut nrd = rd + 1;
        if nrd == q.sz {
            nrd = 0;
        }
        q.rd.store(nrd, Ordering::Release);
        Some(v)
    }
    /// Look at the head without consuming it
    pub fn peek(&self) -> Option<&T> {
        let q = &*self.ring;
        let rd = q.rd.load(Ordering::Relaxed);
        if rd == q.wr.load(Ordering::Acquire) {
            return None;
        }
        unsafe {
            // UNSAFE(@ohsayan): published slot; we own rd so it stays live
            Some((*q.slots[rd as usize].get()).assume_init_ref())
        }
    }
    /// Best-effort occupancy; exact only in steady state
    pub fn len(&self) -> usize {
        self.ring.len() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}
