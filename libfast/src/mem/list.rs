/*
 * Created on Tue Feb 06 2024
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
    # Intrusive lists

    Nodes embed their links, so list membership costs no allocation and
    removal is O(1) without knowing the containing head. The marker type
    parameter `A` names the link, which lets one node carry several
    independent links and sit on several lists at once:

    ```
    use libfast::mem::list::{DlHead, DlLink, DlNode};

    struct Lru;
    struct Dirty;
    struct Page {
        lru: DlLink<Page, Lru>,
        dirty: DlLink<Page, Dirty>,
    }
    impl DlNode<Lru> for Page {
        fn link(&mut self) -> &mut DlLink<Self, Lru> { &mut self.lru }
    }
    impl DlNode<Dirty> for Page {
        fn link(&mut self) -> &mut DlLink<Self, Dirty> { &mut self.dirty }
    }
    # let _ = DlHead::<Page, Lru>::new();
    ```

    Every operation that takes or returns a raw node pointer is unsafe: the
    caller keeps nodes alive while they are linked and never links a node
    onto two lists through the same link field.
*/

use core::{marker::PhantomData, ptr};

pub struct SlLink<T, A = ()> {
    next: *mut T,
    _marker: PhantomData<A>,
}

impl<T, A> SlLink<T, A> {
    pub const fn new() -> Self {
        Self {
            next: ptr::null_mut(),
            _marker: PhantomData,
        }
    }
}

impl<T, A> Default for SlLink<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A node with a singly linked membership named by `A`
pub trait SlNode<A = ()>: Sized {
    fn link(&mut self) -> &mut SlLink<Self, A>;
}

/// Head of a singly linked intrusive list
pub struct SlHead<T: SlNode<A>, A = ()> {
    first: *mut T,
    _marker: PhantomData<A>,
}

impl<T: SlNode<A>, A> SlHead<T, A> {
    pub const fn new() -> Self {
        Self {
            first: ptr::null_mut(),
            _marker: PhantomData,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.first.is_null()
    }
    pub fn first(&self) -> *mut T {
        self.first
    }
    pub unsafe fn next(node: *mut T) -> *mut T {
        (*node).link().next
    }
    pub unsafe fn insert_head(&mut self, node: *mut T) {
        (*node).link().next = self.first;
        self.first = node;
    }
    pub unsafe fn insert_after(after: *mut T, node: *mut T) {
        (*node).link().next = (*after).link().next;
        (*after).link().next = node;
    }
    pub unsafe fn remove_head(&mut self) -> *mut T {
        let node = self.first;
        if !node.is_null() {
            self.first = (*node).link().next;
            (*node).link().next = ptr::null_mut();
        }
        node
    }
    pub unsafe fn for_each(&self, mut f: impl FnMut(&mut T)) {
        let mut node = self.first;
        while !node.is_null() {
            let next = (*node).link().next;
            f(&mut *node);
            node = next;
        }
    }
}

impl<T: SlNode<A>, A> Default for SlHead<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DlLink<T, A = ()> {
    prev: *mut T,
    next: *mut T,
    _marker: PhantomData<A>,
}

impl<T, A> DlLink<T, A> {
    pub const fn new() -> Self {
        Self {
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
            _marker: PhantomData,
        }
    }
}

impl<T, A> Default for DlLink<T, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A node with a doubly linked membership named by `A`
pub trait DlNode<A = ()>: Sized {
    fn link(&mut self) -> &mut DlLink<Self, A>;
}

/// Head of a doubly linked intrusive list
pub struct DlHead<T: DlNode<A>, A = ()> {
    first: *mut T,
    last: *mut T,
    _marker: PhantomData<A>,
}

impl<T: DlNode<A>, A> DlHead<T, A> {
    pub const fn new() -> Self {
        Self {
            first: ptr::null_mut(),
            last: ptr::null_mut(),
            _marker: PhantomData,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.first.is_null()
    }
    pub fn first(&self) -> *mut T {
        self.first
    }
    pub fn last(&self) -> *mut T {
        self.last
    }
    pub unsafe fn next(node: *mut T) -> *mut T {
        (*node).link().next
    }
    pub unsafe fn prev(node: *mut T) -> *mut T {
        (*node).link().prev
    }
    pub unsafe fn insert_head(&mut self, node: *mut T) {
        (*node).link().prev = ptr::null_mut();
        (*node).link().next = self.first;
        if self.first.is_null() {
            self.last = node;
        } else {
            (*self.first).link().prev = node;
        }
        self.first = node;
    }
    pub unsafe fn insert_tail(&mut self, node: *mut T) {
        (*node).link().next = ptr::null_mut();
        (*node).link().prev = self.last;
        if self.last.is_null() {
            self.first = node;
        } else {
            (*self.last).link().next = node;
        }
        self.last = node;
    }
    pub unsafe fn insert_before(&mut self, at: *mut T, node: *mut T) {
        let prev = (*at).link().prev;
        (*node).link().prev = prev;
        (*node).link().next = at;
        (*at).link().prev = node;
        if prev.is_null() {
            self.first = node;
        } else {
            (*prev).link().next = node;
        }
    }
    pub unsafe fn insert_after(&mut self, at: *mut T, node: *mut T) {
        let next = (*at).link().next;
        (*node).link().next = next;
        (*node).link().prev = at;
        (*at).link().next = node;
        if next.is_null() {
            self.last = node;
        } else {
            (*next).link().prev = node;
        }
    }
    /// Unlink `node` in O(1); the head need not be known to the caller, but
    /// the node must be on *this* list
    pub unsafe fn remove(&mut self, node: *mut T) {
        let prev = (*node).link().prev;
        let next = (*node).link().next;
        if prev.is_null() {
            self.first = next;
        } else {
            (*prev).link().next = next;
        }
        if next.is_null() {
            self.last = prev;
        } else {
            (*next).link().prev = prev;
        }
        (*node).link().prev = ptr::null_mut();
        (*node).link().next = ptr::null_mut();
    }
    pub unsafe fn remove_head(&mut self) -> *mut T {
        let node = self.first;
        if !node.is_null() {
            self.remove(node);
        }
        node
    }
    pub unsafe fn remove_tail(&mut self) -> *mut T {
        let node = self.last;
        if !node.is_null() {
            self.remove(node);
        }
        node
    }
    /// Move every node of `other` to the back of `self`
    pub unsafe fn append_list(&mut self, other: &mut Self) {
        if other.first.is_null() {
            return;
        }
        if self.last.is_null() {
            self.first = other.first;
            self.last = other.last;
        } else {
            (*self.last).link().next = other.first;
            (*other.first).link().prev = self.last;
            self.last = other.last;
        }
        other.first = ptr::null_mut();
        other.last = ptr::null_mut();
    }
    /// Move every node of `other` to the front of `self`
    pub unsafe fn prepend_list(&mut self, other: &mut Self) {
        if other.first.is_null() {
            return;
        }
        if self.first.is_null() {
            self.first = other.first;
            self.last = other.last;
        } else {
            (*other.last).link().next = self.first;
            (*self.first).link().prev = other.last;
            self.first = other.first;
        }
        other.first = ptr::null_mut();
        other.last = ptr::null_mut();
    }
    pub unsafe fn for_each(&self, mut f: impl FnMut(&mut T)) {
        let mut node = self.first;
        while !node.is_null() {
            let next = (*node).link().next;
            f(&mut *node);
            node = next;
        }
    }
    pub unsafe fn for_each_reverse(&self, mut f: impl FnMut(&mut T)) {
        let mut node = self.last;
        while !node.is_null() {
            let prev = (*node).link().prev;
            f(&mut *node);
            node = prev;
        }
    }
}

impl<T: DlNode<A>, A> Default for DlHead<T, A> {
    fn default() -> Self {
        Self::new()
    }
}
