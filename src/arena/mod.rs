// {{{ Copyright (c) Paul R. Tagliamonte <paultag@debian.org>, 2024
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE. }}}

//! The `arena` module implements `NfAlloc`, a process-lifetime bump
//! allocator for interned strings.
//!
//! The historical `dpkg` package database (`nfmalloc` in `lib/dpkg/nfmalloc.c`)
//! never frees the memory it hands out for parsed package metadata: strings
//! read out of the status file live for the lifetime of the process and are
//! referenced by pointer from many places in the dependency graph.
//!
//! Rather than hand out raw pointers (which would make [`NfAlloc`]
//! self-referential with its callers, and require `unsafe` at every use
//! site), this module hands out small `Copy` [`StringId`] handles. Looking a
//! handle back up is an indexed `Vec` read. This is the same trade discussed
//! in the "Intrusive dependency graph" design note: index-based edges
//! instead of raw pointers, at the cost of one extra indirection per lookup.
//!
//! Nothing interned in an [`NfAlloc`] is ever freed individually; the whole
//! arena is dropped at once (the moral equivalent of `pkg_db_reset`).

use std::collections::HashMap;

/// A handle to a string interned in an [`NfAlloc`]. Two handles compare
/// equal iff they were produced by interning the same string value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(usize);

/// Process-lifetime bump allocator for strings.
///
/// Every string the package-database parsers pull out of the status file,
/// an available-file, or a split-part header is interned here once and
/// referenced by [`StringId`] from then on, rather than being copied afresh
/// at every use site.
#[derive(Debug, Default)]
pub struct NfAlloc {
    strings: Vec<Box<str>>,
    dedup: HashMap<Box<str>, StringId>,
}

impl NfAlloc {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning its [`StringId`]. Interning the same string
    /// value twice returns the same handle; the arena never stores a
    /// duplicate copy.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.dedup.get(s) {
            return *id;
        }
        let id = StringId(self.strings.len());
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.dedup.insert(boxed, id);
        id
    }

    /// Resolve a [`StringId`] previously returned by [`NfAlloc::intern`]
    /// back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this arena.
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.0]
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn intern_roundtrip() {
        let mut arena = NfAlloc::new();
        let id = arena.intern("libc6");
        assert_eq!("libc6", arena.resolve(id));
    }

    #[test]
    fn intern_dedups() {
        let mut arena = NfAlloc::new();
        let a = arena.intern("libc6");
        let b = arena.intern("libc6");
        assert_eq!(a, b);
        assert_eq!(1, arena.len());
    }

    #[test]
    fn intern_distinguishes() {
        let mut arena = NfAlloc::new();
        let a = arena.intern("libc6");
        let b = arena.intern("libc6-dev");
        assert_ne!(a, b);
        assert_eq!(2, arena.len());
    }
}

// vim: foldmethod=marker
