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

//! Package-database architecture handling.
//!
//! This is deliberately a different type from [`crate::architecture::Architecture`]:
//! that type models the *name* of a Debian architecture (`amd64`, `arm64`, ...).
//! This module models dpkg's classification of an architecture *relative to
//! the host the database is open on* -- the thing `dpkg_arch_type` in
//! `lib/dpkg/arch.c` computes. The same name classifies differently on two
//! different hosts (`amd64` is [`ArchKind::Native`] on an amd64 host and
//! [`ArchKind::Foreign`] everywhere else).

use crate::architecture::Architecture as DebianArch;
use crate::arena::{NfAlloc, StringId};
use std::collections::HashMap;
use std::str::FromStr;

/// A handle to an interned architecture name. Two handles compare equal iff
/// they were interned from the same name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchHandle(StringId);

/// Classification of an [`ArchHandle`] relative to a [`ArchTable`]'s host
/// architecture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArchKind {
    /// No `Architecture` field was present at all (distinct from an empty
    /// string, which is [`ArchKind::Empty`]).
    None,
    /// The field was present but empty.
    Empty,
    /// The name matches the table's host architecture.
    Native,
    /// The special `all` architecture.
    All,
    /// The special `any` wildcard architecture.
    Wildcard,
    /// A syntactically valid, recognized architecture other than the host.
    Foreign,
    /// Syntactically valid but not a recognized Debian architecture name.
    Unknown,
    /// Not a syntactically valid architecture name.
    Illegal,
}

/// Table of architectures interned for one package database, plus the host
/// architecture used to classify them.
#[derive(Debug)]
pub struct ArchTable {
    arena: NfAlloc,
    by_name: HashMap<String, ArchHandle>,
    host: ArchHandle,
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl ArchTable {
    /// Build a table whose host architecture is `host`, e.g. the single
    /// line read from `<admindir>/arch`.
    pub fn new(host: &str) -> Self {
        let mut arena = NfAlloc::new();
        let mut by_name = HashMap::new();
        let handle = ArchHandle(arena.intern(host));
        by_name.insert(host.to_owned(), handle);
        ArchTable {
            arena,
            by_name,
            host: handle,
        }
    }

    /// Intern an architecture name, returning a stable handle to it.
    pub fn intern(&mut self, name: &str) -> ArchHandle {
        if let Some(handle) = self.by_name.get(name) {
            return *handle;
        }
        let handle = ArchHandle(self.arena.intern(name));
        self.by_name.insert(name.to_owned(), handle);
        handle
    }

    /// The handle for this table's host architecture.
    pub fn host(&self) -> ArchHandle {
        self.host
    }

    /// Resolve a handle back to its name.
    pub fn name(&self, handle: ArchHandle) -> &str {
        self.arena.resolve(handle.0)
    }

    /// Classify a handle relative to the host architecture.
    pub fn kind(&self, handle: ArchHandle) -> ArchKind {
        let name = self.name(handle);
        if name.is_empty() {
            return ArchKind::Empty;
        }
        if !is_valid_name(name) {
            return ArchKind::Illegal;
        }
        match DebianArch::from_str(name) {
            Ok(DebianArch::All) => ArchKind::All,
            Ok(DebianArch::Any) => ArchKind::Wildcard,
            Ok(DebianArch::Other(_)) => ArchKind::Unknown,
            Ok(_) if handle == self.host => ArchKind::Native,
            Ok(_) => ArchKind::Foreign,
            Err(_) => ArchKind::Illegal,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn native_vs_foreign() {
        let mut table = ArchTable::new("amd64");
        let amd64 = table.intern("amd64");
        let arm64 = table.intern("arm64");
        assert_eq!(ArchKind::Native, table.kind(amd64));
        assert_eq!(ArchKind::Foreign, table.kind(arm64));
    }

    #[test]
    fn all_and_wildcard() {
        let mut table = ArchTable::new("amd64");
        let all = table.intern("all");
        let any = table.intern("any");
        assert_eq!(ArchKind::All, table.kind(all));
        assert_eq!(ArchKind::Wildcard, table.kind(any));
    }

    #[test]
    fn empty_and_illegal() {
        let mut table = ArchTable::new("amd64");
        let empty = table.intern("");
        let illegal = table.intern("_bad");
        assert_eq!(ArchKind::Empty, table.kind(empty));
        assert_eq!(ArchKind::Illegal, table.kind(illegal));
    }

    #[test]
    fn unknown_is_syntactically_valid_but_unrecognized() {
        let mut table = ArchTable::new("amd64");
        let weird = table.intern("zorp9000");
        assert_eq!(ArchKind::Unknown, table.kind(weird));
    }

    #[test]
    fn interning_dedups() {
        let mut table = ArchTable::new("amd64");
        let a = table.intern("arm64");
        let b = table.intern("arm64");
        assert_eq!(a, b);
    }
}

// vim: foldmethod=marker
