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

//! `pkghash` is the process-wide package database: [`PkgHash`] maps a
//! lowercased package name to a [`PackageSet`], each of which holds one
//! [`PackageInstance`] per architecture, and maintains the reverse
//! dependency graph across them.

pub mod arch;
pub mod conffile;
pub mod dependency;
pub mod package;
pub mod pkgbin;
pub mod status;

pub use arch::{ArchHandle, ArchKind, ArchTable};
pub use conffile::Conffile;
pub use dependency::{DepClause, DepPossibility, DepRelOp, DepType};
pub use package::{ConsistencyError, InstanceIndex, PackageInstance, PackageSet};
pub use pkgbin::{ArbitraryField, MultiArch, PackageBin, StanzaKind};
pub use status::{EFlag, Status, StatusField, TriggerState, Want};

use std::hash::{Hash, Hasher};

/// A stable handle to a [`PackageSet`] within a [`PkgHash`]. Also doubles as
/// the "target" a [`DepPossibility`] points at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(usize);

impl SetId {
    /// Build a `SetId` from a raw index. Exposed for tests in sibling
    /// modules that need a `SetId` without a live [`PkgHash`] to mint one
    /// from.
    pub fn from_raw(raw: usize) -> Self {
        SetId(raw)
    }

    /// The raw index backing this handle.
    pub fn raw(self) -> usize {
        self.0
    }
}

/// Error conditions raised while committing a parsed [`PackageBin`] into a
/// [`PkgHash`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Failure reading or verifying the pkgbin stanza itself.
    PackageBin(pkgbin::Error),
    /// A [`PackageSet`] consistency invariant was violated by this commit.
    Consistency(ConsistencyError),
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PackageBin(e) => write!(f, "{}", e),
            Error::Consistency(e) => write!(f, "{}", e),
        }
    }
}

impl From<pkgbin::Error> for Error {
    fn from(e: pkgbin::Error) -> Self {
        Error::PackageBin(e)
    }
}

impl From<ConsistencyError> for Error {
    fn from(e: ConsistencyError) -> Self {
        Error::Consistency(e)
    }
}

/// Which file a [`PackageBin`] being committed was read from; selects the
/// slot-selection rule in [`PkgHash::commit`] (§4.4 of the design).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommitSource {
    /// Read from the status file.
    Status,
    /// Read from an `available`/Packages-style file.
    Available,
    /// Read from a journal update record.
    Update,
}

enum SelectedSlot {
    Reuse(InstanceIndex),
    ByArch,
}

fn select_slot(
    set: &PackageSet,
    source: CommitSource,
    new_is_same: bool,
) -> SelectedSlot {
    match source {
        CommitSource::Status => SelectedSlot::ByArch,
        CommitSource::Available => match set.single_installed() {
            Some(idx) if !new_is_same => SelectedSlot::Reuse(idx),
            _ => SelectedSlot::ByArch,
        },
        CommitSource::Update => match set.single_installed() {
            Some(idx) => {
                let existing_is_same = set.instance(idx).is_multi_arch_same();
                if existing_is_same && new_is_same {
                    SelectedSlot::ByArch
                } else {
                    SelectedSlot::Reuse(idx)
                }
            }
            None => SelectedSlot::ByArch,
        },
    }
}

/// A fixed, large prime number of buckets, per the design's "hash by
/// lowercased name into a fixed large prime (>= 8192) number of buckets".
const NBUCKETS: usize = 10_007;

/// The process-wide package database: name -> [`PackageSet`] -> per-arch
/// [`PackageInstance`], plus the cross-linked dependency graph between
/// sets.
#[derive(Debug)]
pub struct PkgHash {
    arches: ArchTable,
    sets: Vec<PackageSet>,
    buckets: Vec<Vec<SetId>>,
}

impl PkgHash {
    /// Build an empty table whose host architecture is `host_arch` (the
    /// single line read from `<admindir>/arch`).
    pub fn new(host_arch: &str) -> Self {
        PkgHash {
            arches: ArchTable::new(host_arch),
            sets: Vec::new(),
            buckets: (0..NBUCKETS).map(|_| Vec::new()).collect(),
        }
    }

    /// Borrow the architecture interner shared by every committed pkgbin.
    pub fn arches(&self) -> &ArchTable {
        &self.arches
    }

    /// Mutably borrow the architecture interner, e.g. to intern a name
    /// before parsing.
    pub fn arches_mut(&mut self) -> &mut ArchTable {
        &mut self.arches
    }

    fn bucket_index(name: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        name.to_ascii_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % NBUCKETS
    }

    /// Look a package name up, without creating a set if none exists yet.
    pub fn lookup(&self, name: &str) -> Option<SetId> {
        let bucket = &self.buckets[Self::bucket_index(name)];
        bucket
            .iter()
            .copied()
            .find(|id| self.sets[id.0].name.eq_ignore_ascii_case(name))
    }

    /// Look a package name up, creating an empty set for it on first use.
    pub fn get_or_create(&mut self, name: &str) -> SetId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        let id = SetId(self.sets.len());
        self.sets.push(PackageSet::new(name));
        let idx = Self::bucket_index(name);
        self.buckets[idx].push(id);
        id
    }

    /// Borrow a committed set.
    pub fn set(&self, id: SetId) -> &PackageSet {
        &self.sets[id.0]
    }

    /// Mutably borrow a committed set.
    pub fn set_mut(&mut self, id: SetId) -> &mut PackageSet {
        &mut self.sets[id.0]
    }

    /// Number of distinct package names known to this table.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// `true` if no package name has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Parse one stanza against this table's arena and hash table, without
    /// committing it to a slot. Exposed so callers that need the parsed
    /// [`PackageBin`] itself (e.g. [`crate::statusdb::StatusDb::note`]'s
    /// callers) don't have to re-derive the resolver closures.
    pub fn parse(&mut self, raw: &crate::control::RawParagraph, kind: StanzaKind) -> Result<PackageBin, pkgbin::Error> {
        // `arches` is borrowed directly as pkgbin::parse's own parameter,
        // disjoint from the `sets`/`buckets` the resolve_pkg closure below
        // captures, so the borrow checker accepts both live at once without
        // resorting to raw pointers.
        let sets = &mut self.sets;
        let buckets = &mut self.buckets;
        pkgbin::parse(
            raw,
            kind,
            &mut self.arches,
            |name| get_or_create_raw(sets, buckets, name),
            |arches, name| arches.intern(name),
        )
    }

    /// Parse one stanza and commit it into its slot, re-threading the
    /// dependency graph. Returns the set and instance the stanza landed in.
    pub fn parse_and_commit(
        &mut self,
        raw: &crate::control::RawParagraph,
        kind: StanzaKind,
        source: CommitSource,
    ) -> Result<(SetId, InstanceIndex), Error> {
        let pkg = self.parse(raw, kind)?;
        self.commit(pkg, source)
    }

    /// Commit an already-parsed [`PackageBin`] into its slot, re-threading
    /// the dependency graph against whatever it replaces.
    pub fn commit(&mut self, pkg: PackageBin, source: CommitSource) -> Result<(SetId, InstanceIndex), Error> {
        let set_id = self.get_or_create(&pkg.package);
        let new_is_same = matches!(pkg.multi_arch, Some(MultiArch::Same));
        let new_arch = pkg.architecture;
        let available = matches!(source, CommitSource::Available);

        let selected = select_slot(&self.sets[set_id.0], source, new_is_same);
        let instance_idx = match selected {
            SelectedSlot::Reuse(idx) => idx,
            SelectedSlot::ByArch => self.sets[set_id.0].get_or_create(new_arch),
        };

        let old_deps: Vec<DepPossibility> = {
            let inst = self.sets[set_id.0].instance(instance_idx);
            let slot = if available { &inst.available } else { &inst.installed };
            slot.as_ref()
                .map(|p| p.dependencies.iter().flat_map(|c| c.alternatives.clone()).collect())
                .unwrap_or_default()
        };
        let new_deps: Vec<DepPossibility> =
            pkg.dependencies.iter().flat_map(|c| c.alternatives.clone()).collect();

        self.unlink_deps(&old_deps, available);

        {
            let inst = self.sets[set_id.0].instance_mut(instance_idx);
            if available {
                inst.available = Some(pkg);
            } else {
                inst.installed = Some(pkg);
            }
        }

        self.link_deps(&new_deps, available);

        self.sets[set_id.0].check_consistency()?;

        Ok((set_id, instance_idx))
    }

    /// Remove the reverse-dependency entries `deps` points at (the targets'
    /// `rdeps_installed`/`rdeps_available`, per `available`).
    fn unlink_deps(&mut self, deps: &[DepPossibility], available: bool) {
        for dep in deps {
            let rdeps = if available {
                &mut self.sets[dep.target.0].rdeps_available
            } else {
                &mut self.sets[dep.target.0].rdeps_installed
            };
            if let Some(pos) = rdeps.iter().position(|d| d == dep) {
                rdeps.remove(pos);
            }
        }
    }

    /// Add reverse-dependency entries for `deps` (the counterpart to
    /// [`PkgHash::unlink_deps`]).
    fn link_deps(&mut self, deps: &[DepPossibility], available: bool) {
        for dep in deps {
            let rdeps = if available {
                &mut self.sets[dep.target.0].rdeps_available
            } else {
                &mut self.sets[dep.target.0].rdeps_installed
            };
            rdeps.push(dep.clone());
        }
    }
}

fn get_or_create_raw(sets: &mut Vec<PackageSet>, buckets: &mut [Vec<SetId>], name: &str) -> SetId {
    let idx = {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        name.to_ascii_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % NBUCKETS
    };
    if let Some(id) = buckets[idx]
        .iter()
        .copied()
        .find(|id| sets[id.0].name.eq_ignore_ascii_case(name))
    {
        return id;
    }
    let id = SetId(sets.len());
    sets.push(PackageSet::new(name));
    buckets[idx].push(id);
    id
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_and_commit(
        db: &mut PkgHash,
        text: &str,
        kind: StanzaKind,
        source: CommitSource,
    ) -> (SetId, InstanceIndex) {
        let raw = crate::control::RawParagraph::parse(text).unwrap();
        db.parse_and_commit(&raw, kind, source).unwrap()
    }

    #[test]
    fn get_or_create_dedups_case_insensitively() {
        let mut db = PkgHash::new("amd64");
        let a = db.get_or_create("Libc6");
        let b = db.get_or_create("libc6");
        assert_eq!(a, b);
        assert_eq!(1, db.len());
    }

    #[test]
    fn status_commit_slots_by_arch() {
        let mut db = PkgHash::new("amd64");
        let (set_id, idx) = parse_and_commit(
            &mut db,
            "Package: foo\nStatus: install ok installed\nMaintainer: a\nVersion: 1.0\nDescription: d\nArchitecture: amd64\n",
            StanzaKind::Status,
            CommitSource::Status,
        );
        let inst = db.set(set_id).instance(idx);
        assert!(inst.installed.is_some());
    }

    #[test]
    fn back_link_integrity_on_dependency_change() {
        let mut db = PkgHash::new("amd64");

        parse_and_commit(
            &mut db,
            "Package: a\nStatus: install ok installed\nMaintainer: m\nVersion: 1.0\nDescription: d\nArchitecture: amd64\nDepends: b (>= 2)\n",
            StanzaKind::Status,
            CommitSource::Status,
        );

        let b_id = db.get_or_create("b");
        let c_id = db.get_or_create("c");
        assert_eq!(1, db.set(b_id).rdeps_installed.len());
        assert_eq!(0, db.set(c_id).rdeps_installed.len());

        parse_and_commit(
            &mut db,
            "Package: a\nStatus: install ok installed\nMaintainer: m\nVersion: 1.1\nDescription: d\nArchitecture: amd64\nDepends: c (>= 1)\n",
            StanzaKind::Status,
            CommitSource::Status,
        );

        assert_eq!(0, db.set(b_id).rdeps_installed.len());
        assert_eq!(1, db.set(c_id).rdeps_installed.len());
    }

    #[test]
    fn available_reuses_singleton_for_crossgrade() {
        let mut db = PkgHash::new("amd64");
        parse_and_commit(
            &mut db,
            "Package: foo\nStatus: install ok installed\nMaintainer: m\nVersion: 1.0\nDescription: d\nArchitecture: i386\n",
            StanzaKind::Status,
            CommitSource::Status,
        );
        let (set_id, idx_before) = {
            let id = db.lookup("foo").unwrap();
            (id, db.set(id).single_installed().unwrap())
        };

        let (_set_id2, idx_after) = parse_and_commit(
            &mut db,
            "Package: foo\nMaintainer: m\nVersion: 1.1\nDescription: d\nArchitecture: amd64\n",
            StanzaKind::Available,
            CommitSource::Available,
        );

        assert_eq!(set_id, db.lookup("foo").unwrap());
        assert_eq!(idx_before, idx_after);
    }
}

// vim: foldmethod=marker
