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

//! [`PackageSet`] and [`PackageInstance`]: the named bucket a package name
//! hashes to, and the per-architecture record it holds.

use crate::pkghash::arch::ArchHandle;
use crate::pkghash::dependency::DepPossibility;
use crate::pkghash::pkgbin::PackageBin;

/// Index of a [`PackageInstance`] within its owning [`PackageSet`]'s
/// `instances` vector. Stable for the lifetime of the set (instances are
/// never removed, only replaced in place, to keep reverse-dependency
/// bookkeeping simple).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceIndex(pub(crate) usize);

/// One architecture's worth of package data: the `installed` record (from
/// the status file) and the `available` record (from a Packages file),
/// either or both of which may be absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackageInstance {
    /// The instance's architecture. Redundant with both `installed` and
    /// `available`'s own `architecture` field when present, but needed to
    /// locate an instance before either is populated.
    pub architecture: Option<ArchHandle>,
    /// Record from the status file, if this package is known to be
    /// installed (in any lifecycle state, including `not-installed`).
    pub installed: Option<PackageBin>,
    /// Record from an `available` file, if a candidate version is known.
    pub available: Option<PackageBin>,
}

impl PackageInstance {
    fn new(architecture: ArchHandle) -> Self {
        PackageInstance {
            architecture: Some(architecture),
            installed: None,
            available: None,
        }
    }

    /// `true` if this instance's installed record has `Multi-Arch: same`.
    pub fn is_multi_arch_same(&self) -> bool {
        matches!(
            self.installed.as_ref().and_then(|p| p.multi_arch),
            Some(crate::pkghash::pkgbin::MultiArch::Same)
        )
    }
}

/// A named bucket of [`PackageInstance`]s, at most one per architecture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackageSet {
    /// The package name this set is keyed on.
    pub name: String,
    /// This set's instances, in first-seen order. Never shrinks; an
    /// instance that is fully removed is left in place with both `installed`
    /// and `available` set to `None` so [`InstanceIndex`]es already handed
    /// out elsewhere stay valid.
    pub instances: Vec<PackageInstance>,
    /// Reverse-dependency list for the `installed` view: every
    /// [`DepPossibility`] (from some other pkgbin's `installed` record)
    /// whose `target` is this set.
    pub rdeps_installed: Vec<DepPossibility>,
    /// Reverse-dependency list for the `available` view.
    pub rdeps_available: Vec<DepPossibility>,
}

impl PackageSet {
    /// Create an empty set for `name`, with no instances yet.
    pub fn new(name: &str) -> Self {
        PackageSet {
            name: name.to_owned(),
            instances: Vec::new(),
            rdeps_installed: Vec::new(),
            rdeps_available: Vec::new(),
        }
    }

    /// Find the instance for a given architecture, if one exists.
    pub fn find(&self, architecture: ArchHandle) -> Option<InstanceIndex> {
        self.instances
            .iter()
            .position(|i| i.architecture == Some(architecture))
            .map(InstanceIndex)
    }

    /// The single installed instance, if exactly one instance in this set
    /// has a non-`None` `installed` record.
    pub fn single_installed(&self) -> Option<InstanceIndex> {
        let mut found = None;
        for (idx, inst) in self.instances.iter().enumerate() {
            if inst.installed.is_some() {
                if found.is_some() {
                    return None;
                }
                found = Some(InstanceIndex(idx));
            }
        }
        found
    }

    /// Get or create the instance at `idx`'s architecture, inserting a new
    /// one if none matched.
    pub fn get_or_create(&mut self, architecture: ArchHandle) -> InstanceIndex {
        if let Some(idx) = self.find(architecture) {
            return idx;
        }
        self.instances.push(PackageInstance::new(architecture));
        InstanceIndex(self.instances.len() - 1)
    }

    /// Borrow the instance at `idx`.
    pub fn instance(&self, idx: InstanceIndex) -> &PackageInstance {
        &self.instances[idx.0]
    }

    /// Mutably borrow the instance at `idx`.
    pub fn instance_mut(&mut self, idx: InstanceIndex) -> &mut PackageInstance {
        &mut self.instances[idx.0]
    }

    /// Number of non-empty (installed or available) instances.
    pub fn non_empty_instance_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.installed.is_some() || i.available.is_some())
            .count()
    }

    /// Consistency check run after a mutation: at most one non-`Multi-Arch:
    /// same` installed instance, and no mixing of same/non-same installed
    /// instances. Both situations are fatal per the design.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let mut same_count = 0usize;
        let mut non_same_count = 0usize;
        for inst in &self.instances {
            if inst.installed.is_none() {
                continue;
            }
            if inst.is_multi_arch_same() {
                same_count += 1;
            } else {
                non_same_count += 1;
            }
        }
        if non_same_count > 1 {
            return Err(ConsistencyError::MultipleNonSameInstalled);
        }
        if same_count > 0 && non_same_count > 0 {
            return Err(ConsistencyError::MixedSameAndNonSame);
        }
        Ok(())
    }
}

/// Fatal consistency violations detected by [`PackageSet::check_consistency`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConsistencyError {
    /// More than one installed instance in this set is not `Multi-Arch:
    /// same`.
    MultipleNonSameInstalled,
    /// This set has both `Multi-Arch: same` and non-`same` installed
    /// instances at once.
    MixedSameAndNonSame,
}
crate::errors::error_enum!(ConsistencyError);

impl std::fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyError::MultipleNonSameInstalled => {
                write!(f, "more than one non-Multi-Arch:same instance installed")
            }
            ConsistencyError::MixedSameAndNonSame => {
                write!(f, "both Multi-Arch:same and non-same instances installed")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pkghash::arch::ArchTable;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut arches = ArchTable::new("amd64");
        let amd64 = arches.intern("amd64");
        let mut set = PackageSet::new("libc6");
        let a = set.get_or_create(amd64);
        let b = set.get_or_create(amd64);
        assert_eq!(a, b);
        assert_eq!(1, set.instances.len());
    }

    #[test]
    fn find_distinguishes_architectures() {
        let mut arches = ArchTable::new("amd64");
        let amd64 = arches.intern("amd64");
        let arm64 = arches.intern("arm64");
        let mut set = PackageSet::new("libc6");
        set.get_or_create(amd64);
        assert!(set.find(amd64).is_some());
        assert!(set.find(arm64).is_none());
    }

    #[test]
    fn single_installed_requires_exactly_one() {
        let mut arches = ArchTable::new("amd64");
        let amd64 = arches.intern("amd64");
        let arm64 = arches.intern("arm64");
        let mut set = PackageSet::new("libc6");
        let idx = set.get_or_create(amd64);
        assert!(set.single_installed().is_none());

        set.instance_mut(idx).installed = Some(dummy_pkgbin(amd64));
        assert_eq!(Some(idx), set.single_installed());

        let idx2 = set.get_or_create(arm64);
        set.instance_mut(idx2).installed = Some(dummy_pkgbin(arm64));
        assert!(set.single_installed().is_none());
    }

    fn dummy_pkgbin(arch: ArchHandle) -> PackageBin {
        // a minimal record sufficient for consistency tests; real instances
        // always go through pkgbin::parse.
        let raw = crate::control::RawParagraph::parse("Package: libc6\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0usize;
        let mut pkg = crate::pkghash::pkgbin::parse(
            &raw,
            crate::pkghash::pkgbin::StanzaKind::Status,
            &mut arches,
            move |_name| {
                n += 1;
                crate::pkghash::SetId::from_raw(n)
            },
            |arches, name| arches.intern(name),
        )
        .unwrap();
        pkg.architecture = arch;
        pkg
    }
}

// vim: foldmethod=marker
