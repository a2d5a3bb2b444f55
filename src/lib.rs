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

#![deny(missing_copy_implementations)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

//! `dpkg-suite` implements the hardest load-bearing parts of the historical
//! `dpkg` tool chain as a library: the package-database core (deb822
//! parsing, the field dispatch table, the package hash table, and the
//! status-file journal), the multipart `.deb` split/join archive format and
//! its part-queue depot, and the `update-alternatives` symlink-group
//! database and commit engine.
//!
//! This crate does not implement a CLI, a `.deb` archive builder, or any
//! compression backend; those are thin wrappers meant to sit on top of the
//! types here. See [`Session`] for the shared configuration every
//! filesystem-facing module is built from.
//!
//! # Feature Flags
//!
//! | Flag      | Description                                               |
//! | --------- | ---------------------------------------------------------|
//! | `full`    | Enable all optional features.                             |
//! | `serde`   | Enable [serde::Serialize]/[serde::Deserialize] on the data model types. |

pub(crate) mod errors;

pub mod alternatives;
pub mod architecture;
pub mod arena;
pub mod arreader;
pub mod build_profile;
pub mod control;
pub mod dependency;
pub mod partqueue;
pub mod pkghash;
pub mod splitformat;
pub mod statusdb;
pub mod varbuf;
pub mod version;

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`DpkgError`], matching the error kinds named
/// in the package-database error handling design: bad CLI usage, corrupt
/// on-disk data, a syscall failure, a violated in-core invariant, a missing
/// package/alternative, or a contended database lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bad command-line usage. Not produced by this crate directly (the CLI
    /// parser is out of scope) but reserved for wrapping binaries.
    Usage,
    /// A database file, split part, or control stanza failed to parse.
    Parse,
    /// A syscall (open/read/write/rename/fsync/lock) failed.
    Io,
    /// An in-core invariant was violated (e.g. an ambiguous package-hash
    /// slot selection, or a malformed dependency graph edge).
    Logic,
    /// The requested package, package set, or alternative does not exist.
    NotFound,
    /// Another process already holds the database or frontend lock.
    AlreadyLocked,
}

/// Umbrella error type for callers that don't want to match on every
/// module's local error enum. Every module error converts into this via
/// `From`; [`DpkgError::kind`] recovers the [`ErrorKind`] needed to compute
/// the exit codes documented for `dpkg-split` and `update-alternatives`.
#[derive(Debug)]
#[non_exhaustive]
pub enum DpkgError {
    /// Failure parsing or rendering a [`version::Version`].
    Version(version::Error),
    /// Failure parsing a deb822 control stanza or a known field.
    Control(control::Error),
    /// Failure parsing a dependency relation.
    Dependency(dependency::Error),
    /// Failure in the package hash table (ambiguous slot, bad invariant).
    PkgHash(pkghash::Error),
    /// Failure opening, journaling, or checkpointing the status database.
    StatusDb(statusdb::Error),
    /// Failure reading or writing the multipart split archive format.
    SplitFormat(splitformat::Error),
    /// Failure in the part-queue depot.
    PartQueue(partqueue::Error),
    /// Failure in the alternatives database or commit engine.
    Alternatives(alternatives::Error),
    /// A wrapped `std::io::Error`, tagged with the operation that failed.
    Io(String, std::io::Error),
}

impl DpkgError {
    /// Classify this error into one of the six coarse kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DpkgError::Version(_)
            | DpkgError::Control(_)
            | DpkgError::Dependency(_)
            | DpkgError::SplitFormat(_) => ErrorKind::Parse,
            DpkgError::PkgHash(_) => ErrorKind::Logic,
            DpkgError::StatusDb(e) if e.is_locked() => ErrorKind::AlreadyLocked,
            DpkgError::StatusDb(_) => ErrorKind::Parse,
            DpkgError::PartQueue(_) => ErrorKind::Parse,
            DpkgError::Alternatives(_) => ErrorKind::NotFound,
            DpkgError::Io(..) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for DpkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpkgError::Version(e) => write!(f, "{}", e),
            DpkgError::Control(e) => write!(f, "{}", e),
            DpkgError::Dependency(e) => write!(f, "{}", e),
            DpkgError::PkgHash(e) => write!(f, "{}", e),
            DpkgError::StatusDb(e) => write!(f, "{}", e),
            DpkgError::SplitFormat(e) => write!(f, "{}", e),
            DpkgError::PartQueue(e) => write!(f, "{}", e),
            DpkgError::Alternatives(e) => write!(f, "{}", e),
            DpkgError::Io(op, e) => write!(f, "{}: {}", op, e),
        }
    }
}

impl std::error::Error for DpkgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DpkgError::Version(e) => Some(e),
            DpkgError::Control(e) => Some(e),
            DpkgError::Dependency(e) => Some(e),
            DpkgError::PkgHash(e) => Some(e),
            DpkgError::StatusDb(e) => Some(e),
            DpkgError::SplitFormat(e) => Some(e),
            DpkgError::PartQueue(e) => Some(e),
            DpkgError::Alternatives(e) => Some(e),
            DpkgError::Io(_, e) => Some(e),
        }
    }
}

macro_rules! from_module_error {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for DpkgError {
            fn from(e: $ty) -> Self {
                DpkgError::$variant(e)
            }
        }
    };
}

from_module_error!(Version, version::Error);
from_module_error!(Control, control::Error);
from_module_error!(Dependency, dependency::Error);
from_module_error!(PkgHash, pkghash::Error);
from_module_error!(StatusDb, statusdb::Error);
from_module_error!(SplitFormat, splitformat::Error);
from_module_error!(PartQueue, partqueue::Error);
from_module_error!(Alternatives, alternatives::Error);

/// Shared, explicit configuration threaded through every filesystem-facing
/// module, replacing the source's global `admindir`/`altdir` variables
/// (`update-alternatives.c`'s `admindir_init`, `dpkg-split`'s `--depotdir`).
///
/// A `Session` carries no open file descriptors or locks itself; those are
/// owned by the RAII guards returned from e.g. [`statusdb::StatusDb::open`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    admindir: PathBuf,
    altdir: PathBuf,
    depotdir: Option<PathBuf>,
    frontend_locked: bool,
}

impl Session {
    /// Build a `Session` rooted at an explicit admindir, with the
    /// conventional `<admindir>/alternatives` layout and no depotdir
    /// override (callers of [`partqueue`] default to `<admindir>/parts`).
    pub fn new(admindir: impl Into<PathBuf>) -> Self {
        let admindir = admindir.into();
        let altdir = PathBuf::from("/etc/alternatives");
        Session {
            admindir,
            altdir,
            depotdir: None,
            frontend_locked: false,
        }
    }

    /// Build a `Session` from the environment, per §6: `DPKG_ADMINDIR`
    /// overrides the admindir (default `/var/lib/dpkg`); `DPKG_FRONTEND_LOCKED`
    /// being present means the frontend lock is assumed already held by a
    /// caller further up the stack and must not be re-acquired.
    pub fn from_env() -> Self {
        let admindir = env::var_os("DPKG_ADMINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/lib/dpkg"));
        let mut session = Session::new(admindir);
        session.frontend_locked = env::var_os("DPKG_FRONTEND_LOCKED").is_some();
        session
    }

    /// Override the alternatives runtime-link directory (default
    /// `/etc/alternatives`).
    pub fn with_altdir(mut self, altdir: impl Into<PathBuf>) -> Self {
        self.altdir = altdir.into();
        self
    }

    /// Override the part-queue depot directory (default
    /// `<admindir>/parts`).
    pub fn with_depotdir(mut self, depotdir: impl Into<PathBuf>) -> Self {
        self.depotdir = Some(depotdir.into());
        self
    }

    /// Root of dpkg's runtime state.
    pub fn admindir(&self) -> &Path {
        &self.admindir
    }

    /// Directory holding the `<name>` runtime symlinks for alternatives.
    pub fn altdir(&self) -> &Path {
        &self.altdir
    }

    /// Directory holding admin records for alternatives
    /// (`<admindir>/alternatives`).
    pub fn alternatives_admindir(&self) -> PathBuf {
        self.admindir.join("alternatives")
    }

    /// Directory holding in-flight split parts (`<admindir>/parts` unless
    /// overridden).
    pub fn depotdir(&self) -> PathBuf {
        self.depotdir
            .clone()
            .unwrap_or_else(|| self.admindir.join("parts"))
    }

    /// `true` if a caller further up the stack already holds the frontend
    /// lock and [`statusdb::StatusDb::open`] should not try to acquire it
    /// itself.
    pub fn frontend_locked(&self) -> bool {
        self.frontend_locked
    }
}

// vim: foldmethod=marker
