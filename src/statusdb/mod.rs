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

//! `statusdb` journals the package database to disk: the canonical `status`
//! file, a directory of pending `updates/NNNN` stanzas, and the checkpoint
//! logic that folds them back together. Modeled on `modstatdb_*` in
//! `lib/dpkg/dbmodify.c`.

use crate::control::RawParagraph;
use crate::pkghash::{pkgbin, CommitSource, PkgHash, StanzaKind};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// How a [`StatusDb`] was opened; governs whether locks are acquired and
/// whether the admindir is created if missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Load only; never locks, never writes.
    ReadOnly,
    /// Load and lock for writing; fails if the admindir is missing.
    Write,
    /// Like [`Mode::Write`], but creates the admindir if it doesn't exist.
    WriteIfPossible,
    /// Like [`Mode::WriteIfPossible`]; reserved for callers that also need
    /// to assert the caller is privileged (the privilege check itself is a
    /// CLI-layer concern, out of scope here).
    NeedSuperuser,
}

impl Mode {
    fn creates_admindir(self) -> bool {
        matches!(self, Mode::WriteIfPossible | Mode::NeedSuperuser)
    }

    fn is_write(self) -> bool {
        matches!(self, Mode::Write | Mode::WriteIfPossible | Mode::NeedSuperuser)
    }
}

/// Number of pending `updates/NNNN` entries after which [`StatusDb::note`]
/// runs a checkpoint automatically.
const CHECKPOINT_THRESHOLD: u32 = 250;

/// Width of a zero-padded `updates/NNNN` filename.
const UPDATE_WIDTH: usize = 4;

/// Number of `#padding\n` lines preallocated in `updates/tmp.i` to reserve
/// filesystem extents before the real content is written.
const PADDING_LINES: usize = 512;

/// Error conditions raised opening, journaling, or checkpointing a
/// [`StatusDb`].
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A syscall failed, tagged with the operation that failed.
    Io(String, io::Error),
    /// Another process already holds the database or frontend lock.
    AlreadyLocked,
    /// A stanza failed to parse at the deb822 level.
    Control(crate::control::Error),
    /// A stanza failed pkghash-level validation or commit.
    PkgHash(crate::pkghash::Error),
    /// An `updates/` filename was not all-digit.
    BadUpdateFilename(String),
    /// Two `updates/` filenames had different zero-padded widths.
    InconsistentUpdateWidth,
}
crate::errors::error_enum!(Error);

impl Error {
    /// `true` if this error is a lock contention failure. Used by
    /// [`crate::DpkgError::kind`] to classify to
    /// [`crate::ErrorKind::AlreadyLocked`].
    pub fn is_locked(&self) -> bool {
        matches!(self, Error::AlreadyLocked)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(op, e) => write!(f, "{}: {}", op, e),
            Error::AlreadyLocked => write!(f, "another process has the database locked"),
            Error::Control(e) => write!(f, "{}", e),
            Error::PkgHash(e) => write!(f, "{}", e),
            Error::BadUpdateFilename(n) => write!(f, "updates/{} is not a numeric filename", n),
            Error::InconsistentUpdateWidth => {
                write!(f, "updates/ contains filenames of differing width")
            }
        }
    }
}

impl From<crate::control::Error> for Error {
    fn from(e: crate::control::Error) -> Self {
        Error::Control(e)
    }
}
impl From<crate::pkghash::Error> for Error {
    fn from(e: crate::pkghash::Error) -> Self {
        Error::PkgHash(e)
    }
}

fn io_err(op: &str, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::WouldBlock {
        Error::AlreadyLocked
    } else {
        Error::Io(op.to_owned(), e)
    }
}

/// Write `data` to `path` via the crate-wide atomic-file primitive: write to
/// a sibling `path.dpkg-tmp`, fsync, `rename()` over `path`, fsync the
/// parent directory. If `backup` is set and `path` already exists, it is
/// renamed to `path-old` (sibling, fsync'd) before the new content lands.
fn atomic_write(path: &Path, data: &[u8], backup: bool) -> Result<(), Error> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".dpkg-tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut tmp = File::create(&tmp_path).map_err(|e| io_err("create updates tmp", e))?;
    tmp.write_all(data).map_err(|e| io_err("write updates tmp", e))?;
    tmp.sync_all().map_err(|e| io_err("fsync updates tmp", e))?;
    drop(tmp);

    if backup && path.exists() {
        let mut old_name = path.as_os_str().to_owned();
        old_name.push("-old");
        fs::rename(path, PathBuf::from(old_name)).map_err(|e| io_err("backup status", e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| io_err("rename into place", e))?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn split_stanzas(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|s| !s.is_empty())
}

/// The on-disk package status database: a journal of `status` plus
/// `updates/NNNN`, and the in-memory [`PkgHash`] it was replayed into.
pub struct StatusDb {
    admindir: PathBuf,
    mode: Mode,
    pkgs: PkgHash,
    pending_updates: u32,
    lock_file: Option<File>,
    frontend_lock_file: Option<File>,
}

impl StatusDb {
    fn status_path(admindir: &Path) -> PathBuf {
        admindir.join("status")
    }

    fn updates_dir(admindir: &Path) -> PathBuf {
        admindir.join("updates")
    }

    fn lock_file_at(path: &Path) -> Result<File, Error> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|e| io_err("open lock file", e))
    }

    /// Run the open sequence from the design: create the admindir if the
    /// mode allows it, acquire locks for write modes, determine the host
    /// architecture, and replay the journal via [`StatusDb::cleanupdates`].
    pub fn open(admindir: impl Into<PathBuf>, mode: Mode, frontend_locked: bool, host_arch: &str) -> Result<Self, Error> {
        let admindir = admindir.into();

        if !admindir.exists() {
            if mode.creates_admindir() {
                fs::create_dir_all(&admindir).map_err(|e| io_err("create admindir", e))?;
            } else if mode.is_write() {
                return Err(io_err(
                    "admindir",
                    io::Error::new(io::ErrorKind::NotFound, "admindir does not exist"),
                ));
            }
        }
        let updates_dir = Self::updates_dir(&admindir);
        if mode.is_write() && !updates_dir.exists() {
            fs::create_dir_all(&updates_dir).map_err(|e| io_err("create updates dir", e))?;
        }

        let mut lock_file = None;
        let mut frontend_lock_file = None;
        if mode.is_write() {
            let lock = Self::lock_file_at(&admindir.join("lock"))?;
            lock.try_lock_exclusive().map_err(|e| io_err("lock admindir", e))?;
            lock_file = Some(lock);

            if !frontend_locked {
                let flock = Self::lock_file_at(&admindir.join("lock-frontend"))?;
                flock
                    .try_lock_exclusive()
                    .map_err(|e| io_err("lock frontend", e))?;
                frontend_lock_file = Some(flock);
            }
        }

        let host_arch = fs::read_to_string(admindir.join("arch"))
            .ok()
            .and_then(|s| s.lines().next().map(str::to_owned))
            .unwrap_or_else(|| host_arch.to_owned());

        let mut db = StatusDb {
            admindir,
            mode,
            pkgs: PkgHash::new(&host_arch),
            pending_updates: 0,
            lock_file,
            frontend_lock_file,
        };
        db.cleanupdates()?;
        Ok(db)
    }

    /// The package database built up by replaying `status` and the journal.
    pub fn packages(&self) -> &PkgHash {
        &self.pkgs
    }

    /// Mutably borrow the package database, e.g. to commit an `available`
    /// stanza read from a separate Packages file.
    pub fn packages_mut(&mut self) -> &mut PkgHash {
        &mut self.pkgs
    }

    fn numeric_update_files(&self) -> Result<Vec<(u32, PathBuf)>, Error> {
        let dir = Self::updates_dir(&self.admindir);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut width = None;
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| io_err("read updates dir", e))? {
            let entry = entry.map_err(|e| io_err("read updates entry", e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy().into_owned();
            if name == "tmp.i" {
                continue;
            }
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                log::warn!("updates/{} is junk, ignoring", name);
                continue;
            }
            match width {
                None => width = Some(name.len()),
                Some(w) if w != name.len() => return Err(Error::InconsistentUpdateWidth),
                _ => {}
            }
            let n: u32 = name
                .parse()
                .map_err(|_| Error::BadUpdateFilename(name.clone()))?;
            out.push((n, entry.path()));
        }
        out.sort_by_key(|(n, _)| *n);
        Ok(out)
    }

    /// Replay `status` and every pending `updates/NNNN` entry, in order,
    /// into the in-memory [`PkgHash`]. If this database is open for
    /// writing, checkpoints the result back to `status` and unlinks the
    /// consumed update files. Idempotent: running it again on the resulting
    /// on-disk state is a no-op.
    fn cleanupdates(&mut self) -> Result<(), Error> {
        let status_path = Self::status_path(&self.admindir);
        if let Ok(text) = fs::read_to_string(&status_path) {
            for stanza in split_stanzas(&text) {
                self.commit_stanza(stanza, CommitSource::Status)?;
            }
        }

        let updates = self.numeric_update_files()?;
        if updates.is_empty() {
            return Ok(());
        }

        for (_, path) in &updates {
            let text = fs::read_to_string(path).map_err(|e| io_err("read update", e))?;
            for stanza in split_stanzas(&text) {
                self.commit_stanza(stanza, CommitSource::Update)?;
            }
        }

        if self.mode.is_write() {
            self.checkpoint()?;
        }
        Ok(())
    }

    fn commit_stanza(&mut self, stanza: &str, source: CommitSource) -> Result<(), Error> {
        let raw = RawParagraph::parse(stanza)?;
        self.pkgs
            .parse_and_commit(&raw, StanzaKind::Status, source)?;
        Ok(())
    }

    fn render_status_file(&self) -> String {
        let mut out = String::new();
        for set in self.iter_sets() {
            for inst in &set.instances {
                if let Some(pkg) = &inst.installed {
                    let raw = pkgbin::to_raw_paragraph(pkg, self.pkgs.arches(), |id| {
                        self.pkgs.set(id).name.clone()
                    });
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    for field in raw.iter() {
                        out.push_str(&field.key);
                        out.push_str(": ");
                        out.push_str(&field.value);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    fn iter_sets(&self) -> impl Iterator<Item = &crate::pkghash::PackageSet> {
        (0..self.pkgs.len()).map(|i| self.pkgs.set(crate::pkghash::SetId::from_raw(i)))
    }

    /// Rewrite `status` atomically from the current in-memory state (with a
    /// `status-old` backup of the previous contents) and unlink every
    /// consumed `updates/NNNN` file.
    pub fn checkpoint(&mut self) -> Result<(), Error> {
        let status_path = Self::status_path(&self.admindir);
        let rendered = self.render_status_file();
        atomic_write(&status_path, rendered.as_bytes(), true)?;

        for (_, path) in self.numeric_update_files()? {
            let _ = fs::remove_file(path);
        }
        self.pending_updates = 0;
        Ok(())
    }

    /// Append one package's stanza to the journal: write `updates/tmp.i`
    /// (preallocated with padding lines, truncated to the real content,
    /// fsync'd), rename to the next `updates/NNNN`, fsync the directory.
    /// Commits the package into the in-memory [`PkgHash`] as well, and runs
    /// a checkpoint once the pending-update count exceeds
    /// [`CHECKPOINT_THRESHOLD`] (i.e. on the 251st `note` after the last
    /// checkpoint, matching dpkg's `if (++nextupdate > 250)`).
    pub fn note(&mut self, pkg: pkgbin::PackageBin) -> Result<(), Error> {
        let raw = pkgbin::to_raw_paragraph(&pkg, self.pkgs.arches(), |id| {
            self.pkgs.set(id).name.clone()
        });
        let mut content = String::new();
        for field in raw.iter() {
            content.push_str(&field.key);
            content.push_str(": ");
            content.push_str(&field.value);
            content.push('\n');
        }

        let updates_dir = Self::updates_dir(&self.admindir);
        let tmp_path = updates_dir.join("tmp.i");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| io_err("create updates/tmp.i", e))?;
            for _ in 0..PADDING_LINES {
                tmp.write_all(b"#padding\n")
                    .map_err(|e| io_err("pad updates/tmp.i", e))?;
            }
            tmp.set_len(content.len() as u64)
                .map_err(|e| io_err("truncate updates/tmp.i", e))?;
            use std::io::Seek;
            tmp.seek(io::SeekFrom::Start(0))
                .map_err(|e| io_err("seek updates/tmp.i", e))?;
            tmp.write_all(content.as_bytes())
                .map_err(|e| io_err("write updates/tmp.i", e))?;
            tmp.sync_all().map_err(|e| io_err("fsync updates/tmp.i", e))?;
        }

        let next = self.next_update_number()?;
        let final_name = format!("{:0width$}", next, width = UPDATE_WIDTH);
        let final_path = updates_dir.join(final_name);
        fs::rename(&tmp_path, &final_path).map_err(|e| io_err("rename update into place", e))?;
        if let Ok(dir) = File::open(&updates_dir) {
            let _ = dir.sync_all();
        }

        self.pkgs.commit(pkg, CommitSource::Update)?;

        self.pending_updates += 1;
        if self.pending_updates > CHECKPOINT_THRESHOLD {
            self.checkpoint()?;
        }
        Ok(())
    }

    fn next_update_number(&self) -> Result<u32, Error> {
        let existing = self.numeric_update_files()?;
        Ok(existing.last().map(|(n, _)| n + 1).unwrap_or(1))
    }

    /// Read an `available`-style Packages stream, committing each stanza
    /// with [`CommitSource::Available`]. Called only when the caller
    /// explicitly asked for `available` to be loaded.
    pub fn load_available(&mut self, mut reader: impl Read) -> Result<(), Error> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| io_err("read available", e))?;
        for stanza in split_stanzas(&text) {
            self.commit_stanza(stanza, CommitSource::Available)?;
        }
        Ok(())
    }

    /// Final checkpoint (if open for writing) and release of both locks.
    pub fn shutdown(mut self) -> Result<(), Error> {
        if self.mode.is_write() {
            self.checkpoint()?;
        }
        if let Some(f) = self.lock_file.take() {
            let _ = FileExt::unlock(&f);
        }
        if let Some(f) = self.frontend_lock_file.take() {
            let _ = FileExt::unlock(&f);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn status_stanza(name: &str, version: &str) -> String {
        format!(
            "Package: {name}\nStatus: install ok installed\nMaintainer: m\nVersion: {version}\nDescription: d\nArchitecture: amd64\n",
        )
    }

    #[test]
    fn open_creates_admindir_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let admindir = dir.path().join("dpkg");
        let db = StatusDb::open(&admindir, Mode::WriteIfPossible, true, "amd64").unwrap();
        assert!(admindir.join("updates").is_dir());
        db.shutdown().unwrap();
    }

    #[test]
    fn note_writes_journal_and_commits_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let admindir = dir.path().join("dpkg");
        let mut db = StatusDb::open(&admindir, Mode::WriteIfPossible, true, "amd64").unwrap();

        let raw = RawParagraph::parse(&status_stanza("foo", "1.0")).unwrap();
        let pkg = pkgbin::parse(
            &raw,
            StanzaKind::Status,
            db.packages_mut().arches_mut(),
            |name| db.packages_mut().get_or_create(name),
            |a, n| a.intern(n),
        )
        .unwrap();
        db.note(pkg).unwrap();

        assert!(db.packages().lookup("foo").is_some());
        let entries: Vec<_> = fs::read_dir(admindir.join("updates")).unwrap().collect();
        assert_eq!(1, entries.len());
        db.shutdown().unwrap();
    }

    #[test]
    fn checkpoint_on_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let admindir = dir.path().join("dpkg");
        let mut db = StatusDb::open(&admindir, Mode::WriteIfPossible, true, "amd64").unwrap();

        for i in 0..251 {
            let raw = RawParagraph::parse(&status_stanza("foo", &format!("1.{i}"))).unwrap();
            let pkg = pkgbin::parse(
                &raw,
                StanzaKind::Status,
                db.packages_mut().arches_mut(),
                |name| db.packages_mut().get_or_create(name),
                |a, n| a.intern(n),
            )
            .unwrap();
            db.note(pkg).unwrap();
        }

        let updates_left = fs::read_dir(admindir.join("updates")).unwrap().count();
        assert_eq!(0, updates_left);
        let status_text = fs::read_to_string(admindir.join("status")).unwrap();
        assert!(status_text.contains("1.250"));
        db.shutdown().unwrap();
    }

    #[test]
    fn load_available_commits_available_records() {
        let dir = tempfile::tempdir().unwrap();
        let admindir = dir.path().join("dpkg");
        let mut db = StatusDb::open(&admindir, Mode::WriteIfPossible, true, "amd64").unwrap();
        let available = "Package: foo\nMaintainer: m\nVersion: 2.0\nDescription: d\nArchitecture: amd64\n\n";
        db.load_available(Cursor::new(available)).unwrap();
        assert!(db.packages().lookup("foo").is_some());
        db.shutdown().unwrap();
    }
}

// vim: foldmethod=marker
