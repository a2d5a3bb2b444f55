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

//! `alternatives` implements the `update-alternatives` administrative
//! database: the per-group admin file under `<admindir>/alternatives/`, the
//! auto/manual state machine, and the transactional commit engine that
//! swaps the symlink farm. Modeled on `utils/update-alternatives.c`.
//!
//! The selected target under `manual` status is not stored redundantly in
//! the admin file; [`Alternative::set_manual`] records it in memory for the
//! rest of this session, and a freshly [`AlternativesDb::load`]-ed record
//! (which has no in-memory pick yet) recovers it from whatever
//! `<altdir>/<name>` already points at on disk instead (see
//! [`Alternative::current_selection`]). This mirrors the source, where the
//! public symlink itself is the source of truth for "what is currently
//! selected" across process runs, and the admin file only records the
//! candidate list, their priorities, and whether selection is automatic.

use crate::Session;
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Failure operating on an [`Alternative`] or the on-disk admin record.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// `master_name` contained `/` or whitespace.
    InvalidMasterName(String),
    /// `master_link` was not absolute.
    MasterLinkNotAbsolute(PathBuf),
    /// A slave link collided with the master link, or a slave name/link
    /// was not unique within the group.
    DuplicateSlave(String),
    /// [`Alternative::install_choice`] was given a `master_file` that does
    /// not exist on disk.
    MasterFileMissing(PathBuf),
    /// [`Alternative::set_manual`] was given a `master_file` not present
    /// among the group's choices.
    NoSuchChoice(PathBuf),
    /// An underlying I/O failure, tagged with the operation that failed.
    Io(String, io::Error),
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidMasterName(n) => write!(f, "alternative name `{}' is invalid", n),
            Error::MasterLinkNotAbsolute(p) => {
                write!(f, "alternative link `{}' is not absolute", p.display())
            }
            Error::DuplicateSlave(n) => write!(f, "slave `{}' is not unique in this group", n),
            Error::MasterFileMissing(p) => write!(f, "alternative `{}' doesn't exist", p.display()),
            Error::NoSuchChoice(p) => write!(f, "alternative `{}' is not registered", p.display()),
            Error::Io(op, e) => write!(f, "{}: {}", op, e),
        }
    }
}

fn io_err(op: &str, e: io::Error) -> Error {
    Error::Io(op.to_owned(), e)
}

/// Auto/manual selection mode for an [`Alternative`] group, per §3.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// The current selection is recomputed by priority every run.
    Auto,
    /// The current selection is fixed until the admin picks another one.
    Manual,
}

/// A secondary symlink managed in lockstep with a group's master link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlaveLink {
    /// Slave name, used as the key into each [`FileSet::slave_map`] and as
    /// the admin-directory filename for this slave's own indirection
    /// symlink.
    pub name: String,
    /// Public symlink path this slave manages (analogous to `master_link`).
    pub link: PathBuf,
}

/// One named alternative choice: the master target plus its priority and
/// the slave targets it supplies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSet {
    /// The master target this choice provides, e.g. `/usr/bin/vim.basic`.
    pub master_file: PathBuf,
    /// Priority; higher wins ties in `auto` mode.
    pub priority: i32,
    /// Slave name -> path this choice supplies. A slave absent from this
    /// map is "not provided" by this choice.
    pub slave_map: HashMap<String, PathBuf>,
}

/// One step of the transactional symlink swap: remove a path, or
/// atomically replace `dst` with `src` via `rename()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Unlink a path. Missing-file errors are swallowed; removing
    /// something already gone is not a failure.
    Rm(PathBuf),
    /// `rename(src, dst)`, replacing `dst` if it exists.
    Mv(PathBuf, PathBuf),
}

/// An administrative record: one master/slave symlink group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternative {
    /// Group name; has no `/` or whitespace, and is also the admin
    /// filename under `<admindir>/alternatives/`.
    pub master_name: String,
    /// Public symlink path the admin/user sees, e.g. `/usr/bin/editor`.
    pub master_link: PathBuf,
    /// Current selection mode.
    pub status: Status,
    /// Slave links managed alongside the master.
    pub slaves: Vec<SlaveLink>,
    /// Registered choices.
    pub choices: Vec<FileSet>,
    /// Set by [`AlternativesDb::load`] when a lax-parse reload dropped a
    /// choice whose `master_file` no longer exists; callers should
    /// [`AlternativesDb::save`] again to persist the drop.
    pub modified: bool,
    /// The choice [`Alternative::set_manual`] picked this session. Not
    /// written to the admin record (the file format has no field for it,
    /// per the resolved open question in the design notes); when `None`,
    /// [`Alternative::current_selection`] falls back to whatever
    /// `<altdir>/<name>` already points at on disk, which is how a freshly
    /// [`AlternativesDb::load`]-ed manual record recovers its target.
    manual_selection: Option<PathBuf>,
    commit_ops: Vec<Op>,
}

impl Alternative {
    /// Construct an empty group, validating `master_name`/`master_link`.
    pub fn new(master_name: impl Into<String>, master_link: impl Into<PathBuf>) -> Result<Self, Error> {
        let master_name = master_name.into();
        if master_name.is_empty() || master_name.contains('/') || master_name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidMasterName(master_name));
        }
        let master_link = master_link.into();
        if !master_link.is_absolute() {
            return Err(Error::MasterLinkNotAbsolute(master_link));
        }
        Ok(Alternative {
            master_name,
            master_link,
            status: Status::Auto,
            slaves: Vec::new(),
            choices: Vec::new(),
            modified: false,
            manual_selection: None,
            commit_ops: Vec::new(),
        })
    }

    /// Register a slave. Errors if its link collides with the master link
    /// or with any slave already registered.
    pub fn add_slave(&mut self, name: impl Into<String>, link: impl Into<PathBuf>) -> Result<(), Error> {
        let name = name.into();
        let link = link.into();
        if link == self.master_link {
            return Err(Error::DuplicateSlave(name));
        }
        if self.slaves.iter().any(|s| s.name == name || s.link == link) {
            return Err(Error::DuplicateSlave(name));
        }
        self.slaves.push(SlaveLink { name, link });
        Ok(())
    }

    /// Register or replace a choice. Errors if `fileset.master_file` does
    /// not exist on disk, per the registration-time invariant in §3.
    pub fn install_choice(&mut self, fileset: FileSet) -> Result<(), Error> {
        if !fileset.master_file.exists() {
            return Err(Error::MasterFileMissing(fileset.master_file));
        }
        if let Some(existing) = self
            .choices
            .iter_mut()
            .find(|c| c.master_file == fileset.master_file)
        {
            *existing = fileset;
        } else {
            self.choices.push(fileset);
        }
        Ok(())
    }

    /// Remove the choice providing `master_file`. Returns `true` if the
    /// group now has no choices left at all (the caller should then remove
    /// the whole admin record and every symlink, per the boundary case in
    /// §8).
    ///
    /// This does not itself detect whether `master_file` was the active
    /// manual selection; callers should run [`Alternative::reconcile`]
    /// right after a removal that might affect the current selection, since
    /// that's the only place the on-disk symlink gets consulted.
    pub fn remove_choice(&mut self, master_file: &Path) -> bool {
        self.choices.retain(|c| c.master_file != master_file);
        self.choices.is_empty()
    }

    /// Fix the current selection to `master_file`. Errors if it is not
    /// among this group's registered choices.
    pub fn set_manual(&mut self, master_file: &Path) -> Result<(), Error> {
        if !self.choices.iter().any(|c| c.master_file == master_file) {
            return Err(Error::NoSuchChoice(master_file.to_path_buf()));
        }
        self.status = Status::Manual;
        self.manual_selection = Some(master_file.to_path_buf());
        Ok(())
    }

    /// Switch back to automatic selection.
    pub fn set_auto(&mut self) {
        self.status = Status::Auto;
        self.manual_selection = None;
    }

    /// The public per-name link under `session.altdir()` that the master
    /// link should point at, and that actually carries the chosen target.
    fn altdir_master_link(&self, session: &Session) -> PathBuf {
        session.altdir().join(&self.master_name)
    }

    fn altdir_slave_link(&self, session: &Session, slave: &SlaveLink) -> PathBuf {
        session.altdir().join(&slave.name)
    }

    /// The choice currently in effect. In `auto` mode this is the
    /// highest-priority choice (ties broken by whichever one the on-disk
    /// `<altdir>/<name>` link already points to, else by list order). In
    /// `manual` mode this is [`Alternative::manual_selection`] if
    /// [`Alternative::set_manual`] picked one this session, falling back to
    /// whatever `<altdir>/<name>` points to otherwise (the case right after
    /// [`AlternativesDb::load`]); if that target isn't a registered choice
    /// (removed or dangling), returns `None` (callers should
    /// [`Alternative::reconcile`] first to fold that back into `auto`).
    pub fn current_selection(&self, session: &Session) -> Option<&FileSet> {
        match self.status {
            Status::Auto => self.auto_best(session),
            Status::Manual => {
                let target = self
                    .manual_selection
                    .clone()
                    .or_else(|| fs::read_link(self.altdir_master_link(session)).ok())?;
                self.choices.iter().find(|c| c.master_file == target)
            }
        }
    }

    fn auto_best(&self, session: &Session) -> Option<&FileSet> {
        let current = fs::read_link(self.altdir_master_link(session)).ok();
        self.choices.iter().max_by(|a, b| {
            a.priority.cmp(&b.priority).then_with(|| {
                let a_is_current = current.as_deref() == Some(a.master_file.as_path());
                let b_is_current = current.as_deref() == Some(b.master_file.as_path());
                a_is_current.cmp(&b_is_current)
            })
        })
    }

    /// External detection, per §4.8: if the admin symlink points somewhere
    /// other than `<altdir>/<name>`, or the `<altdir>/<name>` target isn't
    /// a registered choice while we think we're manual, fall back to auto
    /// with a warning. If we're auto and `<altdir>/<name>` points to a
    /// real registered choice that isn't the computed best, flip to manual
    /// (the admin edited the symlink by hand). Returns `true` if `status`
    /// changed.
    pub fn reconcile(&mut self, session: &Session) -> bool {
        let altdir_link = self.altdir_master_link(session);
        let on_disk = fs::read_link(&altdir_link).ok();

        match (self.status, &on_disk) {
            (Status::Manual, Some(target)) => {
                if !self.choices.iter().any(|c| &c.master_file == target) {
                    warn!(
                        "alternative {} is manual but its target is gone; switching back to auto",
                        self.master_name
                    );
                    self.status = Status::Auto;
                    self.manual_selection = None;
                    true
                } else {
                    false
                }
            }
            (Status::Manual, None) => {
                warn!(
                    "alternative {} is manual but its link is dangling; switching back to auto",
                    self.master_name
                );
                self.status = Status::Auto;
                self.manual_selection = None;
                true
            }
            (Status::Auto, Some(target)) => {
                let best = self.auto_best(session).map(|c| c.master_file.clone());
                if best.as_deref() != Some(target.as_path())
                    && self.choices.iter().any(|c| &c.master_file == target)
                {
                    warn!(
                        "alternative {} was manually pointed elsewhere; switching to manual",
                        self.master_name
                    );
                    self.status = Status::Manual;
                    self.manual_selection = Some(target.clone());
                    true
                } else {
                    false
                }
            }
            (Status::Auto, None) => false,
        }
    }

    /// `true` if the admin symlink or any expected slave link is broken or
    /// wrong and [`Alternative::prepare_commit`] would need to repair it.
    pub fn needs_update(&self, session: &Session) -> bool {
        let Some(choice) = self.current_selection(session) else {
            return true;
        };
        if fs::read_link(self.altdir_master_link(session)).ok().as_deref() != Some(choice.master_file.as_path()) {
            return true;
        }
        for slave in &self.slaves {
            let expected = choice.slave_map.get(&slave.name);
            let actual = fs::read_link(self.altdir_slave_link(session, slave)).ok();
            match expected {
                Some(path) if path.exists() => {
                    if actual.as_ref() != Some(path) {
                        return true;
                    }
                }
                _ => {
                    if actual.is_some() {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Build (but do not execute) the symlink operations needed to bring
    /// disk state in line with [`Alternative::current_selection`]. If no
    /// choice is selected (the group is empty), enqueues removal of every
    /// symlink this group owns instead.
    pub fn prepare_commit(&mut self, session: &Session) -> io::Result<()> {
        self.commit_ops.clear();
        let altdir_link = self.altdir_master_link(session);

        let Some(choice) = self.current_selection(session).cloned() else {
            self.commit_ops.push(Op::Rm(altdir_link));
            self.commit_ops.push(Op::Rm(self.master_link.clone()));
            for slave in &self.slaves {
                self.commit_ops.push(Op::Rm(self.altdir_slave_link(session, slave)));
                self.commit_ops.push(Op::Rm(slave.link.clone()));
            }
            return Ok(());
        };

        enqueue_symlink_update(&mut self.commit_ops, &altdir_link, &choice.master_file)?;
        enqueue_symlink_update(&mut self.commit_ops, &self.master_link, &altdir_link)?;

        for slave in &self.slaves {
            let admin_slave_link = self.altdir_slave_link(session, slave);
            match choice.slave_map.get(&slave.name) {
                Some(target) if target.exists() => {
                    enqueue_symlink_update(&mut self.commit_ops, &admin_slave_link, target)?;
                    enqueue_symlink_update(&mut self.commit_ops, &slave.link, &admin_slave_link)?;
                }
                _ => {
                    self.commit_ops.push(Op::Rm(admin_slave_link));
                    self.commit_ops.push(Op::Rm(slave.link.clone()));
                }
            }
        }
        Ok(())
    }

    /// [`Alternative::prepare_commit`] followed by executing every queued
    /// [`Op`] in order. The queue is drained whether or not execution
    /// succeeds partway through, matching the no-retry error policy in
    /// §4.9: a partial failure here is fatal to the caller, not something
    /// this type tries to resume.
    pub fn commit(&mut self, session: &Session) -> Result<(), Error> {
        self.prepare_commit(session).map_err(|e| io_err("prepare commit", e))?;
        let ops = std::mem::take(&mut self.commit_ops);
        run_ops(ops)
    }
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".dpkg-tmp");
    PathBuf::from(name)
}

/// Stage one symlink update: create `target` at a sibling `.dpkg-tmp` path
/// beside `link`, then enqueue the atomic rename over `link` itself.
fn enqueue_symlink_update(ops: &mut Vec<Op>, link: &Path, target: &Path) -> io::Result<()> {
    let tmp = sibling_tmp(link);
    let _ = fs::remove_file(&tmp);
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(target, &tmp)?;
    ops.push(Op::Mv(tmp, link.to_path_buf()));
    Ok(())
}

fn run_ops(ops: Vec<Op>) -> Result<(), Error> {
    for op in ops {
        match op {
            Op::Rm(path) => {
                let _ = fs::remove_file(&path);
            }
            Op::Mv(src, dst) => {
                fs::rename(&src, &dst).map_err(|e| io_err("commit alternative symlink", e))?;
            }
        }
    }
    Ok(())
}

/// Parse an admin-file blob into an [`Alternative`]. `master_name` is
/// supplied by the caller (it's the admin filename, not stored in the
/// file body). Returns `None` on any structural problem; per
/// `ALTDB_LAX_PARSER`, callers treat that as "this alternative doesn't
/// exist" rather than propagating a hard error.
fn parse(master_name: &str, text: &str) -> Option<Alternative> {
    let mut lines = text.lines();
    let status = match lines.next()? {
        "auto" => Status::Auto,
        "manual" => Status::Manual,
        _ => return None,
    };
    let master_link = lines.next()?;
    if master_link.is_empty() {
        return None;
    }
    let master_link = PathBuf::from(master_link);
    if !master_link.is_absolute() {
        return None;
    }

    let mut slaves = Vec::new();
    loop {
        let name = lines.next()?;
        if name.is_empty() {
            break;
        }
        let link = lines.next()?;
        if link.is_empty() {
            return None;
        }
        slaves.push(SlaveLink {
            name: name.to_string(),
            link: PathBuf::from(link),
        });
    }

    let mut choices = Vec::new();
    loop {
        let master_file = match lines.next() {
            None => break,
            Some(s) if s.is_empty() => continue,
            Some(s) => s,
        };
        let priority: i32 = lines.next()?.parse().ok()?;
        let mut slave_map = HashMap::new();
        for slave in &slaves {
            let path_line = lines.next()?;
            if !path_line.is_empty() {
                slave_map.insert(slave.name.clone(), PathBuf::from(path_line));
            }
        }
        choices.push(FileSet {
            master_file: PathBuf::from(master_file),
            priority,
            slave_map,
        });
    }

    Some(Alternative {
        master_name: master_name.to_string(),
        master_link,
        status,
        slaves,
        choices,
        modified: false,
        manual_selection: None,
        commit_ops: Vec::new(),
    })
}

fn render(alt: &Alternative) -> String {
    let mut out = String::new();
    out.push_str(match alt.status {
        Status::Auto => "auto\n",
        Status::Manual => "manual\n",
    });
    out.push_str(&format!("{}\n", alt.master_link.display()));
    for slave in &alt.slaves {
        out.push_str(&format!("{}\n{}\n", slave.name, slave.link.display()));
    }
    out.push('\n');
    for choice in &alt.choices {
        out.push_str(&format!("{}\n{}\n", choice.master_file.display(), choice.priority));
        for slave in &alt.slaves {
            match choice.slave_map.get(&slave.name) {
                Some(path) => out.push_str(&path.display().to_string()),
                None => {}
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// The on-disk admin directory `<admindir>/alternatives/`.
pub struct AlternativesDb {
    dir: PathBuf,
}

impl AlternativesDb {
    /// Open the admin directory from a [`Session`]. Does not create it;
    /// [`AlternativesDb::save`] does that on first write.
    pub fn open(session: &Session) -> Self {
        AlternativesDb {
            dir: session.alternatives_admindir(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load one group by name. Returns `Ok(None)` both when the file is
    /// missing and when it fails the lax parse (per `ALTDB_LAX_PARSER`).
    /// If load drops a choice whose `master_file` vanished from disk,
    /// the returned [`Alternative::modified`] is `true`.
    pub fn load(&self, name: &str) -> Result<Option<Alternative>, Error> {
        let path = self.path_for(name);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read alternative record", e)),
        };
        let Some(mut alt) = parse(name, &text) else {
            warn!("alternative record {} is corrupt; treating as absent", name);
            return Ok(None);
        };
        let before = alt.choices.len();
        alt.choices.retain(|c| {
            let ok = c.master_file.exists();
            if !ok {
                warn!(
                    "alternative {} choice `{}' no longer exists; dropping",
                    name,
                    c.master_file.display()
                );
            }
            ok
        });
        if alt.choices.len() != before {
            alt.modified = true;
        }
        Ok(Some(alt))
    }

    /// List every group name currently on disk.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        match fs::read_dir(&self.dir) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry.map_err(|e| io_err("read alternatives dir", e))?;
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err("read alternatives dir", e)),
        }
        names.sort();
        Ok(names)
    }

    /// Write `alt`'s admin record atomically (temp file + fsync + rename).
    pub fn save(&self, alt: &Alternative) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).map_err(|e| io_err("create alternatives dir", e))?;
        let path = self.path_for(&alt.master_name);
        let tmp_path = sibling_tmp(&path);
        let rendered = render(alt);
        {
            use std::io::Write;
            let mut tmp = fs::File::create(&tmp_path).map_err(|e| io_err("create record tmp", e))?;
            tmp.write_all(rendered.as_bytes())
                .map_err(|e| io_err("write record tmp", e))?;
            tmp.sync_all().map_err(|e| io_err("fsync record tmp", e))?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| io_err("rename record into place", e))?;
        if let Ok(dir) = fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    /// Delete a group's admin record file. Does not touch any symlinks;
    /// callers remove those via [`Alternative::prepare_commit`]/`commit`
    /// with an empty choice list first.
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove alternative record", e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn parse_render_round_trip() {
        let mut alt = Alternative::new("editor", "/usr/bin/editor").unwrap();
        alt.add_slave("editor.1.gz", "/usr/share/man/man1/editor.1.gz")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let nano = dir.path().join("nano");
        let vim = dir.path().join("vim");
        touch(&nano);
        touch(&vim);
        let mut nano_slaves = HashMap::new();
        nano_slaves.insert("editor.1.gz".to_string(), dir.path().join("nano.1.gz"));
        alt.install_choice(FileSet {
            master_file: nano.clone(),
            priority: 40,
            slave_map: nano_slaves,
        })
        .unwrap();
        alt.install_choice(FileSet {
            master_file: vim.clone(),
            priority: 50,
            slave_map: HashMap::new(),
        })
        .unwrap();

        let rendered = render(&alt);
        let back = parse("editor", &rendered).unwrap();
        assert_eq!(back.master_link, alt.master_link);
        assert_eq!(back.slaves, alt.slaves);
        assert_eq!(back.choices.len(), 2);
        assert_eq!(back.status, Status::Auto);
    }

    #[test]
    fn auto_picks_highest_priority() {
        let admindir = tempfile::tempdir().unwrap();
        let session = Session::new(admindir.path());
        let mut alt = Alternative::new("editor", "/usr/bin/editor").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let nano = dir.path().join("nano");
        let vim = dir.path().join("vim");
        touch(&nano);
        touch(&vim);
        alt.install_choice(FileSet {
            master_file: nano.clone(),
            priority: 40,
            slave_map: HashMap::new(),
        })
        .unwrap();
        alt.install_choice(FileSet {
            master_file: vim.clone(),
            priority: 50,
            slave_map: HashMap::new(),
        })
        .unwrap();

        let choice = alt.current_selection(&session).unwrap();
        assert_eq!(choice.master_file, vim);
    }

    #[test]
    fn manual_switch_and_fallback_to_auto_on_removal() {
        let admindir = tempfile::tempdir().unwrap();
        let altdir = tempfile::tempdir().unwrap();
        let session = Session::new(admindir.path()).with_altdir(altdir.path());

        let dir = tempfile::tempdir().unwrap();
        let nano = dir.path().join("nano");
        let vim = dir.path().join("vim");
        touch(&nano);
        touch(&vim);

        let mut alt = Alternative::new("editor", "/usr/bin/editor").unwrap();
        alt.install_choice(FileSet {
            master_file: nano.clone(),
            priority: 40,
            slave_map: HashMap::new(),
        })
        .unwrap();
        alt.install_choice(FileSet {
            master_file: vim.clone(),
            priority: 50,
            slave_map: HashMap::new(),
        })
        .unwrap();

        alt.commit(&session).unwrap();
        assert_eq!(
            fs::read_link(altdir.path().join("editor")).unwrap(),
            vim
        );

        alt.set_manual(&nano).unwrap();
        alt.commit(&session).unwrap();
        assert_eq!(alt.status, Status::Manual);
        assert_eq!(
            fs::read_link(altdir.path().join("editor")).unwrap(),
            nano
        );

        let emptied = alt.remove_choice(&nano);
        assert!(!emptied);
        let flipped = alt.reconcile(&session);
        assert!(flipped);
        assert_eq!(alt.status, Status::Auto);
        alt.commit(&session).unwrap();
        assert_eq!(
            fs::read_link(altdir.path().join("editor")).unwrap(),
            vim
        );
    }

    #[test]
    fn removing_last_choice_tears_down_every_link() {
        let admindir = tempfile::tempdir().unwrap();
        let altdir = tempfile::tempdir().unwrap();
        let session = Session::new(admindir.path()).with_altdir(altdir.path());
        let masterdir = tempfile::tempdir().unwrap();
        let master_link = masterdir.path().join("editor");

        let dir = tempfile::tempdir().unwrap();
        let nano = dir.path().join("nano");
        touch(&nano);

        let mut alt = Alternative::new("editor", &master_link).unwrap();
        alt.install_choice(FileSet {
            master_file: nano.clone(),
            priority: 40,
            slave_map: HashMap::new(),
        })
        .unwrap();
        alt.commit(&session).unwrap();
        assert!(master_link.exists());

        let emptied = alt.remove_choice(&nano);
        assert!(emptied);
        alt.commit(&session).unwrap();
        assert!(fs::symlink_metadata(&master_link).is_err());
        assert!(fs::symlink_metadata(altdir.path().join("editor")).is_err());
    }
}

// vim: foldmethod=marker
