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

//! `partqueue` implements the `depotdir` auto-accumulation engine behind
//! `dpkg-split --auto|--listq|--discard`, modeled on `queue.c`: a flat
//! directory of part files named
//! `<md5:32hex>.<maxpartlen:hex>.<thispartn:hex>.<maxpartn:hex>`, with new
//! parts filed away until a group is complete, at which point it is
//! reassembled and the depot files that made it up are removed.

use crate::splitformat::{self, PartInfo};
use crate::Session;
use log::warn;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Failure operating on the part-queue depot.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The file given to `--auto` does not parse as a split part at all
    /// (exit status 1 per §6, distinct from every other failure here).
    NotAPart(splitformat::Error),
    /// Two depot files claim the same slot in the same group with
    /// different content.
    ConflictingPart(u32),
    /// A depot filename's embedded md5 disagreed with the md5 actually
    /// recorded in that file's own `debian-split` metadata. Per the
    /// resolved open question in the design notes, the filename is never
    /// trusted over the metadata; the file is excluded from its group.
    DepotMismatch(String),
    /// `--auto` would reassemble a complete group but no `--output` path
    /// was given.
    MissingOutput,
    /// Failure inside [`crate::splitformat`] reading a depot file that
    /// otherwise matched the naming scheme.
    SplitFormat(splitformat::Error),
    /// An underlying I/O failure, tagged with the operation that failed.
    Io(String, io::Error),
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotAPart(e) => write!(f, "{}", e),
            Error::ConflictingPart(n) => write!(f, "several versions of part {} - only deliver one copy", n),
            Error::DepotMismatch(name) => write!(
                f,
                "depot file `{}' advertises an md5 its metadata does not actually have",
                name
            ),
            Error::MissingOutput => write!(f, "--output is required to reassemble a complete part set"),
            Error::SplitFormat(e) => write!(f, "{}", e),
            Error::Io(op, e) => write!(f, "{}: {}", op, e),
        }
    }
}

impl From<splitformat::Error> for Error {
    fn from(e: splitformat::Error) -> Self {
        Error::SplitFormat(e)
    }
}

fn io_err(op: &str, e: io::Error) -> Error {
    Error::Io(op.to_owned(), e)
}

/// A depot filename decoded into its naming-scheme components, without
/// having opened the file to read its real [`PartInfo`] yet.
#[derive(Clone, Debug, PartialEq, Eq)]
struct DepotStub {
    filename: String,
    md5: String,
    max_part_len: u64,
    this_part_index: u32,
    max_part_index: u32,
}

/// Decode `name` against the `<md5>.<maxpartlen-hex>.<thispartn-hex>.<maxpartn-hex>`
/// scheme. Returns `None` (i.e. "junk") if it doesn't match: wrong field
/// count, an md5 that isn't exactly 32 hex chars, or a non-hex numeric
/// field.
fn parse_depot_filename(name: &str) -> Option<DepotStub> {
    let fields: Vec<&str> = name.split('.').collect();
    if fields.len() != 4 {
        return None;
    }
    let md5 = fields[0];
    if md5.len() != 32 || !md5.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let max_part_len = u64::from_str_radix(fields[1], 16).ok()?;
    let this_part_index = u32::from_str_radix(fields[2], 16).ok()?;
    let max_part_index = u32::from_str_radix(fields[3], 16).ok()?;
    Some(DepotStub {
        filename: name.to_string(),
        md5: md5.to_string(),
        max_part_len,
        this_part_index,
        max_part_index,
    })
}

fn depot_filename(info: &PartInfo) -> String {
    format!(
        "{}.{:x}.{:x}.{:x}",
        info.md5, info.max_part_len, info.this_part_index, info.max_part_index
    )
}

fn list_depot_entries(depotdir: &Path) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    match fs::read_dir(depotdir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry.map_err(|e| io_err("read depot entry", e))?;
                if let Some(name) = entry.file_name().to_str() {
                    if !name.starts_with("t.") && name != "tmp.i" {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("read depot directory", e)),
    }
    names.sort();
    Ok(names)
}

/// Outcome of [`do_auto`]: either the new part was filed away because the
/// group is still incomplete, or it completed the group and was
/// reassembled.
#[derive(Debug)]
pub enum AutoOutcome {
    /// The group is not yet complete. `missing` lists the still-wanted
    /// 1-based part numbers in ascending order.
    Filed { missing: Vec<u32> },
    /// The group was complete once this part was added; the joined output
    /// was written to `output`.
    Reassembled { output: PathBuf },
}

/// Join `missing` part numbers the way `dpkg-split`'s messages do:
/// `"1"`, `"1 and 2"`, or `"1, 2 and 3"`.
pub fn format_missing(missing: &[u32]) -> String {
    match missing.len() {
        0 => String::new(),
        1 => missing[0].to_string(),
        _ => {
            let (last, rest) = missing.split_last().unwrap();
            let head: Vec<String> = rest.iter().map(u32::to_string).collect();
            format!("{} and {}", head.join(", "), last)
        }
    }
}

/// `dpkg-split --auto`: file `input` into the depot, auto-accumulating
/// until its group is complete, then reassemble to `output` (required only
/// when this call completes the group).
pub fn do_auto(
    session: &Session,
    input: &Path,
    output: Option<&Path>,
) -> Result<AutoOutcome, Error> {
    let depotdir = session.depotdir();
    fs::create_dir_all(&depotdir).map_err(|e| io_err("create depot directory", e))?;

    let (incoming_info, incoming_data) =
        splitformat::read_part_file(input).map_err(Error::NotAPart)?;

    let mut parts: Vec<Option<(PartInfo, Vec<u8>, Option<PathBuf>)>> =
        vec![None; incoming_info.max_part_index as usize];

    for name in list_depot_entries(&depotdir)? {
        let Some(stub) = parse_depot_filename(&name) else {
            continue;
        };
        if stub.md5 != incoming_info.md5
            || stub.max_part_len != incoming_info.max_part_len
            || stub.max_part_index != incoming_info.max_part_index
        {
            continue;
        }
        let path = depotdir.join(&stub.filename);
        let (info, data) = splitformat::read_part_file(&path)?;
        if info.md5 != stub.md5 {
            warn!(
                "{}",
                Error::DepotMismatch(stub.filename.clone())
            );
            continue;
        }
        let slot = (stub.this_part_index - 1) as usize;
        if let Some((existing, _, _)) = &parts[slot] {
            if existing.md5 != info.md5 || existing.this_part_index != info.this_part_index {
                return Err(Error::ConflictingPart(stub.this_part_index));
            }
        }
        parts[slot] = Some((info, data, Some(path)));
    }

    let incoming_slot = (incoming_info.this_part_index - 1) as usize;
    parts[incoming_slot] = Some((incoming_info.clone(), incoming_data.clone(), None));

    let missing: Vec<u32> = parts
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_none())
        .map(|(i, _)| i as u32 + 1)
        .collect();

    if !missing.is_empty() {
        let canonical = depotdir.join(depot_filename(&incoming_info));
        let tmp_path = depotdir.join(format!("t.{}", std::process::id()));
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| io_err("create depot tmp", e))?;
            tmp.write_all(&incoming_data)
                .map_err(|e| io_err("write depot tmp", e))?;
            tmp.sync_all().map_err(|e| io_err("fsync depot tmp", e))?;
        }
        fs::rename(&tmp_path, &canonical).map_err(|e| io_err("rename into depot", e))?;
        if let Ok(dir) = File::open(&depotdir) {
            let _ = dir.sync_all();
        }
        return Ok(AutoOutcome::Filed { missing });
    }

    let output = output.ok_or(Error::MissingOutput)?;
    let mut ordered: Vec<(PartInfo, Vec<u8>)> = Vec::with_capacity(parts.len());
    let mut to_unlink = Vec::new();
    for slot in parts {
        let (info, data, path) = slot.expect("all slots occupied");
        if let Some(path) = path {
            to_unlink.push(path);
        }
        ordered.push((info, data));
    }

    let out_file = File::create(output).map_err(|e| io_err("create output", e))?;
    splitformat::join(&ordered, &out_file)?;
    out_file.sync_all().map_err(|e| io_err("fsync output", e))?;
    drop(out_file);

    for path in to_unlink {
        let _ = fs::remove_file(path);
    }

    Ok(AutoOutcome::Reassembled {
        output: output.to_path_buf(),
    })
}

/// One group reported by [`do_queue`]: every depot file sharing an md5,
/// max-part-len and max-part-index.
#[derive(Debug)]
pub struct QueueGroup {
    /// md5 of the eventual joined file.
    pub md5: String,
    /// Total number of parts expected.
    pub max_part_index: u32,
    /// 1-based indices still missing.
    pub missing: Vec<u32>,
    /// Total bytes currently on disk for the parts that are present.
    pub bytes_on_disk: u64,
}

/// Report produced by `dpkg-split --listq`: incomplete groups, and any
/// depot entries that don't match the naming scheme at all ("junk").
#[derive(Debug, Default)]
pub struct QueueReport {
    /// Groups with at least one part present and at least one missing.
    pub groups: Vec<QueueGroup>,
    /// Filenames in the depot that did not parse as part files.
    pub junk: Vec<String>,
}

/// `dpkg-split --listq`: walk the depot and summarize what's there.
pub fn do_queue(session: &Session) -> Result<QueueReport, Error> {
    let depotdir = session.depotdir();
    let mut report = QueueReport::default();
    let mut groups: std::collections::BTreeMap<(String, u64, u32), Vec<(u32, u64)>> =
        std::collections::BTreeMap::new();

    for name in list_depot_entries(&depotdir)? {
        let Some(stub) = parse_depot_filename(&name) else {
            report.junk.push(name);
            continue;
        };
        let size = fs::metadata(depotdir.join(&stub.filename))
            .map_err(|e| io_err("stat depot entry", e))?
            .len();
        groups
            .entry((stub.md5.clone(), stub.max_part_len, stub.max_part_index))
            .or_default()
            .push((stub.this_part_index, size));
    }

    for ((md5, _max_part_len, max_part_index), present) in groups {
        let have: std::collections::BTreeSet<u32> = present.iter().map(|(i, _)| *i).collect();
        let missing: Vec<u32> = (1..=max_part_index).filter(|i| !have.contains(i)).collect();
        if missing.is_empty() {
            continue;
        }
        let bytes_on_disk: u64 = present.iter().map(|(_, s)| s).sum();
        report.groups.push(QueueGroup {
            md5,
            max_part_index,
            missing,
            bytes_on_disk,
        });
    }

    Ok(report)
}

/// `dpkg-split --discard`: with `packages` empty, unlink every depot file.
/// Otherwise, unlink junk first, then for each name unlink every part whose
/// loaded [`PartInfo::package_name`] matches case-insensitively.
pub fn do_discard(session: &Session, packages: &[String]) -> Result<Vec<PathBuf>, Error> {
    let depotdir = session.depotdir();
    let mut removed = Vec::new();

    if packages.is_empty() {
        for name in list_depot_entries(&depotdir)? {
            let path = depotdir.join(&name);
            fs::remove_file(&path).map_err(|e| io_err("remove depot entry", e))?;
            removed.push(path);
        }
        return Ok(removed);
    }

    for name in list_depot_entries(&depotdir)? {
        if parse_depot_filename(&name).is_none() {
            let path = depotdir.join(&name);
            fs::remove_file(&path).map_err(|e| io_err("remove junk", e))?;
            removed.push(path);
        }
    }

    for name in list_depot_entries(&depotdir)? {
        let path = depotdir.join(&name);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let mut buf = Vec::new();
        if file.read_to_end(&mut buf).is_err() {
            continue;
        }
        let size = buf.len() as u64;
        let info = match splitformat::read_part(io::Cursor::new(buf), size) {
            Ok((info, _)) => info,
            Err(_) => continue,
        };
        if packages
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&info.package_name))
        {
            fs::remove_file(&path).map_err(|e| io_err("remove part", e))?;
            removed.push(path);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn depot_filename_round_trips_through_parser() {
        let name = "0123456789abcdef0123456789abcdef.12c0.1.4";
        let stub = parse_depot_filename(name).unwrap();
        assert_eq!(stub.max_part_len, 0x12c0);
        assert_eq!(stub.this_part_index, 1);
        assert_eq!(stub.max_part_index, 4);
    }

    #[test]
    fn mismatched_depot_file_is_excluded_not_trusted() {
        let admindir = tempfile::tempdir().unwrap();
        let session = Session::new(admindir.path());
        let workdir = tempfile::tempdir().unwrap();
        let depotdir = session.depotdir();
        fs::create_dir_all(&depotdir).unwrap();

        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 200) as u8).collect();
        let source_path = workdir.path().join("pkg.deb");
        std::fs::write(&source_path, &payload).unwrap();
        let version: crate::version::Version = "1.0".parse().unwrap();
        let plan = splitformat::split(
            &source_path,
            "pkg",
            workdir.path(),
            100 * 1024,
            "pkg",
            &version,
            None,
            1_700_000_000,
            false,
        )
        .unwrap();
        assert!(plan.parts.len() >= 2);

        let (first_info, _) = splitformat::read_part_file(&plan.parts[0]).unwrap();
        let real_name = depot_filename(&first_info);
        fs::copy(&plan.parts[0], depotdir.join(&real_name)).unwrap();

        let mut fields: Vec<&str> = real_name.split('.').collect();
        let mut bogus_md5: Vec<char> = fields[0].chars().collect();
        bogus_md5[0] = if bogus_md5[0] == 'a' { 'b' } else { 'a' };
        let bogus_md5: String = bogus_md5.into_iter().collect();
        fields[0] = &bogus_md5;
        let bogus_name = fields.join(".");
        fs::copy(&plan.parts[0], depotdir.join(&bogus_name)).unwrap();

        let output = workdir.path().join("out.deb");
        let last = plan.parts.last().unwrap();
        let outcome = do_auto(&session, last, Some(&output)).unwrap();
        assert!(matches!(outcome, AutoOutcome::Reassembled { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), payload);
        assert!(depotdir.join(&bogus_name).exists());
    }

    #[test]
    fn junk_names_are_rejected() {
        assert!(parse_depot_filename("not-a-part-file").is_none());
        assert!(parse_depot_filename("toofew.fields").is_none());
        assert!(parse_depot_filename("zznothex.1.2.3").is_none());
    }

    #[test]
    fn format_missing_matches_message_grammar() {
        assert_eq!(format_missing(&[1]), "1");
        assert_eq!(format_missing(&[1, 3]), "1 and 3");
        assert_eq!(format_missing(&[1, 2, 3]), "1, 2 and 3");
    }

    #[test]
    fn auto_accumulate_then_reassemble() {
        let admindir = tempfile::tempdir().unwrap();
        let session = Session::new(admindir.path());
        let workdir = tempfile::tempdir().unwrap();

        let payload: Vec<u8> = (0..500_000u32).map(|i| (i % 241) as u8).collect();
        let source_path = workdir.path().join("pkg.deb");
        std::fs::write(&source_path, &payload).unwrap();

        let version: crate::version::Version = "2.0".parse().unwrap();
        let plan = splitformat::split(
            &source_path,
            "pkg",
            workdir.path(),
            200 * 1024,
            "pkg",
            &version,
            None,
            1_700_000_000,
            false,
        )
        .unwrap();
        assert!(plan.parts.len() >= 2);

        for (i, part) in plan.parts.iter().enumerate() {
            let is_last = i + 1 == plan.parts.len();
            let output = workdir.path().join("out.deb");
            let outcome = do_auto(&session, part, Some(&output)).unwrap();
            if is_last {
                assert!(matches!(outcome, AutoOutcome::Reassembled { .. }));
                let joined = std::fs::read(&output).unwrap();
                assert_eq!(joined, payload);
            } else {
                assert!(matches!(outcome, AutoOutcome::Filed { .. }));
            }
        }

        let report = do_queue(&session).unwrap();
        assert!(report.groups.is_empty());
        assert!(report.junk.is_empty());
    }
}

// vim: foldmethod=marker
