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

//! `splitformat` reads and writes the on-disk layout of a multipart `.deb`
//! part file, modeled on `dpkg-split`'s `split.c`: an `ar(5)` archive
//! holding exactly two members, `debian-split` (a small metadata blob) and
//! `data.N` (the raw N-th slice of the original file).
//!
//! This module does not decide *when* to auto-accumulate parts into a
//! complete output; that is [`crate::partqueue`]'s job. This module only
//! knows how to read one part file into a [`PartInfo`] plus payload, and how
//! to write a whole sequence of parts from a source file.

use crate::arreader::{self, Member};
use crate::version::Version;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Name of the first member of every split part: the metadata blob.
const SPLIT_MEMBER_NAME: &str = "debian-split";

/// Bytes reserved for the ar/metadata overhead subtracted from a requested
/// part size (`--partsize`) to get the actual data payload per part. Mirrors
/// `SPLIT_HEADER_LEN` in the source's `dpkg-split.h`.
const HEADER_ALLOWANCE: u64 = 1024;

/// Failure reading or writing a split part, or splitting/joining a whole
/// sequence of them.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The archive did not have exactly two members, or they weren't named
    /// `debian-split` and `data.N`.
    Corrupt(String),
    /// The `debian-split` metadata blob had the wrong number of lines, or a
    /// line failed to parse.
    BadMetadata(String),
    /// A derived invariant from §3 did not hold (e.g. `max_part_index`
    /// didn't match `ceil(original_length / max_part_len)`).
    SizeMismatch(String),
    /// `--msdos` was requested for a split that would need 10 or more
    /// parts. The source's 8.3 name-cleaning truncates multi-digit part
    /// counts ambiguously; rather than guess, this is rejected outright.
    TooManyPartsForMsdos(u32),
    /// Failure inside the inner `ar` archive reader/writer.
    Ar(arreader::Error),
    /// Failure parsing the package version out of the metadata blob.
    Version(crate::version::Error),
    /// An underlying I/O failure, tagged with the operation that failed.
    Io(String, io::Error),
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Corrupt(s) => write!(f, "file is corrupt - {}", s),
            Error::BadMetadata(s) => write!(f, "file is corrupt - {}", s),
            Error::SizeMismatch(s) => write!(f, "file is corrupt - {}", s),
            Error::TooManyPartsForMsdos(n) => write!(
                f,
                "--msdos mode does not support {} parts (maximum 9)",
                n
            ),
            Error::Ar(e) => write!(f, "{}", e),
            Error::Version(e) => write!(f, "{}", e),
            Error::Io(op, e) => write!(f, "{}: {}", op, e),
        }
    }
}

impl From<arreader::Error> for Error {
    fn from(e: arreader::Error) -> Self {
        Error::Ar(e)
    }
}
impl From<crate::version::Error> for Error {
    fn from(e: crate::version::Error) -> Self {
        Error::Version(e)
    }
}

fn io_err(op: &str, e: io::Error) -> Error {
    Error::Io(op.to_owned(), e)
}

/// Everything recorded about one part of a split `.deb`, per §3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartInfo {
    /// Metadata format version, e.g. `"2.1"`.
    pub format_version: String,
    /// Package name, as given by the `Package` control field.
    pub package_name: String,
    /// Package version, as given by the `Version` control field.
    pub package_version: Version,
    /// Architecture, present iff the writer was dpkg >= 1.16.1.
    pub arch: Option<String>,
    /// md5 of the original (joined) file, exactly 32 lowercase hex chars.
    pub md5: String,
    /// Total length in bytes of the original, unsplit file.
    pub original_length: u64,
    /// Split unit size: every part but the last is exactly this long.
    pub max_part_len: u64,
    /// 1-based index of this part.
    pub this_part_index: u32,
    /// Total number of parts in the group.
    pub max_part_index: u32,
    /// Length in bytes of this part's payload.
    pub this_part_len: u64,
    /// Byte offset of this part's payload within the original file.
    pub this_part_offset: u64,
    /// Number of bytes of `ar` framing preceding the `data.N` payload
    /// within the part file (global magic, both member headers, and the
    /// padded `debian-split` body).
    pub header_len: u64,
    /// Total size in bytes of the part file on disk.
    pub file_size: u64,
}

impl PartInfo {
    fn validate(&self) -> Result<(), Error> {
        if self.md5.len() != 32 || !self.md5.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(Error::BadMetadata(format!("md5sum `{}' is malformed", self.md5)));
        }
        if self.max_part_len == 0 {
            return Err(Error::BadMetadata("part size is zero".to_string()));
        }
        let expected_max_index =
            (self.original_length + self.max_part_len - 1) / self.max_part_len;
        if u64::from(self.max_part_index) != expected_max_index.max(1) {
            return Err(Error::SizeMismatch(format!(
                "max part count {} doesn't match computed {}",
                self.max_part_index, expected_max_index
            )));
        }
        if self.this_part_index == 0 || self.this_part_index > self.max_part_index {
            return Err(Error::SizeMismatch(format!(
                "part number {} out of range 1..{}",
                self.this_part_index, self.max_part_index
            )));
        }
        let expected_len = if self.this_part_index == self.max_part_index {
            self.original_length - (u64::from(self.max_part_index) - 1) * self.max_part_len
        } else {
            self.max_part_len
        };
        if self.this_part_len != expected_len {
            return Err(Error::SizeMismatch(format!(
                "size is wrong: expected {}, got {}",
                expected_len, self.this_part_len
            )));
        }
        Ok(())
    }
}

fn member_header_cost(body_len: u64) -> u64 {
    // ar global magic (8) is charged once by the caller; each member
    // contributes a fixed 60-byte header plus its even-padded body.
    60 + body_len + (body_len % 2)
}

/// Read one split part from `reader`, returning its metadata and the raw
/// `data.N` payload. Enforces the ar-level and metadata-level invariants
/// from §3/§4.6/§6: exactly two members, first named `debian-split`, second
/// named `data.<n>`; metadata blob has 7 or 8 lines; derived length
/// invariants hold.
pub fn read_part<R: Read>(reader: R, file_size: u64) -> Result<(PartInfo, Vec<u8>), Error> {
    let members = arreader::read_all(reader)?;
    if members.len() != 2 {
        return Err(Error::Corrupt(format!(
            "expected exactly 2 ar members, found {}",
            members.len()
        )));
    }
    let meta = &members[0];
    let data = &members[1];
    if meta.name != SPLIT_MEMBER_NAME {
        return Err(Error::Corrupt(format!(
            "first member must be named `{}', found `{}'",
            SPLIT_MEMBER_NAME, meta.name
        )));
    }
    if !data.name.starts_with("data") {
        return Err(Error::Corrupt(format!(
            "second member must be named `data...', found `{}'",
            data.name
        )));
    }
    let this_part_index: u32 = data
        .name
        .strip_prefix("data.")
        .ok_or_else(|| Error::Corrupt(format!("malformed data member name `{}'", data.name)))?
        .parse()
        .map_err(|_| Error::Corrupt(format!("malformed data member name `{}'", data.name)))?;

    let text = std::str::from_utf8(&meta.data)
        .map_err(|_| Error::BadMetadata("metadata blob is not valid UTF-8".to_string()))?;
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != 7 && lines.len() != 8 {
        return Err(Error::BadMetadata(format!(
            "expected 7 or 8 metadata lines, found {}",
            lines.len()
        )));
    }
    let format_version = lines[0].to_string();
    let package_name = lines[1].to_string();
    let package_version: Version = lines[2].parse()?;
    let md5 = lines[3].to_string();
    let original_length: u64 = lines[4]
        .parse()
        .map_err(|_| Error::BadMetadata("original length is not numeric".to_string()))?;
    let max_part_len: u64 = lines[5]
        .parse()
        .map_err(|_| Error::BadMetadata("part size is not numeric".to_string()))?;
    let (thispart_str, maxparts_str) = lines[6]
        .split_once('/')
        .ok_or_else(|| Error::BadMetadata("part index line missing `/'".to_string()))?;
    let thispart_from_meta: u32 = thispart_str
        .parse()
        .map_err(|_| Error::BadMetadata("this-part index is not numeric".to_string()))?;
    let max_part_index: u32 = maxparts_str
        .parse()
        .map_err(|_| Error::BadMetadata("max-part index is not numeric".to_string()))?;
    if thispart_from_meta != this_part_index {
        return Err(Error::Corrupt(format!(
            "metadata part index {} disagrees with member name data.{}",
            thispart_from_meta, this_part_index
        )));
    }
    let arch = lines.get(7).map(|s| s.to_string());

    let header_len = 8 + member_header_cost(meta.data.len() as u64) + 60;
    let this_part_len = data.data.len() as u64;
    let this_part_offset = u64::from(this_part_index - 1) * max_part_len;

    let info = PartInfo {
        format_version,
        package_name,
        package_version,
        arch,
        md5,
        original_length,
        max_part_len,
        this_part_index,
        max_part_index,
        this_part_len,
        this_part_offset,
        header_len,
        file_size,
    };
    info.validate()?;
    Ok((info, data.data.clone()))
}

/// Read one split part from a file path, stat-ing it first to fill in
/// [`PartInfo::file_size`].
pub fn read_part_file(path: &Path) -> Result<(PartInfo, Vec<u8>), Error> {
    let file = File::open(path).map_err(|e| io_err("open part", e))?;
    let file_size = file
        .metadata()
        .map_err(|e| io_err("stat part", e))?
        .len();
    read_part(file, file_size)
}

/// Result of splitting a source file: the output part paths, in order.
pub struct SplitPlan {
    /// Paths written, `this_part_index` 1..=N in order.
    pub parts: Vec<PathBuf>,
}

/// Build the 8.3-legal MS-DOS part filename `clean_msdos(prefix) + "iofN.deb"`
/// truncated to fit. Per the open question in §9, this crate refuses more
/// than 9 parts in msdos mode rather than guess at the source's ambiguous
/// truncation of `10of12`-style names.
fn msdos_part_name(prefix: &str, this_part: u32, max_part: u32) -> Result<String, Error> {
    if max_part > 9 {
        return Err(Error::TooManyPartsForMsdos(max_part));
    }
    let suffix = format!("{}of{}.deb", this_part, max_part);
    let budget = 8usize.saturating_sub(suffix.len().saturating_sub(4));
    let clean: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(budget.max(1))
        .collect();
    Ok(format!("{}{}", clean, suffix))
}

/// Split `source` into parts of at most `partsize` bytes of payload each
/// (the caller's requested `--partsize` minus [`HEADER_ALLOWANCE`]),
/// writing `<prefix>.<i>of<n>.deb` (or, in msdos mode, an 8.3 name built by
/// [`msdos_part_name`]) for each part. `mtime` should be
/// `$SOURCE_DATE_EPOCH` if set, else the current time; it is the caller's
/// job to resolve that (this module does not read the clock or the
/// environment).
#[allow(clippy::too_many_arguments)]
pub fn split(
    source: &Path,
    prefix: &str,
    out_dir: &Path,
    partsize: u64,
    package_name: &str,
    package_version: &Version,
    arch: Option<&str>,
    mtime: u64,
    msdos: bool,
) -> Result<SplitPlan, Error> {
    let mut file = File::open(source).map_err(|e| io_err("open source", e))?;
    let file_size = file
        .metadata()
        .map_err(|e| io_err("stat source", e))?
        .len();
    if partsize <= HEADER_ALLOWANCE {
        return Err(Error::Corrupt(
            "--partsize is too small to leave room for the split header".to_string(),
        ));
    }
    let max_part_len = partsize - HEADER_ALLOWANCE;

    let mut whole = Vec::with_capacity(file_size as usize);
    file.read_to_end(&mut whole)
        .map_err(|e| io_err("read source", e))?;
    let md5 = hex::encode(md5::compute(&whole).0);

    let max_part_index = ((file_size + max_part_len - 1) / max_part_len).max(1) as u32;
    let mut parts = Vec::with_capacity(max_part_index as usize);

    for i in 1..=max_part_index {
        let offset = u64::from(i - 1) * max_part_len;
        let len = if i == max_part_index {
            file_size - offset
        } else {
            max_part_len
        };
        let chunk = &whole[offset as usize..(offset + len) as usize];

        let mut metadata = String::new();
        metadata.push_str("2.1\n");
        metadata.push_str(package_name);
        metadata.push('\n');
        metadata.push_str(&package_version.to_string());
        metadata.push('\n');
        metadata.push_str(&md5);
        metadata.push('\n');
        metadata.push_str(&file_size.to_string());
        metadata.push('\n');
        metadata.push_str(&max_part_len.to_string());
        metadata.push('\n');
        metadata.push_str(&format!("{}/{}", i, max_part_index));
        metadata.push('\n');
        if let Some(arch) = arch {
            metadata.push_str(arch);
            metadata.push('\n');
        }

        let members = vec![
            Member {
                name: SPLIT_MEMBER_NAME.to_string(),
                mtime,
                data: metadata.into_bytes(),
            },
            Member {
                name: format!("data.{}", i),
                mtime,
                data: chunk.to_vec(),
            },
        ];

        let name = if msdos {
            msdos_part_name(prefix, i, max_part_index)?
        } else {
            format!("{}.{}of{}.deb", prefix, i, max_part_index)
        };
        let out_path = out_dir.join(name);
        let out = File::create(&out_path).map_err(|e| io_err("create part", e))?;
        arreader::write_all(out, &members)?;
        parts.push(out_path);
    }

    Ok(SplitPlan { parts })
}

/// Control-stanza metadata needed to write a split part, extracted from an
/// unsplit `.deb` by piping it through `dpkg-deb --info <path> control`.
/// Building and reading `.deb` archives proper is out of scope for this
/// crate; this is the one place it shells out to the real tool for that
/// metadata, matching the design note on subprocess invocation.
pub fn binary_control_stanza(deb_path: &Path) -> Result<crate::control::RawParagraph, Error> {
    use std::process::Command;
    let output = Command::new("dpkg-deb")
        .arg("--info")
        .arg(deb_path)
        .arg("control")
        .env_remove("LANGUAGE")
        .env_remove("LC_ALL")
        .output()
        .map_err(|e| io_err("spawn dpkg-deb --info", e))?;
    if !output.status.success() {
        return Err(Error::Corrupt(format!(
            "dpkg-deb --info exited with {}",
            output.status
        )));
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    crate::control::RawParagraph::parse(&text)
        .map_err(|e| Error::Corrupt(format!("control stanza: {}", e)))
}

/// Join a complete, ordered, 1-indexed set of parts back into `out`.
/// Callers (normally [`crate::partqueue`]) are responsible for having
/// verified every slot is present and mutually consistent; this function
/// only concatenates payloads in order.
pub fn join<W: Write>(parts: &[(PartInfo, Vec<u8>)], mut out: W) -> Result<(), Error> {
    for (info, data) in parts {
        if data.len() as u64 != info.this_part_len {
            return Err(Error::SizeMismatch(format!(
                "part {} payload length {} disagrees with recorded {}",
                info.this_part_index,
                data.len(),
                info.this_part_len
            )));
        }
        out.write_all(data).map_err(|e| io_err("write joined output", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn sample_version() -> Version {
        "1.0-1".parse().unwrap()
    }

    #[test]
    fn split_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("pkg.deb");
        let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source_path, &payload).unwrap();

        let plan = split(
            &source_path,
            "pkg",
            dir.path(),
            300 * 1024,
            "pkg",
            &sample_version(),
            Some("amd64"),
            1_700_000_000,
            false,
        )
        .unwrap();
        assert_eq!(plan.parts.len(), 4);

        let mut parts = Vec::new();
        for path in &plan.parts {
            parts.push(read_part_file(path).unwrap());
        }
        for (i, (info, _)) in parts.iter().enumerate() {
            assert_eq!(info.this_part_index as usize, i + 1);
            assert_eq!(info.max_part_index, 4);
            assert_eq!(info.package_name, "pkg");
        }

        let mut joined = Vec::new();
        join(&parts, Cursor::new(&mut joined)).unwrap();
        assert_eq!(joined, payload);

        let expected_md5 = hex::encode(md5::compute(&payload).0);
        for (info, _) in &parts {
            assert_eq!(info.md5, expected_md5);
        }
    }

    #[test]
    fn rejects_wrong_member_count() {
        let mut buf = Vec::new();
        arreader::write_all(
            Cursor::new(&mut buf),
            &[Member {
                name: SPLIT_MEMBER_NAME.to_string(),
                mtime: 0,
                data: b"2.1\n".to_vec(),
            }],
        )
        .unwrap();
        let err = read_part(Cursor::new(&buf), buf.len() as u64).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn msdos_rejects_many_parts() {
        assert!(msdos_part_name("somepackage", 10, 12).is_err());
        assert!(msdos_part_name("somepackage", 1, 9).is_ok());
    }
}

// vim: foldmethod=marker
