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

//! `arreader` reads and writes the Unix `ar(5)` archive format used as the
//! outer container for multipart split files (`splitformat` builds exactly
//! two members inside one of these: `debian-split` and `data.N`).
//!
//! The heavy lifting (the 60-byte member header, the `!<arch>\n` global
//! magic, and even-byte member padding) is delegated to the `ar` crate,
//! which already implements the BSD/GNU/common variants correctly; this
//! module adds the normalization split-format callers need (GNU long names
//! carry a trailing `/`, BSD names are space-padded to 16 bytes) and turns
//! malformed input into this crate's own [`Error`] rather than a bare
//! `io::Error`.

use std::io::{self, Read, Write};

/// One member of an `ar` archive: a name, an mtime, and its raw payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Member name, with any GNU trailing-slash or BSD space padding
    /// already stripped.
    pub name: String,
    /// Member mtime, seconds since the epoch.
    pub mtime: u64,
    /// Raw payload bytes (unpadded; the even-byte pad byte is not part of
    /// this).
    pub data: Vec<u8>,
}

/// Failure reading or writing an `ar` archive.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The global `!<arch>\n` magic, or a member's `\x60\n` trailer, was
    /// missing or malformed.
    BadMagic,
    /// The archive ended before a member's declared payload was fully read.
    Truncated,
    /// An underlying I/O failure, tagged with the operation that failed.
    Io(String, io::Error),
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadMagic => write!(f, "file is corrupt - bad archive magic"),
            Error::Truncated => write!(f, "file is corrupt - archive member truncated"),
            Error::Io(op, e) => write!(f, "{}: {}", op, e),
        }
    }
}

fn io_err(op: &str, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Truncated,
        io::ErrorKind::InvalidData => Error::BadMagic,
        _ => Error::Io(op.to_owned(), e),
    }
}

/// Strip the GNU long-name trailing slash and any BSD space padding from a
/// raw `ar` member identifier.
fn normalize_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    s.trim_end_matches('/').trim_end().to_string()
}

/// Read every member out of `reader`, in order.
///
/// This does not itself enforce the split-format's "exactly two members,
/// first named `debian-split`" shape; that cross-check belongs to
/// [`crate::splitformat`], which is the only caller that knows what shape
/// to expect.
pub fn read_all<R: Read>(reader: R) -> Result<Vec<Member>, Error> {
    let mut archive = ar::Archive::new(reader);
    let mut members = Vec::new();
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.map_err(|e| io_err("read ar member", e))?;
        let name = normalize_name(entry.header().identifier());
        let mtime = entry.header().mtime();
        let mut data = Vec::with_capacity(entry.header().size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| io_err("read ar member body", e))?;
        members.push(Member { name, mtime, data });
    }
    Ok(members)
}

/// Write `members` to `writer` as a fresh `ar` archive, in order. Every
/// member is written with uid/gid 0 and mode `0o100644`, matching what
/// `dpkg-split`'s writer produces.
pub fn write_all<W: Write>(writer: W, members: &[Member]) -> Result<(), Error> {
    let mut builder = ar::Builder::new(writer);
    for member in members {
        let mut header = ar::Header::new(member.name.as_bytes().to_vec(), member.data.len() as u64);
        header.set_mtime(member.mtime);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o100644);
        builder
            .append(&header, &mut &member.data[..])
            .map_err(|e| io_err("write ar member", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_two_members() {
        let members = vec![
            Member {
                name: "debian-split".to_string(),
                mtime: 1_700_000_000,
                data: b"2.1\nfoo\n1.0\n".to_vec(),
            },
            Member {
                name: "data.1".to_string(),
                mtime: 1_700_000_000,
                data: vec![0xAB; 37],
            },
        ];
        let mut buf = Vec::new();
        write_all(Cursor::new(&mut buf), &members).unwrap();
        assert_eq!(&buf[0..8], b"!<arch>\n");

        let back = read_all(Cursor::new(&buf)).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].name, "debian-split");
        assert_eq!(back[1].name, "data.1");
        assert_eq!(back[1].data, members[1].data);
    }

    #[test]
    fn normalize_strips_gnu_and_bsd_padding() {
        assert_eq!(normalize_name(b"data.1/"), "data.1");
        assert_eq!(normalize_name(b"debian-split    "), "debian-split");
    }
}

// vim: foldmethod=marker
