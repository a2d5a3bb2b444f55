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

//! Parsing and rendering of `Conffiles` field lines.
//!
//! Each non-blank continuation line under a `Conffiles:` field is
//! `SP path SP...SP hash [SP remove-on-upgrade] [SP obsolete]`. The trailing
//! words are scanned off the end first, since the path itself may
//! (in principle) contain spaces.

/// One entry of a package's `Conffiles` list: a shipped, admin-editable
/// configuration file and the hash it had when last installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conffile {
    /// Absolute path to the conffile, with any leading `/./` collapsed.
    pub path: String,
    /// Either the 32-character lowercase hex md5 of the shipped file, or
    /// the literal string `newconffile`.
    pub hash: String,
    /// `true` if dpkg has marked this conffile as obsolete.
    pub obsolete: bool,
    /// `true` if this conffile should be removed on the package's next
    /// upgrade.
    pub remove_on_upgrade: bool,
}

/// Error conditions when parsing a single `Conffiles` continuation line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The line had no path/hash pair at all.
    Empty,
    /// The line had a path but no hash field.
    MissingHash,
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Empty => write!(f, "empty conffiles line"),
            Error::MissingHash => write!(f, "conffiles line has a path but no hash"),
        }
    }
}

fn strip_leading_dot_slash(path: &str) -> String {
    let mut out = path.to_owned();
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    while out.starts_with("/./") {
        out.replace_range(0..2, "");
    }
    out
}

impl Conffile {
    /// Parse one non-blank `Conffiles` continuation line (already stripped
    /// of its leading indentation whitespace).
    pub fn parse_line(line: &str) -> Result<Self, Error> {
        let mut words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Err(Error::Empty);
        }

        let mut obsolete = false;
        let mut remove_on_upgrade = false;

        if words.last() == Some(&"obsolete") {
            obsolete = true;
            words.pop();
        }
        if words.last() == Some(&"remove-on-upgrade") {
            remove_on_upgrade = true;
            words.pop();
        }

        let Some(hash) = words.pop() else {
            return Err(Error::MissingHash);
        };
        if words.is_empty() {
            return Err(Error::MissingHash);
        }
        let path = words.join(" ");

        Ok(Conffile {
            path: strip_leading_dot_slash(&path),
            hash: hash.to_owned(),
            obsolete,
            remove_on_upgrade,
        })
    }

    /// Render this entry back to its `Conffiles` continuation-line form
    /// (without leading indentation or trailing newline).
    pub fn to_line(&self) -> String {
        let mut s = format!("{} {}", self.path, self.hash);
        if self.remove_on_upgrade {
            s.push_str(" remove-on-upgrade");
        }
        if self.obsolete {
            s.push_str(" obsolete");
        }
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_line() {
        let c = Conffile::parse_line("/etc/foo.conf deadbeefdeadbeefdeadbeefdeadbeef").unwrap();
        assert_eq!("/etc/foo.conf", c.path);
        assert_eq!("deadbeefdeadbeefdeadbeefdeadbeef", c.hash);
        assert!(!c.obsolete);
        assert!(!c.remove_on_upgrade);
    }

    #[test]
    fn strips_dot_slash() {
        let c = Conffile::parse_line("/./etc/foo.conf newconffile").unwrap();
        assert_eq!("/etc/foo.conf", c.path);
        assert_eq!("newconffile", c.hash);
    }

    #[test]
    fn trailing_flags() {
        let c = Conffile::parse_line("/etc/foo.conf abc123 remove-on-upgrade obsolete").unwrap();
        assert!(c.obsolete);
        assert!(c.remove_on_upgrade);
        assert_eq!("abc123", c.hash);
    }

    #[test]
    fn roundtrip() {
        let c = Conffile::parse_line("/etc/foo.conf abc123 remove-on-upgrade").unwrap();
        assert_eq!("/etc/foo.conf abc123 remove-on-upgrade", c.to_line());
    }

    #[test]
    fn missing_hash_errors() {
        assert_eq!(Error::MissingHash, Conffile::parse_line("/etc/foo.conf").unwrap_err());
    }

    #[test]
    fn empty_line_errors() {
        assert_eq!(Error::Empty, Conffile::parse_line("").unwrap_err());
    }
}

// vim: foldmethod=marker
