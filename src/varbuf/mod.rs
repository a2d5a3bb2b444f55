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

//! The `varbuf` module implements [`VarBuf`], a growable byte buffer with
//! rollback snapshots, modeled on `lib/dpkg/varbuf.c`.
//!
//! Every parser and formatter in this crate that builds output incrementally
//! (the split-format writer assembling an `ar` member, the status-file
//! serializer assembling a stanza) uses a [`VarBuf`] rather than raw
//! `String`/`Vec<u8>` concatenation, so that a partially-written value can be
//! rolled back to a known-good mark on a parse error without having to
//! re-derive the buffer's prior length by hand.

/// A growable byte buffer that supports taking a [`Mark`] and rolling back
/// to it, discarding everything appended since.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarBuf {
    buf: Vec<u8>,
}

/// An opaque snapshot of a [`VarBuf`]'s length, taken with [`VarBuf::mark`]
/// and consumed by [`VarBuf::rollback`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(usize);

impl VarBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for at least `capacity` bytes
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        VarBuf {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes currently in the buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take a snapshot of the current length, to later [`VarBuf::rollback`]
    /// to.
    pub fn mark(&self) -> Mark {
        Mark(self.buf.len())
    }

    /// Truncate the buffer back to a previously taken [`Mark`], discarding
    /// everything appended since.
    ///
    /// # Panics
    ///
    /// Panics if `mark` was taken from a buffer shorter than the one being
    /// rolled back (i.e. the mark is not a valid prefix length).
    pub fn rollback(&mut self, mark: Mark) {
        assert!(mark.0 <= self.buf.len(), "rollback mark past buffer end");
        self.buf.truncate(mark.0);
    }

    /// Append raw bytes.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append a single byte.
    pub fn push_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    /// Append a UTF-8 string.
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Discard everything in the buffer.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Borrow the buffer's contents as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Borrow the buffer's contents as a `str`, failing if it is not valid
    /// UTF-8.
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.buf)
    }

    /// Consume the buffer, returning its contents.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl From<VarBuf> for Vec<u8> {
    fn from(v: VarBuf) -> Vec<u8> {
        v.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn append_and_read() {
        let mut vb = VarBuf::new();
        vb.push_str("Package: ");
        vb.push_str("foo\n");
        assert_eq!("Package: foo\n", vb.as_str().unwrap());
    }

    #[test]
    fn mark_and_rollback() {
        let mut vb = VarBuf::new();
        vb.push_str("Package: foo\n");
        let mark = vb.mark();
        vb.push_str("Version: 1.0-1\n");
        assert_eq!(28, vb.len());
        vb.rollback(mark);
        assert_eq!("Package: foo\n", vb.as_str().unwrap());
    }

    #[test]
    fn rollback_to_start() {
        let mut vb = VarBuf::new();
        let mark = vb.mark();
        vb.push_str("anything");
        vb.rollback(mark);
        assert!(vb.is_empty());
    }

    #[test]
    #[should_panic]
    fn rollback_past_end_panics() {
        let mut vb = VarBuf::new();
        let mark = vb.mark();
        vb.push_str("x");
        let bad = Mark(100);
        let _ = mark;
        vb.rollback(bad);
    }
}

// vim: foldmethod=marker
