//! Byte-level source access.
//!
//! A [`SourceReader`] is a cursor over an in-memory byte buffer with line
//! tracking. Files are memory-mapped when the platform allows it and read
//! into an owned buffer otherwise; strings can be wrapped directly. The
//! reader guarantees that `line` and the line-start offset stay consistent
//! with the cursor as long as newlines are consumed through
//! [`SourceReader::take_newline`].
//!
//! `\n`, `\r`, and `\r\n` each count as one line terminator.
//!
//! The reader does not splice backslash-newline pairs on its own; callers
//! that want logical lines use [`SourceReader::read_line_text`], and the
//! raw scanner handles splicing at the token level.

use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::path::Path;

use declmap_base::{Interner, Symbol};
use memmap2::Mmap;

enum SourceBuf {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl SourceBuf {
    fn bytes(&self) -> &[u8] {
        match self {
            SourceBuf::Mapped(m) => m,
            SourceBuf::Owned(v) => v,
        }
    }
}

/// Saved cursor state, for peek-and-restore scans.
#[derive(Debug, Clone, Copy)]
pub struct ReaderState {
    pos: usize,
    line: u32,
    line_start: usize,
}

/// A random-access, line-tracking view over one source buffer.
pub struct SourceReader {
    buf: SourceBuf,
    name: Symbol,
    pos: usize,
    line: u32,
    line_start: usize,
}

impl SourceReader {
    /// Opens `path`, preferring a memory map and falling back to a plain
    /// read when mapping fails (pipes, some filesystems).
    pub fn open(path: &Path, interner: &mut Interner) -> io::Result<SourceReader> {
        let file = File::open(path)?;
        // Mapping an empty file fails on some platforms; an owned empty
        // buffer behaves identically.
        let buf = match unsafe { Mmap::map(&file) } {
            Ok(map) => SourceBuf::Mapped(map),
            Err(_) => SourceBuf::Owned(std::fs::read(path)?),
        };
        let name = interner.intern(&path.to_string_lossy());
        Ok(SourceReader::with_buf(buf, name))
    }

    /// Wraps a string as a source named `name`.
    pub fn from_string(name: &str, text: impl Into<String>, interner: &mut Interner) -> Self {
        let name = interner.intern(name);
        SourceReader::with_buf(SourceBuf::Owned(text.into().into_bytes()), name)
    }

    fn with_buf(buf: SourceBuf, name: Symbol) -> Self {
        SourceReader {
            buf,
            name,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Overrides the reported file name (used by `#line`).
    pub fn set_name(&mut self, name: Symbol) {
        self.name = name;
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Overrides the reported line number (used by `#line`).
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// 1-based column of the cursor.
    pub fn col(&self) -> u32 {
        (self.pos.saturating_sub(self.line_start) + 1) as u32
    }

    /// 1-based column of an earlier offset on the current line.
    pub fn col_of(&self, offset: usize) -> u32 {
        (offset.saturating_sub(self.line_start) + 1) as u32
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.len()
    }

    /// The byte under the cursor, or 0 at end of buffer.
    pub fn at(&self) -> u8 {
        self.buf.bytes().get(self.pos).copied().unwrap_or(0)
    }

    /// The byte after the cursor, or 0.
    pub fn peek_next(&self) -> u8 {
        self.buf.bytes().get(self.pos + 1).copied().unwrap_or(0)
    }

    /// Advances one byte. Returns false once the end is reached.
    pub fn advance(&mut self) -> bool {
        self.pos += 1;
        self.pos < self.len()
    }

    /// Advances, then returns the byte now under the cursor (0 at end).
    pub fn next(&mut self) -> u8 {
        self.advance();
        self.at()
    }

    /// Returns the byte under the cursor and advances past it.
    pub fn getc(&mut self) -> u8 {
        let c = self.at();
        self.pos += 1;
        c
    }

    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.len());
    }

    pub fn at_newline(&self) -> bool {
        matches!(self.at(), b'\n' | b'\r')
    }

    /// Consumes one line terminator (`\n`, `\r`, or `\r\n`) and updates the
    /// line bookkeeping. Call only when [`at_newline`](Self::at_newline).
    pub fn take_newline(&mut self) {
        if self.at() == b'\r' && self.peek_next() == b'\n' {
            self.pos += 1;
        }
        self.pos += 1;
        self.line += 1;
        self.line_start = self.pos;
    }

    /// If the buffer continues with `expect` at the cursor, consume it.
    pub fn take(&mut self, expect: &str) -> bool {
        if self.buf.bytes()[self.pos.min(self.len())..].starts_with(expect.as_bytes()) {
            self.pos += expect.len();
            true
        } else {
            false
        }
    }

    /// The text between `start` and the cursor.
    pub fn slice_from(&self, start: usize) -> Cow<'_, str> {
        self.slice(start, self.pos)
    }

    pub fn slice(&self, start: usize, end: usize) -> Cow<'_, str> {
        let end = end.min(self.len());
        let start = start.min(end);
        String::from_utf8_lossy(&self.buf.bytes()[start..end])
    }

    pub fn state(&self) -> ReaderState {
        ReaderState {
            pos: self.pos,
            line: self.line,
            line_start: self.line_start,
        }
    }

    pub fn restore(&mut self, state: ReaderState) {
        self.pos = state.pos;
        self.line = state.line;
        self.line_start = state.line_start;
    }

    /// Skips whitespace, newlines, and comments. Stops at the first byte of
    /// anything else, or at end of buffer.
    pub fn skip_whitespace(&mut self) {
        loop {
            match self.at() {
                _ if self.eof() => return,
                b' ' | b'\t' | b'\x0b' | b'\x0c' => {
                    self.pos += 1;
                }
                b'\n' | b'\r' => self.take_newline(),
                b'/' => match self.peek_next() {
                    b'/' => self.skip_line_comment(),
                    b'*' => {
                        self.skip_block_comment();
                    }
                    _ => return,
                },
                _ => return,
            }
        }
    }

    /// Consumes a `//` comment up to (not including) the line terminator.
    /// A backslash-newline inside the comment continues it.
    pub fn skip_line_comment(&mut self) {
        debug_assert_eq!(self.at(), b'/');
        while self.advance() && !self.at_newline() {
            if self.at() == b'\\' && matches!(self.peek_next(), b'\n' | b'\r') {
                self.advance();
                self.take_newline();
                // Back up one so the loop's advance() lands on fresh input.
                self.pos -= 1;
            }
        }
    }

    /// Consumes a `/* ... */` comment across lines. Returns false when the
    /// buffer ends before the closing `*/`.
    pub fn skip_block_comment(&mut self) -> bool {
        debug_assert_eq!(self.at(), b'/');
        self.skip(2);
        loop {
            if self.eof() {
                return false;
            }
            if self.at_newline() {
                self.take_newline();
                continue;
            }
            if self.getc() == b'*' && self.at() == b'/' {
                self.pos += 1;
                return true;
            }
        }
    }

    /// Reads the remainder of the current logical line as text: the
    /// directive-argument reader.
    ///
    /// Backslash-newline pairs are spliced out, `//` comments end the line,
    /// `/* */` comments collapse to one space, and quoted literals pass
    /// through verbatim (including their escapes). Leading and trailing
    /// whitespace is trimmed. The terminating newline is left unconsumed.
    pub fn read_line_text(&mut self) -> String {
        while matches!(self.at(), b' ' | b'\t') && !self.eof() {
            self.pos += 1;
        }
        let mut res = String::new();
        let mut seg_start = self.pos;
        while !self.eof() && !self.at_newline() {
            match self.at() {
                b'/' if self.peek_next() == b'/' => {
                    res.push_str(&self.slice_from(seg_start));
                    self.skip_line_comment();
                    seg_start = self.pos;
                    break;
                }
                b'/' if self.peek_next() == b'*' => {
                    res.push_str(&self.slice_from(seg_start));
                    res.push(' ');
                    self.skip_block_comment();
                    seg_start = self.pos;
                }
                b'\\' if matches!(self.peek_next(), b'\n' | b'\r') => {
                    res.push_str(&self.slice_from(seg_start));
                    self.pos += 1;
                    self.take_newline();
                    seg_start = self.pos;
                }
                q @ (b'"' | b'\'') => {
                    while self.advance() && self.at() != q && !self.at_newline() {
                        if self.at() == b'\\' {
                            self.advance();
                        }
                    }
                    if self.at() == q {
                        self.pos += 1;
                    }
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
        res.push_str(&self.slice_from(seg_start));
        res.truncate(res.trim_end().len());
        res
    }
}
