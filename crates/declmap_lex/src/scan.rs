//! The raw preprocessing-token scanner.
//!
//! [`read_raw_token`] consumes whitespace and comments, then classifies
//! exactly one token. It never expands macros and never interprets
//! directives; those belong to the stream façade. Newlines come back as
//! [`TokenKind::Newline`] markers because the directive processor needs to
//! see logical line boundaries.
//!
//! Scanning rules follow ISO translation phases 1-3 with the documented
//! simplifications: no universal-character-names, no locale-sensitive
//! whitespace. A backslash immediately before a newline splices the lines
//! (phase 2) and produces no token.

use declmap_base::{Interner, Reporter, SourcePos};

use crate::reader::SourceReader;
use crate::token::{Token, TokenKind};

pub(crate) fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

pub(crate) fn is_letterd(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\x0b' | b'\x0c')
}

/// String/character literal prefix classification.
struct LiteralPrefix {
    raw: bool,
}

/// Accepts `R`, `u`, `u8`, `U`, `L`, and each of those followed by `R`.
fn parse_literal_prefix(pre: &str) -> Option<LiteralPrefix> {
    let rest = match pre {
        "R" => return Some(LiteralPrefix { raw: true }),
        _ if pre.starts_with("u8") => &pre[2..],
        _ if pre.starts_with('u') || pre.starts_with('U') || pre.starts_with('L') => &pre[1..],
        _ => return None,
    };
    match rest {
        "" => Some(LiteralPrefix { raw: false }),
        "R" => Some(LiteralPrefix { raw: true }),
        _ => None,
    }
}

fn report_error(rep: &mut Reporter, interner: &Interner, pos: SourcePos, msg: impl Into<String>) {
    rep.error(interner.resolve(pos.file).to_string(), pos.line, pos.col, msg);
}

fn report_warning(rep: &mut Reporter, interner: &Interner, pos: SourcePos, msg: impl Into<String>) {
    rep.warning(interner.resolve(pos.file).to_string(), pos.line, pos.col, msg);
}

/// Consumes an integer-literal suffix: at most one `u`/`U` and at most two
/// adjacent `l`/`L` of the same case, in either order.
fn skip_integer_suffix(r: &mut SourceReader) {
    if r.eof() {
        return;
    }
    if matches!(r.at(), b'u' | b'U') {
        r.skip(1);
        if matches!(r.at(), b'l' | b'L') {
            let l = r.at();
            r.skip(1);
            if r.at() == l {
                r.skip(1);
            }
        }
        return;
    }
    if matches!(r.at(), b'l' | b'L') {
        let l = r.at();
        r.skip(1);
        if r.at() == l {
            r.skip(1);
        }
        if matches!(r.at(), b'u' | b'U') {
            r.skip(1);
        }
    }
}

/// Consumes a quoted literal. Invoked with the cursor on the opening quote;
/// on success the cursor rests on the closing quote. Escapes are honored,
/// including backslash-newline continuation. Returns false (with an error
/// reported) for an unterminated literal.
fn skip_quoted(
    r: &mut SourceReader,
    interner: &Interner,
    rep: &mut Reporter,
    pos: SourcePos,
) -> bool {
    let qc = r.at();
    r.skip(1);
    loop {
        if r.eof() {
            report_error(rep, interner, pos, "unterminated string literal");
            return false;
        }
        match r.at() {
            c if c == qc => return true,
            b'\\' => {
                r.skip(1);
                if r.eof() {
                    report_error(rep, interner, pos, "cannot escape the end of input");
                    return false;
                }
                if r.at_newline() {
                    r.take_newline();
                } else {
                    r.skip(1);
                }
            }
            b'\n' | b'\r' => {
                report_error(rep, interner, pos, "unterminated string literal");
                return false;
            }
            _ => {
                r.skip(1);
            }
        }
    }
}

/// Consumes a raw string literal. Invoked with the cursor on the opening
/// quote of `R"delim( ... )delim"`; leaves the cursor after the closing
/// quote. Returns false at end of input without a terminator.
fn skip_raw_string(
    r: &mut SourceReader,
    interner: &Interner,
    rep: &mut Reporter,
    pos: SourcePos,
) -> bool {
    let delim_start = r.tell() + 1;
    let mut warned = false;
    while r.next() != b'(' {
        if r.eof() {
            report_error(rep, interner, pos, "unterminated raw string literal");
            return false;
        }
        if matches!(r.at(), b'\\' | b' ' | b'"') && !warned {
            report_warning(
                rep,
                interner,
                pos,
                "ISO C++ forbids backslash, space, and quote characters in raw-literal delimiters",
            );
            warned = true;
        }
    }
    let close = format!("){}\"", r.slice(delim_start, r.tell()));
    r.skip(1);
    loop {
        if r.eof() {
            report_error(rep, interner, pos, "unterminated raw string literal");
            return false;
        }
        if r.at() == b')' && r.take(&close) {
            return true;
        }
        if r.at_newline() {
            r.take_newline();
        } else {
            r.skip(1);
        }
    }
}

/// Reads one preprocessing token from `r`.
///
/// One call, one token: horizontal whitespace and comments are discarded,
/// a newline comes back as a `Newline` marker, and the end of the buffer
/// yields `EndOfCode` forever after.
pub fn read_raw_token(r: &mut SourceReader, interner: &mut Interner, rep: &mut Reporter) -> Token {
    loop {
        // Whitespace, newline markers, comments.
        loop {
            if r.eof() {
                let pos = SourcePos::new(r.name(), r.line(), r.col());
                return Token::marker(TokenKind::EndOfCode, pos);
            }
            match r.at() {
                c if is_space(c) => {
                    r.skip(1);
                }
                b'\n' | b'\r' => {
                    let pos = SourcePos::new(r.name(), r.line(), r.col());
                    r.take_newline();
                    return Token::marker(TokenKind::Newline, pos);
                }
                b'/' if r.peek_next() == b'/' => r.skip_line_comment(),
                b'/' if r.peek_next() == b'*' => {
                    let pos = SourcePos::new(r.name(), r.line(), r.col());
                    if !r.skip_block_comment() {
                        report_error(rep, interner, pos, "input ends inside a block comment");
                    }
                }
                _ => break,
            }
        }

        let start = r.tell();
        let pos = SourcePos::new(r.name(), r.line(), r.col());
        let make = |r: &SourceReader, interner: &mut Interner, kind: TokenKind| {
            let text = interner.intern_owned(r.slice_from(start).into_owned());
            Token::new(kind, text, pos)
        };

        let c = r.at();

        // Identifiers, and string literals behind a prefix.
        if is_letter(c) {
            while !r.eof() && is_letterd(r.at()) {
                r.skip(1);
            }
            if r.tell() - start <= 3 && matches!(r.at(), b'"' | b'\'') {
                let prefix = r.slice_from(start).into_owned();
                if let Some(flags) = parse_literal_prefix(&prefix) {
                    let quote = r.at();
                    if flags.raw && quote == b'"' {
                        skip_raw_string(r, interner, rep, pos);
                        return make(r, interner, TokenKind::StringLiteral);
                    }
                    if skip_quoted(r, interner, rep, pos) {
                        r.skip(1);
                    }
                    let kind = if quote == b'\'' {
                        TokenKind::CharLiteral
                    } else {
                        TokenKind::StringLiteral
                    };
                    return make(r, interner, kind);
                }
            }
            return make(r, interner, TokenKind::Identifier);
        }

        // Numeric literals.
        if c == b'0' {
            r.skip(1);
            if matches!(r.at(), b'x' | b'X') {
                while r.advance() && r.at().is_ascii_hexdigit() {}
                skip_integer_suffix(r);
                return make(r, interner, TokenKind::HexLiteral);
            }
            if matches!(r.at(), b'b' | b'B') {
                while r.advance() && matches!(r.at(), b'0' | b'1') {}
                skip_integer_suffix(r);
                return make(r, interner, TokenKind::BinLiteral);
            }
            if r.eof() || !matches!(r.at(), b'0'..=b'7') {
                // A lone zero is octal per ISO: decimal literals never
                // start with 0.
                skip_integer_suffix(r);
                return make(r, interner, TokenKind::OctLiteral);
            }
            while !r.eof() && matches!(r.at(), b'0'..=b'7') {
                r.skip(1);
            }
            skip_integer_suffix(r);
            return make(r, interner, TokenKind::OctLiteral);
        }
        if c.is_ascii_digit() || (c == b'.' && r.peek_next().is_ascii_digit()) {
            return scan_decimal(r, interner, rep, start, pos);
        }

        // Unprefixed string and character literals.
        if matches!(c, b'"' | b'\'') {
            if skip_quoted(r, interner, rep, pos) {
                r.skip(1);
            }
            let kind = if c == b'\'' {
                TokenKind::CharLiteral
            } else {
                TokenKind::StringLiteral
            };
            return make(r, interner, kind);
        }

        // Everything else starts with a known punctuator byte or is junk.
        r.skip(1);
        let kind = match c {
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'?' => TokenKind::Question,
            b'~' => TokenKind::Tilde,
            b'+' => match r.at() {
                b'+' => {
                    r.skip(1);
                    TokenKind::PlusPlus
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::PlusAssign
                }
                _ => TokenKind::Plus,
            },
            b'-' => match r.at() {
                b'-' => {
                    r.skip(1);
                    TokenKind::MinusMinus
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::MinusAssign
                }
                b'>' => {
                    r.skip(1);
                    if r.at() == b'*' {
                        r.skip(1);
                        TokenKind::ArrowStar
                    } else {
                        TokenKind::Arrow
                    }
                }
                _ => TokenKind::Minus,
            },
            b'*' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            b'=' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            b'&' => match r.at() {
                b'&' => {
                    r.skip(1);
                    TokenKind::AmpAmp
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::AmpAssign
                }
                _ => TokenKind::Amp,
            },
            b'|' => match r.at() {
                b'|' => {
                    r.skip(1);
                    TokenKind::PipePipe
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::PipeAssign
                }
                _ => TokenKind::Pipe,
            },
            b'^' => {
                if r.at() == b'=' {
                    r.skip(1);
                    TokenKind::CaretAssign
                } else {
                    TokenKind::Caret
                }
            }
            b'<' => match r.at() {
                b'<' => {
                    r.skip(1);
                    if r.at() == b'=' {
                        r.skip(1);
                        TokenKind::ShlAssign
                    } else {
                        TokenKind::Shl
                    }
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::LessEqual
                }
                _ => TokenKind::Less,
            },
            b'>' => match r.at() {
                b'>' => {
                    r.skip(1);
                    if r.at() == b'=' {
                        r.skip(1);
                        TokenKind::ShrAssign
                    } else {
                        TokenKind::Shr
                    }
                }
                b'=' => {
                    r.skip(1);
                    TokenKind::GreaterEqual
                }
                _ => TokenKind::Greater,
            },
            b':' => {
                if r.at() == b':' {
                    r.skip(1);
                    TokenKind::Scope
                } else {
                    TokenKind::Colon
                }
            }
            b'.' => match r.at() {
                b'.' if r.peek_next() == b'.' => {
                    r.skip(2);
                    TokenKind::Ellipsis
                }
                b'*' => {
                    r.skip(1);
                    TokenKind::DotStar
                }
                _ => TokenKind::Dot,
            },
            b'#' => {
                if r.at() == b'#' {
                    r.skip(1);
                    TokenKind::HashHash
                } else {
                    TokenKind::Hash
                }
            }
            b'\\' => {
                // ISO translation phase 2: splice and keep scanning.
                if r.at_newline() {
                    r.take_newline();
                    continue;
                }
                report_error(rep, interner, pos, "stray backslash in program text");
                TokenKind::Invalid
            }
            _ => {
                report_error(
                    rep,
                    interner,
                    pos,
                    format!("unrecognized symbol (char)0x{:02X}", c),
                );
                TokenKind::Invalid
            }
        };
        return make(r, interner, kind);
    }
}

/// Scans a decimal (possibly floating) literal starting at `start`.
fn scan_decimal(
    r: &mut SourceReader,
    interner: &mut Interner,
    rep: &mut Reporter,
    start: usize,
    pos: SourcePos,
) -> Token {
    while !r.eof() && r.at().is_ascii_digit() {
        r.skip(1);
    }
    if r.at() == b'.' {
        while r.advance() && r.at().is_ascii_digit() {}
    }
    if matches!(r.at(), b'e' | b'E') {
        r.skip(1);
        if matches!(r.at(), b'+' | b'-') {
            r.skip(1);
        }
        if r.eof() || !r.at().is_ascii_digit() {
            report_error(rep, interner, pos, "numeric literal truncated at exponent");
        }
        while !r.eof() && r.at().is_ascii_digit() {
            r.skip(1);
        }
    }
    if matches!(r.at(), b'f' | b'F') {
        r.skip(1);
    } else {
        skip_integer_suffix(r);
    }
    let text = interner.intern_owned(r.slice_from(start).into_owned());
    Token::new(TokenKind::DecLiteral, text, pos)
}
