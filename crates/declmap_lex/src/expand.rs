//! Macro substitution.
//!
//! This module implements the replacement-list walk: argument lookup,
//! `#` (stringize) over unexpanded arguments, `##` (concatenate) with
//! reparse-through-the-raw-scanner, and full pre-expansion of arguments
//! substituted at ordinary positions.
//!
//! Re-expansion of a substitution result is the caller's business: the
//! token stream pushes the result as an expansion frame and re-scans it
//! with the macro's name on the suppression set, and
//! [`expand_sequence`] does the same recursively for token lists that
//! never touch the stream (macro arguments, `#include` lines).

use std::collections::VecDeque;

use declmap_base::{CollectingSink, Interner, Reporter, SourcePos, Symbol};

use crate::macros::{DynamicMacro, MacroDef, MacroTable};
use crate::reader::SourceReader;
use crate::scan::read_raw_token;
use crate::token::{Token, TokenKind};

fn report_error(rep: &mut Reporter, interner: &Interner, pos: SourcePos, msg: String) {
    rep.error(interner.resolve(pos.file).to_string(), pos.line, pos.col, msg);
}

fn report_warning(rep: &mut Reporter, interner: &Interner, pos: SourcePos, msg: String) {
    rep.warning(interner.resolve(pos.file).to_string(), pos.line, pos.col, msg);
}

/// Synthesizes the replacement token for `__FILE__` or `__LINE__` at the
/// expansion site.
pub(crate) fn dynamic_token(
    which: DynamicMacro,
    pos: SourcePos,
    interner: &mut Interner,
) -> Token {
    match which {
        DynamicMacro::File => {
            let text = format!("\"{}\"", interner.resolve(pos.file));
            Token::new(TokenKind::StringLiteral, interner.intern_owned(text), pos)
        }
        DynamicMacro::Line => {
            let text = pos.line.to_string();
            Token::new(TokenKind::DecLiteral, interner.intern_owned(text), pos)
        }
    }
}

/// Collects the argument token sequences of a function-like macro
/// invocation. Call with the opening parenthesis already consumed; `next`
/// yields the following tokens.
///
/// Top-level commas separate arguments, with nesting tracked across
/// parentheses, brackets, and braces. Once a variadic macro has all its
/// declared parameters, further commas are kept inside the final argument.
/// Returns `None` (after reporting) when the input ends before the
/// closing parenthesis.
pub(crate) fn capture_invocation_args<F>(
    mut next: F,
    def: &MacroDef,
    interner: &Interner,
    rep: &mut Reporter,
    pos: SourcePos,
) -> Option<Vec<Vec<Token>>>
where
    F: FnMut() -> Token,
{
    let mut parts: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 1usize;
    loop {
        let tok = next();
        match tok.kind {
            TokenKind::EndOfCode => {
                report_error(
                    rep,
                    interner,
                    pos,
                    format!(
                        "unterminated parameters to macro function `{}`",
                        interner.resolve(def.name)
                    ),
                );
                return None;
            }
            TokenKind::Newline => continue,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                depth += 1;
                parts.last_mut().expect("parts is never empty").push(tok);
            }
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                parts.last_mut().expect("parts is never empty").push(tok);
            }
            TokenKind::RBracket | TokenKind::RBrace => {
                depth = depth.saturating_sub(1).max(1);
                parts.last_mut().expect("parts is never empty").push(tok);
            }
            TokenKind::Comma if depth == 1 => {
                if def.variadic && parts.len() >= def.params.len() {
                    parts.last_mut().expect("parts is never empty").push(tok);
                } else {
                    parts.push(Vec::new());
                }
            }
            _ => parts.last_mut().expect("parts is never empty").push(tok),
        }
    }
    Some(finish_args(parts, def, interner, rep, pos))
}

/// Applies the arity rules: empty substitutions for missing parameters,
/// truncation for extras, an error either way.
pub(crate) fn finish_args(
    mut parts: Vec<Vec<Token>>,
    def: &MacroDef,
    interner: &Interner,
    rep: &mut Reporter,
    pos: SourcePos,
) -> Vec<Vec<Token>> {
    let expected = def.params.len();
    // `F()` is zero arguments, and also one empty argument.
    if parts.len() == 1 && parts[0].is_empty() {
        if expected == 0 {
            return Vec::new();
        }
        if expected == 1 {
            return parts;
        }
    }
    if parts.len() > expected {
        report_error(
            rep,
            interner,
            pos,
            format!(
                "too many arguments to macro function `{}`: expected {}, got {}",
                interner.resolve(def.name),
                expected,
                parts.len()
            ),
        );
        parts.truncate(expected);
    } else if parts.len() < expected {
        report_error(
            rep,
            interner,
            pos,
            format!(
                "too few arguments to macro function `{}`: expected {}, got {}",
                interner.resolve(def.name),
                expected,
                parts.len()
            ),
        );
        parts.resize_with(expected, Vec::new);
    }
    parts
}

/// Renders `tokens` as the content of a stringized argument: the source
/// text of each token, single-space separated, with backslashes, quotes,
/// and control bytes escaped so that rescanning the literal reproduces the
/// original bytes.
fn stringize(tokens: &[Token], interner: &mut Interner, pos: SourcePos) -> Token {
    let mut text = String::from("\"");
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        for c in interner.resolve(tok.text).chars() {
            match c {
                '\\' | '"' => {
                    text.push('\\');
                    text.push(c);
                }
                c if c.is_control() => {
                    text.push_str(&format!("\\x{:02x}", c as u32));
                }
                c => text.push(c),
            }
        }
    }
    text.push('"');
    Token::new(TokenKind::StringLiteral, interner.intern_owned(text), pos)
}

/// Pastes two tokens for `##`. The combined text is rescanned with the raw
/// scanner; when it does not form exactly one valid token, both operands
/// are kept and a warning is issued.
fn paste(
    left: Token,
    right: Token,
    interner: &mut Interner,
    rep: &mut Reporter,
) -> Vec<Token> {
    let combined = format!(
        "{}{}",
        interner.resolve(left.text),
        interner.resolve(right.text)
    );
    // Scan the pasted text in isolation; its diagnostics are irrelevant,
    // only whether it forms a single token.
    let mut scratch = Reporter::new(Box::new(CollectingSink::default()));
    let mut reader = SourceReader::from_string("<pasted>", combined.as_str(), interner);
    let first = read_raw_token(&mut reader, interner, &mut scratch);
    let second = read_raw_token(&mut reader, interner, &mut scratch);
    let single = second.kind == TokenKind::EndOfCode
        && first.kind != TokenKind::Invalid
        && first.kind != TokenKind::EndOfCode
        && scratch.errors() == 0;
    if single {
        let text = interner.intern_owned(combined);
        return vec![Token::new(first.kind, text, left.pos)];
    }
    report_warning(
        rep,
        interner,
        left.pos,
        format!(
            "pasting `{}` and `{}` does not give a valid preprocessing token",
            interner.resolve(left.text),
            interner.resolve(right.text)
        ),
    );
    vec![left, right]
}

/// One stretch of output tokens, possibly glued to the previous stretch.
struct Piece {
    tokens: Vec<Token>,
    glued: bool,
}

/// Performs the replacement-list walk for one invocation of `def`.
///
/// `raw_args` are the captured argument sequences; `expanded_args` their
/// fully macro-expanded counterparts. Parameters adjacent to `#`/`##` use
/// the raw form, all others the expanded form.
pub(crate) fn substitute(
    def: &MacroDef,
    raw_args: &[Vec<Token>],
    expanded_args: &[Vec<Token>],
    interner: &mut Interner,
    rep: &mut Reporter,
) -> Vec<Token> {
    let param_index = |tok: &Token| -> Option<usize> {
        if tok.kind == TokenKind::Identifier {
            def.params.iter().position(|p| *p == tok.text)
        } else {
            None
        }
    };

    let mut pieces: Vec<Piece> = Vec::new();
    let mut glue_next = false;
    let mut i = 0;
    while i < def.body.len() {
        let tok = def.body[i];
        match tok.kind {
            TokenKind::Hash if def.function_like => {
                if let Some(p) = def.body.get(i + 1).and_then(param_index) {
                    pieces.push(Piece {
                        tokens: vec![stringize(&raw_args[p], interner, tok.pos)],
                        glued: std::mem::take(&mut glue_next),
                    });
                    i += 2;
                    continue;
                }
                // Validation already complained; emit the `#` verbatim.
                pieces.push(Piece {
                    tokens: vec![tok],
                    glued: std::mem::take(&mut glue_next),
                });
            }
            TokenKind::HashHash => {
                glue_next = true;
            }
            _ => {
                let tokens = match param_index(&tok) {
                    Some(p) => {
                        let next_is_concat = def
                            .body
                            .get(i + 1)
                            .map(|t| t.kind == TokenKind::HashHash)
                            .unwrap_or(false);
                        if glue_next || next_is_concat {
                            raw_args[p].clone()
                        } else {
                            expanded_args[p].clone()
                        }
                    }
                    None => vec![tok],
                };
                pieces.push(Piece {
                    tokens,
                    glued: std::mem::take(&mut glue_next),
                });
            }
        }
        i += 1;
    }

    let mut out: Vec<Token> = Vec::new();
    for piece in pieces {
        if !piece.glued {
            out.extend(piece.tokens);
            continue;
        }
        let mut rest = piece.tokens.into_iter();
        match (out.pop(), rest.next()) {
            (Some(left), Some(right)) => {
                out.extend(paste(left, right, interner, rep));
            }
            (Some(left), None) => out.push(left),
            (None, Some(right)) => out.push(right),
            (None, None) => {}
        }
        out.extend(rest);
    }
    out
}

/// Fully macro-expands a detached token sequence.
///
/// Used for macro arguments before substitution and for directive lines
/// that require expansion (`#include`). Names on `suppressed` are not
/// expanded, which enforces the self-reference rule through nested calls.
pub(crate) fn expand_sequence(
    tokens: &[Token],
    table: &MacroTable,
    suppressed: &mut Vec<Symbol>,
    interner: &mut Interner,
    rep: &mut Reporter,
) -> Vec<Token> {
    let mut queue: VecDeque<Token> = tokens.iter().copied().collect();
    let mut out: Vec<Token> = Vec::new();
    while let Some(tok) = queue.pop_front() {
        if tok.kind != TokenKind::Identifier || suppressed.contains(&tok.text) {
            out.push(tok);
            continue;
        }
        let Some(def) = table.get(tok.text) else {
            out.push(tok);
            continue;
        };
        if let Some(which) = def.dynamic {
            out.push(dynamic_token(which, tok.pos, interner));
            continue;
        }
        if def.function_like {
            if queue.front().map(|t| t.kind) != Some(TokenKind::LParen) {
                out.push(tok);
                continue;
            }
            queue.pop_front();
            let end = SourcePos::default();
            let args = capture_invocation_args(
                || {
                    queue
                        .pop_front()
                        .unwrap_or_else(|| Token::marker(TokenKind::EndOfCode, end))
                },
                def,
                interner,
                rep,
                tok.pos,
            );
            let Some(raw_args) = args else {
                out.push(tok);
                continue;
            };
            let expanded_args: Vec<Vec<Token>> = raw_args
                .iter()
                .map(|a| expand_sequence(a, table, suppressed, interner, rep))
                .collect();
            let result = substitute(def, &raw_args, &expanded_args, interner, rep);
            suppressed.push(def.name);
            let rescanned = expand_sequence(&result, table, suppressed, interner, rep);
            suppressed.pop();
            out.extend(rescanned);
        } else {
            suppressed.push(def.name);
            let rescanned = expand_sequence(&def.body, table, suppressed, interner, rep);
            suppressed.pop();
            out.extend(rescanned);
        }
    }
    out
}
