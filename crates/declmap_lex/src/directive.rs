//! Preprocessor directive handling.
//!
//! Entered from the token stream when a `#` opens a logical line. The
//! directive keyword and its operands are read with the raw scanner,
//! never macro-expanded, except where ISO demands expansion: the
//! `#if`/`#elif` condition (after `defined` is resolved) and the
//! `#include` name when it is not literally quoted or angle-bracketed.
//!
//! Recovery policy: a malformed directive reports and skips to the end of
//! its line; the stream keeps going.

use std::path::PathBuf;

use declmap_base::SourcePos;

use crate::expand::expand_sequence;
use crate::macros::MacroDef;
use crate::reader::SourceReader;
use crate::scan::read_raw_token;
use crate::stream::{Conditional, IncludeFrame, TokenStream};
use crate::token::{Token, TokenKind};

/// Bound on the include-frame stack.
pub const MAX_INCLUDE_DEPTH: usize = 256;

/// How an `#elif`-family directive re-tests its condition.
enum ElifKind {
    Expr,
    Defined { negate: bool },
}

/// Splits a literal include operand: `"name"` (local-first lookup) or
/// `<name>` (search path only).
fn split_include_operand(text: &str) -> Option<(bool, String)> {
    let t = text.trim();
    if let Some(rest) = t.strip_prefix('"') {
        let end = rest.find('"')?;
        return Some((true, rest[..end].to_string()));
    }
    if let Some(rest) = t.strip_prefix('<') {
        let end = rest.find('>')?;
        return Some((false, rest[..end].to_string()));
    }
    None
}

impl TokenStream<'_> {
    fn raw(&mut self) -> Token {
        read_raw_token(&mut self.reader, self.interner, self.rep)
    }

    /// Consumes tokens through the end of the current logical line.
    fn consume_line(&mut self) {
        loop {
            let tok = self.raw();
            match tok.kind {
                TokenKind::Newline => {
                    self.at_line_start = true;
                    return;
                }
                TokenKind::EndOfCode => return,
                _ => {}
            }
        }
    }

    /// Consumes the rest of the line as text, reporting nothing. Used in
    /// inactive regions, whose content may not even tokenize.
    fn discard_line(&mut self) {
        self.reader.read_line_text();
    }

    /// Dispatches the directive whose `#` was just consumed.
    pub(crate) fn handle_directive(&mut self) {
        let tok = self.raw();
        match tok.kind {
            // The null directive: `#` alone on a line.
            TokenKind::Newline => {
                self.at_line_start = true;
                return;
            }
            TokenKind::EndOfCode => return,
            TokenKind::Identifier => {}
            _ => {
                if self.condition_active() {
                    let text = self.interner.resolve(tok.text).to_string();
                    self.error_at(
                        tok.pos,
                        format!("invalid preprocessor directive `{}`", text),
                    );
                    self.consume_line();
                } else {
                    self.discard_line();
                }
                return;
            }
        }
        let name = self.interner.resolve(tok.text).to_string();
        match name.as_str() {
            "define" => self.directive_define(),
            "undef" => self.directive_undef(),
            "if" => self.directive_if(),
            "ifdef" => self.directive_ifdef(false),
            "ifndef" => self.directive_ifdef(true),
            "elif" => self.directive_elif(tok.pos, ElifKind::Expr),
            "elifdef" => self.directive_elif(tok.pos, ElifKind::Defined { negate: false }),
            "elifndef" => self.directive_elif(tok.pos, ElifKind::Defined { negate: true }),
            "else" => self.directive_else(tok.pos),
            "endif" => self.directive_endif(tok.pos),
            "include" => self.directive_include(false),
            "include_next" => self.directive_include(true),
            "error" => self.directive_message(true),
            "warning" => self.directive_message(false),
            "line" => self.directive_line(tok.pos),
            // Consumed and ignored: #pragma semantics are out of scope,
            // and the original reader also swallowed #import and #using.
            "pragma" | "import" | "using" => self.discard_line(),
            _ => {
                if self.condition_active() {
                    self.error_at(
                        tok.pos,
                        format!("invalid preprocessor directive `{}`", name),
                    );
                    self.consume_line();
                } else {
                    self.discard_line();
                }
            }
        }
    }

    fn directive_define(&mut self) {
        if !self.condition_active() {
            self.discard_line();
            return;
        }
        let name_tok = self.raw();
        if name_tok.kind != TokenKind::Identifier {
            self.error_at(name_tok.pos, "expected macro definiendum at this point");
            if !matches!(name_tok.kind, TokenKind::Newline | TokenKind::EndOfCode) {
                self.consume_line();
            } else {
                self.at_line_start = name_tok.kind == TokenKind::Newline;
            }
            return;
        }
        // Function-like iff `(` directly follows the name, no whitespace.
        let function_like = self.reader.at() == b'(';
        let mut params = Vec::new();
        let mut variadic = false;
        if function_like {
            self.reader.skip(1);
            if !self.parse_macro_params(&mut params, &mut variadic) {
                return;
            }
        }
        let mut body = Vec::new();
        loop {
            let tok = self.raw();
            match tok.kind {
                TokenKind::Newline => {
                    self.at_line_start = true;
                    break;
                }
                TokenKind::EndOfCode => break,
                _ => body.push(tok),
            }
        }
        let def = MacroDef::new(
            name_tok.text,
            params,
            variadic,
            function_like,
            body,
            self.interner,
            self.rep,
            name_tok.pos,
        );
        self.macros.define(def, self.interner, self.rep, name_tok.pos);
    }

    /// Parses `a, b, c...` up to the closing parenthesis. Returns false
    /// after reporting and recovering to the end of the line.
    fn parse_macro_params(&mut self, params: &mut Vec<declmap_base::Symbol>, variadic: &mut bool) -> bool {
        loop {
            let tok = self.raw();
            match tok.kind {
                TokenKind::RParen => return true,
                TokenKind::Identifier => {
                    params.push(tok.text);
                    let sep = self.raw();
                    match sep.kind {
                        TokenKind::Comma => continue,
                        TokenKind::RParen => return true,
                        TokenKind::Ellipsis => {
                            *variadic = true;
                            let close = self.raw();
                            if close.kind != TokenKind::RParen {
                                self.error_at(
                                    close.pos,
                                    "expected closing parenthesis after variadic parameter",
                                );
                                self.consume_line();
                                return false;
                            }
                            return true;
                        }
                        TokenKind::Newline | TokenKind::EndOfCode => {
                            self.error_at(sep.pos, "unterminated macro parameter list");
                            self.at_line_start = sep.kind == TokenKind::Newline;
                            return false;
                        }
                        _ => {
                            self.error_at(
                                sep.pos,
                                "expected comma or closing parenthesis at this point",
                            );
                            self.consume_line();
                            return false;
                        }
                    }
                }
                TokenKind::Ellipsis => {
                    *variadic = true;
                    params.push(self.interner.intern("__VA_ARGS__"));
                    let close = self.raw();
                    if close.kind != TokenKind::RParen {
                        self.error_at(
                            close.pos,
                            "expected end of parameters after variadic",
                        );
                        self.consume_line();
                        return false;
                    }
                    return true;
                }
                TokenKind::Newline | TokenKind::EndOfCode => {
                    self.error_at(tok.pos, "unterminated macro parameter list");
                    self.at_line_start = tok.kind == TokenKind::Newline;
                    return false;
                }
                _ => {
                    self.error_at(tok.pos, "expected parameter name for macro declaration");
                    self.consume_line();
                    return false;
                }
            }
        }
    }

    fn directive_undef(&mut self) {
        if !self.condition_active() {
            self.discard_line();
            return;
        }
        let tok = self.raw();
        match tok.kind {
            TokenKind::Identifier => {
                self.macros.undefine(tok.text);
                self.consume_line();
            }
            TokenKind::Newline | TokenKind::EndOfCode => {
                self.error_at(tok.pos, "expected macro identifier at this point");
                self.at_line_start = tok.kind == TokenKind::Newline;
            }
            _ => {
                self.error_at(tok.pos, "expected macro identifier at this point");
                self.consume_line();
            }
        }
    }

    fn directive_if(&mut self) {
        if !self.condition_active() {
            self.discard_line();
            self.conditionals.push(Conditional {
                is_active: false,
                may_yet_activate: false,
            });
            return;
        }
        let tokens = self.collect_directive_expression();
        let cond = self
            .if_eval
            .eval_condition(&tokens, self.interner, self.rep);
        self.conditionals.push(Conditional {
            is_active: cond,
            may_yet_activate: !cond,
        });
    }

    fn directive_ifdef(&mut self, negate: bool) {
        if !self.condition_active() {
            self.discard_line();
            self.conditionals.push(Conditional {
                is_active: false,
                may_yet_activate: false,
            });
            return;
        }
        let tok = self.raw();
        let cond = match tok.kind {
            TokenKind::Identifier => {
                let defined = self.macros.contains(tok.text);
                self.consume_line();
                defined != negate
            }
            _ => {
                self.error_at(tok.pos, "expected identifier to check against macros");
                if !matches!(tok.kind, TokenKind::Newline | TokenKind::EndOfCode) {
                    self.consume_line();
                } else {
                    self.at_line_start = tok.kind == TokenKind::Newline;
                }
                false
            }
        };
        self.conditionals.push(Conditional {
            is_active: cond,
            may_yet_activate: !cond,
        });
    }

    fn directive_elif(&mut self, pos: SourcePos, kind: ElifKind) {
        let Some(top) = self.conditionals.last().copied() else {
            self.error_at(pos, "unexpected #elif directive; no matching #if");
            self.discard_line();
            return;
        };
        if top.is_active {
            if let Some(top) = self.conditionals.last_mut() {
                top.is_active = false;
                top.may_yet_activate = false;
            }
            self.discard_line();
        } else if top.may_yet_activate {
            // Re-enter the group as if this were its #if.
            self.conditionals.pop();
            match kind {
                ElifKind::Expr => self.directive_if(),
                ElifKind::Defined { negate } => self.directive_ifdef(negate),
            }
        } else {
            self.discard_line();
        }
    }

    fn directive_else(&mut self, pos: SourcePos) {
        match self.conditionals.last_mut() {
            None => {
                self.error_at(pos, "unexpected #else directive; no matching #if");
            }
            Some(top) => {
                top.is_active = top.may_yet_activate;
                top.may_yet_activate = false;
            }
        }
        self.consume_line();
    }

    fn directive_endif(&mut self, pos: SourcePos) {
        if self.conditionals.pop().is_none() {
            self.error_at(pos, "unexpected #endif directive: no open conditionals");
        }
        self.consume_line();
    }

    /// Collects the condition of `#if`/`#elif` as evaluation-ready tokens:
    /// the raw line is read, `defined` forms become 1/0 without expanding
    /// their operand, macros are expanded, and any identifier that
    /// survives becomes the literal 0.
    fn collect_directive_expression(&mut self) -> Vec<Token> {
        let mut line = Vec::new();
        loop {
            let tok = self.raw();
            match tok.kind {
                TokenKind::Newline => {
                    self.at_line_start = true;
                    break;
                }
                TokenKind::EndOfCode => break,
                _ => line.push(tok),
            }
        }

        let one = self.interner.intern("1");
        let zero = self.interner.intern("0");
        let mut processed = Vec::with_capacity(line.len());
        let mut i = 0;
        while i < line.len() {
            let tok = line[i];
            if tok.kind == TokenKind::Identifier && tok.text == self.defined_sym {
                i += 1;
                let parenthesized = line.get(i).map(|t| t.kind) == Some(TokenKind::LParen);
                if parenthesized {
                    i += 1;
                }
                let mut value = false;
                match line.get(i) {
                    Some(name) if name.kind == TokenKind::Identifier => {
                        value = self.macros.contains(name.text);
                        i += 1;
                    }
                    _ => self.error_at(tok.pos, "expected identifier to look up as macro"),
                }
                if parenthesized {
                    if line.get(i).map(|t| t.kind) == Some(TokenKind::RParen) {
                        i += 1;
                    } else {
                        self.error_at(tok.pos, "expected ending parenthesis for defined()");
                    }
                }
                processed.push(Token::new(
                    TokenKind::DecLiteral,
                    if value { one } else { zero },
                    tok.pos,
                ));
                continue;
            }
            processed.push(tok);
            i += 1;
        }

        let mut suppressed = Vec::new();
        let mut expanded = expand_sequence(
            &processed,
            self.macros,
            &mut suppressed,
            self.interner,
            self.rep,
        );
        for tok in &mut expanded {
            if tok.kind == TokenKind::Identifier {
                *tok = Token::new(TokenKind::DecLiteral, zero, tok.pos);
            }
        }
        expanded
    }

    fn directive_include(&mut self, include_next: bool) {
        if !self.condition_active() {
            self.discard_line();
            return;
        }
        let pos = self.here();
        let text = self.reader.read_line_text();
        let Some((local, name)) = self.parse_include_name(&text, pos) else {
            return;
        };
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            self.error_at(
                pos,
                format!("#include nested deeper than {} files", MAX_INCLUDE_DEPTH),
            );
            return;
        }

        let mut found: Option<(SourceReader, Option<usize>)> = None;
        if local && !include_next {
            let current = PathBuf::from(self.interner.resolve(self.reader.name()));
            let candidate = match current.parent() {
                Some(dir) => dir.join(&name),
                None => PathBuf::from(&name),
            };
            if let Ok(reader) = SourceReader::open(&candidate, self.interner) {
                found = Some((reader, None));
            }
        }
        if found.is_none() {
            let start = if include_next {
                self.search_origin.map(|i| i + 1).unwrap_or(0)
            } else {
                0
            };
            for (i, dir) in self.search_dirs.iter().enumerate().skip(start) {
                let candidate = dir.join(&name);
                if let Ok(reader) = SourceReader::open(&candidate, self.interner) {
                    found = Some((reader, Some(i)));
                    break;
                }
            }
        }
        match found {
            Some((reader, origin)) => {
                self.visited
                    .insert(self.interner.resolve(reader.name()).to_string());
                let old = std::mem::replace(&mut self.reader, reader);
                self.includes.push(IncludeFrame {
                    reader: old,
                    search_origin: self.search_origin,
                });
                self.search_origin = origin;
                self.at_line_start = true;
            }
            None => self.error_at(pos, format!("could not find {}", name)),
        }
    }

    /// Extracts the header name from the include operand, expanding macros
    /// when the operand is not already a quoted or bracketed form.
    fn parse_include_name(&mut self, text: &str, pos: SourcePos) -> Option<(bool, String)> {
        if let Some(parsed) = split_include_operand(text) {
            return Some(parsed);
        }
        let expanded = self.expand_include_text(text);
        if let Some(parsed) = split_include_operand(&expanded) {
            return Some(parsed);
        }
        self.error_at(pos, "expected filename inside <> or \"\" delimiters");
        None
    }

    fn expand_include_text(&mut self, text: &str) -> String {
        let mut reader = SourceReader::from_string("<include directive>", text, self.interner);
        let mut tokens = Vec::new();
        loop {
            let tok = read_raw_token(&mut reader, self.interner, self.rep);
            match tok.kind {
                TokenKind::EndOfCode => break,
                TokenKind::Newline => continue,
                _ => tokens.push(tok),
            }
        }
        let mut suppressed = Vec::new();
        let expanded = expand_sequence(
            &tokens,
            self.macros,
            &mut suppressed,
            self.interner,
            self.rep,
        );
        let mut out = String::new();
        for tok in expanded {
            out.push_str(self.interner.resolve(tok.text));
        }
        out
    }

    fn directive_message(&mut self, is_error: bool) {
        let pos = self.here();
        let text = self.reader.read_line_text();
        if !self.condition_active() {
            return;
        }
        if is_error {
            self.error_at(pos, format!("#error {}", text));
        } else {
            self.warning_at(pos, format!("#warning {}", text));
        }
    }

    fn directive_line(&mut self, pos: SourcePos) {
        if !self.condition_active() {
            self.discard_line();
            return;
        }
        let mut line_no: Option<u32> = None;
        let mut file: Option<declmap_base::Symbol> = None;
        loop {
            let tok = self.raw();
            match tok.kind {
                TokenKind::Newline => {
                    self.at_line_start = true;
                    break;
                }
                TokenKind::EndOfCode => break,
                TokenKind::DecLiteral if line_no.is_none() => {
                    line_no = self.interner.resolve(tok.text).parse().ok();
                }
                TokenKind::StringLiteral if file.is_none() => {
                    let text = self.interner.resolve(tok.text);
                    let inner = text.trim_matches('"').to_string();
                    file = Some(self.interner.intern_owned(inner));
                }
                _ => {
                    self.error_at(tok.pos, "malformed #line directive");
                    self.consume_line();
                    break;
                }
            }
        }
        // Applied after the terminator, so the next line reports as N.
        match line_no {
            Some(n) => self.reader.set_line(n),
            None => self.error_at(pos, "expected line number after #line"),
        }
        if let Some(f) = file {
            self.reader.set_name(f);
        }
    }

    /// Fast-skips a false conditional region: lines are discarded at the
    /// character level (their content need not tokenize), with only
    /// comments and `#`-led lines interpreted.
    pub(crate) fn skip_inactive_region(&mut self) {
        while !self.condition_active() {
            self.reader.skip_whitespace();
            if self.reader.eof() {
                let pos = self.here();
                self.error_at(pos, "expected closing preprocessor conditionals before end of code");
                self.conditionals.clear();
                break;
            }
            if self.reader.at() == b'#' {
                self.reader.skip(1);
                self.handle_directive();
                continue;
            }
            while !self.reader.eof() && !self.reader.at_newline() {
                match (self.reader.at(), self.reader.peek_next()) {
                    (b'/', b'*') => {
                        self.reader.skip_block_comment();
                    }
                    (b'/', b'/') => self.reader.skip_line_comment(),
                    _ => self.reader.skip(1),
                }
            }
        }
        self.at_line_start = true;
    }
}
