//! Shared harness for driving the token stream with the real `#if`
//! evaluator, plus diagnostics capture.

use std::collections::BTreeSet;
use std::path::PathBuf;

use declmap_ast::DirectiveEvaluator;
use declmap_base::{CollectingSink, Interner, Reporter};
use declmap_lex::{MacroTable, SourceReader, StreamContext, TokenKind, TokenStream};

pub struct Harness {
    pub interner: Interner,
    pub macros: MacroTable,
    pub rep: Reporter,
    pub visited: BTreeSet<String>,
    pub dirs: Vec<PathBuf>,
    pub if_eval: DirectiveEvaluator,
}

impl Harness {
    pub fn new() -> Harness {
        let mut interner = Interner::new();
        let mut macros = MacroTable::new();
        macros.seed_dynamic(&mut interner);
        Harness {
            interner,
            macros,
            rep: Reporter::new(Box::new(CollectingSink::default())),
            visited: BTreeSet::new(),
            dirs: Vec::new(),
            if_eval: DirectiveEvaluator::default(),
        }
    }

    pub fn stream<'a>(&'a mut self, name: &str, src: &str) -> TokenStream<'a> {
        let reader = SourceReader::from_string(name, src, &mut self.interner);
        TokenStream::new(
            reader,
            StreamContext {
                macros: &mut self.macros,
                interner: &mut self.interner,
                rep: &mut self.rep,
                search_dirs: &self.dirs,
                visited: &mut self.visited,
                if_eval: &mut self.if_eval,
            },
        )
    }
}

/// Pulls every token of `src` through a fresh harness, returning
/// `(kind, text)` pairs and the error count.
pub fn lex_all(src: &str) -> (Vec<(TokenKind, String)>, usize) {
    let mut h = Harness::new();
    let mut out = Vec::new();
    {
        let mut stream = h.stream("input.cpp", src);
        loop {
            let tok = stream.get_token();
            if tok.kind == TokenKind::EndOfCode {
                break;
            }
            let text = stream.text_of(tok).to_string();
            out.push((tok.kind, text));
        }
    }
    (out, h.rep.errors())
}

/// The token texts of `src` after full preprocessing.
pub fn lex_texts(src: &str) -> Vec<String> {
    lex_all(src).0.into_iter().map(|(_, t)| t).collect()
}
