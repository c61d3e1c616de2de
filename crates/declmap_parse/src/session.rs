//! Parse sessions.
//!
//! A [`Session`] owns everything a parse needs: the interner, the macro
//! table, the definition store, the diagnostic reporter, and the include
//! search path. It is created pre-seeded with the builtin primitive
//! types, type modifiers, declaration qualifiers, and builtin macros,
//! then fed sources through [`Session::parse_stream`] and queried
//! through [`Session::lookup`] and the dump methods.
//!
//! # Example
//!
//! ```
//! use declmap_parse::Session;
//!
//! let mut session = Session::new();
//! session.parse_string("demo.cpp", "namespace app { int version; }");
//! assert!(session.lookup("app::version").is_some());
//! ```

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use declmap_ast::{DirectiveEvaluator, EvalOptions};
use declmap_base::{DiagnosticSink, Interner, Reporter};
use declmap_lex::{MacroDef, MacroTable, SourceReader, StreamContext, TokenStream};
use declmap_store::{flags, DefId, DefStore, Definition};

use crate::parser::DeclParser;

/// The builtin primitive type names.
const PRIMITIVES: &[&str] = &[
    "void",
    "bool",
    "char",
    "int",
    "float",
    "double",
    "wchar_t",
    "__builtin_va_list",
];

/// Integer-type modifiers; they can stand alone as a type (`unsigned x;`).
const MODIFIERS: &[&str] = &["signed", "unsigned", "short", "long"];

/// Declaration qualifiers the type reader consumes.
const QUALIFIERS: &[&str] = &["const", "volatile", "static", "register", "inline", "throw"];

/// One parsing context: builtins, macros, search path, and the scope tree
/// that parses accumulate into.
pub struct Session {
    interner: Interner,
    macros: MacroTable,
    store: DefStore,
    rep: Reporter,
    search_dirs: Vec<PathBuf>,
    visited: BTreeSet<String>,
    eval_options: EvalOptions,
}

impl Session {
    /// Creates a session seeded with builtin types and macros.
    pub fn new() -> Session {
        let mut session = Session {
            interner: Interner::new(),
            macros: MacroTable::new(),
            store: DefStore::new(),
            rep: Reporter::stderr(),
            search_dirs: Vec::new(),
            visited: BTreeSet::new(),
            eval_options: EvalOptions::default(),
        };
        session.seed_builtins();
        session
    }

    fn seed_builtins(&mut self) {
        let global = self.store.global();
        for name in PRIMITIVES {
            let sym = self.interner.intern(name);
            self.store.declare(
                global,
                Definition::new(sym, flags::PRIMITIVE | flags::TYPENAME),
            );
        }
        for name in MODIFIERS {
            let sym = self.interner.intern(name);
            self.store.declare(
                global,
                Definition::new(sym, flags::MODIFIER | flags::TYPENAME),
            );
        }
        for name in QUALIFIERS {
            let sym = self.interner.intern(name);
            self.store
                .declare(global, Definition::new(sym, flags::QUALIFIER));
        }

        self.macros.seed_dynamic(&mut self.interner);
        self.add_macro("true", "1");
        self.add_macro("false", "0");
        self.add_macro("__extension__", "");
        self.add_macro_function("__attribute__", &["x"], "", false);
        self.add_macro_function("__typeof__", &["x"], "int", false);
        self.add_macro_function("__typeof", &["x"], "int", false);
    }

    /// Appends a directory to the `#include` search path.
    pub fn add_search_directory(&mut self, dir: impl Into<PathBuf>) {
        self.search_dirs.push(dir.into());
    }

    /// Registers an object-like macro, as if by `#define name definiens`.
    pub fn add_macro(&mut self, name: &str, definiens: &str) {
        let def = MacroDef::object(name, definiens, &mut self.interner, &mut self.rep);
        self.macros.define(
            def,
            &self.interner,
            &mut self.rep,
            declmap_base::SourcePos::default(),
        );
    }

    /// Registers a function-like macro.
    pub fn add_macro_function(
        &mut self,
        name: &str,
        params: &[&str],
        definiens: &str,
        variadic: bool,
    ) {
        let def = MacroDef::function(
            name,
            params,
            definiens,
            variadic,
            &mut self.interner,
            &mut self.rep,
        );
        self.macros.define(
            def,
            &self.interner,
            &mut self.rep,
            declmap_base::SourcePos::default(),
        );
    }

    /// Removes a macro; removing an unknown name is not an error.
    pub fn undefine(&mut self, name: &str) {
        if let Some(sym) = self.interner.get(name) {
            self.macros.undefine(sym);
        }
    }

    /// Runs the preprocessor and declaration parser over `reader`,
    /// accumulating definitions. Problems are reported to the sink and
    /// counted; parsing always runs to end of code.
    pub fn parse_stream(&mut self, reader: SourceReader) {
        let mut if_eval = DirectiveEvaluator::new(self.eval_options);
        let stream = TokenStream::new(
            reader,
            StreamContext {
                macros: &mut self.macros,
                interner: &mut self.interner,
                rep: &mut self.rep,
                search_dirs: &self.search_dirs,
                visited: &mut self.visited,
                if_eval: &mut if_eval,
            },
        );
        let mut parser = DeclParser::new(stream, &mut self.store, self.eval_options);
        parser.parse_translation_unit();
    }

    /// Opens `path` (memory-mapped when possible) and parses it.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let reader = SourceReader::open(path.as_ref(), &mut self.interner)?;
        self.visited
            .insert(path.as_ref().to_string_lossy().into_owned());
        self.parse_stream(reader);
        Ok(())
    }

    /// Parses an in-memory string as a source named `name`.
    pub fn parse_string(&mut self, name: &str, text: &str) {
        let reader = SourceReader::from_string(name, text, &mut self.interner);
        self.parse_stream(reader);
    }

    /// Resolves a `::`-separated qualified name from the global scope.
    pub fn lookup(&self, qualified_name: &str) -> Option<DefId> {
        self.store.lookup_qualified(qualified_name, &self.interner)
    }

    pub fn store(&self) -> &DefStore {
        &self.store
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Writes the scope tree to `sink`.
    pub fn dump_definitions(&self, sink: &mut dyn Write) -> io::Result<()> {
        self.store.dump(sink, &self.interner)
    }

    /// Writes every live macro definition to `sink`, sorted by name.
    pub fn dump_macros(&self, sink: &mut dyn Write) -> io::Result<()> {
        let mut lines: Vec<String> = self
            .macros
            .iter()
            .map(|def| format!("#define {}", def.display(&self.interner)))
            .collect();
        lines.sort();
        for line in lines {
            writeln!(sink, "{}", line)?;
        }
        Ok(())
    }

    /// Files pulled in by `#include` so far, in sorted order.
    pub fn visited_files(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(|s| s.as_str())
    }

    pub fn error_count(&self) -> usize {
        self.rep.errors()
    }

    pub fn warning_count(&self) -> usize {
        self.rep.warnings()
    }

    /// Replaces the diagnostic sink; counts are preserved.
    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.rep.set_sink(sink);
    }

    /// Switches `#if` float comparison between the legacy 2⁻¹⁰ tolerance
    /// (default) and exact IEEE equality.
    pub fn set_exact_float_compare(&mut self, exact: bool) {
        self.eval_options.exact_float_eq = exact;
    }

    /// Drops parsed definitions and user macros; builtins and the search
    /// path survive.
    pub fn reset(&mut self) {
        self.store = DefStore::new();
        self.macros.clear();
        self.visited.clear();
        self.rep.reset_counts();
        self.seed_builtins();
    }

    /// Drops everything, builtins included. The session accepts input
    /// afterwards but resolves no names until re-seeded by parsing.
    pub fn reset_all(&mut self) {
        self.store = DefStore::new();
        self.macros.clear();
        self.visited.clear();
        self.search_dirs.clear();
        self.rep.reset_counts();
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_are_seeded() {
        let session = Session::new();
        for name in ["void", "int", "double", "wchar_t"] {
            assert!(session.lookup(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn builtin_macros_expand() {
        let mut session = Session::new();
        session.parse_string("t.cpp", "int x = true;\n");
        assert_eq!(session.error_count(), 0);
        assert!(session.lookup("x").is_some());
    }

    #[test]
    fn attribute_macro_vanishes() {
        let mut session = Session::new();
        session.parse_string(
            "t.cpp",
            "__attribute__((packed)) int x;\n__extension__ int y;\n",
        );
        assert_eq!(session.error_count(), 0);
        assert!(session.lookup("x").is_some());
        assert!(session.lookup("y").is_some());
    }

    #[test]
    fn simple_variable_extraction() {
        let mut session = Session::new();
        session.parse_string("t.cpp", "int x = 4;");
        let id = session.lookup("x").expect("x should be declared");
        let def = session.store().get(id);
        assert!(def.has(flags::TYPED));
        assert_eq!(session.error_count(), 0);
    }

    #[test]
    fn namespace_and_qualified_lookup() {
        let mut session = Session::new();
        session.parse_string("t.cpp", "namespace outer { namespace inner { int deep; } }");
        assert!(session.lookup("outer::inner::deep").is_some());
        assert!(session.lookup("outer::deep").is_none());
    }

    #[test]
    fn user_macro_applies_before_parse() {
        let mut session = Session::new();
        session.add_macro("WIDTH", "int");
        session.parse_string("t.cpp", "WIDTH sized;");
        assert!(session.lookup("sized").is_some());
        assert_eq!(session.error_count(), 0);
    }

    #[test]
    fn undefine_removes_user_macro() {
        let mut session = Session::new();
        session.add_macro("X", "1");
        session.undefine("X");
        session.undefine("X");
        session.parse_string("t.cpp", "#ifdef X\nint wrong;\n#endif\n");
        assert!(session.lookup("wrong").is_none());
    }

    #[test]
    fn reset_keeps_builtins_drops_parsed() {
        let mut session = Session::new();
        session.parse_string("t.cpp", "int x;");
        assert!(session.lookup("x").is_some());
        session.reset();
        assert!(session.lookup("x").is_none());
        assert!(session.lookup("int").is_some());
    }

    #[test]
    fn reset_all_drops_builtins_too() {
        let mut session = Session::new();
        session.reset_all();
        assert!(session.lookup("int").is_none());
    }

    #[test]
    fn dump_macros_lists_definitions() {
        let mut session = Session::new();
        session.add_macro("ANSWER", "42");
        let mut out = Vec::new();
        session.dump_macros(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("#define ANSWER 42"));
        assert!(text.contains("#define true 1"));
    }
}
