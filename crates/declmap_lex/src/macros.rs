//! Macro records and the macro table.
//!
//! A [`MacroDef`] is immutable once built: name, parameter list, variadic
//! flag, and the replacement list as pre-scanned tokens. The
//! [`MacroTable`] maps interned names to records; `#define` replaces,
//! `#undef` is idempotent, and redefinition with a different replacement
//! list warns (same-sequence redefinition is silent).
//!
//! `__FILE__` and `__LINE__` carry a [`DynamicMacro`] tag instead of a
//! token body; the stream synthesizes their replacement at expansion time.

use declmap_base::{Interner, Reporter, SourcePos, Symbol};
use rustc_hash::FxHashMap;

use crate::reader::SourceReader;
use crate::scan::read_raw_token;
use crate::token::{Token, TokenKind};

/// Builtin macros whose replacement depends on the expansion site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicMacro {
    /// `__FILE__`: the current file name as a string literal.
    File,
    /// `__LINE__`: the current line as a decimal literal.
    Line,
}

/// One macro definition, object-like or function-like.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: Symbol,
    /// Parameter names. For a variadic macro declared with a bare `...`,
    /// the final entry is `__VA_ARGS__`.
    pub params: Vec<Symbol>,
    pub variadic: bool,
    pub function_like: bool,
    /// The replacement list. Empty for dynamic macros.
    pub body: Vec<Token>,
    pub dynamic: Option<DynamicMacro>,
}

impl MacroDef {
    /// Builds a record and checks the replacement-list invariants: `##`
    /// may not begin or end the list, and in a function-like macro every
    /// `#` must be followed by a parameter name. Violations are reported
    /// and the macro is kept with the offending operator left inert.
    pub fn new(
        name: Symbol,
        params: Vec<Symbol>,
        variadic: bool,
        function_like: bool,
        body: Vec<Token>,
        interner: &Interner,
        rep: &mut Reporter,
        pos: SourcePos,
    ) -> MacroDef {
        let complain = |rep: &mut Reporter, msg: String| {
            rep.error(interner.resolve(pos.file).to_string(), pos.line, pos.col, msg);
        };
        if let Some(first) = body.first() {
            if first.kind == TokenKind::HashHash {
                complain(
                    rep,
                    "`##` cannot appear at the start of a macro replacement list".into(),
                );
            }
        }
        if body.len() > 1 {
            if let Some(last) = body.last() {
                if last.kind == TokenKind::HashHash {
                    complain(
                        rep,
                        "`##` cannot appear at the end of a macro replacement list".into(),
                    );
                }
            }
        }
        if function_like {
            let mut i = 0;
            while i < body.len() {
                if body[i].kind == TokenKind::Hash {
                    let param_follows = body
                        .get(i + 1)
                        .map(|t| t.kind == TokenKind::Identifier && params.contains(&t.text))
                        .unwrap_or(false);
                    if !param_follows {
                        complain(rep, "`#` must be followed by a macro parameter name".into());
                    }
                    i += 1;
                }
                i += 1;
            }
        }
        MacroDef {
            name,
            params,
            variadic,
            function_like,
            body,
            dynamic: None,
        }
    }

    /// Builds an object-like macro by scanning `definiens` as one logical
    /// line of preprocessing tokens.
    pub fn object(
        name: &str,
        definiens: &str,
        interner: &mut Interner,
        rep: &mut Reporter,
    ) -> MacroDef {
        let name_sym = interner.intern(name);
        let body = scan_definiens(name, definiens, interner, rep);
        MacroDef::new(
            name_sym,
            Vec::new(),
            false,
            false,
            body,
            interner,
            rep,
            SourcePos::default(),
        )
    }

    /// Builds a function-like macro from a parameter name list and a
    /// definiens string.
    pub fn function(
        name: &str,
        params: &[&str],
        definiens: &str,
        variadic: bool,
        interner: &mut Interner,
        rep: &mut Reporter,
    ) -> MacroDef {
        let name_sym = interner.intern(name);
        let mut param_syms: Vec<Symbol> = params.iter().map(|p| interner.intern(p)).collect();
        if variadic && params.is_empty() {
            param_syms.push(interner.intern("__VA_ARGS__"));
        }
        let body = scan_definiens(name, definiens, interner, rep);
        MacroDef::new(
            name_sym,
            param_syms,
            variadic,
            true,
            body,
            interner,
            rep,
            SourcePos::default(),
        )
    }

    fn dynamic(name: &str, which: DynamicMacro, interner: &mut Interner) -> MacroDef {
        MacroDef {
            name: interner.intern(name),
            params: Vec::new(),
            variadic: false,
            function_like: false,
            body: Vec::new(),
            dynamic: Some(which),
        }
    }

    /// True when both records would expand identically.
    pub fn same_replacement(&self, other: &MacroDef) -> bool {
        self.function_like == other.function_like
            && self.variadic == other.variadic
            && self.params == other.params
            && self.dynamic == other.dynamic
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(other.body.iter())
                .all(|(a, b)| a.kind == b.kind && a.text == b.text)
    }

    /// Renders the definition the way `#define` would have spelled it.
    pub fn display(&self, interner: &Interner) -> String {
        let mut out = String::from(interner.resolve(self.name));
        if self.function_like {
            out.push('(');
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(interner.resolve(*p));
            }
            if self.variadic {
                out.push_str("...");
            }
            out.push(')');
        }
        out.push(' ');
        match self.dynamic {
            Some(DynamicMacro::File) => out.push_str("<current file>"),
            Some(DynamicMacro::Line) => out.push_str("<current line>"),
            None => {
                for (i, t) in self.body.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(interner.resolve(t.text));
                }
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// Scans a definiens string into replacement-list tokens.
fn scan_definiens(
    macro_name: &str,
    definiens: &str,
    interner: &mut Interner,
    rep: &mut Reporter,
) -> Vec<Token> {
    let mut reader = SourceReader::from_string(
        &format!("<definition of {}>", macro_name),
        definiens,
        interner,
    );
    let mut body = Vec::new();
    loop {
        let tok = read_raw_token(&mut reader, interner, rep);
        match tok.kind {
            TokenKind::EndOfCode => break,
            TokenKind::Newline => continue,
            _ => body.push(tok),
        }
    }
    body
}

/// The identifier-to-macro mapping for one session.
#[derive(Default)]
pub struct MacroTable {
    map: FxHashMap<Symbol, MacroDef>,
}

impl MacroTable {
    pub fn new() -> MacroTable {
        MacroTable::default()
    }

    /// Seeds `__FILE__` and `__LINE__`.
    pub fn seed_dynamic(&mut self, interner: &mut Interner) {
        for (name, which) in [("__FILE__", DynamicMacro::File), ("__LINE__", DynamicMacro::Line)] {
            let def = MacroDef::dynamic(name, which, interner);
            self.map.insert(def.name, def);
        }
    }

    /// Registers `def`, warning when it replaces a different definition of
    /// the same name.
    pub fn define(
        &mut self,
        def: MacroDef,
        interner: &Interner,
        rep: &mut Reporter,
        pos: SourcePos,
    ) {
        if let Some(old) = self.map.get(&def.name) {
            if !old.same_replacement(&def) {
                rep.warning(
                    interner.resolve(pos.file).to_string(),
                    pos.line,
                    pos.col,
                    format!("macro `{}` redefined", interner.resolve(def.name)),
                );
            }
        }
        self.map.insert(def.name, def);
    }

    /// Removes a macro. Removing a missing name is not an error.
    pub fn undefine(&mut self, name: Symbol) {
        self.map.remove(&name);
    }

    pub fn get(&self, name: Symbol) -> Option<&MacroDef> {
        self.map.get(&name)
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.map.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroDef> {
        self.map.values()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declmap_base::CollectingSink;

    fn setup() -> (Interner, Reporter) {
        (
            Interner::new(),
            Reporter::new(Box::new(CollectingSink::default())),
        )
    }

    #[test]
    fn object_macro_scans_body() {
        let (mut i, mut rep) = setup();
        let def = MacroDef::object("TWO", "1 + 1", &mut i, &mut rep);
        assert!(!def.function_like);
        assert_eq!(def.body.len(), 3);
        assert_eq!(i.resolve(def.body[0].text), "1");
        assert_eq!(def.body[1].kind, TokenKind::Plus);
    }

    #[test]
    fn function_macro_records_params() {
        let (mut i, mut rep) = setup();
        let def = MacroDef::function("MAX", &["a", "b"], "a > b ? a : b", false, &mut i, &mut rep);
        assert!(def.function_like);
        assert_eq!(def.params.len(), 2);
        assert_eq!(rep.errors(), 0);
    }

    #[test]
    fn variadic_without_named_params_gets_va_args() {
        let (mut i, mut rep) = setup();
        let def = MacroDef::function("V", &[], "__VA_ARGS__", true, &mut i, &mut rep);
        assert_eq!(def.params.len(), 1);
        assert_eq!(i.resolve(def.params[0]), "__VA_ARGS__");
    }

    #[test]
    fn leading_concat_is_rejected() {
        let (mut i, mut rep) = setup();
        MacroDef::object("BAD", "## x", &mut i, &mut rep);
        assert_eq!(rep.errors(), 1);
    }

    #[test]
    fn trailing_concat_is_rejected() {
        let (mut i, mut rep) = setup();
        MacroDef::object("BAD", "x ##", &mut i, &mut rep);
        assert_eq!(rep.errors(), 1);
    }

    #[test]
    fn stringize_must_name_a_parameter() {
        let (mut i, mut rep) = setup();
        MacroDef::function("S", &["x"], "# y", false, &mut i, &mut rep);
        assert_eq!(rep.errors(), 1);
        let mut rep2 = Reporter::new(Box::new(CollectingSink::default()));
        MacroDef::function("S", &["x"], "# x", false, &mut i, &mut rep2);
        assert_eq!(rep2.errors(), 0);
    }

    #[test]
    fn redefinition_with_different_body_warns() {
        let (mut i, mut rep) = setup();
        let mut table = MacroTable::new();
        let a = MacroDef::object("M", "1", &mut i, &mut rep);
        let b = MacroDef::object("M", "2", &mut i, &mut rep);
        table.define(a, &i, &mut rep, SourcePos::default());
        assert_eq!(rep.warnings(), 0);
        table.define(b, &i, &mut rep, SourcePos::default());
        assert_eq!(rep.warnings(), 1);
    }

    #[test]
    fn identical_redefinition_is_silent() {
        let (mut i, mut rep) = setup();
        let mut table = MacroTable::new();
        let a = MacroDef::object("M", "x + 1", &mut i, &mut rep);
        let b = MacroDef::object("M", "x  +  1", &mut i, &mut rep);
        table.define(a, &i, &mut rep, SourcePos::default());
        table.define(b, &i, &mut rep, SourcePos::default());
        assert_eq!(rep.warnings(), 0);
    }

    #[test]
    fn undefine_is_idempotent() {
        let (mut i, mut rep) = setup();
        let mut table = MacroTable::new();
        let def = MacroDef::object("GONE", "", &mut i, &mut rep);
        let name = def.name;
        table.define(def, &i, &mut rep, SourcePos::default());
        table.undefine(name);
        assert!(!table.contains(name));
        table.undefine(name);
        assert!(table.is_empty());
    }

    #[test]
    fn display_round_trips_shape() {
        let (mut i, mut rep) = setup();
        let def = MacroDef::function("CAT", &["a", "b"], "a ## b", false, &mut i, &mut rep);
        assert_eq!(def.display(&i), "CAT(a, b) a ## b");
    }

    #[test]
    fn dynamic_seeds_present() {
        let mut i = Interner::new();
        let mut table = MacroTable::new();
        table.seed_dynamic(&mut i);
        let file = i.intern("__FILE__");
        assert_eq!(table.get(file).and_then(|d| d.dynamic), Some(DynamicMacro::File));
    }
}
