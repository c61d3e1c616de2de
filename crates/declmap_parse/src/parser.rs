//! The declaration parser.
//!
//! A recursive-descent reader over the preprocessed token stream that
//! records the *shape* of declared names into the definition store:
//! namespaces, classes/structs/unions, enums (with evaluated enumerator
//! constants), typedefs and using-aliases, variables, functions, and
//! template headers. It deliberately stops short of semantics: no
//! overload resolution, no template instantiation; function bodies and
//! initializers are skipped by bracket matching.
//!
//! Recovery: a malformed declaration reports once and re-syncs to `;`,
//! `}`, or end of code.

use declmap_ast::{eval, parse_expression, EvalOptions, SliceSource, Value};
use declmap_base::{SourcePos, Symbol};
use declmap_lex::{Token, TokenKind, TokenStream};
use declmap_store::{flags, DefId, DefStore, Definition, TypeRef};

/// What a declarator list declares.
#[derive(Clone, Copy, PartialEq)]
enum DeclMode {
    Variable,
    Typedef,
}

/// A parsed type specifier: qualifiers, modifiers, and a base.
#[derive(Clone)]
struct ParsedType {
    base: Option<DefId>,
    spelling: String,
}

/// One parameter of an active template header.
#[derive(Clone, Copy)]
struct TemplateParam {
    name: Symbol,
    /// True for `typename T` / `class T`, false for non-type parameters.
    is_type: bool,
}

pub struct DeclParser<'s, 'st> {
    stream: TokenStream<'s>,
    store: &'st mut DefStore,
    options: EvalOptions,
    peeked: Option<Token>,
    anon_count: u32,
    /// Parameters of the template headers currently in force; the type
    /// reader resolves them without touching the store.
    tparam_stack: Vec<Vec<TemplateParam>>,
}

impl<'s, 'st> DeclParser<'s, 'st> {
    pub fn new(
        stream: TokenStream<'s>,
        store: &'st mut DefStore,
        options: EvalOptions,
    ) -> DeclParser<'s, 'st> {
        DeclParser {
            stream,
            store,
            options,
            peeked: None,
            anon_count: 0,
            tparam_stack: Vec::new(),
        }
    }

    fn next(&mut self) -> Token {
        match self.peeked.take() {
            Some(tok) => tok,
            None => self.stream.get_token(),
        }
    }

    fn push_back(&mut self, tok: Token) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(tok);
    }

    fn text(&self, tok: Token) -> &str {
        self.stream.interner_ref().resolve(tok.text)
    }

    fn error(&mut self, pos: SourcePos, msg: impl Into<String>) {
        let file = self.stream.interner_ref().resolve(pos.file).to_string();
        self.stream.reporter().error(file, pos.line, pos.col, msg);
    }

    /// Parses everything up to end of code into the global scope.
    pub fn parse_translation_unit(&mut self) {
        let global = self.store.global();
        self.parse_scope_body(global, false);
    }

    /// Parses declarations into `scope`. With `until_brace`, stops at the
    /// matching `}` (consumed); otherwise at end of code.
    fn parse_scope_body(&mut self, scope: DefId, until_brace: bool) {
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => {
                    if until_brace {
                        self.error(tok.pos, "expected `}` before end of code");
                    }
                    return;
                }
                TokenKind::RBrace if until_brace => return,
                TokenKind::Semicolon => continue,
                TokenKind::KwNamespace => self.parse_namespace(scope),
                TokenKind::KwClass => {
                    self.parse_record(scope, flags::CLASS, Vec::new());
                }
                TokenKind::KwStruct => {
                    self.parse_record(scope, flags::STRUCT, Vec::new());
                }
                TokenKind::KwUnion => {
                    self.parse_record(scope, flags::UNION, Vec::new());
                }
                TokenKind::KwEnum => self.parse_enum(scope),
                TokenKind::KwTypedef => self.parse_typedef(scope),
                TokenKind::KwUsing => self.parse_using(scope),
                TokenKind::KwTemplate => self.parse_template(scope),
                TokenKind::KwExtern => self.parse_extern(scope),
                TokenKind::KwPublic | TokenKind::KwPrivate | TokenKind::KwProtected => {
                    let colon = self.next();
                    if colon.kind != TokenKind::Colon {
                        self.error(colon.pos, "expected `:` after access specifier");
                        self.push_back(colon);
                    }
                }
                // Shapes this extractor records nothing for.
                TokenKind::KwFriend
                | TokenKind::KwOperator
                | TokenKind::KwStaticAssert
                | TokenKind::KwAsm
                | TokenKind::Tilde => self.skip_statement(),
                TokenKind::Identifier => self.parse_declaration(scope, tok, false, Vec::new()),
                TokenKind::Invalid => continue,
                _ => {
                    let desc = tok.kind.describe();
                    self.error(tok.pos, format!("unexpected {} at this point", desc));
                    self.skip_statement();
                }
            }
        }
    }

    /// Consumes through the next `;` at bracket depth zero, or stops just
    /// before a scope-closing `}`.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => return,
                TokenKind::Semicolon if depth == 0 => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        if tok.kind == TokenKind::RBrace {
                            self.push_back(tok);
                            return;
                        }
                        continue;
                    }
                    depth -= 1;
                    // A function body needs no trailing semicolon.
                    if depth == 0 && tok.kind == TokenKind::RBrace {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Consumes a brace-matched block; the opening `{` is already eaten.
    fn skip_braced(&mut self) {
        let mut depth = 1usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => {
                    self.error(tok.pos, "unterminated block before end of code");
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_namespace(&mut self, scope: DefId) {
        let tok = self.next();
        match tok.kind {
            TokenKind::Identifier => {
                let res = self.store.declare(
                    scope,
                    Definition::new(tok.text, flags::NAMESPACE | flags::SCOPE),
                );
                if !res.inserted && !self.store.get(res.id).has(flags::NAMESPACE) {
                    let name = self.text(tok).to_string();
                    self.error(tok.pos, format!("`{}` redeclared as a namespace", name));
                    self.skip_statement();
                    return;
                }
                let open = self.next();
                match open.kind {
                    TokenKind::LBrace => self.parse_scope_body(res.id, true),
                    // Namespace alias: `namespace a = b;`
                    TokenKind::Assign => self.skip_statement(),
                    _ => {
                        self.error(open.pos, "expected `{` to open namespace");
                        self.push_back(open);
                        self.skip_statement();
                    }
                }
            }
            // Anonymous namespace members belong to the enclosing scope.
            TokenKind::LBrace => self.parse_scope_body(scope, true),
            _ => {
                self.error(tok.pos, "expected namespace name");
                self.push_back(tok);
                self.skip_statement();
            }
        }
    }

    fn synthesize_anonymous(&mut self, what: &str) -> Symbol {
        self.anon_count += 1;
        let name = format!("<{} #{}>", what, self.anon_count);
        self.stream.interner().intern_owned(name)
    }

    /// Parses a class/struct/union head and, when present, its body and
    /// trailing declarators.
    fn parse_record(
        &mut self,
        scope: DefId,
        kind_flag: u32,
        template_params: Vec<Symbol>,
    ) {
        let record_flags = kind_flag | flags::TYPENAME | flags::SCOPE;
        let tok = self.next();
        let (name, after) = match tok.kind {
            TokenKind::Identifier => (tok.text, self.next()),
            TokenKind::LBrace => (self.synthesize_anonymous("anonymous"), tok),
            _ => {
                self.error(tok.pos, "expected record name or body");
                self.push_back(tok);
                self.skip_statement();
                return;
            }
        };

        match after.kind {
            TokenKind::Semicolon => {
                // Forward declaration; keep any earlier full definition.
                let mut def = Definition::new(name, record_flags | flags::INCOMPLETE);
                def.template_params = template_params;
                if !def.template_params.is_empty() {
                    def.flags |= flags::TEMPLATE;
                }
                self.store.declare(scope, def);
            }
            TokenKind::Colon | TokenKind::LBrace => {
                if after.kind == TokenKind::Colon {
                    // Base clause: recorded nowhere, skipped to the body.
                    loop {
                        let t = self.next();
                        match t.kind {
                            TokenKind::LBrace => break,
                            TokenKind::Semicolon | TokenKind::EndOfCode => {
                                self.error(t.pos, "expected class body after base clause");
                                return;
                            }
                            _ => {}
                        }
                    }
                }
                let mut def = Definition::new(name, record_flags);
                def.template_params = template_params;
                if !def.template_params.is_empty() {
                    def.flags |= flags::TEMPLATE;
                }
                let res = self.store.declare(scope, def);
                if !res.inserted {
                    // Completing a forward declaration.
                    let existing = self.store.get_mut(res.id);
                    existing.flags &= !flags::INCOMPLETE;
                    existing.flags |= record_flags;
                }
                self.parse_scope_body(res.id, true);
                // `struct S { ... } s1, *s2;`
                let trailer = self.next();
                if trailer.kind == TokenKind::Semicolon {
                    return;
                }
                self.push_back(trailer);
                let ty = ParsedType {
                    base: Some(res.id),
                    spelling: self
                        .stream
                        .interner_ref()
                        .resolve(name)
                        .to_string(),
                };
                self.parse_declarator_list(scope, ty, DeclMode::Variable, false, Vec::new());
            }
            TokenKind::Identifier | TokenKind::Star | TokenKind::Amp => {
                // Elaborated type in a declaration: `struct S x;`
                let res = self.store.declare(
                    scope,
                    Definition::new(name, record_flags | flags::INCOMPLETE),
                );
                self.push_back(after);
                let ty = ParsedType {
                    base: Some(res.id),
                    spelling: self
                        .stream
                        .interner_ref()
                        .resolve(name)
                        .to_string(),
                };
                self.parse_declarator_list(scope, ty, DeclMode::Variable, false, Vec::new());
            }
            _ => {
                self.error(after.pos, "unexpected token after record name");
                self.push_back(after);
                self.skip_statement();
            }
        }
    }

    fn parse_enum(&mut self, scope: DefId) {
        let mut tok = self.next();
        let scoped = matches!(tok.kind, TokenKind::KwClass | TokenKind::KwStruct);
        if scoped {
            tok = self.next();
        }
        let name = match tok.kind {
            TokenKind::Identifier => {
                let n = tok.text;
                tok = self.next();
                n
            }
            _ => self.synthesize_anonymous("anonymous enum"),
        };
        // Underlying type: `enum E : unsigned { ... }`
        if tok.kind == TokenKind::Colon {
            loop {
                tok = self.next();
                match tok.kind {
                    TokenKind::LBrace | TokenKind::Semicolon | TokenKind::EndOfCode => break,
                    _ => {}
                }
            }
        }
        match tok.kind {
            TokenKind::Semicolon => {
                self.store.declare(
                    scope,
                    Definition::new(
                        name,
                        flags::ENUM | flags::TYPENAME | flags::SCOPE | flags::INCOMPLETE,
                    ),
                );
            }
            TokenKind::LBrace => {
                let res = self.store.declare(
                    scope,
                    Definition::new(name, flags::ENUM | flags::TYPENAME | flags::SCOPE),
                );
                self.parse_enumerators(res.id, scope, scoped);
                let trailer = self.next();
                if trailer.kind != TokenKind::Semicolon {
                    self.push_back(trailer);
                    let ty = ParsedType {
                        base: Some(res.id),
                        spelling: self.stream.interner_ref().resolve(name).to_string(),
                    };
                    self.parse_declarator_list(scope, ty, DeclMode::Variable, false, Vec::new());
                }
            }
            _ => {
                self.error(tok.pos, "expected `{` or `;` in enum declaration");
                self.skip_statement();
            }
        }
    }

    /// Parses `A, B = expr, C` through the closing `}`. Unscoped
    /// enumerators are also exported into the enclosing scope.
    fn parse_enumerators(&mut self, enum_id: DefId, parent: DefId, scoped: bool) {
        let mut next_value: i64 = 0;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::RBrace => return,
                TokenKind::Comma => continue,
                TokenKind::EndOfCode => {
                    self.error(tok.pos, "unterminated enumerator list");
                    return;
                }
                TokenKind::Identifier => {
                    let sep = self.next();
                    let value = if sep.kind == TokenKind::Assign {
                        let tokens = self.collect_until_comma_or_brace();
                        match self.eval_tokens(&tokens) {
                            Value::Int(v) => v,
                            _ => {
                                self.error(
                                    tok.pos,
                                    "enumerator initializer is not an integer constant",
                                );
                                next_value
                            }
                        }
                    } else {
                        self.push_back(sep);
                        next_value
                    };
                    next_value = value.wrapping_add(1);
                    let mut def = Definition::new(tok.text, flags::VALUED);
                    def.value = Some(value);
                    self.store.declare(enum_id, def);
                    if !scoped {
                        let mut exported = Definition::new(tok.text, flags::VALUED);
                        exported.value = Some(value);
                        self.store.declare(parent, exported);
                    }
                }
                _ => {
                    self.error(tok.pos, "expected enumerator name");
                    self.skip_statement();
                    return;
                }
            }
        }
    }

    /// Collects tokens to the next `,` or `}` at depth zero; the
    /// terminator is pushed back.
    fn collect_until_comma_or_brace(&mut self) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => return out,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    out.push(tok);
                }
                TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    out.push(tok);
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        self.push_back(tok);
                        return out;
                    }
                    depth -= 1;
                    out.push(tok);
                }
                TokenKind::Comma if depth == 0 => {
                    self.push_back(tok);
                    return out;
                }
                _ => out.push(tok),
            }
        }
    }

    fn eval_tokens(&mut self, tokens: &[Token]) -> Value {
        let mut src = SliceSource::new(tokens);
        let (expr, _) = parse_expression(&mut src);
        match expr {
            Some(expr) => eval(&expr, self.stream.interner_ref(), &self.options),
            None => Value::None,
        }
    }

    fn parse_typedef(&mut self, scope: DefId) {
        let first = self.next();
        let Some(ty) = self.parse_type(scope, first) else {
            return;
        };
        self.parse_declarator_list(scope, ty, DeclMode::Typedef, false, Vec::new());
    }

    fn parse_using(&mut self, scope: DefId) {
        let tok = self.next();
        match tok.kind {
            // `using namespace x;` records no alias.
            TokenKind::KwNamespace => self.skip_statement(),
            TokenKind::Identifier => {
                let eq = self.next();
                if eq.kind == TokenKind::Assign {
                    // `using Name = type;` behaves as a typedef.
                    let first = self.next();
                    let Some(ty) = self.parse_type(scope, first) else {
                        return;
                    };
                    let spelling = self.stream.interner().intern_owned(ty.spelling.clone());
                    let mut def = Definition::new(tok.text, flags::TYPENAME | flags::TYPED);
                    def.ty = Some(TypeRef {
                        base: ty.base,
                        spelling,
                        ptr_depth: 0,
                        is_reference: false,
                    });
                    self.store.declare(scope, def);
                    self.skip_statement();
                } else {
                    // `using x::y;`
                    self.push_back(eq);
                    self.skip_statement();
                }
            }
            _ => {
                self.error(tok.pos, "expected name after `using`");
                self.skip_statement();
            }
        }
    }

    fn parse_template(&mut self, scope: DefId) {
        let open = self.next();
        if open.kind != TokenKind::Less {
            self.error(open.pos, "expected `<` after `template`");
            self.push_back(open);
            self.skip_statement();
            return;
        }
        let params = self.parse_template_params();
        let names: Vec<Symbol> = params.iter().map(|p| p.name).collect();
        self.tparam_stack.push(params);
        let tok = self.next();
        match tok.kind {
            TokenKind::KwClass => self.parse_record(scope, flags::CLASS, names),
            TokenKind::KwStruct => self.parse_record(scope, flags::STRUCT, names),
            TokenKind::KwUnion => self.parse_record(scope, flags::UNION, names),
            TokenKind::Identifier => self.parse_declaration(scope, tok, false, names),
            TokenKind::KwUsing => self.parse_using(scope),
            _ => {
                self.error(tok.pos, "expected declaration after template header");
                self.push_back(tok);
                self.skip_statement();
            }
        }
        self.tparam_stack.pop();
    }

    /// Reads `typename T, class U, int N = 4, ...` through the matching
    /// `>`, returning the parameters. Non-type default arguments run
    /// through the constant evaluator.
    fn parse_template_params(&mut self) -> Vec<TemplateParam> {
        let mut names = Vec::new();
        let mut entry: Vec<Token> = Vec::new();
        let mut depth = 1i32;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => break,
                TokenKind::Less => {
                    depth += 1;
                    entry.push(tok);
                }
                TokenKind::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    entry.push(tok);
                }
                // `>>` can close two template levels at once.
                TokenKind::Shr => {
                    depth -= 2;
                    if depth <= 0 {
                        break;
                    }
                    entry.push(tok);
                }
                TokenKind::Comma if depth == 1 => {
                    self.finish_template_param(&entry, &mut names);
                    entry.clear();
                }
                _ => entry.push(tok),
            }
        }
        self.finish_template_param(&entry, &mut names);
        names
    }

    fn finish_template_param(&mut self, entry: &[Token], names: &mut Vec<TemplateParam>) {
        if entry.is_empty() {
            return;
        }
        let eq_at = entry.iter().position(|t| t.kind == TokenKind::Assign);
        let head = &entry[..eq_at.unwrap_or(entry.len())];
        if let Some(eq) = eq_at {
            // Validate the default as a constant expression; the value
            // itself is not retained.
            let _ = self.eval_tokens(&entry[eq + 1..]);
        }
        let is_type = head
            .iter()
            .any(|t| matches!(t.kind, TokenKind::KwTypename | TokenKind::KwClass));
        if let Some(name) = head
            .iter()
            .rev()
            .find(|t| t.kind == TokenKind::Identifier)
        {
            names.push(TemplateParam {
                name: name.text,
                is_type,
            });
        }
    }

    fn parse_extern(&mut self, scope: DefId) {
        let tok = self.next();
        match tok.kind {
            TokenKind::StringLiteral => {
                let brace = self.next();
                if brace.kind == TokenKind::LBrace {
                    self.parse_scope_body(scope, true);
                } else {
                    self.push_back(brace);
                    let first = self.next();
                    if first.kind == TokenKind::Identifier {
                        self.parse_declaration(scope, first, true, Vec::new());
                    } else {
                        self.push_back(first);
                        self.skip_statement();
                    }
                }
            }
            TokenKind::Identifier => self.parse_declaration(scope, tok, true, Vec::new()),
            _ => {
                self.error(tok.pos, "expected declaration after `extern`");
                self.push_back(tok);
                self.skip_statement();
            }
        }
    }

    /// A declaration led by an identifier: type specifier, then
    /// declarators.
    fn parse_declaration(
        &mut self,
        scope: DefId,
        first: Token,
        is_extern: bool,
        template_params: Vec<Symbol>,
    ) {
        let Some(ty) = self.parse_type(scope, first) else {
            return;
        };
        self.parse_declarator_list(scope, ty, DeclMode::Variable, is_extern, template_params);
    }

    /// Reads a type specifier starting at `first`: qualifiers, integer
    /// modifiers, a base type name (possibly qualified or with template
    /// arguments). Returns `None` after error recovery.
    fn parse_type(&mut self, scope: DefId, first: Token) -> Option<ParsedType> {
        let mut spelling: Vec<String> = Vec::new();
        let mut base: Option<DefId> = None;
        let mut have_type_word = false;
        let mut tok = first;
        loop {
            match tok.kind {
                TokenKind::Identifier => {
                    let found = self.classify_type_word(scope, tok.text);
                    match found {
                        TypeWord::Qualifier => {
                            spelling.push(self.text(tok).to_string());
                        }
                        TypeWord::Modifier => {
                            spelling.push(self.text(tok).to_string());
                            have_type_word = true;
                        }
                        TypeWord::Base(id) => {
                            if have_type_word && base.is_some() {
                                // A second type name is the declarator.
                                self.push_back(tok);
                                break;
                            }
                            base = Some(id);
                            have_type_word = true;
                            spelling.push(self.text(tok).to_string());
                        }
                        TypeWord::TParam => {
                            if have_type_word {
                                self.push_back(tok);
                                break;
                            }
                            have_type_word = true;
                            spelling.push(self.text(tok).to_string());
                        }
                        TypeWord::Unknown => {
                            if have_type_word {
                                self.push_back(tok);
                                break;
                            }
                            let name = self.text(tok).to_string();
                            self.error(
                                tok.pos,
                                format!("`{}` does not name a type", name),
                            );
                            self.skip_statement();
                            return None;
                        }
                    }
                }
                TokenKind::Scope => {
                    // Qualified name: resolve the next identifier inside
                    // the current base.
                    let member = self.next();
                    if member.kind != TokenKind::Identifier {
                        self.error(member.pos, "expected identifier after `::`");
                        self.push_back(member);
                        break;
                    }
                    let resolved = base
                        .and_then(|b| self.store.lookup_local(b, member.text));
                    match resolved {
                        Some(id) => {
                            base = Some(id);
                            let last = spelling.pop().unwrap_or_default();
                            spelling.push(format!("{}::{}", last, self.text(member)));
                        }
                        None => {
                            let name = self.text(member).to_string();
                            self.error(
                                member.pos,
                                format!("`{}` is not a member of the preceding scope", name),
                            );
                            self.skip_statement();
                            return None;
                        }
                    }
                }
                TokenKind::Less if have_type_word => {
                    // Template arguments on the base; recorded as
                    // spelling only.
                    let args = self.skip_template_args();
                    let last = spelling.pop().unwrap_or_default();
                    spelling.push(format!("{}<{}>", last, args));
                }
                TokenKind::KwStruct
                | TokenKind::KwClass
                | TokenKind::KwUnion
                | TokenKind::KwEnum => {
                    // Elaborated specifier inside a declaration.
                    let name = self.next();
                    if name.kind != TokenKind::Identifier {
                        self.error(name.pos, "expected name after elaborated type keyword");
                        self.push_back(name);
                        break;
                    }
                    let id = match self.store.lookup(scope, name.text) {
                        Some(id) => id,
                        None => {
                            let f = match tok.kind {
                                TokenKind::KwClass => flags::CLASS,
                                TokenKind::KwUnion => flags::UNION,
                                TokenKind::KwEnum => flags::ENUM,
                                _ => flags::STRUCT,
                            };
                            self.store
                                .declare(
                                    scope,
                                    Definition::new(
                                        name.text,
                                        f | flags::TYPENAME | flags::SCOPE | flags::INCOMPLETE,
                                    ),
                                )
                                .id
                        }
                    };
                    base = Some(id);
                    have_type_word = true;
                    spelling.push(self.text(name).to_string());
                }
                TokenKind::KwTypename => {
                    // `typename T::type` is dependent; take the next words
                    // as an opaque type spelling.
                    let name = self.next();
                    if name.kind == TokenKind::Identifier {
                        have_type_word = true;
                        spelling.push(self.text(name).to_string());
                    } else {
                        self.push_back(name);
                    }
                }
                _ => {
                    self.push_back(tok);
                    break;
                }
            }
            tok = self.next();
        }
        if !have_type_word {
            let pos = tok.pos;
            self.error(pos, "expected type specifier");
            self.skip_statement();
            return None;
        }
        Some(ParsedType {
            base,
            spelling: spelling.join(" "),
        })
    }

    fn classify_type_word(&self, scope: DefId, name: Symbol) -> TypeWord {
        for frame in self.tparam_stack.iter().rev() {
            if let Some(param) = frame.iter().find(|p| p.name == name) {
                return if param.is_type {
                    TypeWord::TParam
                } else {
                    TypeWord::Unknown
                };
            }
        }
        match self.store.lookup(scope, name) {
            Some(id) => {
                let def = self.store.get(id);
                if def.has(flags::QUALIFIER) {
                    TypeWord::Qualifier
                } else if def.has(flags::MODIFIER) {
                    TypeWord::Modifier
                } else if def.is_type() || def.has(flags::NAMESPACE) {
                    // Namespaces are admitted so qualified names like
                    // `lib::Str` can start a type.
                    TypeWord::Base(id)
                } else {
                    TypeWord::Unknown
                }
            }
            None => TypeWord::Unknown,
        }
    }

    /// Consumes balanced `<...>` template arguments (the `<` is already
    /// eaten) and returns their spelling.
    fn skip_template_args(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = 1i32;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => break,
                TokenKind::Less => {
                    depth += 1;
                    parts.push("<".into());
                }
                TokenKind::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    parts.push(">".into());
                }
                TokenKind::Shr => {
                    depth -= 2;
                    if depth <= 0 {
                        break;
                    }
                    parts.push(">>".into());
                }
                _ => parts.push(self.text(tok).to_string()),
            }
        }
        parts.join(" ")
    }

    /// Parses one or more declarators of `ty` and records them.
    fn parse_declarator_list(
        &mut self,
        scope: DefId,
        ty: ParsedType,
        mode: DeclMode,
        is_extern: bool,
        template_params: Vec<Symbol>,
    ) {
        loop {
            let mut ptr_depth: u8 = 0;
            let mut is_reference = false;
            let mut tok = self.next();
            while matches!(tok.kind, TokenKind::Star | TokenKind::Amp) {
                if tok.kind == TokenKind::Star {
                    ptr_depth += 1;
                } else {
                    is_reference = true;
                }
                tok = self.next();
            }
            match tok.kind {
                TokenKind::Identifier => {}
                TokenKind::Semicolon => return,
                TokenKind::LParen if ty.base == Some(scope) => {
                    // Constructor shape: the class name immediately
                    // followed by a parameter list.
                    let _ = self.parse_param_list(scope);
                    self.finish_function_trailer();
                    return;
                }
                _ => {
                    self.error(tok.pos, "expected declarator name");
                    self.push_back(tok);
                    self.skip_statement();
                    return;
                }
            }
            let name = tok.text;

            let mut full_spelling = ty.spelling.clone();
            for _ in 0..ptr_depth {
                full_spelling.push_str(" *");
            }
            if is_reference {
                full_spelling.push_str(" &");
            }
            let spelling_sym = self.stream.interner().intern_owned(full_spelling);
            let type_ref = TypeRef {
                base: ty.base,
                spelling: spelling_sym,
                ptr_depth,
                is_reference,
            };

            let after = self.next();
            match after.kind {
                TokenKind::LParen if mode == DeclMode::Variable => {
                    let params = self.parse_param_list(scope);
                    let mut def = Definition::new(name, flags::FUNCTION | flags::TYPED);
                    def.ty = Some(type_ref);
                    def.param_types = params;
                    def.template_params = template_params.clone();
                    if !def.template_params.is_empty() {
                        def.flags |= flags::TEMPLATE;
                    }
                    if is_extern {
                        def.flags |= flags::EXTERN;
                    }
                    self.store.declare(scope, def);
                    if !self.finish_function_trailer() {
                        return;
                    }
                    continue;
                }
                _ => {
                    // Array declarators: record the pointer-like shape.
                    let mut after = after;
                    while after.kind == TokenKind::LBracket {
                        loop {
                            let t = self.next();
                            match t.kind {
                                TokenKind::RBracket | TokenKind::EndOfCode => break,
                                _ => {}
                            }
                        }
                        after = self.next();
                    }

                    let mut def = match mode {
                        DeclMode::Variable => {
                            let mut d = Definition::new(name, flags::TYPED);
                            if is_extern {
                                d.flags |= flags::EXTERN;
                            }
                            d
                        }
                        DeclMode::Typedef => {
                            Definition::new(name, flags::TYPENAME | flags::TYPED)
                        }
                    };
                    def.ty = Some(type_ref);
                    def.template_params = template_params.clone();
                    if !def.template_params.is_empty() {
                        def.flags |= flags::TEMPLATE;
                    }
                    self.store.declare(scope, def);

                    match after.kind {
                        TokenKind::Semicolon => return,
                        TokenKind::Comma => continue,
                        TokenKind::Assign => match self.skip_initializer() {
                            TokenKind::Comma => continue,
                            _ => return,
                        },
                        TokenKind::LBrace => {
                            // Brace initializer: `int x{4};`
                            self.skip_braced();
                            let t = self.next();
                            match t.kind {
                                TokenKind::Comma => continue,
                                TokenKind::Semicolon => return,
                                _ => {
                                    self.push_back(t);
                                    return;
                                }
                            }
                        }
                        TokenKind::Colon => {
                            // Bitfield width.
                            match self.skip_initializer() {
                                TokenKind::Comma => continue,
                                _ => return,
                            }
                        }
                        TokenKind::EndOfCode => return,
                        _ => {
                            self.error(after.pos, "expected `;` after declaration");
                            self.push_back(after);
                            self.skip_statement();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Collects a function's parameter list through the closing `)`,
    /// returning each parameter's spelled-out type.
    fn parse_param_list(&mut self, _scope: DefId) -> Vec<Symbol> {
        let mut params: Vec<Symbol> = Vec::new();
        let mut entry: Vec<String> = Vec::new();
        let mut depth = 1usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    entry.push(self.text(tok).to_string());
                }
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    entry.push(")".into());
                }
                TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1).max(1);
                    entry.push(self.text(tok).to_string());
                }
                TokenKind::Comma if depth == 1 => {
                    if !entry.is_empty() {
                        let text = entry.join(" ");
                        params.push(self.stream.interner().intern_owned(text));
                        entry.clear();
                    }
                }
                _ => entry.push(self.text(tok).to_string()),
            }
        }
        if !entry.is_empty() {
            let text = entry.join(" ");
            params.push(self.stream.interner().intern_owned(text));
        }
        params
    }

    /// After a function's `)`: consumes cv-qualifiers and noexcept,
    /// then a body, `= 0;`/`= default;`, or `;`. Returns true when the
    /// declaration continued with a comma.
    fn finish_function_trailer(&mut self) -> bool {
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::Semicolon | TokenKind::EndOfCode => return false,
                TokenKind::Comma => return true,
                TokenKind::LBrace => {
                    self.skip_braced();
                    return false;
                }
                TokenKind::Assign => {
                    let _ = self.skip_initializer();
                    return false;
                }
                // `const`, `noexcept`, `override`, trailing attributes...
                TokenKind::Identifier | TokenKind::KwNoexcept | TokenKind::KwConstexpr => {}
                TokenKind::Colon => {
                    // Constructor initializer list runs to the body.
                    loop {
                        let t = self.next();
                        match t.kind {
                            TokenKind::LBrace => {
                                self.skip_braced();
                                return false;
                            }
                            TokenKind::Semicolon | TokenKind::EndOfCode => return false,
                            _ => {}
                        }
                    }
                }
                _ => {
                    self.error(tok.pos, "unexpected token after function declarator");
                    self.push_back(tok);
                    self.skip_statement();
                    return false;
                }
            }
        }
    }

    /// Consumes an initializer (the `=`, `{`, or `:` is already eaten) up
    /// to the next `,` or `;` at depth zero. Returns the terminator kind.
    fn skip_initializer(&mut self) -> TokenKind {
        let mut depth = 0usize;
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::EndOfCode => return TokenKind::EndOfCode,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        self.push_back(tok);
                        return TokenKind::RBrace;
                    }
                    depth -= 1;
                }
                TokenKind::Comma if depth == 0 => return TokenKind::Comma,
                TokenKind::Semicolon if depth == 0 => return TokenKind::Semicolon,
                _ => {}
            }
        }
    }
}

enum TypeWord {
    Qualifier,
    Modifier,
    Base(DefId),
    /// A type parameter of an active template header.
    TParam,
    Unknown,
}
