//! Preprocessing tokens.
//!
//! A [`Token`] is the unit produced by the raw scanner: a kind, the
//! interned source text, and the position it came from. The kind space is
//! one flat enum covering identifiers, the literal families, every
//! punctuator, every keyword the declaration layer cares about, and the
//! soft markers (`Newline`, `EndOfCode`, `Invalid`).
//!
//! Keyword kinds are never produced by the raw scanner. An identifier is
//! promoted to its keyword kind at the moment the token stream hands it to
//! a consumer, so that macro expansion always sees plain identifiers.

use declmap_base::{Interner, SourcePos, Symbol};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Kind tag for a preprocessing token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,

    // Literals
    DecLiteral,
    HexLiteral,
    OctLiteral,
    BinLiteral,
    CharLiteral,
    StringLiteral,

    // Punctuators
    Semicolon,
    Comma,
    Dot,
    DotStar,
    Ellipsis,
    Arrow,
    ArrowStar,
    Plus,
    PlusPlus,
    PlusAssign,
    Minus,
    MinusMinus,
    MinusAssign,
    Star,
    StarAssign,
    Slash,
    SlashAssign,
    Percent,
    PercentAssign,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Shl,
    ShlAssign,
    Greater,
    GreaterEqual,
    Shr,
    ShrAssign,
    Amp,
    AmpAmp,
    AmpAssign,
    Pipe,
    PipePipe,
    PipeAssign,
    Caret,
    CaretAssign,
    Tilde,
    Not,
    Question,
    Colon,
    Scope,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Hash,
    HashHash,

    // Keywords, produced by promotion only
    KwAlignas,
    KwAlignof,
    KwAsm,
    KwAuto,
    KwClass,
    KwConstCast,
    KwConstexpr,
    KwDecltype,
    KwDelete,
    KwDynamicCast,
    KwEnum,
    KwExtern,
    KwFriend,
    KwNamespace,
    KwNew,
    KwNoexcept,
    KwOperator,
    KwPrivate,
    KwProtected,
    KwPublic,
    KwReinterpretCast,
    KwSizeof,
    KwStaticAssert,
    KwStaticCast,
    KwStruct,
    KwTemplate,
    KwTypedef,
    KwTypeid,
    KwTypename,
    KwUnion,
    KwUsing,

    // Soft markers
    Newline,
    EndOfCode,
    Invalid,
}

impl TokenKind {
    /// True for the integer-literal family (not char or string).
    pub fn is_integer_literal(self) -> bool {
        matches!(
            self,
            TokenKind::DecLiteral
                | TokenKind::HexLiteral
                | TokenKind::OctLiteral
                | TokenKind::BinLiteral
        )
    }

    pub fn is_literal(self) -> bool {
        self.is_integer_literal()
            || matches!(self, TokenKind::CharLiteral | TokenKind::StringLiteral)
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwAlignas
                | TokenKind::KwAlignof
                | TokenKind::KwAsm
                | TokenKind::KwAuto
                | TokenKind::KwClass
                | TokenKind::KwConstCast
                | TokenKind::KwConstexpr
                | TokenKind::KwDecltype
                | TokenKind::KwDelete
                | TokenKind::KwDynamicCast
                | TokenKind::KwEnum
                | TokenKind::KwExtern
                | TokenKind::KwFriend
                | TokenKind::KwNamespace
                | TokenKind::KwNew
                | TokenKind::KwNoexcept
                | TokenKind::KwOperator
                | TokenKind::KwPrivate
                | TokenKind::KwProtected
                | TokenKind::KwPublic
                | TokenKind::KwReinterpretCast
                | TokenKind::KwSizeof
                | TokenKind::KwStaticAssert
                | TokenKind::KwStaticCast
                | TokenKind::KwStruct
                | TokenKind::KwTemplate
                | TokenKind::KwTypedef
                | TokenKind::KwTypeid
                | TokenKind::KwTypename
                | TokenKind::KwUnion
                | TokenKind::KwUsing
        )
    }

    /// A short human name used in diagnostics, e.g. "`class` keyword" or
    /// "string literal".
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::DecLiteral => "decimal literal",
            TokenKind::HexLiteral => "hexadecimal literal",
            TokenKind::OctLiteral => "octal literal",
            TokenKind::BinLiteral => "binary literal",
            TokenKind::CharLiteral => "character literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Newline => "end of line",
            TokenKind::EndOfCode => "end of code",
            TokenKind::Invalid => "invalid token",
            TokenKind::Hash => "`#` operator",
            TokenKind::HashHash => "`##` operator",
            k if k.is_keyword() => "keyword",
            _ => "punctuator",
        }
    }
}

/// The map from keyword spellings to their token kinds.
///
/// Built on first use and immutable afterwards. `__asm`/`__asm__` alias
/// `asm`; the GNU spellings that expand like macros (`__attribute__`,
/// `__typeof__`, ...) are deliberately absent here; they are seeded as
/// builtin macros instead.
static KEYWORDS: Lazy<FxHashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("alignas", TokenKind::KwAlignas);
    m.insert("alignof", TokenKind::KwAlignof);
    m.insert("asm", TokenKind::KwAsm);
    m.insert("__asm", TokenKind::KwAsm);
    m.insert("__asm__", TokenKind::KwAsm);
    m.insert("auto", TokenKind::KwAuto);
    m.insert("class", TokenKind::KwClass);
    m.insert("const_cast", TokenKind::KwConstCast);
    m.insert("constexpr", TokenKind::KwConstexpr);
    m.insert("decltype", TokenKind::KwDecltype);
    m.insert("delete", TokenKind::KwDelete);
    m.insert("dynamic_cast", TokenKind::KwDynamicCast);
    m.insert("enum", TokenKind::KwEnum);
    m.insert("extern", TokenKind::KwExtern);
    m.insert("friend", TokenKind::KwFriend);
    m.insert("namespace", TokenKind::KwNamespace);
    m.insert("new", TokenKind::KwNew);
    m.insert("noexcept", TokenKind::KwNoexcept);
    m.insert("operator", TokenKind::KwOperator);
    m.insert("private", TokenKind::KwPrivate);
    m.insert("protected", TokenKind::KwProtected);
    m.insert("public", TokenKind::KwPublic);
    m.insert("reinterpret_cast", TokenKind::KwReinterpretCast);
    m.insert("sizeof", TokenKind::KwSizeof);
    m.insert("static_assert", TokenKind::KwStaticAssert);
    m.insert("static_cast", TokenKind::KwStaticCast);
    m.insert("struct", TokenKind::KwStruct);
    m.insert("template", TokenKind::KwTemplate);
    m.insert("typedef", TokenKind::KwTypedef);
    m.insert("typeid", TokenKind::KwTypeid);
    m.insert("typename", TokenKind::KwTypename);
    m.insert("union", TokenKind::KwUnion);
    m.insert("using", TokenKind::KwUsing);
    m
});

/// Returns the keyword kind for `text`, if it is a keyword spelling.
pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    KEYWORDS.get(text).copied()
}

/// One preprocessing token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Interned source text of the token. For `Newline`/`EndOfCode` this
    /// is the empty symbol.
    pub text: Symbol,
    pub pos: SourcePos,
}

impl Token {
    pub fn new(kind: TokenKind, text: Symbol, pos: SourcePos) -> Self {
        Token { kind, text, pos }
    }

    /// A marker token with no text.
    pub fn marker(kind: TokenKind, pos: SourcePos) -> Self {
        Token {
            kind,
            text: Symbol::EMPTY,
            pos,
        }
    }

    pub fn is(self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Resolves the token's text through `interner`.
    pub fn text_in<'i>(self, interner: &'i Interner) -> &'i str {
        interner.resolve(self.text)
    }
}
