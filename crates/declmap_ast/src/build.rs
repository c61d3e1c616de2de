//! The precedence-climbing expression builder.
//!
//! Reads tokens from a [`TokenSource`] and folds them into an [`Expr`]:
//! start with a prefix operator or primary, then, while the next token is
//! an operator binding at least as tightly as the current minimum,
//! consume it and recurse on the right with that operator's power plus
//! one (left-to-right) or plus zero (right-to-left).
//!
//! An unexpected token ends the climb: the builder returns whatever tree
//! it has, along with the first unconsumed token, and lets the caller
//! decide whether that is an error. This is what lets the same builder
//! serve `#if` lines (stop at end of line) and template arguments (stop
//! at `>` or `,`).

use declmap_base::SourcePos;
use declmap_lex::{Token, TokenKind};

use crate::expr::Expr;
use crate::op::{self, COMMA_PREC, POSTFIX_PREC, PREFIX_PREC};

/// Anything that can feed tokens to the builder. Sources signal
/// exhaustion with an `EndOfCode` token rather than an option so partial
/// trees keep a position to point at.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
}

/// A source over a token slice, used for collected `#if` lines.
pub struct SliceSource<'a> {
    tokens: &'a [Token],
    cursor: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(tokens: &'a [Token]) -> SliceSource<'a> {
        SliceSource { tokens, cursor: 0 }
    }
}

impl TokenSource for SliceSource<'_> {
    fn next_token(&mut self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(tok) => {
                self.cursor += 1;
                *tok
            }
            None => {
                let pos = self
                    .tokens
                    .last()
                    .map(|t| t.pos)
                    .unwrap_or_else(SourcePos::default);
                Token::marker(TokenKind::EndOfCode, pos)
            }
        }
    }
}

/// Builds one expression from `src`.
///
/// Returns the tree (or `None` when not even a primary was found) and the
/// first token the builder did not consume.
pub fn parse_expression<S: TokenSource>(src: &mut S) -> (Option<Expr>, Token) {
    let current = src.next_token();
    let mut builder = ExprBuilder { src, current };
    let expr = builder.parse_expr(0);
    (expr, builder.current)
}

struct ExprBuilder<'s, S: TokenSource> {
    src: &'s mut S,
    current: Token,
}

impl<S: TokenSource> ExprBuilder<'_, S> {
    fn bump(&mut self) -> Token {
        let tok = self.current;
        self.current = self.src.next_token();
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Option<Expr> {
        let mut lhs = self.parse_prefix()?;
        loop {
            let tok = self.current;
            match tok.kind {
                TokenKind::LParen if POSTFIX_PREC >= min_bp => {
                    self.bump();
                    let mut args = Vec::new();
                    if self.current.kind != TokenKind::RParen {
                        loop {
                            match self.parse_expr(COMMA_PREC + 1) {
                                Some(arg) => args.push(arg),
                                None => break,
                            }
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.eat(TokenKind::RParen);
                    lhs = Expr::Call {
                        callee: Box::new(lhs),
                        args,
                    };
                    continue;
                }
                TokenKind::LBracket if POSTFIX_PREC >= min_bp => {
                    self.bump();
                    let index = self.parse_expr(0);
                    self.eat(TokenKind::RBracket);
                    match index {
                        Some(index) => {
                            lhs = Expr::Subscript {
                                base: Box::new(lhs),
                                index: Box::new(index),
                            };
                            continue;
                        }
                        None => return Some(lhs),
                    }
                }
                _ => {}
            }

            let Some(info) = op::op_info(tok.kind) else {
                break;
            };

            if matches!(tok.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
                if POSTFIX_PREC < min_bp {
                    break;
                }
                self.bump();
                lhs = Expr::Unary {
                    op: tok,
                    operand: Box::new(lhs),
                    postfix: true,
                };
                continue;
            }

            if info.is(op::TERNARY) {
                if info.prec < min_bp {
                    break;
                }
                self.bump();
                // The middle expression runs to the colon with the outer
                // minimum; the right branch re-enters at the ternary's own
                // level (right-to-left).
                let then_branch = self.parse_expr(0);
                let else_branch = if self.eat(TokenKind::Colon) {
                    self.parse_expr(info.prec)
                } else {
                    None
                };
                lhs = Expr::Ternary {
                    op: tok,
                    cond: Box::new(lhs),
                    then_branch: then_branch.map(Box::new),
                    else_branch: else_branch.map(Box::new),
                };
                continue;
            }

            if !info.is(op::BINARY) || info.prec < min_bp {
                break;
            }
            self.bump();
            let next_min = if info.is(op::RIGHT_TO_LEFT) {
                info.prec
            } else {
                info.prec + 1
            };
            match self.parse_expr(next_min) {
                Some(rhs) => {
                    lhs = Expr::Binary {
                        op: tok,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                // Missing right-hand side: hand back the partial tree.
                None => break,
            }
        }
        Some(lhs)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let tok = self.current;
        match tok.kind {
            k if k.is_literal() => {
                self.bump();
                Some(Expr::Literal(tok))
            }
            TokenKind::Identifier => {
                self.bump();
                Some(Expr::Ident(tok))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr(0);
                self.eat(TokenKind::RParen);
                inner.map(|e| Expr::Group(Box::new(e)))
            }
            TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Not
            | TokenKind::Tilde
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::KwSizeof
            | TokenKind::KwNew
            | TokenKind::KwDelete => {
                self.bump();
                let operand = self.parse_expr(PREFIX_PREC)?;
                Some(Expr::Unary {
                    op: tok,
                    operand: Box::new(operand),
                    postfix: false,
                })
            }
            TokenKind::KwConstCast
            | TokenKind::KwStaticCast
            | TokenKind::KwDynamicCast
            | TokenKind::KwReinterpretCast => {
                self.bump();
                let mut ty = Vec::new();
                if self.eat(TokenKind::Less) {
                    let mut depth = 1usize;
                    loop {
                        match self.current.kind {
                            TokenKind::Less => depth += 1,
                            TokenKind::Greater => {
                                depth -= 1;
                                if depth == 0 {
                                    self.bump();
                                    break;
                                }
                            }
                            TokenKind::EndOfCode => break,
                            _ => {}
                        }
                        ty.push(self.bump());
                    }
                }
                let operand = if self.eat(TokenKind::LParen) {
                    let inner = self.parse_expr(0);
                    self.eat(TokenKind::RParen);
                    inner
                } else {
                    None
                };
                operand.map(|e| Expr::Cast {
                    keyword: tok,
                    ty,
                    operand: Box::new(e),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declmap_base::{CollectingSink, Interner, Reporter};
    use declmap_lex::{keyword_kind, read_raw_token, SourceReader};

    /// Scans and keyword-promotes, the way the stream façade hands tokens
    /// to consumers.
    fn tokens(src: &str, interner: &mut Interner) -> Vec<Token> {
        let mut rep = Reporter::new(Box::new(CollectingSink::default()));
        let mut r = SourceReader::from_string("<expr>", src, interner);
        let mut out = Vec::new();
        loop {
            let t = read_raw_token(&mut r, interner, &mut rep);
            match t.kind {
                TokenKind::EndOfCode => break,
                TokenKind::Newline => continue,
                TokenKind::Identifier => {
                    let promoted = match keyword_kind(interner.resolve(t.text)) {
                        Some(kind) => Token::new(kind, t.text, t.pos),
                        None => t,
                    };
                    out.push(promoted);
                }
                _ => out.push(t),
            }
        }
        out
    }

    fn parse(src: &str) -> (Option<Expr>, Interner) {
        let mut interner = Interner::new();
        let toks = tokens(src, &mut interner);
        let mut s = SliceSource::new(&toks);
        let (expr, _) = parse_expression(&mut s);
        (expr, interner)
    }

    /// Renders the tree in prefix form for shape assertions.
    fn shape(expr: &Expr, interner: &Interner) -> String {
        match expr {
            Expr::Literal(t) | Expr::Ident(t) => interner.resolve(t.text).to_string(),
            Expr::Unary {
                op,
                operand,
                postfix,
            } => {
                let o = interner.resolve(op.text);
                if *postfix {
                    format!("(post{} {})", o, shape(operand, interner))
                } else {
                    format!("({} {})", o, shape(operand, interner))
                }
            }
            Expr::Binary { op, lhs, rhs } => format!(
                "({} {} {})",
                interner.resolve(op.text),
                shape(lhs, interner),
                shape(rhs, interner)
            ),
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
                ..
            } => format!(
                "(? {} {} {})",
                shape(cond, interner),
                then_branch
                    .as_ref()
                    .map(|e| shape(e, interner))
                    .unwrap_or_else(|| "_".into()),
                else_branch
                    .as_ref()
                    .map(|e| shape(e, interner))
                    .unwrap_or_else(|| "_".into()),
            ),
            Expr::Group(inner) => format!("(group {})", shape(inner, interner)),
            Expr::Call { callee, args } => {
                let mut s = format!("(call {}", shape(callee, interner));
                for a in args {
                    s.push(' ');
                    s.push_str(&shape(a, interner));
                }
                s.push(')');
                s
            }
            Expr::Subscript { base, index } => format!(
                "(index {} {})",
                shape(base, interner),
                shape(index, interner)
            ),
            Expr::Cast { operand, .. } => format!("(cast {})", shape(operand, interner)),
        }
    }

    fn assert_shape(src: &str, expected: &str) {
        let (expr, interner) = parse(src);
        let expr = expr.expect("expression should parse");
        assert_eq!(shape(&expr, &interner), expected, "for {src:?}");
    }

    #[test]
    fn multiplication_before_addition() {
        assert_shape("1 + 2 * 3", "(+ 1 (* 2 3))");
        assert_shape("1 * 2 + 3", "(+ (* 1 2) 3)");
    }

    #[test]
    fn left_associativity() {
        assert_shape("1 - 2 - 3", "(- (- 1 2) 3)");
        assert_shape("1 / 2 / 3", "(/ (/ 1 2) 3)");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_shape("a = b = c", "(= a (= b c))");
    }

    #[test]
    fn parentheses_group() {
        assert_shape("(1 + 2) * 3", "(* (group (+ 1 2)) 3)");
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        assert_shape("-1 + 2", "(+ (- 1) 2)");
        assert_shape("!a && b", "(&& (! a) b)");
        assert_shape("- - 1", "(- (- 1))");
    }

    #[test]
    fn comparison_chain_shapes() {
        assert_shape("1 + 1 == 2", "(== (+ 1 1) 2)");
        assert_shape("1 << 2 < 3", "(< (<< 1 2) 3)");
    }

    #[test]
    fn ternary_shape() {
        assert_shape("a ? b : c", "(? a b c)");
        assert_shape("a ? b : c ? d : e", "(? a b (? c d e))");
        assert_shape("a == 1 ? b + 1 : c * 2", "(? (== a 1) (+ b 1) (* c 2))");
    }

    #[test]
    fn logical_operators_nest_correctly() {
        assert_shape("a && b || c && d", "(|| (&& a b) (&& c d))");
        assert_shape("a | b ^ c & d", "(| a (^ b (& c d)))");
    }

    #[test]
    fn comma_is_loosest() {
        assert_shape("a = 1, b", "(, (= a 1) b)");
    }

    #[test]
    fn postfix_forms() {
        assert_shape("f(1, 2)", "(call f 1 2)");
        assert_shape("a[1] + 2", "(+ (index a 1) 2)");
        assert_shape("a++", "(post++ a)");
        assert_shape("++a", "(++ a)");
    }

    #[test]
    fn sizeof_is_prefix() {
        assert_shape("sizeof x + 1", "(+ (sizeof x) 1)");
    }

    #[test]
    fn partial_tree_on_unexpected_token() {
        let mut interner = Interner::new();
        let toks = tokens("1 + 2 }", &mut interner);
        let mut s = SliceSource::new(&toks);
        let (expr, rest) = parse_expression(&mut s);
        assert_eq!(shape(&expr.unwrap(), &interner), "(+ 1 2)");
        assert_eq!(rest.kind, TokenKind::RBrace);
    }

    #[test]
    fn empty_input_gives_no_tree() {
        let mut interner = Interner::new();
        let toks = tokens("", &mut interner);
        let mut s = SliceSource::new(&toks);
        let (expr, rest) = parse_expression(&mut s);
        assert!(expr.is_none());
        assert_eq!(rest.kind, TokenKind::EndOfCode);
    }
}
