//! Constant evaluation.
//!
//! A recursive walk over [`Expr`] producing a [`Value`]: signed integer,
//! double, string, or none. The none value is the uniform answer for
//! anything outside constant territory (unresolved identifiers, calls,
//! division by zero), and `#if` treats it as false.
//!
//! Floating-point equality uses an absolute tolerance of 2⁻¹⁰ unless
//! [`EvalOptions::exact_float_eq`] is set. The tolerance predates this
//! implementation and is kept for output parity; the option is the
//! escape hatch.

use declmap_base::{Interner, Reporter};
use declmap_lex::{IfEvaluator, Token, TokenKind};

use crate::build::{parse_expression, SliceSource};
use crate::expr::Expr;

/// The legacy float-comparison tolerance: 1/1024.
pub const FLOAT_EQ_TOLERANCE: f64 = 1.0 / 1024.0;

/// Result of constant evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Evaluation failure or a non-constant expression.
    None,
    Int(i64),
    Double(f64),
    Str(String),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// Evaluation knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// Compare doubles exactly instead of within [`FLOAT_EQ_TOLERANCE`].
    pub exact_float_eq: bool,
}

/// The `#if` truth rule: none and strings are false, numbers follow C.
pub fn truth(value: &Value, opts: &EvalOptions) -> bool {
    match value {
        Value::None | Value::Str(_) => false,
        Value::Int(i) => *i != 0,
        Value::Double(d) => {
            if opts.exact_float_eq {
                *d != 0.0
            } else {
                d.abs() > FLOAT_EQ_TOLERANCE
            }
        }
    }
}

fn float_eq(a: f64, b: f64, opts: &EvalOptions) -> bool {
    if opts.exact_float_eq {
        a == b
    } else {
        (a - b).abs() < FLOAT_EQ_TOLERANCE
    }
}

/// Evaluates `expr` to a value.
pub fn eval(expr: &Expr, interner: &Interner, opts: &EvalOptions) -> Value {
    match expr {
        Expr::Literal(tok) => eval_literal(*tok, interner),
        Expr::Ident(_) => Value::None,
        Expr::Group(inner) => eval(inner, interner, opts),
        Expr::Unary {
            op,
            operand,
            postfix,
        } => {
            let v = eval(operand, interner, opts);
            eval_unary(op.kind, v, *postfix)
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, interner, opts);
            let r = eval(rhs, interner, opts);
            eval_binary(op.kind, l, r, opts)
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            let c = eval(cond, interner, opts);
            // The condition is evaluated numerically; a string condition
            // is the none value, same as in `logic()`.
            if c.is_none() || matches!(c, Value::Str(_)) {
                return Value::None;
            }
            let branch = if truth(&c, opts) {
                then_branch
            } else {
                else_branch
            };
            match branch {
                Some(e) => eval(e, interner, opts),
                None => Value::None,
            }
        }
        Expr::Call { .. } => Value::None,
        Expr::Subscript { base, index } => {
            let b = eval(base, interner, opts);
            let i = eval(index, interner, opts);
            match (b, i) {
                (Value::Str(s), Value::Int(i)) if i >= 0 => s
                    .as_bytes()
                    .get(i as usize)
                    .map(|b| Value::Int(*b as i64))
                    .unwrap_or(Value::None),
                _ => Value::None,
            }
        }
        // Without type resolution a named cast passes its operand through.
        Expr::Cast { operand, .. } => eval(operand, interner, opts),
    }
}

fn eval_literal(tok: Token, interner: &Interner) -> Value {
    let text = interner.resolve(tok.text);
    match tok.kind {
        TokenKind::DecLiteral => eval_decimal(text),
        TokenKind::HexLiteral => eval_radix(&text[2..], 16),
        TokenKind::BinLiteral => eval_radix(&text[2..], 2),
        TokenKind::OctLiteral => {
            let digits = text.trim_start_matches(|c: char| c == '0');
            if strip_int_suffix(digits).is_empty() {
                Value::Int(0)
            } else {
                eval_radix(digits, 8)
            }
        }
        TokenKind::CharLiteral => {
            let content = unquote(text);
            let unescaped = unescape(&content);
            match unescaped.bytes().next() {
                Some(b) => Value::Int(b as i64),
                None => Value::None,
            }
        }
        TokenKind::StringLiteral => Value::Str(unescape(&unquote(text))),
        _ => Value::None,
    }
}

/// Strips an integer suffix (`u`, `l`, combinations) off a literal. The
/// suffix never affects the evaluated width: `#if` arithmetic is done in
/// the widest signed integer available.
fn strip_int_suffix(text: &str) -> &str {
    text.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
}

fn eval_radix(text: &str, radix: u32) -> Value {
    let digits = strip_int_suffix(text);
    match u64::from_str_radix(digits, radix) {
        Ok(v) => Value::Int(v as i64),
        Err(_) => Value::None,
    }
}

fn eval_decimal(text: &str) -> Value {
    let stripped = text.trim_end_matches(|c: char| matches!(c, 'f' | 'F'));
    let is_float =
        stripped.len() != text.len() || stripped.contains('.') || stripped.contains(['e', 'E']);
    if is_float {
        return match stripped.parse::<f64>() {
            Ok(d) => Value::Double(d),
            Err(_) => Value::None,
        };
    }
    let digits = strip_int_suffix(text);
    match digits.parse::<i64>() {
        Ok(v) => Value::Int(v),
        Err(_) => Value::None,
    }
}

/// Removes a literal's quotes and any encoding prefix (`L'x'`, `u8"y"`).
fn unquote(text: &str) -> String {
    let Some(open) = text.find(['"', '\'']) else {
        return text.to_string();
    };
    let inner = &text[open + 1..];
    let inner = inner.strip_suffix(['"', '\'']).unwrap_or(inner);
    inner.to_string()
}

/// Resolves backslash escapes to the bytes they denote.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('x') => {
                let mut code = 0u32;
                let mut any = false;
                while let Some(d) = chars.clone().next().and_then(|c| c.to_digit(16)) {
                    chars.next();
                    code = code * 16 + d;
                    any = true;
                }
                if any {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                    }
                } else {
                    out.push('x');
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn as_double(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Double(d) => Some(*d),
        _ => None,
    }
}

fn eval_unary(op: TokenKind, v: Value, postfix: bool) -> Value {
    if postfix {
        // Postfix ++/-- yields the operand's value; there is no store to
        // mutate here.
        return match v {
            Value::Int(_) | Value::Double(_) => v,
            _ => Value::None,
        };
    }
    match (op, v) {
        (TokenKind::Plus, v @ (Value::Int(_) | Value::Double(_))) => v,
        (TokenKind::Minus, Value::Int(i)) => Value::Int(i.wrapping_neg()),
        (TokenKind::Minus, Value::Double(d)) => Value::Double(-d),
        (TokenKind::Not, Value::Int(i)) => Value::Int((i == 0) as i64),
        (TokenKind::Not, Value::Double(d)) => Value::Int((d == 0.0) as i64),
        (TokenKind::Tilde, Value::Int(i)) => Value::Int(!i),
        (TokenKind::PlusPlus, Value::Int(i)) => Value::Int(i + 1),
        (TokenKind::PlusPlus, Value::Double(d)) => Value::Double(d + 1.0),
        (TokenKind::MinusMinus, Value::Int(i)) => Value::Int(i - 1),
        (TokenKind::MinusMinus, Value::Double(d)) => Value::Double(d - 1.0),
        // Dereferencing a string yields its first character.
        (TokenKind::Star, Value::Str(s)) => s
            .bytes()
            .next()
            .map(|b| Value::Int(b as i64))
            .unwrap_or(Value::None),
        _ => Value::None,
    }
}

fn eval_binary(op: TokenKind, l: Value, r: Value, opts: &EvalOptions) -> Value {
    use TokenKind::*;
    match op {
        // Compound assignments evaluate as their base operator; plain
        // assignment yields the right-hand side. Nothing is stored.
        Assign => r,
        PlusAssign => eval_binary(Plus, l, r, opts),
        MinusAssign => eval_binary(Minus, l, r, opts),
        StarAssign => eval_binary(Star, l, r, opts),
        SlashAssign => eval_binary(Slash, l, r, opts),
        PercentAssign => eval_binary(Percent, l, r, opts),
        ShlAssign => eval_binary(Shl, l, r, opts),
        ShrAssign => eval_binary(Shr, l, r, opts),
        AmpAssign => eval_binary(Amp, l, r, opts),
        PipeAssign => eval_binary(Pipe, l, r, opts),
        CaretAssign => eval_binary(Caret, l, r, opts),
        Comma => r,
        Plus => match (l, r) {
            (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
            (a, b) => match (as_double(&a), as_double(&b)) {
                (Some(x), Some(y)) => Value::Double(x + y),
                _ => Value::None,
            },
        },
        Minus => arith(l, r, |a, b| a.wrapping_sub(b), |a, b| a - b),
        Star => arith(l, r, |a, b| a.wrapping_mul(b), |a, b| a * b),
        Slash => match (l, r) {
            (_, Value::Int(0)) => Value::None,
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_div(b)),
            (a, b) => match (as_double(&a), as_double(&b)) {
                (Some(_), Some(y)) if y == 0.0 => Value::None,
                (Some(x), Some(y)) => Value::Double(x / y),
                _ => Value::None,
            },
        },
        Percent => match (l, r) {
            (_, Value::Int(0)) => Value::None,
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_rem(b)),
            (a, b) => match (as_double(&a), as_double(&b)) {
                (Some(_), Some(y)) if y == 0.0 => Value::None,
                (Some(x), Some(y)) => Value::Double(x % y),
                _ => Value::None,
            },
        },
        Shl => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_shl(b as u32)),
            // Legacy behavior: a floating shift scales by powers of two.
            (a, b) => match (as_double(&a), as_double(&b)) {
                (Some(x), Some(y)) => Value::Double(x * 2f64.powf(y)),
                _ => Value::None,
            },
        },
        Shr => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_shr(b as u32)),
            (a, b) => match (as_double(&a), as_double(&b)) {
                (Some(x), Some(y)) => Value::Double(x / 2f64.powf(y)),
                _ => Value::None,
            },
        },
        Amp => int_only(l, r, |a, b| a & b),
        Pipe => int_only(l, r, |a, b| a | b),
        Caret => int_only(l, r, |a, b| a ^ b),
        AmpAmp => logic(l, r, opts, |a, b| a && b),
        PipePipe => logic(l, r, opts, |a, b| a || b),
        Equal => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => Value::Int((a == b) as i64),
            _ => match (as_double(&l), as_double(&r)) {
                (Some(x), Some(y)) => Value::Int(float_eq(x, y, opts) as i64),
                _ => Value::None,
            },
        },
        NotEqual => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => Value::Int((a != b) as i64),
            _ => match (as_double(&l), as_double(&r)) {
                (Some(x), Some(y)) => Value::Int(!float_eq(x, y, opts) as i64),
                _ => Value::None,
            },
        },
        Less => compare(l, r, |o| o == std::cmp::Ordering::Less),
        Greater => compare(l, r, |o| o == std::cmp::Ordering::Greater),
        LessEqual => compare(l, r, |o| o != std::cmp::Ordering::Greater),
        GreaterEqual => compare(l, r, |o| o != std::cmp::Ordering::Less),
        _ => Value::None,
    }
}

fn arith(l: Value, r: Value, ints: fn(i64, i64) -> i64, floats: fn(f64, f64) -> f64) -> Value {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Value::Int(ints(a, b)),
        (a, b) => match (as_double(&a), as_double(&b)) {
            (Some(x), Some(y)) => Value::Double(floats(x, y)),
            _ => Value::None,
        },
    }
}

fn int_only(l: Value, r: Value, f: fn(i64, i64) -> i64) -> Value {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Value::Int(f(a, b)),
        _ => Value::None,
    }
}

fn logic(l: Value, r: Value, opts: &EvalOptions, f: fn(bool, bool) -> bool) -> Value {
    if l.is_none() || r.is_none() {
        return Value::None;
    }
    match (matches!(l, Value::Str(_)), matches!(r, Value::Str(_))) {
        (false, false) => Value::Int(f(truth(&l, opts), truth(&r, opts)) as i64),
        _ => Value::None,
    }
}

fn compare(l: Value, r: Value, f: fn(std::cmp::Ordering) -> bool) -> Value {
    match (as_double(&l), as_double(&r)) {
        (Some(x), Some(y)) => match x.partial_cmp(&y) {
            Some(ord) => Value::Int(f(ord) as i64),
            None => Value::None,
        },
        _ => Value::None,
    }
}

/// The `#if` condition evaluator the token stream calls back into.
pub struct DirectiveEvaluator {
    pub options: EvalOptions,
}

impl DirectiveEvaluator {
    pub fn new(options: EvalOptions) -> DirectiveEvaluator {
        DirectiveEvaluator { options }
    }
}

impl Default for DirectiveEvaluator {
    fn default() -> Self {
        DirectiveEvaluator::new(EvalOptions::default())
    }
}

impl IfEvaluator for DirectiveEvaluator {
    fn eval_condition(
        &mut self,
        tokens: &[Token],
        interner: &mut Interner,
        rep: &mut Reporter,
    ) -> bool {
        if tokens.is_empty() {
            rep.error(String::new(), 0, 0, "expected expression in #if directive");
            return false;
        }
        let mut src = SliceSource::new(tokens);
        let (expr, _rest) = parse_expression(&mut src);
        match expr {
            Some(expr) => truth(&eval(&expr, interner, &self.options), &self.options),
            None => {
                let pos = tokens[0].pos;
                rep.error(
                    interner.resolve(pos.file).to_string(),
                    pos.line,
                    pos.col,
                    "could not parse #if condition",
                );
                false
            }
        }
    }
}
