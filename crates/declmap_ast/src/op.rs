//! The operator symbol table.
//!
//! One process-wide table mapping token kinds to operator roles and
//! binding power, built lazily on first use and immutable afterwards.
//! Higher `prec` binds tighter; right-to-left operators recurse at their
//! own level instead of one above it.

use declmap_lex::TokenKind;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

pub const BINARY: u8 = 1 << 0;
pub const UNARY_PREFIX: u8 = 1 << 1;
pub const UNARY_POSTFIX: u8 = 1 << 2;
pub const TERNARY: u8 = 1 << 3;
pub const RIGHT_TO_LEFT: u8 = 1 << 4;

/// Binding power of every prefix operator.
pub const PREFIX_PREC: u8 = 15;
/// Binding power of the postfix forms: calls, subscripts, `.`/`->`,
/// postfix `++`/`--`.
pub const POSTFIX_PREC: u8 = 16;
/// Binding power of the comma operator; call arguments parse just above.
pub const COMMA_PREC: u8 = 1;

#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub flags: u8,
    pub prec: u8,
}

impl OpInfo {
    pub fn is(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

static OPERATORS: Lazy<FxHashMap<TokenKind, OpInfo>> = Lazy::new(|| {
    use TokenKind::*;
    let mut m = FxHashMap::default();
    let mut add = |kinds: &[TokenKind], flags: u8, prec: u8| {
        for &k in kinds {
            m.insert(k, OpInfo { flags, prec });
        }
    };

    add(&[Comma], BINARY, COMMA_PREC);
    add(
        &[
            Assign,
            PlusAssign,
            MinusAssign,
            StarAssign,
            SlashAssign,
            PercentAssign,
            ShlAssign,
            ShrAssign,
            AmpAssign,
            PipeAssign,
            CaretAssign,
        ],
        BINARY | RIGHT_TO_LEFT,
        2,
    );
    add(&[Question], TERNARY | RIGHT_TO_LEFT, 3);
    add(&[PipePipe], BINARY, 4);
    add(&[AmpAmp], BINARY, 5);
    add(&[Pipe], BINARY, 6);
    add(&[Caret], BINARY, 7);
    add(&[Amp], BINARY | UNARY_PREFIX, 8);
    add(&[Equal, NotEqual], BINARY, 9);
    add(&[Less, LessEqual, Greater, GreaterEqual], BINARY, 10);
    add(&[Shl, Shr], BINARY, 11);
    add(&[Plus, Minus], BINARY | UNARY_PREFIX, 12);
    add(&[Star], BINARY | UNARY_PREFIX, 13);
    add(&[Slash, Percent], BINARY, 13);
    add(&[DotStar, ArrowStar], BINARY, 14);
    add(&[Not, Tilde], UNARY_PREFIX, PREFIX_PREC);
    add(&[PlusPlus, MinusMinus], UNARY_PREFIX | UNARY_POSTFIX, POSTFIX_PREC);
    add(&[Dot, Arrow], BINARY, POSTFIX_PREC);
    m
});

/// Looks up the operator role of a token kind, if it has one.
pub fn op_info(kind: TokenKind) -> Option<OpInfo> {
    OPERATORS.get(&kind).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let mul = op_info(TokenKind::Star).unwrap();
        let plus = op_info(TokenKind::Plus).unwrap();
        assert!(mul.prec > plus.prec);
    }

    #[test]
    fn shift_sits_between_additive_and_relational() {
        let shl = op_info(TokenKind::Shl).unwrap();
        let plus = op_info(TokenKind::Plus).unwrap();
        let less = op_info(TokenKind::Less).unwrap();
        assert!(less.prec < shl.prec && shl.prec < plus.prec);
    }

    #[test]
    fn assignments_are_right_to_left() {
        for k in [
            TokenKind::Assign,
            TokenKind::PlusAssign,
            TokenKind::ShlAssign,
        ] {
            let info = op_info(k).unwrap();
            assert!(info.is(RIGHT_TO_LEFT), "{k:?}");
            assert!(info.is(BINARY));
        }
    }

    #[test]
    fn ternary_is_right_to_left() {
        let q = op_info(TokenKind::Question).unwrap();
        assert!(q.is(TERNARY) && q.is(RIGHT_TO_LEFT));
    }

    #[test]
    fn operators_within_a_level_share_precedence() {
        let eq = op_info(TokenKind::Equal).unwrap();
        let ne = op_info(TokenKind::NotEqual).unwrap();
        assert_eq!(eq.prec, ne.prec);
    }

    #[test]
    fn non_operators_are_absent() {
        assert!(op_info(TokenKind::Semicolon).is_none());
        assert!(op_info(TokenKind::Identifier).is_none());
        assert!(op_info(TokenKind::LBrace).is_none());
    }
}
