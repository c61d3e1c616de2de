//! # declmap-ast
//!
//! The expression engine: a precedence-climbing builder that folds
//! preprocessed tokens into an owned [`Expr`] tree, and a constant
//! evaluator producing a typed [`Value`].
//!
//! Two callers share it:
//!
//! - the directive processor, through [`DirectiveEvaluator`], to decide
//!   `#if`/`#elif` conditions on a line-bounded token list;
//! - the declaration parser, to evaluate template non-type arguments and
//!   enumerator initializers, stopping at whatever token its context
//!   treats as a terminator.

pub mod build;
pub mod eval;
pub mod expr;
pub mod op;

pub use build::{parse_expression, SliceSource, TokenSource};
pub use eval::{
    eval, truth, DirectiveEvaluator, EvalOptions, Value, FLOAT_EQ_TOLERANCE,
};
pub use expr::Expr;
pub use op::{op_info, OpInfo};
