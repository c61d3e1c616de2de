//! # declmap-base
//!
//! Structural atoms shared by every declmap crate:
//!
//! - [`Interner`]/[`Symbol`]: string interning for O(1) equality
//! - [`SourcePos`]: file/line/column triples for diagnostics
//! - [`Diagnostic`]/[`DiagnosticSink`]/[`Reporter`]: the error channel
//!
//! This crate knows nothing about C++, tokens, or I/O beyond writing
//! diagnostics to a sink. Higher layers build on these types only.

pub mod diag;
pub mod intern;
pub mod pos;

pub use diag::{CollectingSink, Diagnostic, DiagnosticSink, Reporter, Severity, StderrSink};
pub use intern::{Interner, Symbol};
pub use pos::SourcePos;
