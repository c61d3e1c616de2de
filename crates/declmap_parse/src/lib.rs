//! # declmap-parse
//!
//! The top of the declmap pipeline: a [`DeclParser`] that reads the
//! preprocessed token stream and records declaration shapes into the
//! definition store, and the [`Session`] type that owns a whole parsing
//! context (builtins, macros, include path, diagnostics) and exposes
//! the public API.
//!
//! ```
//! use declmap_parse::Session;
//!
//! let mut session = Session::new();
//! session.add_macro("VERSION", "3");
//! session.parse_string("lib.h", "#if VERSION >= 2\nint modern;\n#endif\n");
//! assert!(session.lookup("modern").is_some());
//! ```

pub mod parser;
pub mod session;

pub use parser::DeclParser;
pub use session::Session;
