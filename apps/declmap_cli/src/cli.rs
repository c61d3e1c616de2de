//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;

/// Extract a table of declarations from C++ sources without compiling
/// them.
#[derive(Parser, Debug)]
#[command(name = "declmap", version, about)]
pub struct Args {
    /// C++ source or header files to parse, in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Add a directory to the #include search path (repeatable).
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Predefine a macro, NAME or NAME=VALUE (repeatable).
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,

    /// Print the extracted scope tree after parsing.
    #[arg(long)]
    pub dump_definitions: bool,

    /// Print the macro table after parsing.
    #[arg(long)]
    pub dump_macros: bool,

    /// Emit dumps as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Use exact IEEE comparison for floats in #if instead of the legacy
    /// 2^-10 tolerance.
    #[arg(long)]
    pub exact_float_compare: bool,
}
