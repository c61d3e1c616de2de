//! # declmap-cli
//!
//! Thin command-line front-end over [`declmap_parse::Session`]: parse the
//! given files with the given include path and predefines, then dump
//! definitions or macros as text or JSON.
//!
//! Exit codes: 0 on success, 1 when any error was reported, 2 for usage
//! errors (argument parsing).

pub mod cli;

use std::io::Write;

use declmap_parse::Session;
use declmap_store::{DefId, DefStore, Definition};
use serde::Serialize;

use cli::Args;

/// One definition in the JSON dump, with its children inline.
#[derive(Serialize)]
struct JsonDef {
    name: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<JsonDef>,
}

#[derive(Serialize)]
struct JsonReport {
    files: Vec<String>,
    errors: usize,
    warnings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    macros: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    definitions: Vec<JsonDef>,
}

fn json_def(store: &DefStore, session: &Session, id: DefId) -> JsonDef {
    let def: &Definition = store.get(id);
    JsonDef {
        name: session.interner().resolve(def.name).to_string(),
        kind: def.kind_word(),
        ty: def
            .ty
            .as_ref()
            .map(|t| session.interner().resolve(t.spelling).to_string()),
        value: def.value,
        members: def
            .order
            .iter()
            .map(|&child| json_def(store, session, child))
            .collect(),
    }
}

/// Runs the tool; returns the process exit code.
pub fn run(args: Args) -> i32 {
    let mut session = Session::new();
    session.set_exact_float_compare(args.exact_float_compare);
    for dir in &args.include_dirs {
        session.add_search_directory(dir);
    }
    for define in &args.defines {
        match define.split_once('=') {
            Some((name, value)) => session.add_macro(name, value),
            None => session.add_macro(define, ""),
        }
    }

    for file in &args.files {
        if let Err(err) = session.parse_file(file) {
            eprintln!("declmap: cannot open {}: {}", file.display(), err);
            return 1;
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let store = session.store();
        let report = JsonReport {
            files: args
                .files
                .iter()
                .map(|f| f.display().to_string())
                .collect(),
            errors: session.error_count(),
            warnings: session.warning_count(),
            macros: if args.dump_macros {
                let mut buf = Vec::new();
                let _ = session.dump_macros(&mut buf);
                String::from_utf8_lossy(&buf)
                    .lines()
                    .map(str::to_string)
                    .collect()
            } else {
                Vec::new()
            },
            definitions: if args.dump_definitions {
                store
                    .get(store.global())
                    .order
                    .iter()
                    .map(|&id| json_def(store, &session, id))
                    .collect()
            } else {
                Vec::new()
            },
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                let _ = writeln!(out, "{}", text);
            }
            Err(err) => {
                eprintln!("declmap: could not serialize report: {}", err);
                return 1;
            }
        }
    } else {
        if args.dump_macros {
            if session.dump_macros(&mut out).is_err() {
                return 1;
            }
        }
        if args.dump_definitions {
            if session.dump_definitions(&mut out).is_err() {
                return 1;
            }
        }
    }

    if session.error_count() > 0 {
        1
    } else {
        0
    }
}
