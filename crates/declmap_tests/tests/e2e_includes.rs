//! Include resolution over real directory trees.

use std::fs;

use declmap_parse::Session;
use tempfile::TempDir;

fn write(dir: &TempDir, rel: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn quiet_session() -> Session {
    let mut s = Session::new();
    s.set_sink(Box::new(declmap_base::CollectingSink::default()));
    s
}

#[test]
fn quoted_include_resolves_next_to_including_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "types.h", "typedef int my_int;\n");
    let main = write(&dir, "main.cpp", "#include \"types.h\"\nmy_int value;\n");

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 0);
    assert!(session.lookup("value").is_some());
    assert!(session.lookup("my_int").is_some());
}

#[test]
fn angle_include_uses_search_path_only() {
    let dir = TempDir::new().unwrap();
    let incdir = dir.path().join("include");
    fs::create_dir_all(&incdir).unwrap();
    fs::write(incdir.join("lib.h"), "int from_lib;\n").unwrap();
    let main = write(&dir, "main.cpp", "#include <lib.h>\nint here;\n");

    // Without the search directory the include fails.
    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 1);
    assert!(session.lookup("from_lib").is_none());

    let mut session = quiet_session();
    session.add_search_directory(&incdir);
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 0);
    assert!(session.lookup("from_lib").is_some());
    assert!(session.lookup("here").is_some());
}

#[test]
fn nested_includes_restore_outer_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "inner.h", "int inner_sym;\n");
    write(&dir, "outer.h", "#include \"inner.h\"\nint outer_sym;\n");
    let main = write(&dir, "main.cpp", "#include \"outer.h\"\nint main_sym;\n");

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 0);
    for sym in ["inner_sym", "outer_sym", "main_sym"] {
        assert!(session.lookup(sym).is_some(), "missing {sym}");
    }
    let visited: Vec<&str> = session.visited_files().collect();
    assert!(visited.iter().any(|f| f.ends_with("inner.h")));
    assert!(visited.iter().any(|f| f.ends_with("outer.h")));
}

#[test]
fn include_guards_block_second_inclusion() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "guarded.h",
        "#ifndef GUARDED_H\n#define GUARDED_H\nint once_only;\n#endif\n",
    );
    let main = write(
        &dir,
        "main.cpp",
        "#include \"guarded.h\"\n#include \"guarded.h\"\nint after;\n",
    );

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    // A second definition of once_only would not error (the store keeps
    // the first), so check via the diagnostic-free parse and the count of
    // members instead.
    assert_eq!(session.error_count(), 0);
    assert!(session.lookup("once_only").is_some());
}

#[test]
fn include_next_skips_the_current_directory() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(
        first.join("layer.h"),
        "int first_layer;\n#include_next <layer.h>\n",
    )
    .unwrap();
    fs::write(second.join("layer.h"), "int second_layer;\n").unwrap();
    let main = write(&dir, "main.cpp", "#include <layer.h>\n");

    let mut session = quiet_session();
    session.add_search_directory(&first);
    session.add_search_directory(&second);
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 0);
    assert!(session.lookup("first_layer").is_some());
    assert!(session.lookup("second_layer").is_some());
}

#[test]
fn missing_include_reports_and_continues() {
    let dir = TempDir::new().unwrap();
    let main = write(
        &dir,
        "main.cpp",
        "#include \"no_such_file.h\"\nint survivor;\n",
    );

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 1);
    assert!(session.lookup("survivor").is_some());
}

#[test]
fn macro_expanded_include_name() {
    let dir = TempDir::new().unwrap();
    write(&dir, "real.h", "int through_macro;\n");
    let main = write(
        &dir,
        "main.cpp",
        "#define HEADER \"real.h\"\n#include HEADER\n",
    );

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 0);
    assert!(session.lookup("through_macro").is_some());
}

#[test]
fn conditional_stack_is_confined_to_each_file() {
    let dir = TempDir::new().unwrap();
    // The header leaves a conditional open: that is the header's error,
    // reported at its end, and must not leak into the includer.
    write(&dir, "broken.h", "#if 1\nint partial;\n");
    let main = write(
        &dir,
        "main.cpp",
        "#include \"broken.h\"\n#ifdef NEVER\nint unseen;\n#endif\nint tail;\n",
    );

    let mut session = quiet_session();
    session.parse_file(&main).unwrap();
    assert_eq!(session.error_count(), 1);
    assert!(session.lookup("partial").is_some());
    assert!(session.lookup("unseen").is_none());
    assert!(session.lookup("tail").is_some());
}
