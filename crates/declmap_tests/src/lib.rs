//! Integration tests for the declmap workspace.
//!
//! The crate body is empty; everything lives under `tests/`, wired
//! against the public APIs of the other crates the way an embedding tool
//! would use them.
