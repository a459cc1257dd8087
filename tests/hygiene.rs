//! Hygiene — enforces coding standards at test time
//!
//! Scans the production sources under `src/` for antipatterns. Each pattern
//! has a budget of zero: the engine runs inside someone else's process, so it
//! must not panic and must not drop errors on the floor.

use std::fs;
use std::path::Path;

struct SourceFile {
    path: String,
    content: String,
}

/// Production `.rs` files under `src/`, excluding sibling `*_test.rs` files.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if !path_str.ends_with(".rs") || path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

/// Lines containing `pattern`, as `path:line` entries.
fn hits(files: &[SourceFile], pattern: &str) -> Vec<String> {
    files
        .iter()
        .flat_map(|file| {
            file.content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim_start().starts_with("//") && line.contains(pattern))
                .map(|(n, _)| format!("  {}:{}", file.path, n + 1))
        })
        .collect()
}

fn assert_absent(pattern: &str) {
    let found = hits(&source_files(), pattern);
    assert!(found.is_empty(), "{pattern} found in production code:\n{}", found.join("\n"));
}

#[test]
fn sources_are_found() {
    assert!(source_files().iter().any(|f| f.path.ends_with("lib.rs")));
}

#[test]
fn no_unwrap() {
    assert_absent(".unwrap()");
}

#[test]
fn no_expect() {
    assert_absent(".expect(");
}

#[test]
fn no_panicking_macros() {
    for pattern in ["panic!(", "unreachable!(", "todo!(", "unimplemented!("] {
        assert_absent(pattern);
    }
}

#[test]
fn no_silent_discard() {
    assert_absent("let _ =");
    assert_absent(".ok()");
}

#[test]
fn no_allow_dead_code() {
    assert_absent("#[allow(dead_code)]");
}
