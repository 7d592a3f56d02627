//! Source layout checks that rustfmt alone does not enforce

use std::fs;
use std::path::{Path, PathBuf};

const MAX_WIDTH: usize = 100;

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("readable source dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            out.push(path);
        }
    }
}

fn crate_files(sub: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    rust_files(&Path::new(env!("CARGO_MANIFEST_DIR")).join(sub), &mut files);
    files
}

#[test]
fn test_lines_fit_max_width() {
    let mut too_wide = Vec::new();
    for file in crate_files("src").into_iter().chain(crate_files("tests")) {
        let content = fs::read_to_string(&file).expect("readable source file");
        for (n, line) in content.lines().enumerate() {
            if line.chars().count() > MAX_WIDTH {
                too_wide.push(format!("{}:{}", file.display(), n + 1));
            }
        }
    }
    assert!(too_wide.is_empty(), "lines over {MAX_WIDTH} columns: {too_wide:#?}");
}

#[test]
fn test_hook_modules_have_headers() {
    for file in crate_files("src/hooks") {
        let content = fs::read_to_string(&file).expect("readable source file");
        assert!(content.starts_with("//! "), "{} has no module doc header", file.display());
    }
}
