use std::fs;
use std::path::{Path, PathBuf};

/// The subscriber setup reports its own failures before tracing is installed
const ALLOWED_STDERR_WRITERS: &[&str] = &["src/logging.rs"];

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

#[test]
fn library_code_logs_through_tracing_only() {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join("src"), &mut files);
    assert!(!files.is_empty());

    let mut offenders = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }
            let stderr = trimmed.contains("eprintln!(");
            let stdout = (trimmed.contains("println!(") && !stderr) || trimmed.contains("dbg!(");
            if stdout || (stderr && !ALLOWED_STDERR_WRITERS.contains(&rel.as_str())) {
                offenders.push(format!("{rel}:{}: {}", idx + 1, trimmed));
            }
        }
    }

    assert!(
        offenders.is_empty(),
        "direct stdout/stderr output detected, use tracing instead:\n{}",
        offenders.join("\n")
    );
}
