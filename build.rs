use std::fs;
use std::path::Path;

const FORBIDDEN: [&str; 5] = ["std::fs", "std::io", "println!", "eprintln!", "dbg!"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");

    let mut violations = Vec::new();
    scan(Path::new("src"), &mut violations);
    if !violations.is_empty() {
        panic!("lmi-pencil core must not do I/O:\n  {}", violations.join("\n  "));
    }
}

fn scan(dir: &Path, violations: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            scan(&path, violations);
        } else if path.extension().is_some_and(|ext| ext == "rs")
            && let Ok(src) = fs::read_to_string(&path)
        {
            for (line_no, line) in src.lines().enumerate() {
                if let Some(token) = FORBIDDEN.iter().find(|t| line.contains(*t)) {
                    violations.push(format!("{}:{}: {token}", path.display(), line_no + 1));
                }
            }
        }
    }
}
