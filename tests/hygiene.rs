//! Hygiene: enforces coding standards at test time.
//!
//! Scans `src/` (excluding `*_test.rs` files) for patterns the crate keeps
//! out of production code. Each pattern has a budget, ideally zero. The
//! budget never grows: to add one, remove an existing one first.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

struct Budget {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

// Panics crash the event loop that every open board shares.
const PANICS: &[Budget] = &[
    Budget { pattern: ".unwrap()", max: 0, why: "propagate or log instead" },
    Budget { pattern: ".expect(", max: 0, why: "propagate or log instead" },
    Budget { pattern: "panic!(", max: 0, why: "return an error" },
    Budget { pattern: "unreachable!(", max: 0, why: "model the state instead" },
    Budget { pattern: "todo!(", max: 0, why: "finish the stub" },
    Budget { pattern: "unimplemented!(", max: 0, why: "finish the stub" },
];

// Silent loss discards errors without inspecting them.
const SILENT_LOSS: &[Budget] = &[
    Budget { pattern: "let _ =", max: 0, why: "inspect or log the result" },
    Budget { pattern: ".ok()", max: 0, why: "match and log the error" },
];

// Output goes through tracing, and async code never blocks the runtime.
const STYLE: &[Budget] = &[
    Budget { pattern: "#[allow(dead_code)]", max: 0, why: "delete the dead code" },
    Budget { pattern: "println!(", max: 0, why: "use tracing" },
    Budget { pattern: "eprintln!(", max: 0, why: "use tracing" },
    Budget { pattern: "dbg!(", max: 0, why: "remove debugging output" },
    Budget { pattern: "std::thread::sleep", max: 0, why: "use tokio::time" },
];

// Input and gesture types are read by UI code; every public field and
// variant carries a doc line.
const DOCUMENTED_MEMBERS: &[&str] = &["src/input.rs", "src/slack.rs"];

struct SourceFile {
    path: String,
    content: String,
}

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

/// Lines of production code matching `pattern`, per file.
fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

fn check(budgets: &[Budget]) {
    let files = source_files();
    assert!(!files.is_empty(), "no sources found; run from the crate root");

    let mut report = Vec::new();
    for budget in budgets {
        let found = hits(&files, budget.pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        if count > budget.max {
            let listing: Vec<String> = found.iter().map(|(path, c)| format!("    {path}: {c}")).collect();
            report.push(format!(
                "{} budget exceeded: found {count}, max {} ({}).\n{}",
                budget.pattern,
                budget.max,
                budget.why,
                listing.join("\n")
            ));
        }
    }
    assert!(report.is_empty(), "{}", report.join("\n"));
}

#[test]
fn panic_budget() {
    check(PANICS);
}

#[test]
fn silent_loss_budget() {
    check(SILENT_LOSS);
}

#[test]
fn style_budget() {
    check(STYLE);
}

#[test]
fn every_module_has_docs() {
    let undocumented: Vec<String> = source_files()
        .into_iter()
        .filter(|f| !f.path.ends_with("main.rs") && !f.content.starts_with("//!"))
        .map(|f| f.path)
        .collect();
    assert!(undocumented.is_empty(), "modules without //! docs: {undocumented:?}");
}

/// Public fields and enum variants of top-level types with no `///` line
/// (or `#[error]` message) above them, as 1-based line numbers.
fn undocumented_members(content: &str) -> Vec<usize> {
    let lines: Vec<&str> = content.lines().collect();
    let mut in_type: Option<bool> = None;
    let mut missing = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.ends_with('{') && (line.starts_with("pub struct ") || line.starts_with("pub enum ")) {
            in_type = Some(line.starts_with("pub enum "));
            continue;
        }
        if *line == "}" {
            in_type = None;
            continue;
        }
        let Some(is_enum) = in_type else {
            continue;
        };
        if !line.starts_with("    ") || line.starts_with("     ") {
            continue;
        }
        let item = line.trim_start();
        if item.starts_with("//") || item.starts_with("#[") || (!is_enum && !item.starts_with("pub ")) {
            continue;
        }
        let mut j = i;
        while j > 0 && lines[j - 1].trim_start().starts_with("#[") && !lines[j - 1].trim_start().starts_with("#[error") {
            j -= 1;
        }
        let above = if j > 0 { lines[j - 1].trim_start() } else { "" };
        if !above.starts_with("///") && !above.starts_with("#[error") {
            missing.push(i + 1);
        }
    }
    missing
}

#[test]
fn public_fields_and_variants_are_documented() {
    let mut report = Vec::new();
    for path in DOCUMENTED_MEMBERS {
        let content = fs::read_to_string(path).unwrap_or_default();
        assert!(!content.is_empty(), "{path} not found; run from the crate root");
        for line in undocumented_members(&content) {
            report.push(format!("    {path}:{line}"));
        }
    }
    assert!(report.is_empty(), "undocumented public members:\n{}", report.join("\n"));
}

#[test]
fn undocumented_member_is_reported() {
    let sample = "pub enum Button {\n    /// Left.\n    Primary,\n    Middle,\n}\n\npub struct Modifiers {\n    /// Shift.\n    pub shift: bool,\n    pub ctrl: bool,\n    hidden: bool,\n}\n";
    assert_eq!(undocumented_members(sample), vec![4, 10]);
}
