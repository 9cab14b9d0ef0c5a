//! Fixture-driven test harness (§4.10): walks `tests/fixtures` for `*.perm.txt` files,
//! runs the checker over each, and compares against the expectation recorded in a leading
//! `// expect: ...` comment — either the literal `OK` or a substring that must appear
//! somewhere in the rendered diagnostics report. Trades an LSP round-trip and `.ref`-file
//! blessing for a direct in-process call into `permck_interp::check` plus a substring
//! match, since this checker has no language server to drive.

use std::path::Path;

use anyhow::{bail, Context, Result};

fn main() -> Result<()> {
    let mut total = 0;
    let mut errors = Errors::default();

    for entry in walkdir::WalkDir::new("tests/fixtures") {
        let run_test = || -> Result<()> {
            let entry = entry?;
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(".perm.txt")) {
                total += 1;
                run_fixture(path).with_context(|| format!("testing `{}`", path.display()))?;
            }
            Ok(())
        };
        errors.push_result(run_test());
    }

    let num_errors = errors.reports.len();
    for error in &errors.reports {
        eprintln!("{error:?}");
    }
    eprintln!("{total} fixtures executed, {num_errors} failed");

    if num_errors == 0 {
        Ok(())
    } else {
        bail!("{num_errors} fixtures failed")
    }
}

#[derive(Debug, Default)]
struct Errors {
    reports: Vec<anyhow::Error>,
}

impl Errors {
    fn push_result(&mut self, r: Result<()>) {
        if let Err(e) = r {
            self.reports.push(e);
        }
    }
}

/// `// expect: OK` or `// expect: <substring>`, read from the first matching comment line
/// anywhere in the file (fixtures conventionally put it before the first declaration).
#[derive(Debug)]
enum Expectation {
    Ok,
    Contains(String),
}

fn parse_expectation(text: &str) -> Result<Expectation> {
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("// expect:") {
            let rest = rest.trim();
            return Ok(if rest == "OK" { Expectation::Ok } else { Expectation::Contains(rest.to_string()) });
        }
    }
    bail!("no `// expect: ...` comment found")
}

fn run_fixture(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;
    let expectation = parse_expectation(&text)?;

    let fixture = permck_ast::parse_fixture(&text).map_err(|e| anyhow::anyhow!("{e}"))?;
    let config = permck_interp::CheckerConfig::default();
    let result = permck_interp::check(&fixture.program, &fixture.annotations, &fixture.positions, &fixture.type_info, &config);
    let report = permck_interp::report(&result.errors);

    match expectation {
        Expectation::Ok => {
            if !result.is_ok() {
                bail!("expected OK, got:\n{report}");
            }
        }
        Expectation::Contains(needle) => {
            if !report.contains(&needle) {
                bail!("expected report to contain `{needle}`, got:\n{report}");
            }
        }
    }
    Ok(())
}
