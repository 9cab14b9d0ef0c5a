//! The `check` subcommand (§4.9): read one or more textual fixtures, run the checker over
//! each, and print either the human-readable report or a JSON summary per file.

use std::path::PathBuf;

use permck_util::{Context, Fallible};
use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct Options {
    /// Fixture file(s) to check (see `permck-ast`'s textual surface language).
    paths: Vec<PathBuf>,

    /// Emit one JSON object per file instead of the human-readable report.
    #[structopt(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonError {
    kind: &'static str,
    message: String,
    position: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    ok: bool,
    errors: Vec<JsonError>,
}

impl Options {
    pub fn main(&self) -> Fallible<()> {
        let mut any_failed = false;

        for path in &self.paths {
            let contents = std::fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;
            let fixture = permck_ast::parse_fixture(&contents).map_err(|e| permck_util::anyhow!("{e}"))?;
            let config = permck_interp::CheckerConfig::default();
            let result = permck_interp::check(
                &fixture.program,
                &fixture.annotations,
                &fixture.positions,
                &fixture.type_info,
                &config,
            );

            if !result.is_ok() {
                any_failed = true;
            }

            let file = path.display().to_string();
            if self.json {
                let report = JsonReport {
                    file: &file,
                    ok: result.is_ok(),
                    errors: result
                        .errors
                        .iter()
                        .map(|e| JsonError { kind: e.kind(), message: e.to_string(), position: e.position().map(|p| p.to_string()) })
                        .collect(),
                };
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("{file}: {}", permck_interp::report(&result.errors));
            }
        }

        if any_failed {
            permck_util::bail!("permission check failed");
        }
        Ok(())
    }
}
