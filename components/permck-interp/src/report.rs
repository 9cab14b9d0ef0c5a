//! Turning a list of [`CheckError`]s into the human-readable text a CLI prints (§4.8).
//! Pure formatting — no I/O — so the CLI and the test harness can both call it and compare
//! against expected strings.

use crate::error::CheckError;

pub fn report(errors: &[CheckError]) -> String {
    if errors.is_empty() {
        return "no permission errors found".to_string();
    }

    let mut out = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        match e.position() {
            Some(pos) => out.push_str(&format!("{}: {} (at {})", e.kind(), e, pos)),
            None => out.push_str(&format!("{}: {}", e.kind(), e)),
        }
    }
    out
}
