//! The overridable tunables otherwise scattered through the interpreter as bare literals
//! (§4.11).

/// Knobs embedders and the test harness may override; `default()` reproduces the
/// documented literal constants exactly.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Recognized annotation comment markers (§6.2). The legacy `@cap` spelling is kept
    /// alongside `@perm` so existing fixtures using either continue to parse.
    pub annotation_prefixes: Vec<String>,
    /// The bounded-unrolling cap for `for`/`range` loops (§4.6).
    pub max_loop_iterations: usize,
    /// The accumulated-error bail-out threshold (§4.7).
    pub max_accumulated_errors: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            annotation_prefixes: vec!["@perm".to_string(), "@cap".to_string()],
            max_loop_iterations: 42,
            max_accumulated_errors: 10,
        }
    }
}
