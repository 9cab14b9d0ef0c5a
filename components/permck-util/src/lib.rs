pub use fxhash::FxHashMap as Map;
pub use fxhash::FxHashSet as Set;

pub type Fallible<T> = anyhow::Result<T>;

pub use anyhow::anyhow;
pub use anyhow::bail;
pub use anyhow::Context;
pub use anyhow::Error;

/// A 1-based source position, used by [`permck-core`] diagnostics.
///
/// Kept here rather than in the core crate so that the CLI and the core agree on one
/// representation without a dependency cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
