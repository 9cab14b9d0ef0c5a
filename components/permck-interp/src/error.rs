//! `CheckError` (§7): one variant per error kind, each carrying its payload and an
//! `Option<Position>`. Propagation is ordinary `Result`/`?` inside one expression or
//! statement evaluation; an error partway through a statement is realized here as a
//! `Result::Err` bubbling up to the per-function driver in
//! [`crate::checker`], not an actual Rust panic — `Bailout` is the one case treated as a
//! distinguished sentinel rather than a finding about the analyzed program.

use permck_core::Permission;
use permck_util::Position;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CheckError {
    #[error("parse error: {reason}")]
    Parse { reason: String, position: Option<Position> },

    #[error("permission error: need `{needed}`, have `{have}`")]
    Permission {
        needed: Permission,
        have: Permission,
        position: Option<Position>,
    },

    #[error("cannot move or copy `{from}` into `{to}`")]
    MoveCopy {
        from: Permission,
        to: Permission,
        position: Option<Position>,
    },

    #[error("shape error: {reason}")]
    Shape { reason: String, position: Option<Position> },

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String, position: Option<Position> },

    #[error("not a channel: `{found}`")]
    NotAChannel { found: Permission, position: Option<Position> },

    #[error("not a pointer: `{found}`")]
    NotAPointer { found: Permission, position: Option<Position> },

    #[error("not a struct: `{found}`")]
    NotAStruct { found: Permission, position: Option<Position> },

    #[error("not a function: `{found}`")]
    NotAFunction { found: Permission, position: Option<Position> },

    #[error("not implemented: {what}")]
    NotImplemented { what: String, position: Option<Position> },

    #[error("cannot merge stores: {reason}")]
    Merge { reason: String, position: Option<Position> },

    #[error("loop did not converge within {limit} iterations")]
    IterationLimit { limit: usize, position: Option<Position> },

    /// A distinguished sentinel, not a finding — caught separately at the checker's entry
    /// point once `max_accumulated_errors` is reached (§4.7, §9).
    #[error("too many accumulated errors")]
    Bailout,
}

impl CheckError {
    pub fn position(&self) -> Option<Position> {
        match self {
            CheckError::Parse { position, .. }
            | CheckError::Permission { position, .. }
            | CheckError::MoveCopy { position, .. }
            | CheckError::Shape { position, .. }
            | CheckError::UnknownVariable { position, .. }
            | CheckError::NotAChannel { position, .. }
            | CheckError::NotAPointer { position, .. }
            | CheckError::NotAStruct { position, .. }
            | CheckError::NotAFunction { position, .. }
            | CheckError::NotImplemented { position, .. }
            | CheckError::Merge { position, .. }
            | CheckError::IterationLimit { position, .. } => *position,
            CheckError::Bailout => None,
        }
    }

    /// The error kind's name, used by the reporter (§4.8) as the first word of each
    /// paragraph.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::Parse { .. } => "ParseError",
            CheckError::Permission { .. } => "PermissionError",
            CheckError::MoveCopy { .. } => "MoveCopyError",
            CheckError::Shape { .. } => "ShapeError",
            CheckError::UnknownVariable { .. } => "UnknownVariable",
            CheckError::NotAChannel { .. } => "NotAChannel",
            CheckError::NotAPointer { .. } => "NotAPointer",
            CheckError::NotAStruct { .. } => "NotAStruct",
            CheckError::NotAFunction { .. } => "NotAFunction",
            CheckError::NotImplemented { .. } => "NotImplemented",
            CheckError::Merge { .. } => "MergeError",
            CheckError::IterationLimit { .. } => "IterationLimit",
            CheckError::Bailout => "Bailout",
        }
    }
}

impl From<permck_core::StoreError> for CheckError {
    fn from(e: permck_core::StoreError) -> Self {
        CheckError::Merge { reason: e.to_string(), position: None }
    }
}

impl From<permck_core::algebra::ShapeError> for CheckError {
    fn from(e: permck_core::algebra::ShapeError) -> Self {
        CheckError::Shape { reason: e.0, position: None }
    }
}
