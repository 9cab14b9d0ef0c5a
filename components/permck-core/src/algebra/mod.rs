//! The permission algebra (§4.2): assignability predicates, convert, and merge.
//!
//! Every top-level entry point here builds its own memoization table and is safe to call
//! concurrently from independent threads — nothing is shared across calls.

pub mod assign;
pub mod convert;
pub mod memo;
pub mod merge;

pub use assign::{can_copy, can_move, can_refcopy, Mode};
pub use convert::{convert, convert_strict, ConvertGoal};
pub use merge::{intersect, merge, union, Action, ShapeError};
