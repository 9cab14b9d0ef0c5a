//! The permission algebra and permission store — components A, B, and C of the checker.
//! This crate has no knowledge of any host-language syntax tree; it
//! exposes the lattice of permissions, the five primitive operations on them, and the
//! scoped store the interpreter threads through control flow. The interpreter itself
//! (component D) lives in `permck-interp`, built on top of this crate.

pub mod algebra;
pub mod base;
pub mod parse;
pub mod perm;
pub mod store;

pub use base::Base;
pub use parse::{parse, ParseError};
pub use perm::{FuncPermission, Permission, PermissionData};
pub use store::{Store, StoreError};
