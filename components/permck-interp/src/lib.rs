//! The abstract interpreter (component D) and diagnostics reporter (component F). Built
//! on `permck-core`'s algebra and store, and `permck-ast`'s minimal AST and `TypeInfo`
//! oracle.

pub mod checker;
pub mod config;
pub mod ctx;
pub mod error;
pub mod expr;
pub mod moveorcopy;
pub mod release;
pub mod report;
pub mod stmt;

pub use checker::{check, CheckResult};
pub use config::CheckerConfig;
pub use ctx::Ctx;
pub use error::CheckError;
pub use expr::{eval_expr, EvalResult};
pub use release::{Binding, Borrows, Owner};
pub use report::report;
pub use stmt::{eval_block, eval_stmt, Exit, ExitPoint};
