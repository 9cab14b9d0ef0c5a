//! The minimal surface AST, the `TypeInfo` oracle interface, and the textual fixture
//! parser — component E of the checker. `permck-core` has no
//! knowledge of any of this; everything here exists so `permck-interp`'s evaluator has a
//! tree to walk and fixtures have a textual notation to write that tree in.

pub mod ast;
pub mod textparse;
pub mod typeinfo;

pub use ast::{
    BinOp, BranchKind, CallMode, CaseClause, CommClause, CompositeElem, Expr, ExprKind, FuncDecl,
    IncDecOp, NodeId, NodeIdGen, Param, Program, Stmt, StmtKind, UnaryOp,
};
pub use textparse::{parse_fixture, parse_fixture_with_prefixes, ParsedFixture, DEFAULT_ANNOTATION_PREFIXES};
pub use typeinfo::{Selection, SelectionKind, StubTypeInfo, TypeInfo};
