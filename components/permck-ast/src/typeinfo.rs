//! The `TypeInfo` oracle (§6.3): the interface through which the interpreter consults the
//! (externally supplied, out-of-scope) type checker. This module only defines the
//! interface and a hand-built stub implementation good enough to drive fixtures and unit
//! tests — a real embedding supplies its own `TypeInfo` backed by an actual type checker.

use permck_util::Map;

use crate::ast::NodeId;

/// How a selector's final step resolves. `Field` carries no payload — the index of the
/// field itself is the last entry of [`Selection::index_path`]. The two method variants
/// carry the method name to look up on the interface reached after walking the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionKind {
    Field,
    MethodValue(String),
    MethodExpr(String),
}

/// The resolved meaning of one selector expression (`a.f`), as §6.3 describes it: a
/// sequence of struct-field indices to walk (auto-dereferencing pointers along the way,
/// per §4.4) terminated by a selection kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index_path: Vec<usize>,
    pub kind: SelectionKind,
}

pub trait TypeInfo {
    /// The access path for a selector expression, keyed by the selector node's own id.
    fn selection(&self, selector: NodeId) -> Option<&Selection>;

    /// Ordered field names for the struct type of a composite-literal node, used to
    /// resolve keyed elements (`Field: value`) to a positional index. `None` for
    /// positional-only literals or when every element in that literal is positional.
    fn struct_fields(&self, composite_lit: NodeId) -> Option<&[String]>;
}

/// A hand-populated stand-in for a real type checker: fixtures and unit tests register
/// exactly the selections and struct-field lists their scenario needs, by node id.
#[derive(Default)]
pub struct StubTypeInfo {
    selections: Map<NodeId, Selection>,
    struct_fields: Map<NodeId, Vec<String>>,
}

impl StubTypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, node: NodeId, selection: Selection) -> Self {
        self.selections.insert(node, selection);
        self
    }

    pub fn with_struct_fields(mut self, node: NodeId, fields: Vec<String>) -> Self {
        self.struct_fields.insert(node, fields);
        self
    }

    pub fn has_selection(&self, node: NodeId) -> bool {
        self.selections.contains_key(&node)
    }
}

impl TypeInfo for StubTypeInfo {
    fn selection(&self, selector: NodeId) -> Option<&Selection> {
        self.selections.get(&selector)
    }

    fn struct_fields(&self, composite_lit: NodeId) -> Option<&[String]> {
        self.struct_fields.get(&composite_lit).map(|v| v.as_slice())
    }
}
