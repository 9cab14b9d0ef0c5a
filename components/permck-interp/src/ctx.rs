//! The read-only context threaded through expression and statement evaluation: the
//! externally-supplied `TypeInfo` oracle, the already-parsed annotation map, the node
//! position table, the tunable knobs, and the enclosing function's declared result
//! permissions (needed by `return`, §4.6).

use std::cell::RefCell;

use permck_ast::{NodeId, TypeInfo};
use permck_core::Permission;
use permck_util::{Map, Position};

use crate::config::CheckerConfig;

pub struct Ctx<'a> {
    pub type_info: &'a dyn TypeInfo,
    pub annotations: &'a Map<NodeId, Permission>,
    pub positions: &'a Map<NodeId, Position>,
    pub config: &'a CheckerConfig,
    pub results: &'a [Permission],
    /// Every expression's result permission, keyed by node id (§6.4's `permissions` map).
    /// A side channel rather than a second return value: recording happens uniformly in
    /// `eval_expr` itself, so no evaluator has to thread a recorder through by hand.
    pub permissions: &'a RefCell<Map<NodeId, Permission>>,
}

impl<'a> Ctx<'a> {
    pub fn position_of(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    pub fn record(&self, id: NodeId, perm: &Permission) {
        self.permissions.borrow_mut().insert(id, perm.clone());
    }
}
