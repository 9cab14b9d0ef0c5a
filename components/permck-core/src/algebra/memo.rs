//! Memoization tables shared by the assignability, convert, and merge recursions.
//!
//! Every algebra entry point builds a fresh table and threads it through its own
//! recursion; tables are never shared across unrelated top-level calls. Before computing
//! a pair, the table is consulted; while
//! computing, a tentative value is inserted first so that a cycle unifies with itself
//! instead of looping forever.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::perm::Permission;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
    Move,
    Copy,
    Refcopy,
}

/// Memo table for the three boolean assignability predicates. The tentative value
/// inserted before recursing is `true`: a predicate that only succeeds by revisiting
/// itself through a cycle is, definitionally, vacuously satisfied on that cycle.
#[derive(Default)]
pub struct BoolMemo {
    table: RefCell<HashMap<(usize, usize, Tag), bool>>,
}

impl BoolMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lhs: usize, rhs: usize, tag: Tag) -> Option<bool> {
        self.table.borrow().get(&(lhs, rhs, tag)).copied()
    }

    pub fn set(&self, lhs: usize, rhs: usize, tag: Tag, value: bool) {
        self.table.borrow_mut().insert((lhs, rhs, tag), value);
    }
}

/// Memo table for the value-producing operations (convert, merge). The tentative value
/// inserted before recursing is a [`Permission::placeholder`], which downstream recursion
/// can hold onto (and embed into its own output) without ever reading — by the time
/// anyone reads it, the constructor on the outermost call will have filled it in.
#[derive(Default)]
pub struct PermMemo<K> {
    table: RefCell<HashMap<K, Permission>>,
}

impl<K: std::hash::Hash + Eq + Clone> PermMemo<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<Permission> {
        self.table.borrow().get(key).cloned()
    }

    pub fn insert_placeholder(&self, key: K) -> Permission {
        let placeholder = Permission::placeholder();
        self.table.borrow_mut().insert(key, placeholder.clone());
        placeholder
    }
}
