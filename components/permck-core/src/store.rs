//! The permission store (§3.3, §4.3): an ordered stack of frames, each holding an ordered
//! sequence of `(name, effective, maximum)` bindings.
//!
//! Stores are value-like and copy-on-write (`Rc`-shared frames, cloned lazily) so that
//! stores threaded down independent control-flow branches never alias each other's
//! mutations — this is what lets the statement interpreter fork a store per `if`/`switch`
//! arm and later `merge` them back without interference.

use std::fmt;
use std::rc::Rc;

use crate::algebra::{intersect, ShapeError};
use crate::perm::Permission;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("end_block called on a store with no open frame")]
    NoOpenFrame,
    #[error("cannot merge stores: {0}")]
    Mismatch(String),
}

#[derive(Clone, Debug)]
struct Binding {
    name: String,
    effective: Permission,
    maximum: Permission,
}

#[derive(Clone, Debug, Default)]
struct Frame {
    bindings: Vec<Binding>,
}

/// An ordered stack of frames. Cloning a `Store` is O(frame count): frames are
/// reference-counted and only the top-level `Vec` of frame handles is duplicated, so
/// branching the store for each control-flow path is cheap.
#[derive(Clone, Debug, Default)]
pub struct Store {
    frames: Vec<Rc<Frame>>,
}

impl Store {
    pub fn new() -> Self {
        Store { frames: vec![Rc::new(Frame::default())] }
    }

    pub fn empty() -> Self {
        Store { frames: Vec::new() }
    }

    pub fn begin_block(&self) -> Store {
        let mut frames = self.frames.clone();
        frames.push(Rc::new(Frame::default()));
        Store { frames }
    }

    pub fn end_block(&self) -> Result<Store, StoreError> {
        if self.frames.is_empty() {
            return Err(StoreError::NoOpenFrame);
        }
        let mut frames = self.frames.clone();
        frames.pop();
        Ok(Store { frames })
    }

    /// `define(name, P)`: if `name` already exists in the *top* frame, behaves as
    /// `set_effective` (and leaves `maximum` where it is); otherwise inserts a fresh
    /// binding `(name, P, P)`.
    pub fn define(&self, name: &str, perm: Permission) -> Result<Store, StoreError> {
        let mut store = self.clone();
        let top = store.top_mut();
        if let Some(existing) = top.bindings.iter_mut().find(|b| b.name == name) {
            let maximum = existing.maximum.clone();
            existing.effective = intersect(&maximum, &perm)
                .map_err(|e| StoreError::Mismatch(e.0))?;
        } else {
            top.bindings.push(Binding {
                name: name.to_string(),
                effective: perm.clone(),
                maximum: perm,
            });
        }
        Ok(store)
    }

    pub fn set_effective(&self, name: &str, perm: Permission) -> Result<Store, StoreError> {
        let mut store = self.clone();
        let binding = store
            .find_mut(name)
            .ok_or_else(|| StoreError::UnknownVariable(name.to_string()))?;
        let maximum = binding.maximum.clone();
        binding.effective = intersect(&maximum, &perm)
            .map_err(|e| StoreError::Mismatch(e.0))?;
        Ok(store)
    }

    pub fn set_maximum(&self, name: &str, perm: Permission) -> Result<Store, StoreError> {
        let mut store = self.clone();
        let binding = store
            .find_mut(name)
            .ok_or_else(|| StoreError::UnknownVariable(name.to_string()))?;
        let old_effective = binding.effective.clone();
        binding.maximum = perm.clone();
        binding.effective = intersect(&old_effective, &perm)
            .map_err(|e| StoreError::Mismatch(e.0))?;
        Ok(store)
    }

    pub fn get_effective(&self, name: &str) -> Option<Permission> {
        self.find(name).map(|b| b.effective.clone())
    }

    pub fn get_maximum(&self, name: &str) -> Option<Permission> {
        self.find(name).map(|b| b.maximum.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Pairwise-intersects effective and maximum permissions across two stores with
    /// identical binding order and names — used at control-flow joins (e.g. after an
    /// `if`/`else`, or between loop iterations).
    pub fn merge(&self, other: &Store) -> Result<Store, StoreError> {
        if self.frames.len() != other.frames.len() {
            return Err(StoreError::Mismatch(format!(
                "frame count mismatch: {} vs {}",
                self.frames.len(),
                other.frames.len()
            )));
        }
        let mut frames = Vec::with_capacity(self.frames.len());
        for (fa, fb) in self.frames.iter().zip(other.frames.iter()) {
            frames.push(Rc::new(merge_frame(fa, fb)?));
        }
        Ok(Store { frames })
    }

    pub fn equal(&self, other: &Store) -> bool {
        if self.frames.len() != other.frames.len() {
            return false;
        }
        self.frames.iter().zip(other.frames.iter()).all(|(a, b)| {
            a.bindings.len() == b.bindings.len()
                && a.bindings.iter().zip(b.bindings.iter()).all(|(x, y)| {
                    x.name == y.name
                        && x.effective.structurally_equal(&y.effective)
                        && x.maximum.structurally_equal(&y.maximum)
                })
        })
    }

    fn find(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.iter().rev().find(|b| b.name == name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Binding> {
        for frame in self.frames.iter_mut().rev() {
            if frame.bindings.iter().any(|b| b.name == name) {
                let frame = Rc::make_mut(frame);
                return frame.bindings.iter_mut().rev().find(|b| b.name == name);
            }
        }
        None
    }

    fn top_mut(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Rc::new(Frame::default()));
        }
        Rc::make_mut(self.frames.last_mut().unwrap())
    }
}

fn merge_frame(a: &Frame, b: &Frame) -> Result<Frame, StoreError> {
    if a.bindings.len() != b.bindings.len() {
        return Err(StoreError::Mismatch(format!(
            "binding count mismatch: {} vs {}",
            a.bindings.len(),
            b.bindings.len()
        )));
    }
    let mut bindings = Vec::with_capacity(a.bindings.len());
    for (x, y) in a.bindings.iter().zip(b.bindings.iter()) {
        if x.name != y.name {
            return Err(StoreError::Mismatch(format!(
                "binding order mismatch: `{}` vs `{}`",
                x.name, y.name
            )));
        }
        let effective = intersect(&x.effective, &y.effective)
            .map_err(|ShapeError(e)| StoreError::Mismatch(e))?;
        let maximum = intersect(&x.maximum, &y.maximum)
            .map_err(|ShapeError(e)| StoreError::Mismatch(e))?;
        bindings.push(Binding { name: x.name.clone(), effective, maximum });
    }
    Ok(Frame { bindings })
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "[")?;
            for (j, b) in frame.bindings.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {} / {}", b.name, b.effective, b.maximum)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn block_balance_restores_prior_store() {
        let base = Store::new().define("a", parse("om").unwrap()).unwrap();
        let opened = base.begin_block().define("b", parse("or").unwrap()).unwrap();
        let closed = opened.end_block().unwrap();
        assert!(closed.equal(&base));
    }

    #[test]
    fn end_block_without_frame_is_an_error() {
        assert!(Store::empty().end_block().is_err());
    }

    #[test]
    fn define_redefines_in_top_frame() {
        let store = Store::new()
            .define("a", parse("om").unwrap())
            .unwrap()
            .define("a", parse("or").unwrap())
            .unwrap();
        assert!(store
            .get_effective("a")
            .unwrap()
            .structurally_equal(&parse("or").unwrap()));
        // maximum is untouched by a plain re-`define` in the same frame.
        assert!(store
            .get_maximum("a")
            .unwrap()
            .structurally_equal(&parse("om").unwrap()));
    }

    #[test]
    fn define_narrows_by_intersection_with_maximum_on_redefinition() {
        // Redefining `a` with `or` (a superset of `om`'s rights is not possible here since
        // `or` ⊆ `om`, so use a case where the new permission isn't already a subset: a
        // pointer base cannot widen past the maximum established by the first `define`.
        let store = Store::new()
            .define("a", parse("or").unwrap())
            .unwrap()
            .define("a", parse("om").unwrap())
            .unwrap();
        // `om`'s rights beyond `or`'s maximum are clipped away.
        assert!(store
            .get_effective("a")
            .unwrap()
            .structurally_equal(&parse("or").unwrap()));
        assert!(store
            .get_maximum("a")
            .unwrap()
            .structurally_equal(&parse("or").unwrap()));
    }

    #[test]
    fn set_effective_narrows_by_intersection_with_maximum() {
        let store = Store::new().define("a", parse("om").unwrap()).unwrap();
        let store = store.set_effective("a", parse("or").unwrap()).unwrap();
        assert!(store
            .get_effective("a")
            .unwrap()
            .structurally_equal(&parse("or").unwrap()));
    }

    #[test]
    fn set_effective_on_unknown_variable_fails() {
        assert!(Store::new()
            .set_effective("ghost", parse("om").unwrap())
            .is_err());
    }

    #[test]
    fn merge_idempotent() {
        let store = Store::new().define("a", parse("om").unwrap()).unwrap();
        let merged = store.merge(&store).unwrap();
        assert!(merged.equal(&store));
    }

    #[test]
    fn merge_rejects_mismatched_binding_names() {
        let a = Store::new().define("a", parse("om").unwrap()).unwrap();
        let b = Store::new().define("b", parse("om").unwrap()).unwrap();
        assert!(a.merge(&b).is_err());
    }
}
