//! `merge(P1, P2, action)` implements intersect, union, and the two convert-by-shape
//! actions (§4.2.3). All four share one recursive structural routine; only the base
//! combine rule and (for `Func`) the direction of recursion differ.

use std::fmt;

use crate::algebra::memo::PermMemo;
use crate::base::Base;
use crate::perm::{FuncPermission, Permission, PermissionData};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    Intersection,
    Union,
    Conversion,
    StrictConversion,
}

impl Action {
    /// Function bases invert the action (union<->intersection) because a wider function
    /// permission is a narrower consumer. Conversion actions have no natural inverse and
    /// pass through unchanged.
    fn inverted(self) -> Action {
        match self {
            Action::Intersection => Action::Union,
            Action::Union => Action::Intersection,
            Action::Conversion => Action::Conversion,
            Action::StrictConversion => Action::StrictConversion,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ShapeError(pub String);

type MemoKey = (usize, usize, Action);

fn combine_base(a: Base, b: Base, action: Action) -> Base {
    match action {
        Action::Intersection => a & b,
        Action::Union => a | b,
        Action::Conversion | Action::StrictConversion => b,
    }
}

pub fn merge(p1: &Permission, p2: &Permission, action: Action) -> Result<Permission, ShapeError> {
    tracing::trace!(p1 = %p1, p2 = %p2, %action, "merge");
    let memo = PermMemo::<MemoKey>::new();
    let result = merge_rec(p1, p2, action, &memo)?;
    if result.structurally_equal(p1) {
        Ok(p1.clone())
    } else {
        Ok(result)
    }
}

pub fn intersect(p1: &Permission, p2: &Permission) -> Result<Permission, ShapeError> {
    merge(p1, p2, Action::Intersection)
}

pub fn union(p1: &Permission, p2: &Permission) -> Result<Permission, ShapeError> {
    merge(p1, p2, Action::Union)
}

fn merge_rec(
    p1: &Permission,
    p2: &Permission,
    action: Action,
    memo: &PermMemo<MemoKey>,
) -> Result<Permission, ShapeError> {
    if p1.is_wildcard() {
        return Ok(p2.clone());
    }
    if p2.is_wildcard() {
        return Ok(p1.clone());
    }
    if p1.is_nil() && p2.is_nil() {
        return Ok(Permission::nil());
    }
    if p1.is_nil() {
        return if p2.accepts_nil() {
            Ok(p2.clone())
        } else {
            Err(shape_mismatch(p1, p2))
        };
    }
    if p2.is_nil() {
        return if p1.accepts_nil() {
            Ok(p1.clone())
        } else {
            Err(shape_mismatch(p1, p2))
        };
    }

    let key = (p1.handle_id(), p2.handle_id(), action);
    if let Some(existing) = memo.get(&key) {
        return Ok(existing);
    }
    let placeholder = memo.insert_placeholder(key);
    let data = compute_merge(p1, p2, action, memo)?;
    placeholder.fill(data);
    Ok(placeholder)
}

fn shape_mismatch(p1: &Permission, p2: &Permission) -> ShapeError {
    ShapeError(format!(
        "cannot merge permissions of different shape: `{p1}` vs `{p2}`"
    ))
}

fn compute_merge(
    p1: &Permission,
    p2: &Permission,
    action: Action,
    memo: &PermMemo<MemoKey>,
) -> Result<PermissionData, ShapeError> {
    use PermissionData::*;

    match (&*p1.data(), &*p2.data()) {
        (Base(b1), Base(b2)) => Ok(Base(combine_base(*b1, *b2, action))),

        (Pointer { base: b1, target: t1 }, Pointer { base: b2, target: t2 }) => Ok(Pointer {
            base: combine_base(*b1, *b2, action),
            target: merge_rec(t1, t2, action, memo)?,
        }),

        (Chan { base: b1, element: e1 }, Chan { base: b2, element: e2 }) => Ok(Chan {
            base: combine_base(*b1, *b2, action),
            element: merge_rec(e1, e2, action, memo)?,
        }),

        (Slice { base: b1, element: e1 }, Slice { base: b2, element: e2 }) => Ok(Slice {
            base: combine_base(*b1, *b2, action),
            element: merge_rec(e1, e2, action, memo)?,
        }),

        (
            Array { base: b1, element: e1, len: l1 },
            Array { base: b2, element: e2, len: l2 },
        ) => Ok(Array {
            base: combine_base(*b1, *b2, action),
            element: merge_rec(e1, e2, action, memo)?,
            len: l2.or(*l1),
        }),

        (Map { base: b1, key: k1, value: v1 }, Map { base: b2, key: k2, value: v2 }) => Ok(Map {
            base: combine_base(*b1, *b2, action),
            key: merge_rec(k1, k2, action, memo)?,
            value: merge_rec(v1, v2, action, memo)?,
        }),

        (Struct { base: b1, fields: f1 }, Struct { base: b2, fields: f2 }) => {
            if f1.len() != f2.len() {
                return Err(ShapeError(format!(
                    "struct field count mismatch: {} vs {}",
                    f1.len(),
                    f2.len()
                )));
            }
            let fields = f1
                .iter()
                .zip(f2.iter())
                .map(|(x, y)| merge_rec(x, y, action, memo))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Struct {
                base: combine_base(*b1, *b2, action),
                fields,
            })
        }

        (Tuple { base: b1, elements: e1 }, Tuple { base: b2, elements: e2 }) => {
            if e1.len() != e2.len() {
                return Err(ShapeError(format!(
                    "tuple arity mismatch: {} vs {}",
                    e1.len(),
                    e2.len()
                )));
            }
            let elements = e1
                .iter()
                .zip(e2.iter())
                .map(|(x, y)| merge_rec(x, y, action, memo))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Tuple {
                base: combine_base(*b1, *b2, action),
                elements,
            })
        }

        (Func(fa), Func(fb)) => Ok(Func(merge_func(fa, fb, action, memo)?)),

        (Interface { base: b1, methods: m1 }, Interface { base: b2, methods: m2 }) => {
            if m1.len() != m2.len() {
                return Err(ShapeError(format!(
                    "interface method-count mismatch: {} vs {}",
                    m1.len(),
                    m2.len()
                )));
            }
            let methods = m1
                .iter()
                .zip(m2.iter())
                .map(|(x, y)| merge_func(x, y, action, memo))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Interface {
                base: combine_base(*b1, *b2, action),
                methods,
            })
        }

        _ => Err(shape_mismatch(p1, p2)),
    }
}

fn merge_func(
    fa: &FuncPermission,
    fb: &FuncPermission,
    action: Action,
    memo: &PermMemo<MemoKey>,
) -> Result<FuncPermission, ShapeError> {
    if fa.receivers.len() != fb.receivers.len()
        || fa.params.len() != fb.params.len()
        || fa.results.len() != fb.results.len()
    {
        return Err(ShapeError(format!(
            "function signature arity mismatch: ({}, {}, {}) vs ({}, {}, {})",
            fa.receivers.len(),
            fa.params.len(),
            fa.results.len(),
            fb.receivers.len(),
            fb.params.len(),
            fb.results.len()
        )));
    }

    let inverted = action.inverted();
    let receivers = fa
        .receivers
        .iter()
        .zip(fb.receivers.iter())
        .map(|(x, y)| merge_rec(x, y, inverted, memo))
        .collect::<Result<Vec<_>, _>>()?;
    let params = fa
        .params
        .iter()
        .zip(fb.params.iter())
        .map(|(x, y)| merge_rec(x, y, inverted, memo))
        .collect::<Result<Vec<_>, _>>()?;
    let results = fa
        .results
        .iter()
        .zip(fb.results.iter())
        .map(|(x, y)| merge_rec(x, y, action, memo))
        .collect::<Result<Vec<_>, _>>()?;

    // §9: contravariance flips every base bit except `O`, which combines under the
    // original action alongside the (covariant) results.
    let owned = combine_base(fa.base, fb.base, action) & Base::OWNED;
    let rest = combine_base(fa.base, fb.base, inverted) - Base::OWNED;
    let base = owned | rest;

    Ok(FuncPermission {
        base,
        name: fa.name.clone().or_else(|| fb.name.clone()),
        receivers,
        params,
        results,
    })
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Intersection => "intersection",
            Action::Union => "union",
            Action::Conversion => "conversion",
            Action::StrictConversion => "strict_conversion",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn intersect_is_bitwise_and_on_bases() {
        let a = parse("om").unwrap();
        let b = parse("or").unwrap();
        let result = intersect(&a, &b).unwrap();
        assert_eq!(result.base(), a.base() & b.base());
    }

    #[test]
    fn union_is_bitwise_or_on_bases() {
        let a = parse("om").unwrap();
        let b = parse("or").unwrap();
        let result = union(&a, &b).unwrap();
        assert_eq!(result.base(), a.base() | b.base());
    }

    #[test]
    fn merge_is_idempotent() {
        let a = parse("om [3]or").unwrap();
        let result = intersect(&a, &a).unwrap();
        assert!(result.structurally_equal(&a));
    }

    #[test]
    fn function_merge_is_contravariant_on_receivers_and_params() {
        // om (om) func(om) om  ⊓  or (or) func(or) or  ->  om (om) func(om) or
        let f1 = parse("om (om) func(om) om").unwrap();
        let f2 = parse("or (or) func(or) or").unwrap();
        let merged = intersect(&f1, &f2).unwrap();
        match &*merged.data() {
            PermissionData::Func(f) => {
                assert_eq!(f.base, Base::OWNED | Base::MUTABLE);
                assert_eq!(f.receivers[0].base(), Base::OWNED | Base::MUTABLE);
                assert_eq!(f.params[0].base(), Base::OWNED | Base::MUTABLE);
                assert_eq!(f.results[0].base(), Base::OWNED | Base::SHARED_READ);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn function_merge_combines_owned_covariantly_unlike_the_rest_of_the_base() {
        // `om` carries `O`, `m` does not — the existing contravariant test above has `O`
        // on both sides and can't tell a covariant combine of `O` apart from an inverted
        // one, since the two coincide there.
        let f1 = parse("om (om) func(om) om").unwrap();
        let f2 = parse("m (or) func(or) or").unwrap();
        let merged = intersect(&f1, &f2).unwrap();
        match &*merged.data() {
            PermissionData::Func(f) => {
                // O combines under intersection itself (om has it, m doesn't), so it drops
                // out; the rest of the base still combines under the inverted action.
                assert!(!f.base.has_owned());
                assert_eq!(f.base, Base::MUTABLE);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn wildcard_absorbs() {
        let w = Permission::wildcard();
        let a = parse("om").unwrap();
        assert!(intersect(&w, &a).unwrap().structurally_equal(&a));
        assert!(intersect(&a, &w).unwrap().structurally_equal(&a));
    }

    #[test]
    fn shape_mismatch_errors() {
        let a = parse("om").unwrap();
        let b = parse("om [3]om").unwrap();
        assert!(intersect(&a, &b).is_err());
    }
}
