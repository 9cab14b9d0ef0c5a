//! The three assignability predicates — `move`, `copy`, `refcopy` — and their shared
//! structural recursion (§4.2.1).

use crate::algebra::memo::{BoolMemo, Tag};
use crate::base::Base;
use crate::perm::{FuncPermission, Permission, PermissionData};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Mode {
    Move,
    Copy,
    Refcopy,
}

impl Mode {
    fn tag(self) -> Tag {
        match self {
            Mode::Move => Tag::Move,
            Mode::Copy => Tag::Copy,
            Mode::Refcopy => Tag::Refcopy,
        }
    }
}

#[tracing::instrument(level = "trace", skip_all, fields(a = %a, b = %b))]
pub fn can_move(a: &Permission, b: &Permission) -> bool {
    let result = assignable(a, b, Mode::Move, &BoolMemo::new());
    tracing::trace!(result, "move");
    result
}

#[tracing::instrument(level = "trace", skip_all, fields(a = %a, b = %b))]
pub fn can_copy(a: &Permission, b: &Permission) -> bool {
    let result = assignable(a, b, Mode::Copy, &BoolMemo::new());
    tracing::trace!(result, "copy");
    result
}

#[tracing::instrument(level = "trace", skip_all, fields(a = %a, b = %b))]
pub fn can_refcopy(a: &Permission, b: &Permission) -> bool {
    let result = assignable(a, b, Mode::Refcopy, &BoolMemo::new());
    tracing::trace!(result, "refcopy");
    result
}

/// The base predicate shared by all three modes (§4.2.1's table).
fn base_predicate(a: Base, b: Base, mode: Mode) -> bool {
    match mode {
        Mode::Move => (a.has_read() && a.is_superset_of(b)) || (a.is_empty() && b.is_empty()),
        Mode::Copy => a.has_read() || (a.is_empty() && b.is_empty()),
        Mode::Refcopy => a.is_superset_of(b) && !a.is_linear() && !b.is_linear(),
    }
}

fn assignable(a: &Permission, b: &Permission, mode: Mode, memo: &BoolMemo) -> bool {
    if a.is_wildcard() || b.is_wildcard() {
        // Wildcard is never directly assignable from or to.
        return false;
    }

    if a.is_nil() {
        return b.accepts_nil();
    }
    if b.is_nil() {
        return false;
    }

    let key = (a.handle_id(), b.handle_id());
    if let Some(v) = memo.get(key.0, key.1, mode.tag()) {
        return v;
    }
    memo.set(key.0, key.1, mode.tag(), true);

    let result = compute_assignable(a, b, mode, memo);
    memo.set(key.0, key.1, mode.tag(), result);
    result
}

fn compute_assignable(a: &Permission, b: &Permission, mode: Mode, memo: &BoolMemo) -> bool {
    use PermissionData::*;

    match (&*a.data(), &*b.data()) {
        (Base(ba), Base(bb)) => base_predicate(*ba, *bb, mode),

        (Pointer { base: ba, target: ta }, Pointer { base: bb, target: tb }) => {
            base_predicate(*ba, *bb, mode) && assignable(ta, tb, Mode::Refcopy, memo)
        }

        (Chan { base: ba, element: ea }, Chan { base: bb, element: eb }) => {
            base_predicate(*ba, *bb, mode) && assignable(ea, eb, Mode::Refcopy, memo)
        }

        (Slice { base: ba, element: ea }, Slice { base: bb, element: eb }) => {
            base_predicate(*ba, *bb, mode) && assignable(ea, eb, Mode::Refcopy, memo)
        }

        (Map { base: ba, key: ka, value: va }, Map { base: bb, key: kb, value: vb }) => {
            base_predicate(*ba, *bb, mode)
                && assignable(ka, kb, Mode::Refcopy, memo)
                && assignable(va, vb, Mode::Refcopy, memo)
        }

        (Array { base: ba, element: ea, .. }, Array { base: bb, element: eb, .. }) => {
            base_predicate(*ba, *bb, mode) && assignable(ea, eb, mode, memo)
        }

        // An array may refcopy into a slice (array-to-slice conversion), never move/copy.
        (Array { base: ba, element: ea, .. }, Slice { base: bb, element: eb }) => {
            mode == Mode::Refcopy
                && base_predicate(*ba, *bb, mode)
                && assignable(ea, eb, Mode::Refcopy, memo)
        }

        (Struct { base: ba, fields: fa }, Struct { base: bb, fields: fb }) => {
            fa.len() == fb.len()
                && base_predicate(*ba, *bb, mode)
                && fa
                    .iter()
                    .zip(fb.iter())
                    .all(|(x, y)| assignable(x, y, mode, memo))
        }

        (Tuple { base: ba, elements: ea }, Tuple { base: bb, elements: eb }) => {
            ea.len() == eb.len()
                && base_predicate(*ba, *bb, mode)
                && ea
                    .iter()
                    .zip(eb.iter())
                    .all(|(x, y)| assignable(x, y, mode, memo))
        }

        (Func(fa), Func(fb)) => func_assignable(fa, fb, mode, memo),

        (Interface { base: ba, methods: ma }, Interface { base: bb, methods: mb }) => {
            // Interface base always moves, regardless of the outer mode.
            base_predicate(*ba, *bb, Mode::Move)
                && mb.iter().all(|target_method| {
                    let source_method = ma.iter().find(|m| m.name == target_method.name).expect(
                        "interface assignability invariant violated: target method has no \
                         same-named source method (caller must ensure subset containment)",
                    );
                    func_assignable(source_method, target_method, Mode::Move, memo)
                })
        }

        _ => false,
    }
}

/// Func base is contravariant on `O` alone and covariant on the rest — in practice this
/// means the `O` bit never blocks assignability (dropping it, per the move-or-copy rule,
/// is always allowed; the contravariant direction makes adding it back at a consuming
/// site equally unconstrained), while the remaining bits behave like any other base.
fn func_base_predicate(a: Base, b: Base, mode: Mode) -> bool {
    let rest_a = a - Base::OWNED;
    let rest_b = b - Base::OWNED;
    base_predicate(rest_a, rest_b, mode)
}

fn func_assignable(fa: &FuncPermission, fb: &FuncPermission, mode: Mode, memo: &BoolMemo) -> bool {
    if fa.receivers.len() != fb.receivers.len() {
        return false;
    }
    if fa.params.len() != fb.params.len() {
        return false;
    }
    if fa.results.len() != fb.results.len() {
        return false;
    }

    func_base_predicate(fa.base, fb.base, mode)
        && fa
            .receivers
            .iter()
            .zip(fb.receivers.iter())
            // Contravariant: swap arguments and use move.
            .all(|(ra, rb)| assignable(rb, ra, Mode::Move, memo))
        && fa
            .params
            .iter()
            .zip(fb.params.iter())
            .all(|(pa, pb)| assignable(pb, pa, Mode::Move, memo))
        && fa
            .results
            .iter()
            .zip(fb.results.iter())
            // Covariant: same direction, same mode as the outer check.
            .all(|(ra, rb)| assignable(ra, rb, mode, memo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn move_implies_copy_when_target_is_not_a_reference() {
        let a = parse("om").unwrap();
        let b = parse("or").unwrap();
        if can_move(&a, &b) {
            assert!(can_copy(&a, &b));
        }
    }

    #[test]
    fn refcopy_forbids_linear_on_either_side() {
        let linear = parse("om").unwrap();
        let nonlinear = parse("or").unwrap();
        assert!(!can_refcopy(&linear, &nonlinear));
        assert!(!can_refcopy(&nonlinear, &linear));
    }

    #[test]
    fn nil_moves_into_pointer_but_not_into_base() {
        let nil = Permission::nil();
        let ptr = parse("om * om").unwrap();
        assert!(can_move(&nil, &ptr));

        let base = parse("om").unwrap();
        assert!(!can_move(&nil, &base));
    }

    #[test]
    fn array_refcopies_into_slice_but_never_moves() {
        let array = parse("or [3]or").unwrap();
        let slice = parse("or []or").unwrap();
        assert!(can_refcopy(&array, &slice));
        assert!(!can_move(&array, &slice));
        assert!(!can_copy(&array, &slice));
    }

    #[test]
    fn function_variance_is_contravariant_in_params() {
        let f1 = parse("om func(om) or").unwrap();
        let f2 = parse("om func(or) or").unwrap();
        if can_move(&f1, &f2) {
            let p1 = parse("om").unwrap();
            let p2 = parse("or").unwrap();
            assert!(can_move(&p2, &p1));
        }
    }
}
