//! Property-based tests for the permission algebra (§8's universally-quantified
//! properties), generating bounded-depth permission shapes rather than the single
//! worked examples the unit tests alongside `assign.rs`/`convert.rs`/`merge.rs` use.

use proptest::prelude::*;

use permck_core::algebra::{can_copy, can_move, can_refcopy, convert, intersect, union, ConvertGoal};
use permck_core::{Base, Permission, PermissionData};

/// A permission's structural shape without committing to any particular base — two
/// permissions built from the same `Shape` with different base streams are guaranteed to
/// merge/convert without a `ShapeError`.
#[derive(Clone, Debug)]
enum Shape {
    Leaf,
    Pointer(Box<Shape>),
    Chan(Box<Shape>),
    Slice(Box<Shape>),
    Array(Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
    Struct(Vec<Shape>),
    Tuple(Vec<Shape>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = Just(Shape::Leaf);
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| Shape::Pointer(Box::new(s))),
            inner.clone().prop_map(|s| Shape::Chan(Box::new(s))),
            inner.clone().prop_map(|s| Shape::Slice(Box::new(s))),
            inner.clone().prop_map(|s| Shape::Array(Box::new(s))),
            (inner.clone(), inner.clone())
                .prop_map(|(k, v)| Shape::Map(Box::new(k), Box::new(v))),
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Shape::Struct),
            proptest::collection::vec(inner, 0..3).prop_map(Shape::Tuple),
        ]
    })
}

fn arb_base() -> impl Strategy<Value = u8> {
    0u8..32u8
}

fn take_base(bases: &[u8], idx: &mut usize) -> Base {
    let b = bases[*idx % bases.len()];
    *idx += 1;
    Base::from_bits_truncate(b)
}

/// Instantiate `shape`, pulling one base per node from `bases` (cycled if exhausted).
fn build(shape: &Shape, bases: &[u8], idx: &mut usize) -> Permission {
    match shape {
        Shape::Leaf => Permission::base_of(take_base(bases, idx)),
        Shape::Pointer(inner) => {
            let base = take_base(bases, idx);
            let target = build(inner, bases, idx);
            Permission::new(PermissionData::Pointer { base, target })
        }
        Shape::Chan(inner) => {
            let base = take_base(bases, idx);
            let element = build(inner, bases, idx);
            Permission::new(PermissionData::Chan { base, element })
        }
        Shape::Slice(inner) => {
            let base = take_base(bases, idx);
            let element = build(inner, bases, idx);
            Permission::new(PermissionData::Slice { base, element })
        }
        Shape::Array(inner) => {
            let base = take_base(bases, idx);
            let element = build(inner, bases, idx);
            Permission::new(PermissionData::Array { base, element, len: Some(3) })
        }
        Shape::Map(k, v) => {
            let base = take_base(bases, idx);
            let key = build(k, bases, idx);
            let value = build(v, bases, idx);
            Permission::new(PermissionData::Map { base, key, value })
        }
        Shape::Struct(fields) => {
            let base = take_base(bases, idx);
            let fields = fields.iter().map(|f| build(f, bases, idx)).collect();
            Permission::new(PermissionData::Struct { base, fields })
        }
        Shape::Tuple(elements) => {
            let base = take_base(bases, idx);
            let elements = elements.iter().map(|e| build(e, bases, idx)).collect();
            Permission::new(PermissionData::Tuple { base, elements })
        }
    }
}

/// A standalone arbitrary permission (no sharing constraint with anything else).
fn arb_permission() -> impl Strategy<Value = Permission> {
    (arb_shape(), proptest::collection::vec(arb_base(), 1..40))
        .prop_map(|(shape, bases)| build(&shape, &bases, &mut 0))
}

/// A pair of permissions that share one `Shape` but carry independently chosen bases at
/// every node — exactly the precondition `merge`/`convert`-by-shape need to succeed.
fn arb_same_shape_pair() -> impl Strategy<Value = (Permission, Permission)> {
    (
        arb_shape(),
        proptest::collection::vec(arb_base(), 1..40),
        proptest::collection::vec(arb_base(), 1..40),
    )
        .prop_map(|(shape, bases_a, bases_b)| {
            let a = build(&shape, &bases_a, &mut 0);
            let b = build(&shape, &bases_b, &mut 0);
            (a, b)
        })
}

proptest! {
    /// §8: a permission that can move into another can always copy into it too — `move`'s
    /// base predicate (`a.has_read() && a.is_superset_of(b)`) is strictly narrower than
    /// `copy`'s (`a.has_read()`).
    #[test]
    fn move_implies_copy(a in arb_permission(), b in arb_permission()) {
        if can_move(&a, &b) {
            prop_assert!(can_copy(&a, &b));
        }
    }

    /// §8: `refcopy` never succeeds if either side is linear.
    #[test]
    fn refcopy_forbids_linearity(a in arb_permission(), b in arb_permission()) {
        if can_refcopy(&a, &b) {
            prop_assert!(!a.is_linear());
            prop_assert!(!b.is_linear());
        }
    }

    /// §8: converting to a fixed base twice is the same as converting once.
    #[test]
    fn convert_to_base_is_idempotent(p in arb_permission(), g in arb_base()) {
        let goal = ConvertGoal::Base(Base::from_bits_truncate(g));
        let once = convert(&p, &goal).unwrap();
        let twice = convert(&once, &goal).unwrap();
        prop_assert!(once.structurally_equal(&twice));
    }

    /// §8: intersect/union on same-shaped permissions are commutative, and at the top
    /// level are exactly the bitwise `&`/`|` of the two top bases.
    #[test]
    fn intersect_and_union_are_commutative_and_bitwise_on_top_base(
        (a, b) in arb_same_shape_pair()
    ) {
        let i_ab = intersect(&a, &b).unwrap();
        let i_ba = intersect(&b, &a).unwrap();
        prop_assert!(i_ab.structurally_equal(&i_ba));
        prop_assert_eq!(i_ab.base(), a.base() & b.base());

        let u_ab = union(&a, &b).unwrap();
        let u_ba = union(&b, &a).unwrap();
        prop_assert!(u_ab.structurally_equal(&u_ba));
        prop_assert_eq!(u_ab.base(), a.base() | b.base());
    }

    /// §8: intersecting (or unioning) a permission with itself changes nothing.
    #[test]
    fn merge_is_idempotent(p in arb_permission()) {
        let i = intersect(&p, &p).unwrap();
        prop_assert!(i.structurally_equal(&p));
        let u = union(&p, &p).unwrap();
        prop_assert!(u.structurally_equal(&p));
    }
}
