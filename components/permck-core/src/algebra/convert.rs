//! `convert(P, G)` re-shapes a permission to a new base (or to the base pattern of a
//! same-shaped permission) while keeping `P`'s structural shape (§4.2.2).

use crate::algebra::memo::PermMemo;
use crate::algebra::merge::{merge, Action, ShapeError};
use crate::base::Base;
use crate::perm::{FuncPermission, Permission, PermissionData};

/// The goal of a convert: either a bare base (propagated structurally) or a full
/// permission of the same shape as `P` (merged base-wise).
pub enum ConvertGoal<'a> {
    Base(Base),
    Shape(&'a Permission),
}

pub fn convert(p: &Permission, goal: &ConvertGoal<'_>) -> Result<Permission, ShapeError> {
    tracing::trace!(p = %p, "convert");
    convert_with(p, goal, false)
}

/// The strict variant overrides every inner base with `g` uniformly, with no linearity
/// adjustment at pointers — used to narrow a polymorphic receiver to a concrete one.
pub fn convert_strict(p: &Permission, g: Base) -> Result<Permission, ShapeError> {
    convert_with(p, &ConvertGoal::Base(g), true)
}

fn convert_with(
    p: &Permission,
    goal: &ConvertGoal<'_>,
    strict: bool,
) -> Result<Permission, ShapeError> {
    match goal {
        ConvertGoal::Base(g) => {
            let memo = PermMemo::<(usize, bool)>::new();
            Ok(convert_base_rec(p, *g, strict, &memo))
        }
        ConvertGoal::Shape(target) => merge(
            p,
            target,
            if strict {
                Action::StrictConversion
            } else {
                Action::Conversion
            },
        ),
    }
}

fn convert_base_rec(p: &Permission, g: Base, strict: bool, memo: &PermMemo<(usize, bool)>) -> Permission {
    if p.is_nil() {
        return Permission::nil();
    }
    if p.is_wildcard() {
        return Permission::base_of(g);
    }

    let key = (p.handle_id(), strict);
    if let Some(existing) = memo.get(&key) {
        return existing;
    }
    let placeholder = memo.insert_placeholder(key);

    let data = match &*p.data() {
        PermissionData::Nil => PermissionData::Nil,
        PermissionData::Wildcard => PermissionData::Base(g),
        PermissionData::Base(_) => PermissionData::Base(g),

        PermissionData::Pointer { base, target } => {
            let lost_linearity = !strict && base.is_linear() && !g.is_linear();
            let target_goal = if lost_linearity {
                target.base().strip_exclusive_after_demotion()
            } else {
                g
            };
            PermissionData::Pointer {
                base: g,
                target: convert_base_rec(target, target_goal, strict, memo),
            }
        }

        PermissionData::Chan { element, .. } => PermissionData::Chan {
            base: g,
            element: convert_base_rec(element, g, strict, memo),
        },

        PermissionData::Slice { element, .. } => PermissionData::Slice {
            base: g,
            element: convert_base_rec(element, g, strict, memo),
        },

        PermissionData::Array { element, len, .. } => PermissionData::Array {
            base: g,
            element: convert_base_rec(element, g, strict, memo),
            len: *len,
        },

        PermissionData::Map { key, value, .. } => PermissionData::Map {
            base: g,
            key: convert_base_rec(key, g, strict, memo),
            value: convert_base_rec(value, g, strict, memo),
        },

        PermissionData::Struct { fields, .. } => PermissionData::Struct {
            base: g,
            fields: fields
                .iter()
                .map(|field| convert_base_rec(field, g, strict, memo))
                .collect(),
        },

        PermissionData::Tuple { elements, .. } => PermissionData::Tuple {
            base: g,
            elements: elements
                .iter()
                .map(|e| convert_base_rec(e, g, strict, memo))
                .collect(),
        },

        // Receivers/parameters/results keep their own bases — converting a function
        // does not over-propagate into its signature.
        PermissionData::Func(func) => PermissionData::Func(FuncPermission {
            base: g,
            name: func.name.clone(),
            receivers: func.receivers.clone(),
            params: func.params.clone(),
            results: func.results.clone(),
        }),

        PermissionData::Interface { methods, .. } => PermissionData::Interface {
            base: g,
            methods: methods
                .iter()
                .map(|m| FuncPermission {
                    base: g,
                    name: m.name.clone(),
                    receivers: m.receivers.clone(),
                    params: m.params.clone(),
                    results: m.results.clone(),
                })
                .collect(),
        },
    };

    placeholder.fill(data);
    placeholder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn convert_base_is_idempotent() {
        let p = parse("om [3]or").unwrap();
        let once = convert(&p, &ConvertGoal::Base(Base::SHARED_READ)).unwrap();
        let twice = convert(&once, &ConvertGoal::Base(Base::SHARED_READ)).unwrap();
        assert!(once.structurally_equal(&twice));
    }

    #[test]
    fn convert_interface_to_base_only_touches_bases() {
        let p = parse("om interface { ov (om) func() }").unwrap();
        let converted = convert(&p, &ConvertGoal::Base(Base::SHARED_READ)).unwrap();
        match &*converted.data() {
            PermissionData::Interface { base, methods } => {
                assert_eq!(*base, Base::SHARED_READ);
                assert_eq!(methods[0].base, Base::SHARED_READ);
                assert_eq!(methods[0].receivers[0].base(), Base::OWNED | Base::MUTABLE);
            }
            other => panic!("expected interface, got {other:?}"),
        }
    }

    #[test]
    fn convert_does_not_propagate_into_func_signature() {
        let f = parse("om func(om) or").unwrap();
        let converted = convert(&f, &ConvertGoal::Base(Base::SHARED_READ)).unwrap();
        match &*converted.data() {
            PermissionData::Func(func) => {
                assert_eq!(func.base, Base::SHARED_READ);
                assert_eq!(func.params[0].base(), Base::OWNED | Base::MUTABLE);
                assert_eq!(func.results[0].base(), Base::OWNED | Base::SHARED_READ);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }
}
