//! The recursive structural permission and its cyclic-safe construction.
//!
//! Permissions are value-like once published: [`Permission`] is a cheap `Rc` handle, and
//! [`PermissionData`] is never mutated after a node is filled in. The only exception is
//! during construction of a *cyclic* permission (a pointer that targets itself through some
//! chain of structs), where a placeholder handle is inserted first and its data is filled
//! in once the cycle closes — see [`Permission::placeholder`].

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::base::{print_base, Base};

#[derive(Clone)]
pub struct Permission(Rc<RefCell<Option<PermissionData>>>);

#[derive(Clone, Debug)]
pub struct FuncPermission {
    pub base: Base,
    pub name: Option<String>,
    pub receivers: Vec<Permission>,
    pub params: Vec<Permission>,
    pub results: Vec<Permission>,
}

#[derive(Clone, Debug)]
pub enum PermissionData {
    Base(Base),
    Pointer {
        base: Base,
        target: Permission,
    },
    Chan {
        base: Base,
        element: Permission,
    },
    Array {
        base: Base,
        element: Permission,
        len: Option<usize>,
    },
    Slice {
        base: Base,
        element: Permission,
    },
    Map {
        base: Base,
        key: Permission,
        value: Permission,
    },
    Struct {
        base: Base,
        fields: Vec<Permission>,
    },
    Func(FuncPermission),
    Interface {
        base: Base,
        methods: Vec<FuncPermission>,
    },
    Tuple {
        base: Base,
        elements: Vec<Permission>,
    },
    Nil,
    Wildcard,
}

impl Permission {
    pub fn new(data: PermissionData) -> Self {
        Permission(Rc::new(RefCell::new(Some(data))))
    }

    pub fn base_of(b: Base) -> Self {
        Self::new(PermissionData::Base(b))
    }

    pub fn nil() -> Self {
        Self::new(PermissionData::Nil)
    }

    pub fn wildcard() -> Self {
        Self::new(PermissionData::Wildcard)
    }

    /// Reserve a handle for a node that is part of a not-yet-closed cycle. The caller must
    /// call [`Permission::fill`] exactly once before anyone reads the handle's data.
    pub fn placeholder() -> Self {
        Permission(Rc::new(RefCell::new(None)))
    }

    /// Close a cycle opened with [`Permission::placeholder`].
    pub fn fill(&self, data: PermissionData) {
        let mut slot = self.0.borrow_mut();
        assert!(slot.is_none(), "permission node filled twice");
        *slot = Some(data);
    }

    pub fn data(&self) -> Ref<'_, PermissionData> {
        Ref::map(self.0.borrow(), |opt| {
            opt.as_ref()
                .expect("read of an unfilled cyclic permission placeholder")
        })
    }

    /// Identity of the underlying handle — used as the memoization key for algebra
    /// operations, which must terminate on cycles by recognizing "I've seen this exact
    /// pair of handles before" rather than re-expanding structurally.
    pub fn handle_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &Permission) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn base(&self) -> Base {
        match &*self.data() {
            PermissionData::Base(b) => *b,
            PermissionData::Pointer { base, .. } => *base,
            PermissionData::Chan { base, .. } => *base,
            PermissionData::Array { base, .. } => *base,
            PermissionData::Slice { base, .. } => *base,
            PermissionData::Map { base, .. } => *base,
            PermissionData::Struct { base, .. } => *base,
            PermissionData::Func(f) => f.base,
            PermissionData::Interface { base, .. } => *base,
            PermissionData::Tuple { base, .. } => *base,
            PermissionData::Nil => Base::MUTABLE,
            PermissionData::Wildcard => Base::NONE,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.base().is_linear()
    }

    /// Rebuild this permission with its top-level base replaced, keeping every child
    /// permission untouched (and `Rc`-shared, not re-cloned). Used to "freeze" a linear
    /// owner's stored permission when it is moved into an unowned, non-linear destination
    /// (§4.5 move-or-copy rule, case 4) — linearity is a property of the base alone
    /// (§3.2), so only the top node needs to change.
    pub fn with_base(&self, new_base: Base) -> Permission {
        match &*self.data() {
            PermissionData::Base(_) => Permission::base_of(new_base),
            PermissionData::Pointer { target, .. } => Permission::new(PermissionData::Pointer {
                base: new_base,
                target: target.clone(),
            }),
            PermissionData::Chan { element, .. } => Permission::new(PermissionData::Chan {
                base: new_base,
                element: element.clone(),
            }),
            PermissionData::Array { element, len, .. } => Permission::new(PermissionData::Array {
                base: new_base,
                element: element.clone(),
                len: *len,
            }),
            PermissionData::Slice { element, .. } => Permission::new(PermissionData::Slice {
                base: new_base,
                element: element.clone(),
            }),
            PermissionData::Map { key, value, .. } => Permission::new(PermissionData::Map {
                base: new_base,
                key: key.clone(),
                value: value.clone(),
            }),
            PermissionData::Struct { fields, .. } => Permission::new(PermissionData::Struct {
                base: new_base,
                fields: fields.clone(),
            }),
            PermissionData::Func(func) => Permission::new(PermissionData::Func(FuncPermission {
                base: new_base,
                name: func.name.clone(),
                receivers: func.receivers.clone(),
                params: func.params.clone(),
                results: func.results.clone(),
            })),
            PermissionData::Interface { methods, .. } => Permission::new(PermissionData::Interface {
                base: new_base,
                methods: methods.clone(),
            }),
            PermissionData::Tuple { elements, .. } => Permission::new(PermissionData::Tuple {
                base: new_base,
                elements: elements.clone(),
            }),
            PermissionData::Nil | PermissionData::Wildcard => self.clone(),
        }
    }

    /// Drop the `O` (owned) bit from a function's base — used when a method-value is
    /// bound through a receiver whose own base lacks `O` (§4.4 selector contract).
    pub fn func_without_owned(&self) -> Permission {
        match &*self.data() {
            PermissionData::Func(func) => Permission::new(PermissionData::Func(FuncPermission {
                base: func.base - Base::OWNED,
                name: func.name.clone(),
                receivers: func.receivers.clone(),
                params: func.params.clone(),
                results: func.results.clone(),
            })),
            _ => self.clone(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.data(), PermissionData::Nil)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(&*self.data(), PermissionData::Wildcard)
    }

    /// A reference-like variant is one `Nil` is directly assignable to: `Chan`, `Func`,
    /// `Interface`, `Map`, `Pointer`, `Slice`.
    pub fn accepts_nil(&self) -> bool {
        matches!(
            &*self.data(),
            PermissionData::Chan { .. }
                | PermissionData::Func(_)
                | PermissionData::Interface { .. }
                | PermissionData::Map { .. }
                | PermissionData::Pointer { .. }
                | PermissionData::Slice { .. }
                | PermissionData::Nil
        )
    }

    /// Structural equality that is safe on cycles: a `seen` set of handle-id pairs breaks
    /// infinite recursion on a back-edge, treating it as equal (consistent with the fact
    /// that a cyclic permission is constructed once and shared by reference — genuinely
    /// distinct cyclic permissions never arise in this system).
    pub fn structurally_equal(&self, other: &Permission) -> bool {
        let mut seen = HashSet::new();
        structurally_equal_rec(self, other, &mut seen)
    }
}

fn structurally_equal_rec(
    a: &Permission,
    b: &Permission,
    seen: &mut HashSet<(usize, usize)>,
) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    let key = (a.handle_id(), b.handle_id());
    if !seen.insert(key) {
        return true;
    }

    use PermissionData::*;
    match (&*a.data(), &*b.data()) {
        (Base(x), Base(y)) => x == y,
        (Nil, Nil) | (Wildcard, Wildcard) => true,
        (Pointer { base: b1, target: t1 }, Pointer { base: b2, target: t2 }) => {
            b1 == b2 && structurally_equal_rec(t1, t2, seen)
        }
        (Chan { base: b1, element: e1 }, Chan { base: b2, element: e2 })
        | (Slice { base: b1, element: e1 }, Slice { base: b2, element: e2 }) => {
            b1 == b2 && structurally_equal_rec(e1, e2, seen)
        }
        (
            Array { base: b1, element: e1, len: l1 },
            Array { base: b2, element: e2, len: l2 },
        ) => b1 == b2 && l1 == l2 && structurally_equal_rec(e1, e2, seen),
        (
            Map { base: b1, key: k1, value: v1 },
            Map { base: b2, key: k2, value: v2 },
        ) => {
            b1 == b2
                && structurally_equal_rec(k1, k2, seen)
                && structurally_equal_rec(v1, v2, seen)
        }
        (Struct { base: b1, fields: f1 }, Struct { base: b2, fields: f2 }) => {
            b1 == b2
                && f1.len() == f2.len()
                && f1
                    .iter()
                    .zip(f2.iter())
                    .all(|(x, y)| structurally_equal_rec(x, y, seen))
        }
        (Tuple { base: b1, elements: e1 }, Tuple { base: b2, elements: e2 }) => {
            b1 == b2
                && e1.len() == e2.len()
                && e1
                    .iter()
                    .zip(e2.iter())
                    .all(|(x, y)| structurally_equal_rec(x, y, seen))
        }
        (Func(f1), Func(f2)) => func_equal(f1, f2, seen),
        (Interface { base: b1, methods: m1 }, Interface { base: b2, methods: m2 }) => {
            b1 == b2
                && m1.len() == m2.len()
                && m1
                    .iter()
                    .zip(m2.iter())
                    .all(|(x, y)| func_equal(x, y, seen))
        }
        _ => false,
    }
}

fn func_equal(f1: &FuncPermission, f2: &FuncPermission, seen: &mut HashSet<(usize, usize)>) -> bool {
    f1.base == f2.base
        && f1.name == f2.name
        && f1.receivers.len() == f2.receivers.len()
        && f1.params.len() == f2.params.len()
        && f1.results.len() == f2.results.len()
        && f1
            .receivers
            .iter()
            .zip(f2.receivers.iter())
            .all(|(x, y)| structurally_equal_rec(x, y, seen))
        && f1
            .params
            .iter()
            .zip(f2.params.iter())
            .all(|(x, y)| structurally_equal_rec(x, y, seen))
        && f1
            .results
            .iter()
            .zip(f2.results.iter())
            .all(|(x, y)| structurally_equal_rec(x, y, seen))
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        print_rec(self, f, &mut seen)
    }
}

fn print_rec(
    p: &Permission,
    f: &mut fmt::Formatter<'_>,
    seen: &mut HashSet<usize>,
) -> fmt::Result {
    let id = p.handle_id();
    if !seen.insert(id) {
        return write!(f, "<seen>");
    }

    match &*p.data() {
        PermissionData::Base(b) => write!(f, "{}", print_base(*b)),
        PermissionData::Nil => write!(f, "nil"),
        PermissionData::Wildcard => write!(f, "_"),
        PermissionData::Pointer { base, target } => {
            write!(f, "{}*", print_base(*base))?;
            print_rec(target, f, seen)
        }
        PermissionData::Chan { base, element } => {
            write!(f, "{}chan ", print_base(*base))?;
            print_rec(element, f, seen)
        }
        PermissionData::Array { base, element, len } => {
            write!(f, "{}[", print_base(*base))?;
            match len {
                Some(n) => write!(f, "{n}")?,
                None => (),
            }
            write!(f, "]")?;
            print_rec(element, f, seen)
        }
        PermissionData::Slice { base, element } => {
            write!(f, "{}[]", print_base(*base))?;
            print_rec(element, f, seen)
        }
        PermissionData::Map { base, key, value } => {
            write!(f, "{}map[", print_base(*base))?;
            print_rec(key, f, seen)?;
            write!(f, "]")?;
            print_rec(value, f, seen)
        }
        PermissionData::Struct { base, fields } => {
            write!(f, "{}struct{{", print_base(*base))?;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                print_rec(field, f, seen)?;
            }
            write!(f, "}}")
        }
        PermissionData::Func(func) => print_func(func, f, seen),
        PermissionData::Interface { base, methods } => {
            write!(f, "{}interface{{", print_base(*base))?;
            for (i, m) in methods.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                print_func(m, f, seen)?;
            }
            write!(f, "}}")
        }
        PermissionData::Tuple { base, elements } => {
            write!(f, "{}(", print_base(*base))?;
            for (i, e) in elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                print_rec(e, f, seen)?;
            }
            write!(f, ")")
        }
    }
}

fn print_func(
    func: &FuncPermission,
    f: &mut fmt::Formatter<'_>,
    seen: &mut HashSet<usize>,
) -> fmt::Result {
    write!(f, "{} ", print_base(func.base))?;
    if !func.receivers.is_empty() {
        write!(f, "(")?;
        for (i, r) in func.receivers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            print_rec(r, f, seen)?;
        }
        write!(f, ") ")?;
    }
    write!(f, "func")?;
    if let Some(name) = &func.name {
        write!(f, " {name}")?;
    }
    write!(f, "(")?;
    for (i, p) in func.params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        print_rec(p, f, seen)?;
    }
    write!(f, ")")?;
    if !func.results.is_empty() {
        write!(f, " (")?;
        for (i, r) in func.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            print_rec(r, f, seen)?;
        }
        write!(f, ")")?;
    }
    Ok(())
}
