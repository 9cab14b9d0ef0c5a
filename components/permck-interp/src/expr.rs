//! `eval_expr(store, expr) -> (permission, owner, borrows, store')` (§4.4): the symbolic
//! evaluator for every expression kind the minimal surface AST knows about.

use permck_ast::{BinOp, CallMode, Expr, ExprKind, UnaryOp};
use permck_core::{Base, FuncPermission, Permission, PermissionData, Store};
use permck_util::Position;

use crate::ctx::Ctx;
use crate::error::CheckError;
use crate::moveorcopy::move_or_copy;
use crate::release::{release, release_borrows, Binding, Borrows, Owner};

pub struct EvalResult {
    pub perm: Permission,
    pub owner: Owner,
    pub borrows: Borrows,
    pub store: Store,
}

fn literal_base() -> Base {
    Base::OWNED | Base::MUTABLE
}

pub(crate) fn require_read(perm: &Permission, position: Option<Position>) -> Result<(), CheckError> {
    if perm.base().has_read() {
        Ok(())
    } else {
        Err(CheckError::Permission { needed: Permission::base_of(Base::READ), have: perm.clone(), position })
    }
}

pub(crate) fn as_pointer_target(p: &Permission) -> Option<Permission> {
    match &*p.data() {
        PermissionData::Pointer { target, .. } => Some(target.clone()),
        _ => None,
    }
}

pub(crate) fn as_chan_element(p: &Permission) -> Option<Permission> {
    match &*p.data() {
        PermissionData::Chan { element, .. } => Some(element.clone()),
        _ => None,
    }
}

pub(crate) fn as_array_or_slice_element(p: &Permission) -> Option<Permission> {
    match &*p.data() {
        PermissionData::Array { element, .. } | PermissionData::Slice { element, .. } => Some(element.clone()),
        _ => None,
    }
}

pub(crate) fn as_map_kv(p: &Permission) -> Option<(Permission, Permission)> {
    match &*p.data() {
        PermissionData::Map { key, value, .. } => Some((key.clone(), value.clone())),
        _ => None,
    }
}

pub(crate) fn as_struct_fields(p: &Permission) -> Option<Vec<Permission>> {
    match &*p.data() {
        PermissionData::Struct { fields, .. } => Some(fields.clone()),
        _ => None,
    }
}

fn as_func(p: &Permission) -> Option<FuncPermission> {
    match &*p.data() {
        PermissionData::Func(f) => Some(f.clone()),
        _ => None,
    }
}

fn as_interface_methods(p: &Permission) -> Option<Vec<FuncPermission>> {
    match &*p.data() {
        PermissionData::Interface { methods, .. } => Some(methods.clone()),
        _ => None,
    }
}

pub fn eval_expr(ctx: &Ctx, store: Store, expr: &Expr) -> Result<EvalResult, CheckError> {
    let result = eval_expr_kind(ctx, store, expr)?;
    tracing::trace!(node = expr.id, perm = %result.perm, "eval_expr");
    ctx.record(expr.id, &result.perm);
    Ok(result)
}

fn eval_expr_kind(ctx: &Ctx, store: Store, expr: &Expr) -> Result<EvalResult, CheckError> {
    let pos = ctx.position_of(expr.id);
    match &expr.kind {
        ExprKind::IntLit(_) | ExprKind::BoolLit(_) => Ok(EvalResult {
            perm: Permission::base_of(literal_base()),
            owner: None,
            borrows: Vec::new(),
            store,
        }),

        ExprKind::Nil => Ok(EvalResult { perm: Permission::nil(), owner: None, borrows: Vec::new(), store }),

        ExprKind::Ident(name) => {
            let prior = store
                .get_effective(name)
                .ok_or_else(|| CheckError::UnknownVariable { name: name.clone(), position: pos })?;
            let store = store
                .set_effective(name, Permission::base_of(Base::NONE))
                .map_err(CheckError::from)?;
            Ok(EvalResult {
                perm: prior.clone(),
                owner: Some(Binding { name: name.clone(), prior }),
                borrows: Vec::new(),
                store,
            })
        }

        ExprKind::Paren(inner) => eval_expr(ctx, store, inner),

        ExprKind::Unary(op, x) => eval_unary(ctx, store, *op, x, pos),

        ExprKind::Binary(op, l, r) => eval_binary(ctx, store, *op, l, r),

        ExprKind::Index(a, b) => eval_index(ctx, store, a, b, pos),

        ExprKind::Slice { base, lo, hi, max } => eval_slice(ctx, store, base, lo.as_deref(), hi.as_deref(), max.as_deref(), pos),

        ExprKind::Selector(a, _name) => eval_selector(ctx, store, expr.id, a, pos),

        ExprKind::Call { func, args, mode } => eval_call(ctx, store, expr.id, func, args, *mode, pos),

        ExprKind::CompositeLit { ty_perm, elements } => eval_composite_lit(ctx, store, expr.id, ty_perm, elements, pos),

        ExprKind::FuncLit => Err(CheckError::NotImplemented { what: "function literal".to_string(), position: pos }),

        ExprKind::TypeAssert(_) => Err(CheckError::NotImplemented { what: "type assertion".to_string(), position: pos }),
    }
}

fn eval_unary(ctx: &Ctx, store: Store, op: UnaryOp, x: &Expr, pos: Option<Position>) -> Result<EvalResult, CheckError> {
    let rx = eval_expr(ctx, store, x)?;
    require_read(&rx.perm, ctx.position_of(x.id))?;

    match op {
        UnaryOp::Deref => {
            let target = as_pointer_target(&rx.perm)
                .ok_or_else(|| CheckError::NotAPointer { found: rx.perm.clone(), position: pos })?;
            Ok(EvalResult { perm: target, owner: rx.owner, borrows: rx.borrows, store: rx.store })
        }
        UnaryOp::Addr => {
            let perm = Permission::new(PermissionData::Pointer { base: literal_base(), target: rx.perm.clone() });
            Ok(EvalResult { perm, owner: rx.owner, borrows: rx.borrows, store: rx.store })
        }
        UnaryOp::Recv => {
            let element = as_chan_element(&rx.perm)
                .ok_or_else(|| CheckError::NotAChannel { found: rx.perm.clone(), position: pos })?;
            let store = release(rx.store, &rx.owner, &rx.borrows)?;
            Ok(EvalResult { perm: element, owner: None, borrows: Vec::new(), store })
        }
        UnaryOp::Other => {
            let store = release(rx.store, &rx.owner, &rx.borrows)?;
            Ok(EvalResult { perm: Permission::base_of(literal_base()), owner: None, borrows: Vec::new(), store })
        }
    }
}

fn eval_binary(ctx: &Ctx, store: Store, op: BinOp, l: &Expr, r: &Expr) -> Result<EvalResult, CheckError> {
    let rl = eval_expr(ctx, store, l)?;
    require_read(&rl.perm, ctx.position_of(l.id))?;
    let store_after_lhs = release(rl.store, &rl.owner, &rl.borrows)?;

    let rr = eval_expr(ctx, store_after_lhs.clone(), r)?;
    require_read(&rr.perm, ctx.position_of(r.id))?;
    let store_after_both = release(rr.store, &rr.owner, &rr.borrows)?;

    let result_store = match op {
        BinOp::LogicalAnd | BinOp::LogicalOr => store_after_lhs.merge(&store_after_both).map_err(CheckError::from)?,
        BinOp::Other => store_after_both,
    };

    Ok(EvalResult { perm: Permission::base_of(literal_base()), owner: None, borrows: Vec::new(), store: result_store })
}

fn eval_index(ctx: &Ctx, store: Store, a: &Expr, b: &Expr, pos: Option<Position>) -> Result<EvalResult, CheckError> {
    let ra = eval_expr(ctx, store, a)?;
    require_read(&ra.perm, ctx.position_of(a.id))?;
    let rb = eval_expr(ctx, ra.store, b)?;
    require_read(&rb.perm, ctx.position_of(b.id))?;

    if let Some(element) = as_array_or_slice_element(&ra.perm) {
        let store = release(rb.store, &rb.owner, &rb.borrows)?;
        return Ok(EvalResult { perm: element, owner: ra.owner, borrows: ra.borrows, store });
    }

    if let Some((key_perm, value_perm)) = as_map_kv(&ra.perm) {
        let (store, residual_owner, residual_borrows) =
            move_or_copy(rb.store, &rb.perm, rb.owner, rb.borrows, &key_perm, ctx.position_of(b.id))?;
        let mut borrows = ra.borrows;
        if let Some(o) = residual_owner {
            borrows.push(o);
        }
        borrows.extend(residual_borrows);
        return Ok(EvalResult { perm: value_perm, owner: ra.owner, borrows, store });
    }

    Err(CheckError::Shape { reason: format!("cannot index into `{}`", ra.perm), position: pos })
}

fn eval_slice(
    ctx: &Ctx,
    store: Store,
    a: &Expr,
    lo: Option<&Expr>,
    hi: Option<&Expr>,
    max: Option<&Expr>,
    pos: Option<Position>,
) -> Result<EvalResult, CheckError> {
    let ra = eval_expr(ctx, store, a)?;
    require_read(&ra.perm, ctx.position_of(a.id))?;

    let mut store = ra.store;
    for part in [lo, hi, max] {
        if let Some(e) = part {
            let r = eval_expr(ctx, store, e)?;
            require_read(&r.perm, ctx.position_of(e.id))?;
            store = release(r.store, &r.owner, &r.borrows)?;
        }
    }

    let element = as_array_or_slice_element(&ra.perm)
        .ok_or_else(|| CheckError::Shape { reason: format!("cannot slice `{}`", ra.perm), position: pos })?;
    let perm = Permission::new(PermissionData::Slice { base: ra.perm.base(), element });
    Ok(EvalResult { perm, owner: ra.owner, borrows: ra.borrows, store })
}

fn eval_selector(ctx: &Ctx, store: Store, selector_id: u32, a: &Expr, pos: Option<Position>) -> Result<EvalResult, CheckError> {
    use permck_ast::SelectionKind;

    let ra = eval_expr(ctx, store, a)?;
    let selection = ctx
        .type_info
        .selection(selector_id)
        .ok_or_else(|| CheckError::Shape { reason: "no selection recorded for this selector".to_string(), position: pos })?
        .clone();

    let mut cur = ra.perm.clone();
    for &idx in &selection.index_path {
        if let Some(target) = as_pointer_target(&cur) {
            cur = target;
        }
        let fields = as_struct_fields(&cur).ok_or_else(|| CheckError::NotAStruct { found: cur.clone(), position: pos })?;
        cur = fields
            .get(idx)
            .cloned()
            .ok_or_else(|| CheckError::Shape { reason: format!("field index {idx} out of range"), position: pos })?;
    }

    match &selection.kind {
        SelectionKind::Field => Ok(EvalResult { perm: cur, owner: ra.owner, borrows: ra.borrows, store: ra.store }),

        SelectionKind::MethodValue(name) => {
            let methods = as_interface_methods(&cur).ok_or_else(|| CheckError::NotAFunction { found: cur.clone(), position: pos })?;
            let method = methods
                .iter()
                .find(|m| m.name.as_deref() == Some(name.as_str()))
                .cloned()
                .ok_or_else(|| CheckError::Shape { reason: format!("no method named `{name}`"), position: pos })?;
            let receiver_to = method
                .receivers
                .first()
                .cloned()
                .ok_or_else(|| CheckError::Shape { reason: format!("method `{name}` declares no receiver"), position: pos })?;
            let (store, _owner, _borrows) = move_or_copy(ra.store, &cur, ra.owner, ra.borrows, &receiver_to, pos)?;
            let mut result = Permission::new(PermissionData::Func(FuncPermission {
                base: method.base,
                name: method.name.clone(),
                receivers: Vec::new(),
                params: method.params.clone(),
                results: method.results.clone(),
            }));
            if !receiver_to.base().has_owned() {
                result = result.func_without_owned();
            }
            Ok(EvalResult { perm: result, owner: None, borrows: Vec::new(), store })
        }

        SelectionKind::MethodExpr(name) => {
            let methods = as_interface_methods(&cur).ok_or_else(|| CheckError::NotAFunction { found: cur.clone(), position: pos })?;
            let method = methods
                .iter()
                .find(|m| m.name.as_deref() == Some(name.as_str()))
                .cloned()
                .ok_or_else(|| CheckError::Shape { reason: format!("no method named `{name}`"), position: pos })?;
            let mut params = Vec::with_capacity(method.params.len() + 1);
            if let Some(recv) = method.receivers.first() {
                params.push(recv.clone());
            }
            params.extend(method.params.clone());
            let result = Permission::new(PermissionData::Func(FuncPermission {
                base: method.base,
                name: method.name.clone(),
                receivers: Vec::new(),
                params,
                results: method.results.clone(),
            }));
            let store = release(ra.store, &ra.owner, &ra.borrows)?;
            Ok(EvalResult { perm: result, owner: None, borrows: Vec::new(), store })
        }
    }
}

fn eval_call(
    ctx: &Ctx,
    store: Store,
    call_id: u32,
    func: &Expr,
    args: &[Expr],
    mode: CallMode,
    pos: Option<Position>,
) -> Result<EvalResult, CheckError> {
    let rf = eval_expr(ctx, store, func)?;
    let f = as_func(&rf.perm).ok_or_else(|| CheckError::NotAFunction { found: rf.perm.clone(), position: ctx.position_of(func.id) })?;

    if args.len() != f.params.len() {
        return Err(CheckError::Shape {
            reason: format!("expected {} argument(s), found {}", f.params.len(), args.len()),
            position: ctx.position_of(call_id),
        });
    }

    let mut store = rf.store;
    let mut accumulated: Borrows = Vec::new();
    for (i, arg_expr) in args.iter().enumerate() {
        let ra = eval_expr(ctx, store, arg_expr)?;
        let (s, residual_owner, residual_borrows) =
            move_or_copy(ra.store, &ra.perm, ra.owner, ra.borrows, &f.params[i], ctx.position_of(arg_expr.id))?;
        store = s;
        if let Some(o) = residual_owner {
            accumulated.push(o);
        }
        accumulated.extend(residual_borrows);
    }

    match mode {
        CallMode::Regular => {
            store = release_borrows(store, &accumulated)?;
            store = release(store, &rf.owner, &rf.borrows)?;
            let perm = if f.results.len() == 1 {
                f.results[0].clone()
            } else {
                Permission::new(PermissionData::Tuple { base: literal_base(), elements: f.results.clone() })
            };
            Ok(EvalResult { perm, owner: None, borrows: Vec::new(), store })
        }
        CallMode::Defer | CallMode::Go => {
            let mut borrows = rf.borrows;
            borrows.extend(accumulated);
            Ok(EvalResult { perm: Permission::base_of(literal_base()), owner: rf.owner, borrows, store })
        }
    }
}

fn eval_composite_lit(
    ctx: &Ctx,
    store: Store,
    node_id: u32,
    ty_perm: &Permission,
    elements: &[permck_ast::CompositeElem],
    pos: Option<Position>,
) -> Result<EvalResult, CheckError> {
    let fields = as_struct_fields(ty_perm).ok_or_else(|| CheckError::NotAStruct { found: ty_perm.clone(), position: pos })?;

    let mut store = store;
    let mut borrows: Borrows = Vec::new();
    let mut next_positional = 0usize;

    for elem in elements {
        let idx = match &elem.key {
            Some(name) => {
                let names = ctx
                    .type_info
                    .struct_fields(node_id)
                    .ok_or_else(|| CheckError::Shape { reason: "no field names known for this composite literal".to_string(), position: pos })?;
                names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| CheckError::Shape { reason: format!("no field named `{name}`"), position: pos })?
            }
            None => {
                let i = next_positional;
                next_positional += 1;
                i
            }
        };
        let field_perm = fields
            .get(idx)
            .cloned()
            .ok_or_else(|| CheckError::Shape { reason: format!("field index {idx} out of range"), position: pos })?;

        let rv = eval_expr(ctx, store, &elem.value)?;
        let (s, residual_owner, residual_borrows) =
            move_or_copy(rv.store, &rv.perm, rv.owner, rv.borrows, &field_perm, ctx.position_of(elem.value.id))?;
        store = s;
        if let Some(o) = residual_owner {
            borrows.push(o);
        }
        borrows.extend(residual_borrows);
    }

    Ok(EvalResult { perm: ty_perm.clone(), owner: None, borrows, store })
}
