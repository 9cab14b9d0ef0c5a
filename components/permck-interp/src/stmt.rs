//! `eval_stmt(store, stmt) -> list_of_exits` (§4.6): the statement interpreter, threading
//! the store through blocks and folding control-flow branches back together at the joins
//! an ordinary abstract interpreter needs — `if`/`switch`/`select` arms, loop bodies, and
//! same-function `goto`.

use permck_ast::{BranchKind, Expr, ExprKind, Stmt, StmtKind};
use permck_core::{Base, Permission, PermissionData, Store};
use permck_util::{Map, Position};

use crate::ctx::Ctx;
use crate::error::CheckError;
use crate::expr::{as_chan_element, eval_expr, require_read};
use crate::moveorcopy::move_or_copy;
use crate::release::{release, release_borrows, Borrows};

/// How control can leave a statement (§4.6). `Normal` stands for "fell through to the next
/// statement" as much as for falling off the end of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Normal,
    Return,
    Break(Option<String>),
    Continue(Option<String>),
    Goto(String),
    Fallthrough,
}

/// One of the ways a statement (or block) can finish, paired with the store at that exit.
#[derive(Debug, Clone)]
pub struct ExitPoint {
    pub exit: Exit,
    pub store: Store,
}

fn require_read_write(perm: &Permission, position: Option<Position>) -> Result<(), CheckError> {
    let b = perm.base();
    if b.has_read() && b.is_superset_of(Base::WRITE) {
        Ok(())
    } else {
        Err(CheckError::Permission { needed: Permission::base_of(Base::READ | Base::WRITE), have: perm.clone(), position })
    }
}

fn ident_name(e: &Expr) -> Option<&str> {
    match &e.kind {
        ExprKind::Ident(n) => Some(n.as_str()),
        _ => None,
    }
}

fn unwrap_paren(e: &Expr) -> &Expr {
    match &e.kind {
        ExprKind::Paren(inner) => unwrap_paren(inner),
        _ => e,
    }
}

/// Pop the frame opened around a branch/loop body from every exit's store, restoring the
/// enclosing scope (§4.3's `end_block`, applied uniformly at every control-flow join).
fn pop_block_exits(exits: Vec<ExitPoint>) -> Result<Vec<ExitPoint>, CheckError> {
    exits
        .into_iter()
        .map(|r| {
            let store = r.store.end_block().map_err(CheckError::from)?;
            Ok(ExitPoint { exit: r.exit, store })
        })
        .collect()
}

/// Evaluate a statement expected to produce exactly one `Normal` continuation — the shape
/// of `for`/`if`'s init and post clauses.
fn eval_single_normal(ctx: &Ctx, store: Store, stmt: &Stmt, own_label: Option<&str>) -> Result<Store, CheckError> {
    let mut results = eval_stmt_inner(ctx, store, stmt, own_label)?;
    if results.len() == 1 && results[0].exit == Exit::Normal {
        Ok(results.pop().unwrap().store)
    } else {
        Err(CheckError::Shape {
            reason: "unexpected control flow in this position".to_string(),
            position: ctx.position_of(stmt.id),
        })
    }
}

fn range_kv(p: &Permission) -> Option<(Permission, Permission)> {
    match &*p.data() {
        PermissionData::Array { element, .. } | PermissionData::Slice { element, .. } => {
            Some((Permission::base_of(Base::OWNED | Base::MUTABLE), element.clone()))
        }
        PermissionData::Map { key, value, .. } => Some((key.clone(), value.clone())),
        _ => None,
    }
}

fn bind_range_var(store: Store, var: Option<&Expr>, perm: Permission, define: bool) -> Result<Store, CheckError> {
    match var {
        None => Ok(store),
        Some(e) => {
            let name = ident_name(e)
                .ok_or_else(|| CheckError::Shape { reason: "range variable must be an identifier".to_string(), position: None })?;
            if define {
                store.define(name, perm).map_err(CheckError::from)
            } else {
                store.set_effective(name, perm).map_err(CheckError::from)
            }
        }
    }
}

/// Process statements in order, threading a single current store through `Normal`
/// continuations and collecting every other exit (including resolved same-block `goto`,
/// recursively re-entered at the label) as a separate result. A bounded step counter
/// (reusing `max_loop_iterations`) guarantees termination on a `goto` cycle.
fn eval_block_inner(ctx: &Ctx, store: Store, stmts: &[Stmt], own_label: Option<&str>, depth: usize) -> Result<Vec<ExitPoint>, CheckError> {
    if depth > ctx.config.max_loop_iterations {
        return Err(CheckError::IterationLimit { limit: ctx.config.max_loop_iterations, position: None });
    }

    let labels: Map<String, usize> = stmts
        .iter()
        .enumerate()
        .filter_map(|(i, s)| match &s.kind {
            StmtKind::Labeled(name, _) => Some((name.clone(), i)),
            _ => None,
        })
        .collect();

    let mut exits_acc: Vec<ExitPoint> = Vec::new();
    let mut current_store = store;

    for stmt in stmts {
        let results = eval_stmt_inner(ctx, current_store, stmt, own_label)?;
        let mut normals: Vec<Store> = Vec::new();

        for r in results {
            match &r.exit {
                Exit::Normal => normals.push(r.store),
                Exit::Goto(label) => match labels.get(label) {
                    Some(&target) => {
                        let sub = eval_block_inner(ctx, r.store, &stmts[target..], own_label, depth + 1)?;
                        exits_acc.extend(sub);
                    }
                    None => exits_acc.push(r),
                },
                _ => exits_acc.push(r),
            }
        }

        if normals.is_empty() {
            return Ok(exits_acc);
        }

        let mut merged = normals[0].clone();
        for s in &normals[1..] {
            merged = merged.merge(s).map_err(CheckError::from)?;
        }
        current_store = merged;
    }

    exits_acc.push(ExitPoint { exit: Exit::Normal, store: current_store });
    Ok(exits_acc)
}

pub fn eval_block(ctx: &Ctx, store: Store, stmts: &[Stmt]) -> Result<Vec<ExitPoint>, CheckError> {
    eval_block_inner(ctx, store, stmts, None, 0)
}

pub fn eval_stmt(ctx: &Ctx, store: Store, stmt: &Stmt) -> Result<Vec<ExitPoint>, CheckError> {
    eval_stmt_inner(ctx, store, stmt, None)
}

fn eval_go_defer(ctx: &Ctx, store: Store, e: &Expr, mode: permck_ast::CallMode, position: Option<Position>) -> Result<Vec<ExitPoint>, CheckError> {
    let inner = unwrap_paren(e);
    match &inner.kind {
        ExprKind::Call { func, args, .. } => {
            let call_expr = Expr { id: inner.id, kind: ExprKind::Call { func: func.clone(), args: args.clone(), mode } };
            let r = eval_expr(ctx, store, &call_expr)?;
            let store = release(r.store, &r.owner, &r.borrows)?;
            Ok(vec![ExitPoint { exit: Exit::Normal, store }])
        }
        _ => Err(CheckError::Shape { reason: "go/defer requires a function call".to_string(), position }),
    }
}

fn eval_stmt_inner(ctx: &Ctx, store: Store, stmt: &Stmt, own_label: Option<&str>) -> Result<Vec<ExitPoint>, CheckError> {
    let pos = ctx.position_of(stmt.id);
    tracing::trace!(node = stmt.id, store = %store, "eval_stmt");

    match &stmt.kind {
        StmtKind::Empty => Ok(vec![ExitPoint { exit: Exit::Normal, store }]),

        StmtKind::Labeled(name, inner) => eval_stmt_inner(ctx, store, inner, Some(name.as_str())),

        StmtKind::ExprStmt(e) => {
            let r = eval_expr(ctx, store, e)?;
            let store = release(r.store, &r.owner, &r.borrows)?;
            Ok(vec![ExitPoint { exit: Exit::Normal, store }])
        }

        StmtKind::IncDec(e, _op) => {
            let name = ident_name(e)
                .ok_or_else(|| CheckError::NotImplemented { what: "increment/decrement of a non-identifier".to_string(), position: pos })?;
            let perm = store
                .get_effective(name)
                .ok_or_else(|| CheckError::UnknownVariable { name: name.to_string(), position: pos })?;
            require_read_write(&perm, pos)?;
            Ok(vec![ExitPoint { exit: Exit::Normal, store }])
        }

        StmtKind::Send { chan, value } => {
            let rc = eval_expr(ctx, store, chan)?;
            require_read(&rc.perm, ctx.position_of(chan.id))?;
            let element = as_chan_element(&rc.perm).ok_or_else(|| CheckError::NotAChannel { found: rc.perm.clone(), position: pos })?;
            let store = release(rc.store, &rc.owner, &rc.borrows)?;

            let rv = eval_expr(ctx, store, value)?;
            let (store, residual_owner, residual_borrows) =
                move_or_copy(rv.store, &rv.perm, rv.owner, rv.borrows, &element, ctx.position_of(value.id))?;
            let mut borrows: Borrows = Vec::new();
            if let Some(o) = residual_owner {
                borrows.push(o);
            }
            borrows.extend(residual_borrows);
            let store = release_borrows(store, &borrows)?;
            Ok(vec![ExitPoint { exit: Exit::Normal, store }])
        }

        StmtKind::Assign { lhs, rhs, define } => eval_assign(ctx, store, lhs, rhs, *define, pos),

        StmtKind::Return(exprs) => {
            if exprs.len() != ctx.results.len() {
                return Err(CheckError::Shape {
                    reason: format!("expected {} return value(s), found {}", ctx.results.len(), exprs.len()),
                    position: pos,
                });
            }
            let mut store = store;
            let mut borrows: Borrows = Vec::new();
            for (e, target) in exprs.iter().zip(ctx.results.iter()) {
                let rv = eval_expr(ctx, store, e)?;
                let (s, residual_owner, residual_borrows) =
                    move_or_copy(rv.store, &rv.perm, rv.owner, rv.borrows, target, ctx.position_of(e.id))?;
                store = s;
                if let Some(o) = residual_owner {
                    borrows.push(o);
                }
                borrows.extend(residual_borrows);
            }
            store = release_borrows(store, &borrows)?;
            Ok(vec![ExitPoint { exit: Exit::Return, store }])
        }

        StmtKind::Branch(kind, label) => {
            let exit = match kind {
                BranchKind::Break => Exit::Break(label.clone()),
                BranchKind::Continue => Exit::Continue(label.clone()),
                BranchKind::Goto => Exit::Goto(
                    label
                        .clone()
                        .ok_or_else(|| CheckError::Shape { reason: "goto without a target label".to_string(), position: pos })?,
                ),
                BranchKind::Fallthrough => Exit::Fallthrough,
            };
            Ok(vec![ExitPoint { exit, store }])
        }

        StmtKind::Block(inner) => {
            let opened = store.begin_block();
            pop_block_exits(eval_block(ctx, opened, inner)?)
        }

        StmtKind::If { init, cond, then_body, else_body } => {
            let base_store = store.begin_block();
            let base_store = match init {
                Some(s) => eval_single_normal(ctx, base_store, s, own_label)?,
                None => base_store,
            };

            let rc = eval_expr(ctx, base_store, cond)?;
            require_read(&rc.perm, ctx.position_of(cond.id))?;
            let cond_store = release(rc.store, &rc.owner, &rc.borrows)?;

            let then_exits = pop_block_exits(eval_block(ctx, cond_store.begin_block(), then_body)?)?;
            let else_exits = match else_body {
                Some(body) => pop_block_exits(eval_block(ctx, cond_store.begin_block(), body)?)?,
                None => vec![ExitPoint { exit: Exit::Normal, store: cond_store }],
            };

            let mut all = then_exits;
            all.extend(else_exits);
            pop_block_exits(all)
        }

        StmtKind::Switch { init, tag, cases } => eval_switch(ctx, store, init.as_deref(), tag.as_ref(), cases, own_label, pos),

        StmtKind::Select { cases } => eval_select(ctx, store, cases, own_label),

        StmtKind::Range { key, value, define, collection, body } => {
            eval_range(ctx, store, key.as_ref(), value.as_ref(), *define, collection, body, own_label, pos)
        }

        StmtKind::For { init, cond, post, body } => eval_for(ctx, store, init.as_deref(), cond.as_ref(), post.as_deref(), body, own_label, pos),

        StmtKind::Go(e) => eval_go_defer(ctx, store, e, permck_ast::CallMode::Go, pos),
        StmtKind::Defer(e) => eval_go_defer(ctx, store, e, permck_ast::CallMode::Defer, pos),
    }
}

fn eval_assign(ctx: &Ctx, store: Store, lhs: &[Expr], rhs: &[Expr], define: bool, pos: Option<Position>) -> Result<Vec<ExitPoint>, CheckError> {
    if lhs.len() != rhs.len() {
        return Err(CheckError::Shape { reason: "mismatched assignment list lengths".to_string(), position: pos });
    }

    let mut store = store;
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let rv = eval_expr(ctx, store, r)?;
        let name = ident_name(l).ok_or_else(|| {
            if define {
                CheckError::Shape { reason: "`:=` target must be an identifier".to_string(), position: ctx.position_of(l.id) }
            } else {
                CheckError::NotImplemented { what: "assignment to a non-identifier target".to_string(), position: ctx.position_of(l.id) }
            }
        })?;

        if define {
            let declared = ctx.annotations.get(&l.id).cloned().unwrap_or_else(|| rv.perm.clone());
            let (s, residual_owner, residual_borrows) =
                move_or_copy(rv.store, &rv.perm, rv.owner, rv.borrows, &declared, ctx.position_of(l.id))?;
            let s = s.define(name, declared).map_err(CheckError::from)?;
            store = release(s, &residual_owner, &residual_borrows)?;
        } else {
            let target_perm = store
                .get_maximum(name)
                .ok_or_else(|| CheckError::UnknownVariable { name: name.to_string(), position: ctx.position_of(l.id) })?;
            let (s, residual_owner, residual_borrows) =
                move_or_copy(rv.store, &rv.perm, rv.owner, rv.borrows, &target_perm, ctx.position_of(l.id))?;
            let s = s.set_effective(name, target_perm).map_err(CheckError::from)?;
            store = release(s, &residual_owner, &residual_borrows)?;
        }
    }
    Ok(vec![ExitPoint { exit: Exit::Normal, store }])
}

fn eval_switch(
    ctx: &Ctx,
    store: Store,
    init: Option<&Stmt>,
    tag: Option<&Expr>,
    cases: &[permck_ast::CaseClause],
    own_label: Option<&str>,
    pos: Option<Position>,
) -> Result<Vec<ExitPoint>, CheckError> {
    let base_store = store.begin_block();
    let base_store = match init {
        Some(s) => eval_single_normal(ctx, base_store, s, own_label)?,
        None => base_store,
    };

    let tag_store = match tag {
        Some(t) => {
            let rt = eval_expr(ctx, base_store, t)?;
            require_read(&rt.perm, ctx.position_of(t.id))?;
            release(rt.store, &rt.owner, &rt.borrows)?
        }
        None => base_store,
    };

    let mut all_exits: Vec<ExitPoint> = Vec::new();
    let has_default = cases.iter().any(|c| c.exprs.is_empty());

    for (i, case) in cases.iter().enumerate() {
        let mut cstore = tag_store.clone();
        for e in &case.exprs {
            let re = eval_expr(ctx, cstore, e)?;
            require_read(&re.perm, ctx.position_of(e.id))?;
            cstore = release(re.store, &re.owner, &re.borrows)?;
        }

        let exits = pop_block_exits(eval_block(ctx, cstore.begin_block(), &case.body)?)?;
        for r in exits {
            if r.exit == Exit::Fallthrough {
                match cases.get(i + 1) {
                    Some(next) => {
                        let chained = pop_block_exits(eval_block(ctx, r.store.begin_block(), &next.body)?)?;
                        all_exits.extend(chained);
                    }
                    None => return Err(CheckError::Shape { reason: "fallthrough in the last case".to_string(), position: pos }),
                }
            } else if let Exit::Break(label) = &r.exit {
                if label.is_none() || label.as_deref() == own_label {
                    all_exits.push(ExitPoint { exit: Exit::Normal, store: r.store });
                } else {
                    all_exits.push(r);
                }
            } else {
                all_exits.push(r);
            }
        }
    }

    if !has_default {
        all_exits.push(ExitPoint { exit: Exit::Normal, store: tag_store });
    }

    pop_block_exits(all_exits)
}

fn eval_select(ctx: &Ctx, store: Store, cases: &[permck_ast::CommClause], own_label: Option<&str>) -> Result<Vec<ExitPoint>, CheckError> {
    let mut all_exits: Vec<ExitPoint> = Vec::new();
    for case in cases {
        let case_store = match &case.comm {
            Some(comm_stmt) => eval_single_normal(ctx, store.clone(), comm_stmt, own_label)?,
            None => store.clone(),
        };
        let exits = pop_block_exits(eval_block(ctx, case_store.begin_block(), &case.body)?)?;
        for r in exits {
            if let Exit::Break(label) = &r.exit {
                if label.is_none() || label.as_deref() == own_label {
                    all_exits.push(ExitPoint { exit: Exit::Normal, store: r.store });
                    continue;
                }
            }
            all_exits.push(r);
        }
    }
    Ok(all_exits)
}

fn eval_for(
    ctx: &Ctx,
    store: Store,
    init: Option<&Stmt>,
    cond: Option<&Expr>,
    post: Option<&Stmt>,
    body: &[Stmt],
    own_label: Option<&str>,
    pos: Option<Position>,
) -> Result<Vec<ExitPoint>, CheckError> {
    let base = store.begin_block();
    let mut cur = match init {
        Some(s) => eval_single_normal(ctx, base, s, own_label)?,
        None => base,
    };

    let mut seen: Vec<Store> = Vec::new();
    let mut collected: Vec<ExitPoint> = Vec::new();
    let mut exited = false;

    for _ in 0..ctx.config.max_loop_iterations {
        let continue_store = match cond {
            Some(c) => {
                let rc = eval_expr(ctx, cur.clone(), c)?;
                require_read(&rc.perm, ctx.position_of(c.id))?;
                release(rc.store, &rc.owner, &rc.borrows)?
            }
            None => cur.clone(),
        };

        if seen.iter().any(|s| s.equal(&continue_store)) {
            collected.push(ExitPoint { exit: Exit::Normal, store: continue_store });
            exited = true;
            break;
        }
        seen.push(continue_store.clone());

        let exits = pop_block_exits(eval_block(ctx, continue_store.begin_block(), body)?)?;
        let mut next_iter: Vec<Store> = Vec::new();
        for r in exits {
            match &r.exit {
                Exit::Normal => next_iter.push(r.store),
                Exit::Continue(label) if label.is_none() || label.as_deref() == own_label => next_iter.push(r.store),
                Exit::Break(label) if label.is_none() || label.as_deref() == own_label => {
                    collected.push(ExitPoint { exit: Exit::Normal, store: r.store })
                }
                _ => collected.push(r),
            }
        }

        if next_iter.is_empty() {
            exited = true;
            break;
        }
        let mut merged = next_iter[0].clone();
        for s in &next_iter[1..] {
            merged = merged.merge(s).map_err(CheckError::from)?;
        }
        cur = match post {
            Some(p) => eval_single_normal(ctx, merged, p, own_label)?,
            None => merged,
        };
    }

    if !exited {
        return Err(CheckError::IterationLimit { limit: ctx.config.max_loop_iterations, position: pos });
    }

    pop_block_exits(collected)
}

#[allow(clippy::too_many_arguments)]
fn eval_range(
    ctx: &Ctx,
    store: Store,
    key: Option<&Expr>,
    value: Option<&Expr>,
    define: bool,
    collection: &Expr,
    body: &[Stmt],
    own_label: Option<&str>,
    pos: Option<Position>,
) -> Result<Vec<ExitPoint>, CheckError> {
    let rc = eval_expr(ctx, store, collection)?;
    require_read(&rc.perm, ctx.position_of(collection.id))?;

    let (key_perm, elem_perm) = range_kv(&rc.perm)
        .ok_or_else(|| CheckError::Shape { reason: format!("cannot range over `{}`", rc.perm), position: ctx.position_of(collection.id) })?;

    // An owned key or value binding keeps the collection alive for as long as the loop
    // runs (§4.6); only a non-owning binding releases it once the loop exits.
    let releases_collection = !(key_perm.base().has_owned() || elem_perm.base().has_owned());

    let base = rc.store.begin_block();
    let base = bind_range_var(base, key, key_perm, define)?;
    let base = bind_range_var(base, value, elem_perm, define)?;

    let mut seen: Vec<Store> = Vec::new();
    let mut collected: Vec<ExitPoint> = Vec::new();
    let mut exited = false;
    let mut cur = base;

    for _ in 0..ctx.config.max_loop_iterations {
        if seen.iter().any(|s| s.equal(&cur)) {
            collected.push(ExitPoint { exit: Exit::Normal, store: cur });
            exited = true;
            break;
        }
        seen.push(cur.clone());

        let exits = pop_block_exits(eval_block(ctx, cur.clone().begin_block(), body)?)?;
        let mut next: Vec<Store> = Vec::new();
        for r in exits {
            match &r.exit {
                Exit::Normal => next.push(r.store),
                Exit::Continue(label) if label.is_none() || label.as_deref() == own_label => next.push(r.store),
                Exit::Break(label) if label.is_none() || label.as_deref() == own_label => {
                    collected.push(ExitPoint { exit: Exit::Normal, store: r.store })
                }
                _ => collected.push(r),
            }
        }

        if next.is_empty() {
            exited = true;
            break;
        }
        let mut merged = next[0].clone();
        for s in &next[1..] {
            merged = merged.merge(s).map_err(CheckError::from)?;
        }
        cur = merged;
    }

    if !exited {
        return Err(CheckError::IterationLimit { limit: ctx.config.max_loop_iterations, position: pos });
    }

    let collected = if releases_collection {
        collected
            .into_iter()
            .map(|r| Ok(ExitPoint { exit: r.exit, store: release(r.store, &rc.owner, &rc.borrows)? }))
            .collect::<Result<Vec<_>, CheckError>>()?
    } else {
        collected
    };

    pop_block_exits(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use permck_ast::StubTypeInfo;
    use permck_core::parse::parse;
    use permck_util::Map as UMap;
    use std::cell::RefCell;

    #[allow(clippy::too_many_arguments)]
    fn ctx_fixture<'a>(
        type_info: &'a StubTypeInfo,
        annotations: &'a UMap<permck_ast::NodeId, Permission>,
        positions: &'a UMap<permck_ast::NodeId, Position>,
        config: &'a crate::config::CheckerConfig,
        results: &'a [Permission],
        permissions: &'a RefCell<UMap<permck_ast::NodeId, Permission>>,
    ) -> Ctx<'a> {
        Ctx { type_info, annotations, positions, config, results, permissions }
    }

    #[test]
    fn inc_dec_requires_read_write() {
        let type_info = StubTypeInfo::default();
        let annotations = UMap::default();
        let positions = UMap::default();
        let config = crate::config::CheckerConfig::default();
        let results: Vec<Permission> = Vec::new();
        let permissions = RefCell::new(UMap::default());
        let ctx = ctx_fixture(&type_info, &annotations, &positions, &config, &results, &permissions);

        let store = Store::new().define("a", parse("om").unwrap()).unwrap();
        let stmt = Stmt { id: 0, kind: StmtKind::IncDec(Expr { id: 1, kind: ExprKind::Ident("a".to_string()) }, permck_ast::IncDecOp::Inc) };
        let exits = eval_stmt(&ctx, store, &stmt).unwrap();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].exit, Exit::Normal);
    }

    #[test]
    fn plain_return_moves_into_result_permission() {
        let type_info = StubTypeInfo::default();
        let annotations = UMap::default();
        let positions = UMap::default();
        let config = crate::config::CheckerConfig::default();
        let results = vec![parse("om").unwrap()];
        let permissions = RefCell::new(UMap::default());
        let ctx = ctx_fixture(&type_info, &annotations, &positions, &config, &results, &permissions);

        let store = Store::new().define("a", parse("om").unwrap()).unwrap();
        let stmt = Stmt { id: 0, kind: StmtKind::Return(vec![Expr { id: 1, kind: ExprKind::Ident("a".to_string()) }]) };
        let exits = eval_stmt(&ctx, store, &stmt).unwrap();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].exit, Exit::Return);
    }

    #[test]
    fn return_arity_mismatch_is_a_shape_error() {
        let type_info = StubTypeInfo::default();
        let annotations = UMap::default();
        let positions = UMap::default();
        let config = crate::config::CheckerConfig::default();
        let results: Vec<Permission> = Vec::new();
        let permissions = RefCell::new(UMap::default());
        let ctx = ctx_fixture(&type_info, &annotations, &positions, &config, &results, &permissions);

        let store = Store::new().define("a", parse("om").unwrap()).unwrap();
        let stmt = Stmt { id: 0, kind: StmtKind::Return(vec![Expr { id: 1, kind: ExprKind::Ident("a".to_string()) }]) };
        assert!(matches!(eval_stmt(&ctx, store, &stmt), Err(CheckError::Shape { .. })));
    }

    #[test]
    fn non_converging_loop_hits_the_iteration_cap() {
        let type_info = StubTypeInfo::default();
        let annotations = UMap::default();
        let positions = UMap::default();
        let mut config = crate::config::CheckerConfig::default();
        config.max_loop_iterations = 1;
        let results: Vec<Permission> = Vec::new();
        let permissions = RefCell::new(UMap::default());
        let ctx = ctx_fixture(&type_info, &annotations, &positions, &config, &results, &permissions);

        let store = Store::new();
        let stmt = Stmt {
            id: 0,
            kind: StmtKind::For { init: None, cond: None, post: None, body: Vec::new() },
        };
        assert!(matches!(eval_stmt(&ctx, store, &stmt), Err(CheckError::IterationLimit { limit: 1, .. })));
    }
}
