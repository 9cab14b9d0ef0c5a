//! The top-level entry point (§4.7): parse raw annotation text, seed a store from globals
//! and each function's declared signature, then check every function body in turn,
//! bailing out once too many errors have accumulated.

use std::cell::RefCell;

use permck_ast::{NodeId, Program, TypeInfo};
use permck_core::{Permission, Store};
use permck_util::{Map, Position};

use crate::config::CheckerConfig;
use crate::ctx::Ctx;
use crate::error::CheckError;
use crate::stmt::eval_block;

/// §6.4's `CheckResult`: the per-node permission map recorded during interpretation, the
/// `TypeInfo` the caller supplied (handed back for convenience, not owned), and the
/// accumulated errors — the first of which is the "primary" error callers are meant to
/// surface first.
pub struct CheckResult<'a> {
    pub permissions: Map<NodeId, Permission>,
    pub type_info: &'a dyn TypeInfo,
    pub errors: Vec<CheckError>,
}

impl<'a> CheckResult<'a> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first accumulated error, distinguished per §6.4's "first-error semantics" —
    /// the full list in `errors` remains available regardless.
    pub fn first_error(&self) -> Option<&CheckError> {
        self.errors.first()
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(funcs = program.funcs.len(), globals = program.globals.len()))]
pub fn check<'a>(
    program: &Program,
    raw_annotations: &Map<NodeId, (String, Position)>,
    positions: &Map<NodeId, Position>,
    type_info: &'a dyn TypeInfo,
    config: &CheckerConfig,
) -> CheckResult<'a> {
    let mut errors: Vec<CheckError> = Vec::new();
    let mut annotations: Map<NodeId, Permission> = Map::default();

    for (id, (text, pos)) in raw_annotations {
        match permck_core::parse(text) {
            Ok(perm) => {
                annotations.insert(*id, perm);
            }
            Err(e) => {
                tracing::debug!(position = %pos, "annotation parse error: {e}");
                errors.push(CheckError::Parse { reason: e.to_string(), position: Some(*pos) });
            }
        }
    }

    let mut global_store = Store::new();
    for global in &program.globals {
        global_store = match global_store.define(&global.name, global.perm.clone()) {
            Ok(s) => s,
            Err(e) => {
                errors.push(CheckError::from(e));
                continue;
            }
        };
    }

    let permissions = RefCell::new(Map::default());

    'funcs: for func in &program.funcs {
        if errors.len() >= config.max_accumulated_errors {
            tracing::debug!("bailing out after {} accumulated errors", errors.len());
            errors.push(CheckError::Bailout);
            break;
        }

        let mut store = global_store.begin_block();
        if let Some(recv) = &func.receiver {
            store = match store.define(&recv.name, recv.perm.clone()) {
                Ok(s) => s,
                Err(e) => {
                    errors.push(CheckError::from(e));
                    continue 'funcs;
                }
            };
        }
        for param in &func.params {
            store = match store.define(&param.name, param.perm.clone()) {
                Ok(s) => s,
                Err(e) => {
                    errors.push(CheckError::from(e));
                    continue 'funcs;
                }
            };
        }

        let ctx = Ctx {
            type_info,
            annotations: &annotations,
            positions,
            config,
            results: &func.results,
            permissions: &permissions,
        };

        if let Err(e) = eval_block(&ctx, store, &func.body) {
            tracing::debug!("function body check failed: {e}");
            errors.push(e);
        }
    }

    CheckResult { permissions: permissions.into_inner(), type_info, errors }
}
