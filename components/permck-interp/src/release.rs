//! Owners and borrows (§3.4, §9): the result of every expression evaluation carries at
//! most one owner plus any number of borrows, each remembering the identifier's effective
//! permission from just before it was demoted so that releasing it later restores exactly
//! that value rather than widening back to the binding's maximum.

use permck_core::{Permission, Store};

use crate::error::CheckError;

/// One demoted identifier: its name and the effective permission it held immediately
/// before being set to `Base(n)` (or otherwise narrowed) by the expression that is
/// borrowing or owning it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub prior: Permission,
}

pub type Owner = Option<Binding>;
pub type Borrows = Vec<Binding>;

/// Restore one binding's effective permission to what it was before demotion.
pub fn release_one(store: &Store, binding: &Binding) -> Result<Store, CheckError> {
    store
        .set_effective(&binding.name, binding.prior.clone())
        .map_err(CheckError::from)
}

pub fn release_borrows(mut store: Store, borrows: &[Binding]) -> Result<Store, CheckError> {
    for b in borrows {
        store = release_one(&store, b)?;
    }
    Ok(store)
}

/// Release an owner (if any) followed by every borrow — the uniform release routine
/// referenced throughout §4.4/§4.6.
pub fn release(store: Store, owner: &Owner, borrows: &[Binding]) -> Result<Store, CheckError> {
    let store = match owner {
        Some(b) => release_one(&store, b)?,
        None => store,
    };
    release_borrows(store, borrows)
}
