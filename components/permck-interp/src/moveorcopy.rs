//! The move-or-copy rule (§4.5): given a source value (with its owner/borrows) being
//! placed into a destination expecting permission `to`, decide which of the five cases
//! applies and thread the store accordingly.

use permck_core::algebra::{can_copy, can_move};
use permck_core::Permission;
use permck_util::Position;

use crate::error::CheckError;
use crate::release::{release, release_borrows, Borrows, Owner};
use permck_core::Store;

#[tracing::instrument(level = "debug", skip(store, owner, borrows), fields(from = %from, to = %to))]
pub fn move_or_copy(
    store: Store,
    from: &Permission,
    owner: Owner,
    borrows: Borrows,
    to: &Permission,
    position: Option<Position>,
) -> Result<(Store, Owner, Borrows), CheckError> {
    // Case 1: a plain copy releases everything; the result has no owner and no borrows.
    if can_copy(from, to) {
        tracing::debug!("case 1: copy");
        let store = release(store, &owner, &borrows)?;
        return Ok((store, None, Vec::new()));
    }

    if !can_move(from, to) {
        tracing::debug!("neither move nor copy applies");
        return Err(CheckError::MoveCopy { from: from.clone(), to: to.clone(), position });
    }

    // Case 3: destination is unowned — the owner/borrows survive as residual borrows,
    // released later by the surrounding statement.
    if !to.base().has_owned() {
        tracing::debug!("case 3: unowned destination, owner/borrows survive as residual");
        return Ok((store, owner, borrows));
    }

    // Case 4: a linear source frozen into a non-linear destination. Strip {W, w, r} from
    // the owner's *stored* permission (not the value just evaluated) and release as usual;
    // no residual survives since the freeze is permanent.
    if from.is_linear() && !to.is_linear() {
        tracing::debug!("case 4: freezing linear owner into non-linear destination");
        let store = match &owner {
            Some(binding) => {
                let frozen = from.with_base(from.base().strip_exclusive_after_demotion());
                store
                    .set_effective(&binding.name, frozen)
                    .map_err(CheckError::from)?
            }
            None => store,
        };
        let store = release_borrows(store, &borrows)?;
        return Ok((store, None, Vec::new()));
    }

    // Case 5: fully moved. The store already holds `Base(n)` for the owner/borrow
    // identifiers (set when they were demoted) — nothing to release.
    Ok((store, None, Vec::new()))
}
