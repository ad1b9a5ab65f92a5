//! Generic record operations shared by leads, customers, deals and tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::{
    database::{fetch, patch_fields, select, write_one, Document, Store, Write},
    error::{CrmError, CrmResult},
    libs::{gen_id, now},
    perm::{can_access, resolve_assignee, restrict_patch, roles::Actor, Action, Owned, Reassignable, Scope},
};

/// A stored entity governed by ownership.
pub trait Record: Document + Owned + Clone {}

impl<T: Document + Owned + Clone> Record for T {}

/// Create request for a [`Record`].
pub trait Draft {
    type Output: Record;

    fn requested_assignee(&self) -> Option<&str>;

    /// Validates the request and builds the record to insert.
    fn build(
        self,
        id: String,
        assigned_to: String,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> CrmResult<Self::Output>;
}

/// Update request for a [`Record`].
pub trait Patch: Serialize + Reassignable {
    type Target: Record;

    /// Rejects patches conflicting with the current state.
    fn check(&self, _current: &Self::Target) -> CrmResult<()> {
        Ok(())
    }
}

pub fn not_found<E: Owned>() -> CrmError {
    CrmError::not_found(format!("{} not found", E::NAME))
}

/// Loads a record without any visibility check.
pub fn load<E: Record>(store: &dyn Store, id: &str) -> CrmResult<E> {
    fetch::<E>(store, id)?.ok_or_else(not_found::<E>)
}

/// Every record of the kind visible to `actor`.
pub fn list<E: Record>(store: &dyn Store, actor: &Actor) -> CrmResult<Vec<E>> {
    Ok(select::<E>(store, &Scope::of(actor).filter())?)
}

pub fn get<E: Record>(store: &dyn Store, actor: &Actor, id: &str) -> CrmResult<E> {
    let record = load::<E>(store, id)?;
    can_access(actor, &record, Action::Read)?;
    Ok(record)
}

pub fn create<D: Draft>(store: &dyn Store, actor: &Actor, draft: D) -> CrmResult<D::Output> {
    let assigned_to = resolve_assignee::<D::Output>(actor, draft.requested_assignee())?;
    let record = draft.build(gen_id(), assigned_to, actor, now())?;
    write_one(store, Write::insert(&record)?)?;
    tracing::info!(kind = <D::Output as Owned>::NAME, id = record.id(), actor = %actor.id, "record created");
    Ok(record)
}

pub fn update<P: Patch>(
    store: &dyn Store,
    actor: &Actor,
    id: &str,
    mut patch: P,
) -> CrmResult<P::Target> {
    let current = load::<P::Target>(store, id)?;
    can_access(actor, &current, Action::Update)?;
    restrict_patch(actor, &mut patch);
    patch.check(&current)?;
    let mut set = patch_fields(&patch)?;
    set.insert("updatedAt".into(), serde_json::to_value(now())?);
    write_one(store, Write::update::<P::Target>(id, set))?;
    load::<P::Target>(store, id)
}

pub fn remove<E: Record>(store: &dyn Store, actor: &Actor, id: &str) -> CrmResult<E> {
    let record = load::<E>(store, id)?;
    can_access(actor, &record, Action::Delete)?;
    write_one(store, Write::delete::<E>(id))?;
    tracing::info!(kind = E::NAME, id, actor = %actor.id, "record deleted");
    Ok(record)
}

/// Newest first by the given timestamp field.
pub fn sort_desc<E, K: Ord>(records: &mut [E], key: impl Fn(&E) -> K) {
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}

pub fn to_values<E: Serialize>(records: &[E]) -> CrmResult<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(|e| CrmError::Internal(e.to_string())))
        .collect()
}
