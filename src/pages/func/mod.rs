use axum::{http::HeaderMap, Router};
use serde::Serialize;
use serde_json::Value;

use crate::{
    bearer,
    database::{populate, Ref},
    model::User,
    parse_jwt_macro,
    perm::roles::Actor,
    workflow::records::to_values,
    AppState, Response,
};

mod customer;
mod deal;
mod lead;
pub mod report;
mod task;

pub fn func_router() -> Router<AppState> {
    lead::lead_router()
        .merge(customer::customer_router())
        .merge(deal::deal_router())
        .merge(task::task_router())
        .merge(report::report_router())
}

/// 当前登录的员工
pub(crate) fn actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, Response> {
    let bearer = bearer!(headers);
    let user: User = parse_jwt_macro!(state, &bearer);
    Ok(user.actor())
}

/// Serializes records and resolves their references.
pub(crate) fn render<E: Serialize>(
    state: &AppState,
    records: &[E],
    refs: &[Ref],
) -> Result<Vec<Value>, Response> {
    let mut docs = to_values(records)?;
    populate(state.store.as_ref(), &mut docs, refs)?;
    Ok(docs)
}

pub(crate) fn render_one<E: Serialize>(
    state: &AppState,
    record: &E,
    refs: &[Ref],
) -> Result<Value, Response> {
    let mut docs = render(state, std::slice::from_ref(record), refs)?;
    Ok(docs.pop().unwrap_or(Value::Null))
}
