use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{actor, render, render_one};
use crate::{
    database::Ref,
    model::{Customer, CustomerPatch, NewCustomer},
    pages::body,
    perm::require_admin,
    workflow::{deletion, records},
    AppState, Response, ResponseResult,
};

const REFS: &[Ref] = &[Ref::ASSIGNED_TO, Ref::LEAD];

pub fn customer_router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

async fn list_customers(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let mut customers = records::list::<Customer>(state.store.as_ref(), &actor)?;
    records::sort_desc(&mut customers, |c| c.created_at);
    Ok(Response::ok(json!(render(&state, &customers, REFS)?)))
}

async fn get_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let customer = records::get::<Customer>(state.store.as_ref(), &actor, &id)?;
    Ok(Response::ok(render_one(&state, &customer, REFS)?))
}

async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let draft: NewCustomer = body(payload)?;
    let customer = records::create(state.store.as_ref(), &actor, draft)?;
    Ok(Response::created(json!(customer)))
}

async fn update_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let patch: CustomerPatch = body(payload)?;
    let customer = records::update(state.store.as_ref(), &actor, &id, patch)?;
    Ok(Response::ok(json!(customer)))
}

async fn delete_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    require_admin(&actor)?;
    deletion::delete_customer(state.store.as_ref(), &actor, &id)?;
    Ok(Response::message("Customer deleted"))
}
