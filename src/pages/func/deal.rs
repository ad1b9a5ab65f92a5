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
    model::{Deal, DealPatch, NewDeal},
    pages::body,
    perm::require_admin,
    workflow::{lifecycle, records},
    AppState, Response, ResponseResult,
};

const REFS: &[Ref] = &[Ref::CUSTOMER, Ref::ASSIGNED_TO];

pub fn deal_router() -> Router<AppState> {
    Router::new()
        .route("/api/deals", get(list_deals).post(create_deal))
        .route(
            "/api/deals/:id",
            get(get_deal).put(update_deal).delete(delete_deal),
        )
}

async fn list_deals(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let mut deals = records::list::<Deal>(state.store.as_ref(), &actor)?;
    records::sort_desc(&mut deals, |d| d.created_at);
    Ok(Response::ok(json!(render(&state, &deals, REFS)?)))
}

async fn get_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let deal = records::get::<Deal>(state.store.as_ref(), &actor, &id)?;
    Ok(Response::ok(render_one(&state, &deal, REFS)?))
}

async fn create_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let draft: NewDeal = body(payload)?;
    let deal = lifecycle::create_deal(state.store.as_ref(), &actor, draft)?;
    Ok(Response::created(json!(deal)))
}

async fn update_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let patch: DealPatch = body(payload)?;
    let deal = lifecycle::update_deal(state.store.as_ref(), &actor, &id, patch)?;
    Ok(Response::ok(json!(deal)))
}

async fn delete_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    require_admin(&actor)?;
    lifecycle::delete_deal(state.store.as_ref(), &actor, &id)?;
    Ok(Response::message("Deal deleted"))
}
