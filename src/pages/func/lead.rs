use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::{actor, render, render_one};
use crate::{
    database::Ref,
    model::{Lead, LeadPatch, NewLead},
    pages::body,
    perm::require_admin,
    workflow::{conversion, records},
    AppState, Response, ResponseResult,
};

const REFS: &[Ref] = &[Ref::ASSIGNED_TO];

pub fn lead_router() -> Router<AppState> {
    Router::new()
        .route("/api/leads", get(list_leads).post(create_lead))
        .route(
            "/api/leads/:id",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/api/leads/:id/convert", post(convert_lead))
}

async fn list_leads(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let mut leads = records::list::<Lead>(state.store.as_ref(), &actor)?;
    records::sort_desc(&mut leads, |l| l.created_at);
    Ok(Response::ok(json!(render(&state, &leads, REFS)?)))
}

async fn get_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let lead = records::get::<Lead>(state.store.as_ref(), &actor, &id)?;
    Ok(Response::ok(render_one(&state, &lead, REFS)?))
}

async fn create_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let draft: NewLead = body(payload)?;
    let lead = records::create(state.store.as_ref(), &actor, draft)?;
    Ok(Response::created(json!(lead)))
}

async fn update_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let patch: LeadPatch = body(payload)?;
    let lead = records::update(state.store.as_ref(), &actor, &id, patch)?;
    Ok(Response::ok(json!(lead)))
}

async fn delete_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    require_admin(&actor)?;
    records::remove::<Lead>(state.store.as_ref(), &actor, &id)?;
    Ok(Response::message("Lead deleted successfully"))
}

async fn convert_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let customer = conversion::convert(state.store.as_ref(), &actor, &id)?;
    Ok(Response::ok(json!(customer)))
}
