use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;

use super::session;
use crate::{model::NewUser, pages::body, workflow::users, AppState, Response, ResponseResult};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let draft: NewUser = body(payload)?;
    let user = users::register(state.store.as_ref(), draft)?;
    Ok(Response::created(session(&state, &user)?))
}

/// 首次部署时创建第一个管理员
pub async fn setup(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let draft: NewUser = body(payload)?;
    let user = users::bootstrap_admin(state.store.as_ref(), draft)?;
    Ok(Response::created(session(&state, &user)?))
}
