use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::Value;

use super::session;
use crate::{pages::body, workflow::users, AppState, Response, ResponseResult};

#[derive(serde::Deserialize)]
struct LoginID {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let id: LoginID = body(payload)?;
    let user = users::login(state.store.as_ref(), &id.email, &id.password)?;
    Ok(Response::ok(session(&state, &user)?))
}
