use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use crate::{bearer, model::User, parse_jwt_macro, token::generate_jwt, AppState, Response, ResponseResult};

mod login;
mod register;

pub fn account_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register::register))
        .route("/api/auth/login", post(login::login))
        .route("/api/auth/setup", post(register::setup))
        .route("/api/auth/me", get(me))
}

/// `{token, user}` for a freshly authenticated user.
fn session(state: &AppState, user: &User) -> Result<Value, Response> {
    let token = generate_jwt(&state.key, &user.id)?;
    Ok(json!({ "token": token, "user": user.summary() }))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let user = parse_jwt_macro!(&state, &bearer);
    Ok(Response::ok(json!(user.summary())))
}
