use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    bearer,
    model::{NewUser, User, UserPatch},
    pages::body,
    parse_jwt_macro,
    perm::{require_admin, roles::Actor},
    workflow::users,
    AppState, Response, ResponseResult,
};

pub fn user_router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// 只有管理员可以管理员工账号
fn admin(state: &AppState, headers: &HeaderMap) -> Result<Actor, Response> {
    let bearer = bearer!(headers);
    let user: User = parse_jwt_macro!(state, &bearer);
    let actor = user.actor();
    require_admin(&actor)?;
    Ok(actor)
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    admin(&state, &headers)?;
    let users: Vec<_> = users::list_users(state.store.as_ref())?
        .iter()
        .map(User::public)
        .collect();
    Ok(Response::ok(json!(users)))
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    admin(&state, &headers)?;
    let user = users::get_user(state.store.as_ref(), &id)?;
    Ok(Response::ok(json!(user.public())))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = admin(&state, &headers)?;
    let draft: NewUser = body(payload)?;
    let user = users::create_user(state.store.as_ref(), &actor, draft)?;
    Ok(Response::created(json!(user.public())))
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let actor = admin(&state, &headers)?;
    let patch: UserPatch = body(payload)?;
    let user = users::update_user(state.store.as_ref(), &actor, &id, patch)?;
    Ok(Response::ok(json!(user.public())))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ResponseResult {
    let actor = admin(&state, &headers)?;
    users::delete_user(state.store.as_ref(), &actor, &id)?;
    Ok(Response::message("User deleted successfully"))
}
