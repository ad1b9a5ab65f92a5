use axum::{extract::rejection::JsonRejection, Json, Router};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{AppState, Response};

mod account;
pub mod func;
mod user;

pub fn pages_router() -> Router<AppState> {
    account::account_router()
        .merge(func::func_router())
        .merge(user::user_router())
}

/// 解析请求体，格式错误统一返回 400 信封
pub(crate) fn body<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, Response> {
    let Json(value) = payload?;
    Ok(serde_json::from_value(value)?)
}
