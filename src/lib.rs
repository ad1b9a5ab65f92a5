pub mod config;
pub mod database;
pub mod error;
pub mod libs;
pub mod logging;
pub mod model;
pub mod pages;
pub mod perm;
pub mod response;
pub mod token;
pub mod workflow;

use std::sync::Arc;

use axum::{http::Method, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use database::Store;
use error::CrmResult;
pub use response::Response;

pub type ResponseResult = Result<Response, Response>;

/// 请求共享的状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub key: token::Key,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt_secret: &str) -> CrmResult<Self> {
        Ok(Self {
            store,
            key: token::signing_key(jwt_secret)?,
        })
    }
}

/// The full HTTP application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(pages::pages_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
