use axum::http::HeaderMap;
use chrono::Duration;
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;

use crate::{
    database::{fetch, Store},
    error::{CrmError, CrmResult},
    libs::now,
    model::User,
};

pub type Key = Hmac<Sha512>;

/// token 有效期
pub const TOKEN_DAYS: i64 = 30;
pub const NOT_AUTHORIZED: &str = "Not authorized to access this route";

pub fn signing_key(secret: &str) -> CrmResult<Key> {
    Key::new_from_slice(secret.as_bytes()).map_err(|e| CrmError::Internal(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bearer {
    token: String,
}

impl Bearer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// `Authorization: Bearer <token>`
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?.trim();
        op::ternary!(token.is_empty() => None; Some(Self::new(token)))
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TokenVerification {
    Ok,
    Expired,
    Error,
}

impl Claims {
    pub fn new(id: &str) -> Self {
        let iat = now();
        Self {
            id: id.to_owned(),
            iat: iat.timestamp(),
            exp: (iat + Duration::days(TOKEN_DAYS)).timestamp(),
        }
    }

    pub fn verify(&self) -> TokenVerification {
        let now = now().timestamp();
        if self.iat > self.exp || self.iat > now + 60 {
            TokenVerification::Error
        } else if now >= self.exp {
            TokenVerification::Expired
        } else {
            TokenVerification::Ok
        }
    }
}

pub fn generate_jwt(key: &Key, id: &str) -> CrmResult<String> {
    Claims::new(id)
        .sign_with_key(key)
        .map_err(|e| CrmError::Internal(e.to_string()))
}

pub fn parse_jwt(key: &Key, bearer: &Bearer) -> Option<Claims> {
    bearer.token().verify_with_key(key).ok()
}

/// Resolves a bearer token back to its user.
pub fn authenticate(store: &dyn Store, key: &Key, bearer: &Bearer) -> CrmResult<User> {
    let denied = || CrmError::Unauthenticated(NOT_AUTHORIZED.into());
    let claims = parse_jwt(key, bearer).ok_or_else(denied)?;
    match claims.verify() {
        TokenVerification::Ok => fetch::<User>(store, &claims.id)?.ok_or_else(denied),
        TokenVerification::Expired | TokenVerification::Error => Err(denied()),
    }
}

/// 取出请求头中的 token，缺失时直接返回 401
#[macro_export]
macro_rules! bearer {
    ($headers:expr) => {
        match $crate::token::Bearer::from_headers($headers) {
            Some(bearer) => bearer,
            None => return Err($crate::Response::token_error($crate::token::NOT_AUTHORIZED)),
        }
    };
}

/// 解析 token 得到当前用户
#[macro_export]
macro_rules! parse_jwt_macro {
    ($state:expr, $bearer:expr) => {
        match $crate::token::authenticate($state.store.as_ref(), &$state.key, $bearer) {
            Ok(user) => user,
            Err(e) => return Err($crate::Response::from(e)),
        }
    };
}
