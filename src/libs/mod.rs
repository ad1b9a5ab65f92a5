pub mod dser;
pub mod password;

use chrono::{DateTime, Utc};

use crate::error::CrmError;

/// 24 位十六进制的随机 id
pub fn gen_id() -> String {
    let bytes: [u8; 12] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fails with `Validation` when any of the named fields is blank.
pub fn require(fields: &[&str], message: &str) -> Result<(), CrmError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        Err(CrmError::validation(message))
    } else {
        Ok(())
    }
}

lazy_static::lazy_static! {
    static ref EMAIL: regex::Regex =
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern");
}

pub fn check_email(email: &str) -> Result<(), CrmError> {
    if EMAIL.is_match(email.trim()) {
        Ok(())
    } else {
        Err(CrmError::validation("Please provide a valid email"))
    }
}
