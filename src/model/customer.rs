use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Money;
use crate::{
    database::{Document, Kind},
    libs::dser::deser_empty_to_none,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

/// 客户
///
/// `total_deals` and `total_revenue` are maintained by the deal lifecycle as
/// atomic increments; no general create or update path writes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    pub assigned_to: String,
    #[serde(default)]
    pub status: CustomerStatus,
    #[serde(default)]
    pub total_deals: i64,
    #[serde(default)]
    pub total_revenue: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Customer {
    const KIND: Kind = Kind::Customer;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
    #[serde(
        default,
        deserialize_with = "deser_empty_to_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<String>,
}
