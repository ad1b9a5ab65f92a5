use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Money;
use crate::{
    database::{Document, Kind},
    libs::dser::{deser_empty_to_none, deserialize_opt_datetime},
};

/// 商机阶段，ClosedWon / ClosedLost 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Stage {
    #[default]
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Prospecting,
        Stage::Qualification,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prospecting => "Prospecting",
            Stage::Qualification => "Qualification",
            Stage::Proposal => "Proposal",
            Stage::Negotiation => "Negotiation",
            Stage::ClosedWon => "Closed Won",
            Stage::ClosedLost => "Closed Lost",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub title: String,
    pub value: Money,
    /// owning customer, only an Admin may move a deal to another one
    pub customer: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub probability: u8,
    #[serde(default)]
    pub expected_close_date: Option<DateTime<Utc>>,
    pub assigned_to: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Deal {
    const KIND: Kind = Kind::Deal;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewDeal {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: Option<Money>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub customer: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub probability: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_opt_datetime")]
    pub expected_close_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub assigned_to: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Money>,
    #[serde(
        default,
        deserialize_with = "deser_empty_to_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_close_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deser_empty_to_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Deal {
    /// The deal as it would look after `patch`.
    pub fn patched(&self, patch: &DealPatch) -> Deal {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(value) = patch.value {
            next.value = value;
        }
        if let Some(customer) = &patch.customer {
            next.customer = customer.clone();
        }
        if let Some(stage) = patch.stage {
            next.stage = stage;
        }
        if let Some(probability) = patch.probability {
            next.probability = probability;
        }
        if patch.expected_close_date.is_some() {
            next.expected_close_date = patch.expected_close_date;
        }
        if let Some(assigned_to) = &patch.assigned_to {
            next.assigned_to = assigned_to.clone();
        }
        if patch.notes.is_some() {
            next.notes = patch.notes.clone();
        }
        next
    }
}
