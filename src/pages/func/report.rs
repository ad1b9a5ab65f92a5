//! 统计报表
//!
//! Every report aggregates over the entities visible to the caller.

use std::collections::BTreeMap;

use axum::{extract::State, http::HeaderMap, routing::get, Router};
use serde::Serialize;
use serde_json::{json, Value};

use super::{actor, render};
use crate::{
    database::Ref,
    model::{Customer, Deal, Lead, LeadStatus, Money, Stage, Task},
    workflow::records,
    AppState, Response, ResponseResult,
};

const RECENT: usize = 5;
const TOP_DEALS: usize = 10;

pub fn report_router() -> Router<AppState> {
    Router::new()
        .route("/api/reports/dashboard", get(dashboard))
        .route("/api/reports/leads", get(lead_report))
        .route("/api/reports/deals", get(deal_report))
        .route("/api/reports/revenue", get(revenue_report))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Percentage of `part` in `total`, two decimals, 0 for an empty set.
pub fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

/// 按枚举的对外名称计数
pub fn tally<T: Serialize>(items: impl IntoIterator<Item = T>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        if let Ok(Value::String(key)) = serde_json::to_value(item) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

fn won(deals: &[Deal]) -> impl Iterator<Item = &Deal> {
    deals.iter().filter(|d| d.stage == Stage::ClosedWon)
}

pub fn revenue(deals: &[Deal]) -> Money {
    won(deals).map(|d| d.value).sum()
}

fn conversion_rate(leads: &[Lead]) -> f64 {
    let converted = leads.iter().filter(|l| l.status == LeadStatus::Converted).count();
    rate(converted, leads.len())
}

fn newest<E: Clone, K: Ord>(records: &[E], n: usize, key: impl Fn(&E) -> K) -> Vec<E> {
    let mut sorted = records.to_vec();
    records::sort_desc(&mut sorted, key);
    sorted.truncate(n);
    sorted
}

pub fn dashboard_summary(
    leads: &[Lead],
    customers: &[Customer],
    deals: &[Deal],
    tasks: &[Task],
) -> Value {
    json!({
        "totalLeads": leads.len(),
        "totalCustomers": customers.len(),
        "totalDeals": deals.len(),
        "totalTasks": tasks.len(),
        "totalRevenue": revenue(deals),
        "conversionRate": conversion_rate(leads),
        "leadsByStatus": tally(leads.iter().map(|l| l.status)),
        "dealsByStage": tally(deals.iter().map(|d| d.stage)),
        "tasksByStatus": tally(tasks.iter().map(|t| t.status)),
        "recentLeads": newest(leads, RECENT, |l| l.created_at),
        "recentDeals": newest(deals, RECENT, |d| d.created_at),
    })
}

pub fn lead_summary(leads: &[Lead]) -> Value {
    json!({
        "total": leads.len(),
        "byStatus": tally(leads.iter().map(|l| l.status)),
        "bySource": tally(leads.iter().map(|l| l.source)),
        "conversionRate": conversion_rate(leads),
    })
}

pub fn deal_summary(deals: &[Deal]) -> Value {
    let won_deals = won(deals).count();
    json!({
        "total": deals.len(),
        "byStage": tally(deals.iter().map(|d| d.stage)),
        "totalValue": deals.iter().map(|d| d.value).sum::<Money>(),
        "wonDeals": won_deals,
        "wonValue": revenue(deals),
        "winRate": rate(won_deals, deals.len()),
    })
}

/// Revenue figures over `Closed Won` deals, with the top deals by value.
pub fn revenue_summary(deals: &[Deal]) -> (Value, Vec<Deal>) {
    let won_deals: Vec<Deal> = won(deals).cloned().collect();
    let total = revenue(&won_deals);
    let mut by_month: BTreeMap<String, Money> = BTreeMap::new();
    for deal in &won_deals {
        *by_month
            .entry(deal.created_at.format("%b %Y").to_string())
            .or_insert(Money::ZERO) += deal.value;
    }
    let average = op::ternary!(
        won_deals.is_empty() => Money::ZERO;
        (total / Money::from(won_deals.len())).round_dp(2)
    );
    let mut top = won_deals.clone();
    top.sort_by(|a, b| b.value.cmp(&a.value));
    top.truncate(TOP_DEALS);
    let summary = json!({
        "totalRevenue": total,
        "totalDeals": won_deals.len(),
        "averageDealSize": average,
        "byMonth": by_month,
    });
    (summary, top)
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let store = state.store.as_ref();
    let leads = records::list::<Lead>(store, &actor)?;
    let customers = records::list::<Customer>(store, &actor)?;
    let deals = records::list::<Deal>(store, &actor)?;
    let tasks = records::list::<Task>(store, &actor)?;
    Ok(Response::ok(dashboard_summary(&leads, &customers, &deals, &tasks)))
}

async fn lead_report(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let leads = records::list::<Lead>(state.store.as_ref(), &actor)?;
    Ok(Response::ok(lead_summary(&leads)))
}

async fn deal_report(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let deals = records::list::<Deal>(state.store.as_ref(), &actor)?;
    Ok(Response::ok(deal_summary(&deals)))
}

async fn revenue_report(State(state): State<AppState>, headers: HeaderMap) -> ResponseResult {
    let actor = actor(&state, &headers)?;
    let deals = records::list::<Deal>(state.store.as_ref(), &actor)?;
    let (mut summary, top) = revenue_summary(&deals);
    summary["topDeals"] = json!(render(&state, &top, &[Ref::CUSTOMER])?);
    Ok(Response::ok(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn deal(id: &str, value: Money, stage: Stage, month: u32) -> Deal {
        let at = Utc.with_ymd_and_hms(2026, month, 3, 0, 0, 0).unwrap();
        Deal {
            id: id.into(),
            title: id.into(),
            value,
            customer: "c1".into(),
            stage,
            probability: 50,
            expected_close_date: None,
            assigned_to: "s1".into(),
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn rates_have_two_decimals() {
        assert_eq!(rate(1, 3), 33.33);
        assert_eq!(rate(2, 3), 66.67);
        assert_eq!(rate(0, 0), 0.0);
    }

    #[test]
    fn deal_figures() {
        let deals = vec![
            deal("a", Money::from(1000), Stage::ClosedWon, 1),
            deal("b", Money::from(500), Stage::ClosedWon, 1),
            deal("c", Money::from(300), Stage::Proposal, 2),
            deal("d", Money::from(200), Stage::ClosedLost, 2),
        ];
        let summary = deal_summary(&deals);
        assert_eq!(summary["total"], 4);
        assert_eq!(summary["wonDeals"], 2);
        assert_eq!(summary["wonValue"], 1500.0);
        assert_eq!(summary["totalValue"], 2000.0);
        assert_eq!(summary["winRate"], 50.0);
        assert_eq!(summary["byStage"]["Closed Won"], 2);

        let (revenue, top) = revenue_summary(&deals);
        assert_eq!(revenue["totalRevenue"], 1500.0);
        assert_eq!(revenue["averageDealSize"], 750.0);
        assert_eq!(revenue["byMonth"]["Jan 2026"], 1500.0);
        assert_eq!(top.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn empty_dashboard() {
        let summary = dashboard_summary(&[], &[], &[], &[]);
        assert_eq!(summary["totalLeads"], 0);
        assert_eq!(summary["totalRevenue"], 0.0);
        assert_eq!(summary["conversionRate"], 0.0);
        assert_eq!(summary["recentDeals"], json!([]));
    }

    #[test]
    fn cents_sum_exactly() {
        let deals = vec![
            deal("a", Money::new(10, 2), Stage::ClosedWon, 3),
            deal("b", Money::new(20, 2), Stage::ClosedWon, 3),
        ];
        assert_eq!(revenue(&deals), Money::new(30, 2));
        let (summary, _) = revenue_summary(&deals);
        assert_eq!(summary["totalRevenue"], 0.3);
        assert_eq!(summary["averageDealSize"], 0.15);
    }
}
