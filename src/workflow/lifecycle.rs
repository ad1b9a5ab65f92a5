//! 商机阶段流转与客户累计数据
//!
//! A customer's `totalDeals` counts its deals and `totalRevenue` sums the
//! value of its `Closed Won` deals. Every deal write carries the matching
//! adjustment in the same batch, applied as an in-place increment.

use serde_json::json;

use super::records::{self, not_found};
use crate::{
    database::{fetch, patch_fields, Bound, Delta, Filter, Kind, Store, Write},
    error::{CrmError, CrmResult},
    libs::{gen_id, now, require},
    model::{Customer, Deal, DealPatch, Money, NewDeal, Stage},
    perm::{
        can_access, check_deal_customer, resolve_assignee, restrict_patch, roles::Actor, Action,
    },
};

const REQUIRED: &str = "Please provide all required fields";
const CONCURRENT_CHANGE: &str = "Deal was modified by another request, please retry";

/// Change to apply to one customer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateDelta {
    pub deals: i64,
    pub revenue: Money,
}

impl AggregateDelta {
    /// What a single deal adds to its customer.
    pub fn contribution(stage: Stage, value: Money) -> Self {
        Self {
            deals: 1,
            revenue: op::ternary!(stage == Stage::ClosedWon => value; Money::ZERO),
        }
    }

    pub fn negate(self) -> Self {
        Self {
            deals: -self.deals,
            revenue: -self.revenue,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.deals == 0 && self.revenue.is_zero()
    }

    fn into_write(self, customer: &str) -> Option<Write> {
        if self.is_zero() {
            return None;
        }
        let mut deltas = Vec::with_capacity(2);
        if self.deals != 0 {
            deltas.push(("totalDeals", Delta::Count(self.deals)));
        }
        if !self.revenue.is_zero() {
            deltas.push(("totalRevenue", Delta::Amount(self.revenue)));
        }
        Some(Write::Increment {
            kind: Kind::Customer,
            id: customer.to_owned(),
            deltas,
        })
    }
}

pub fn on_create(stage: Stage, value: Money) -> AggregateDelta {
    AggregateDelta::contribution(stage, value)
}

/// Adjustment for an update that keeps the deal on the same customer.
pub fn on_update(old: (Stage, Money), new: (Stage, Money)) -> AggregateDelta {
    let won = Stage::ClosedWon;
    let revenue = match (old.0 == won, new.0 == won) {
        (true, true) if new.1 != old.1 => new.1 - old.1,
        (false, true) => new.1,
        (true, false) => -old.1,
        _ => Money::ZERO,
    };
    AggregateDelta { deals: 0, revenue }
}

pub fn on_delete(stage: Stage, value: Money) -> AggregateDelta {
    AggregateDelta::contribution(stage, value).negate()
}

fn check_amounts(value: Option<Money>, probability: Option<u8>) -> CrmResult<()> {
    if let Some(value) = value {
        if value <= Money::ZERO {
            return Err(CrmError::validation("Deal value must be greater than 0"));
        }
        if value.normalize().scale() > 2 {
            return Err(CrmError::validation(
                "Deal value cannot have more than 2 decimal places",
            ));
        }
    }
    if probability.is_some_and(|p| p > 100) {
        return Err(CrmError::validation("Probability must be between 0 and 100"));
    }
    Ok(())
}

fn customer_exists(id: &str) -> Write {
    Write::expect::<Customer>(Filter::by_id(id), Bound::AtLeast(1), "Customer not found")
}

pub fn create_deal(store: &dyn Store, actor: &Actor, draft: NewDeal) -> CrmResult<Deal> {
    require(&[draft.title.as_str()], REQUIRED)?;
    let (Some(value), Some(customer_id)) = (draft.value, draft.customer) else {
        return Err(CrmError::validation(REQUIRED));
    };
    check_amounts(Some(value), draft.probability)?;
    let customer = fetch::<Customer>(store, &customer_id)?.ok_or_else(not_found::<Customer>)?;
    check_deal_customer(actor, &customer)?;
    let assigned_to = resolve_assignee::<Deal>(actor, draft.assigned_to.as_deref())?;

    let at = now();
    let deal = Deal {
        id: gen_id(),
        title: draft.title,
        value,
        customer: customer.id,
        stage: draft.stage.unwrap_or_default(),
        probability: draft.probability.unwrap_or(0),
        expected_close_date: draft.expected_close_date,
        assigned_to,
        notes: draft.notes,
        created_at: at,
        updated_at: at,
    };
    let delta = on_create(deal.stage, deal.value);
    let mut batch = vec![customer_exists(&deal.customer), Write::insert(&deal)?];
    batch.extend(delta.into_write(&deal.customer));
    store.apply(batch)?;
    tracing::info!(
        deal = %deal.id, customer = %deal.customer, stage = deal.stage.as_str(),
        deals = delta.deals, revenue = %delta.revenue, "deal created"
    );
    Ok(deal)
}

pub fn update_deal(
    store: &dyn Store,
    actor: &Actor,
    id: &str,
    mut patch: DealPatch,
) -> CrmResult<Deal> {
    let current = records::load::<Deal>(store, id)?;
    can_access(actor, &current, Action::Update)?;
    restrict_patch(actor, &mut patch);
    check_amounts(patch.value, patch.probability)?;
    let next = current.patched(&patch);

    let mut set = patch_fields(&patch)?;
    set.insert("updatedAt".into(), json!(now()));
    // 读到的快照在提交时必须仍然成立，否则增量会被重复计算
    let mut batch = vec![
        Write::expect::<Deal>(
            Filter::by_id(id)
                .eq("stage", json!(current.stage))
                .eq("value", json!(current.value))
                .eq("customer", current.customer.as_str()),
            Bound::AtLeast(1),
            CONCURRENT_CHANGE,
        ),
        Write::update::<Deal>(id, set),
    ];
    if next.customer == current.customer {
        let delta = on_update((current.stage, current.value), (next.stage, next.value));
        batch.extend(delta.into_write(&current.customer));
    } else {
        fetch::<Customer>(store, &next.customer)?.ok_or_else(not_found::<Customer>)?;
        batch.push(customer_exists(&next.customer));
        batch.extend(on_delete(current.stage, current.value).into_write(&current.customer));
        batch.extend(on_create(next.stage, next.value).into_write(&next.customer));
    }
    store.apply(batch)?;
    if next.stage != current.stage {
        tracing::info!(
            deal = id, from = current.stage.as_str(), to = next.stage.as_str(),
            actor = %actor.id, "deal stage changed"
        );
    }
    records::load::<Deal>(store, id)
}

pub fn delete_deal(store: &dyn Store, actor: &Actor, id: &str) -> CrmResult<Deal> {
    let deal = records::load::<Deal>(store, id)?;
    can_access(actor, &deal, Action::Delete)?;
    if deal.stage.is_terminal() {
        return Err(CrmError::invalid_state(format!(
            "Cannot delete closed deals. This deal is marked as \"{}\". Deleting closed deals would affect revenue records and historical data. If you need to correct data, please edit the deal instead.",
            deal.stage.as_str()
        )));
    }
    let mut batch = vec![
        Write::expect::<Deal>(
            Filter::by_id(id).eq("stage", json!(deal.stage)),
            Bound::AtLeast(1),
            CONCURRENT_CHANGE,
        ),
        Write::delete::<Deal>(id),
    ];
    batch.extend(on_delete(deal.stage, deal.value).into_write(&deal.customer));
    store.apply(batch)?;
    tracing::info!(deal = id, customer = %deal.customer, actor = %actor.id, "deal deleted");
    Ok(deal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::MemoryStore,
        model::CustomerStatus,
        perm::roles::Role,
    };

    const WON: Stage = Stage::ClosedWon;

    fn m(n: i64) -> Money {
        Money::from(n)
    }

    #[test]
    fn transition_table() {
        assert_eq!(on_create(Stage::Prospecting, m(500)), AggregateDelta { deals: 1, revenue: Money::ZERO });
        assert_eq!(on_create(WON, m(500)), AggregateDelta { deals: 1, revenue: m(500) });
        assert_eq!(on_update((WON, m(1000)), (WON, m(1500))).revenue, m(500));
        assert_eq!(on_update((Stage::Negotiation, m(1000)), (WON, m(1200))).revenue, m(1200));
        assert_eq!(on_update((WON, m(1000)), (Stage::ClosedLost, m(1000))).revenue, -m(1000));
        assert_eq!(on_update((WON, m(1000)), (Stage::Proposal, m(2000))).revenue, -m(1000));
        assert!(on_update((Stage::Proposal, m(1000)), (Stage::Negotiation, m(3000))).is_zero());
        assert_eq!(on_delete(Stage::Proposal, m(700)), AggregateDelta { deals: -1, revenue: Money::ZERO });
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let at = now();
        let customer = |id: &str| Customer {
            id: id.into(),
            name: "Acme".into(),
            email: "ops@acme.com".into(),
            phone: "555".into(),
            company: None,
            address: None,
            lead_id: None,
            assigned_to: "s1".into(),
            status: CustomerStatus::Active,
            total_deals: 0,
            total_revenue: Money::ZERO,
            created_at: at,
            updated_at: at,
        };
        store
            .apply(vec![
                Write::insert(&customer("c1")).unwrap(),
                Write::insert(&customer("c2")).unwrap(),
            ])
            .unwrap();
        store
    }

    fn totals(store: &MemoryStore, id: &str) -> (i64, Money) {
        let c = fetch::<Customer>(store, id).unwrap().unwrap();
        (c.total_deals, c.total_revenue)
    }

    fn new_deal(value: Money, stage: Stage) -> NewDeal {
        NewDeal {
            title: "Licences".into(),
            value: Some(value),
            customer: Some("c1".into()),
            stage: Some(stage),
            ..Default::default()
        }
    }

    #[test]
    fn counters_follow_the_deals() {
        let store = seeded();
        let admin = Actor::new("a1", Role::Admin);
        let sales = Actor::new("s1", Role::SalesUser);

        let d1 = create_deal(&store, &sales, new_deal(m(1000), Stage::Prospecting)).unwrap();
        let d2 = create_deal(&store, &admin, new_deal(m(400), WON)).unwrap();
        assert_eq!(totals(&store, "c1"), (2, m(400)));

        let won = DealPatch {
            stage: Some(WON),
            ..Default::default()
        };
        update_deal(&store, &admin, &d1.id, won).unwrap();
        assert_eq!(totals(&store, "c1"), (2, m(1400)));

        let bigger = DealPatch {
            value: Some(m(1500)),
            ..Default::default()
        };
        update_deal(&store, &admin, &d1.id, bigger).unwrap();
        assert_eq!(totals(&store, "c1"), (2, m(1900)));

        let lost = DealPatch {
            stage: Some(Stage::ClosedLost),
            ..Default::default()
        };
        update_deal(&store, &admin, &d2.id, lost).unwrap();
        assert_eq!(totals(&store, "c1"), (2, m(1500)));

        let moved = DealPatch {
            customer: Some("c2".into()),
            ..Default::default()
        };
        update_deal(&store, &admin, &d1.id, moved).unwrap();
        assert_eq!(totals(&store, "c1"), (1, Money::ZERO));
        assert_eq!(totals(&store, "c2"), (1, m(1500)));
    }

    #[test]
    fn open_deals_can_be_deleted_closed_ones_cannot() {
        let store = seeded();
        let admin = Actor::new("a1", Role::Admin);
        let open = create_deal(&store, &admin, new_deal(m(300), Stage::Proposal)).unwrap();
        let closed = create_deal(&store, &admin, new_deal(m(300), Stage::ClosedLost)).unwrap();
        assert_eq!(totals(&store, "c1").0, 2);

        assert!(matches!(
            delete_deal(&store, &admin, &closed.id),
            Err(CrmError::InvalidState(_))
        ));
        delete_deal(&store, &admin, &open.id).unwrap();
        assert_eq!(totals(&store, "c1"), (1, Money::ZERO));
    }

    #[test]
    fn closed_deals_are_frozen_for_sales() {
        let store = seeded();
        let sales = Actor::new("s1", Role::SalesUser);
        let deal = create_deal(&store, &sales, new_deal(m(800), WON)).unwrap();
        let patch = DealPatch {
            value: Some(m(1)),
            ..Default::default()
        };
        assert!(matches!(
            update_deal(&store, &sales, &deal.id, patch),
            Err(CrmError::InvalidState(_))
        ));
        assert_eq!(totals(&store, "c1"), (1, m(800)));
    }

    #[test]
    fn rejects_bad_amounts_and_foreign_customers() {
        let store = seeded();
        let sales = Actor::new("s2", Role::SalesUser);
        let admin = Actor::new("a1", Role::Admin);
        assert!(matches!(
            create_deal(&store, &admin, new_deal(m(0), Stage::Prospecting)),
            Err(CrmError::Validation(_))
        ));
        let mut draft = new_deal(m(10), Stage::Prospecting);
        draft.probability = Some(101);
        assert!(matches!(create_deal(&store, &admin, draft), Err(CrmError::Validation(_))));
        assert!(matches!(
            create_deal(&store, &sales, new_deal(m(10), Stage::Prospecting)),
            Err(CrmError::Forbidden(_))
        ));
        let mut draft = new_deal(m(10), Stage::Prospecting);
        draft.customer = Some("missing".into());
        assert!(matches!(create_deal(&store, &admin, draft), Err(CrmError::NotFound(_))));
    }

    #[test]
    fn fractional_amounts_leave_no_residue() {
        let store = seeded();
        let admin = Actor::new("a1", Role::Admin);
        let cents = |n| Money::new(n, 2);
        let a = create_deal(&store, &admin, new_deal(cents(10), WON)).unwrap();
        let b = create_deal(&store, &admin, new_deal(cents(20), WON)).unwrap();
        assert_eq!(totals(&store, "c1"), (2, cents(30)));

        for deal in [&a, &b] {
            let reopened = DealPatch {
                stage: Some(Stage::Proposal),
                ..Default::default()
            };
            update_deal(&store, &admin, &deal.id, reopened).unwrap();
            delete_deal(&store, &admin, &deal.id).unwrap();
        }
        assert_eq!(totals(&store, "c1"), (0, Money::ZERO));
        crate::workflow::deletion::delete_customer(&store, &admin, "c1").unwrap();
    }

    #[test]
    fn sub_cent_values_are_rejected() {
        let store = seeded();
        let admin = Actor::new("a1", Role::Admin);
        assert!(matches!(
            create_deal(&store, &admin, new_deal(Money::new(1005, 3), Stage::Prospecting)),
            Err(CrmError::Validation(_))
        ));
        assert!(create_deal(&store, &admin, new_deal(Money::new(1500, 3), Stage::Prospecting)).is_ok());
    }
}
