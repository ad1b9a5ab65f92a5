use serde_json::{json, Map, Value};

use super::records;
use crate::{
    database::{Bound, Filter, Store, Write},
    error::{CrmError, CrmResult},
    libs::{gen_id, now},
    model::{Customer, CustomerStatus, Lead, LeadStatus, Money},
    perm::roles::Actor,
};

pub const ALREADY_CONVERTED: &str = "Lead already converted";

fn customer_from(lead: &Lead) -> Customer {
    let at = now();
    Customer {
        id: gen_id(),
        name: lead.name.clone(),
        email: lead.email.clone(),
        phone: lead.phone.clone(),
        company: lead.company.clone(),
        address: None,
        lead_id: Some(lead.id.clone()),
        assigned_to: lead.assigned_to.clone(),
        status: CustomerStatus::Active,
        total_deals: 0,
        total_revenue: Money::ZERO,
        created_at: at,
        updated_at: at,
    }
}

/// 线索转化为客户
///
/// The customer insert and the lead update commit together, guarded on the
/// lead still being unconverted, so a lead yields at most one customer.
pub fn convert(store: &dyn Store, actor: &Actor, lead_id: &str) -> CrmResult<Customer> {
    let lead = records::get::<Lead>(store, actor, lead_id)?;
    if lead.converted_to_customer {
        return Err(CrmError::invalid_state(ALREADY_CONVERTED));
    }
    let customer = customer_from(&lead);
    let mut set = Map::new();
    set.insert("status".into(), serde_json::to_value(LeadStatus::Converted)?);
    set.insert("convertedToCustomer".into(), Value::Bool(true));
    set.insert("updatedAt".into(), json!(customer.created_at));
    store.apply(vec![
        Write::expect::<Lead>(
            Filter::by_id(&lead.id).eq("convertedToCustomer", false),
            Bound::AtLeast(1),
            ALREADY_CONVERTED,
        ),
        Write::insert(&customer)?,
        Write::update::<Lead>(&lead.id, set),
    ])?;
    tracing::info!(lead = %lead.id, customer = %customer.id, actor = %actor.id, "lead converted");
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{fetch, MemoryStore},
        model::LeadSource,
        perm::roles::Role,
    };

    fn seeded() -> (MemoryStore, Actor) {
        let store = MemoryStore::new();
        let at = now();
        let lead = Lead {
            id: "l1".into(),
            name: "Ann".into(),
            email: "ann@acme.com".into(),
            phone: "555".into(),
            company: Some("Acme".into()),
            source: LeadSource::Referral,
            status: LeadStatus::Qualified,
            assigned_to: "s1".into(),
            notes: None,
            converted_to_customer: false,
            created_at: at,
            updated_at: at,
        };
        store.apply(vec![Write::insert(&lead).unwrap()]).unwrap();
        (store, Actor::new("s1", Role::SalesUser))
    }

    #[test]
    fn converts_exactly_once() {
        let (store, actor) = seeded();
        let customer = convert(&store, &actor, "l1").unwrap();
        assert_eq!(customer.lead_id.as_deref(), Some("l1"));
        assert_eq!(customer.company.as_deref(), Some("Acme"));
        assert_eq!(customer.assigned_to, "s1");
        assert_eq!(customer.total_deals, 0);

        let lead = fetch::<Lead>(&store, "l1").unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Converted);
        assert!(lead.converted_to_customer);

        assert_eq!(
            convert(&store, &actor, "l1"),
            Err(CrmError::invalid_state(ALREADY_CONVERTED))
        );
        assert_eq!(store.count(crate::database::Kind::Customer, &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn unknown_and_foreign_leads() {
        let (store, _) = seeded();
        assert!(matches!(
            convert(&store, &Actor::new("s1", Role::SalesUser), "nope"),
            Err(CrmError::NotFound(_))
        ));
        assert!(matches!(
            convert(&store, &Actor::new("s2", Role::SalesUser), "l1"),
            Err(CrmError::Forbidden(_))
        ));
    }
}
