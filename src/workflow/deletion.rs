use super::records;
use crate::{
    database::{Bound, Document, Filter, Store, Write},
    error::{CrmError, CrmResult},
    model::{Customer, Deal, Money},
    perm::{can_access, roles::Actor, Action},
};

fn refusal(deals: u64, revenue: Money) -> String {
    format!(
        "Cannot delete customer. This customer has {deals} deal(s) and ${revenue} in revenue. \
         Deleting this customer would affect deal records, revenue data, and historical reports. \
         If you need to correct data, please edit the customer instead."
    )
}

/// 有商机或有营收的客户不可删除，Admin 也不例外
pub fn can_delete(customer: &Customer, deal_count: u64) -> CrmResult<()> {
    if deal_count > 0 || customer.total_revenue > Money::ZERO {
        Err(CrmError::invalid_state(refusal(deal_count, customer.total_revenue)))
    } else {
        Ok(())
    }
}

pub fn delete_customer(store: &dyn Store, actor: &Actor, id: &str) -> CrmResult<Customer> {
    let customer = records::load::<Customer>(store, id)?;
    can_access(actor, &customer, Action::Delete)?;
    let deals = Filter::all().eq("customer", id);
    let count = store.count(Deal::KIND, &deals)?;
    can_delete(&customer, count)?;
    // a deal created meanwhile aborts the delete
    store.apply(vec![
        Write::expect::<Deal>(deals, Bound::Zero, refusal(1, customer.total_revenue)),
        Write::delete::<Customer>(id),
    ])?;
    tracing::info!(customer = id, actor = %actor.id, "customer deleted");
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{libs::now, model::CustomerStatus};

    fn customer(revenue: Money) -> Customer {
        Customer {
            id: "c1".into(),
            name: "Acme".into(),
            email: "ops@acme.com".into(),
            phone: "555".into(),
            company: None,
            address: None,
            lead_id: None,
            assigned_to: "s1".into(),
            status: CustomerStatus::Active,
            total_deals: 0,
            total_revenue: revenue,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn history_blocks_deletion() {
        assert!(can_delete(&customer(Money::ZERO), 0).is_ok());
        let err = can_delete(&customer(Money::from(1500)), 1).unwrap_err();
        assert!(matches!(err, CrmError::InvalidState(ref m) if m.contains("1 deal(s) and $1500 in revenue")));
        assert!(can_delete(&customer(Money::new(2505, 1)), 0).is_err());
        assert!(can_delete(&customer(Money::ZERO), 3).is_err());
        let err = can_delete(&customer(Money::new(1050, 2)), 1).unwrap_err();
        assert!(matches!(err, CrmError::InvalidState(ref m) if m.contains("$10.50 in revenue")));
    }
}
