//! 权限判断
//!
//! Pure decisions over `(actor, entity, action)`; nothing here touches the
//! store.

pub mod roles;

use crate::{
    database::Filter,
    error::{CrmError, CrmResult},
    model::{Customer, CustomerPatch, Deal, DealPatch, Lead, LeadPatch, Task, TaskPatch},
};
use roles::Actor;

/// Route level rejection for Admin-only endpoints.
pub const ROLE_DENIED: &str = "User role not authorized to access this route";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
}

/// An entity owned through its `assignedTo` field.
pub trait Owned {
    /// display name, e.g. `Lead`
    const NAME: &'static str;
    /// message for a non-Admin delete attempt
    const DELETE_DENIED: &'static str = ROLE_DENIED;

    fn assigned_to(&self) -> &str;

    /// A locked entity may only be modified by an Admin.
    fn locked(&self) -> bool {
        false
    }
}

impl Owned for Lead {
    const NAME: &'static str = "Lead";
    fn assigned_to(&self) -> &str {
        &self.assigned_to
    }
}

impl Owned for Customer {
    const NAME: &'static str = "Customer";
    fn assigned_to(&self) -> &str {
        &self.assigned_to
    }
}

impl Owned for Deal {
    const NAME: &'static str = "Deal";
    fn assigned_to(&self) -> &str {
        &self.assigned_to
    }
    fn locked(&self) -> bool {
        self.stage.is_terminal()
    }
}

impl Owned for Task {
    const NAME: &'static str = "Task";
    const DELETE_DENIED: &'static str =
        "Only Admins can delete tasks. You can mark tasks as 'Cancelled' instead.";
    fn assigned_to(&self) -> &str {
        &self.assigned_to
    }
}

/// 可见范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<'a> {
    All,
    Owner(&'a str),
}

impl<'a> Scope<'a> {
    pub fn of(actor: &'a Actor) -> Self {
        op::ternary!(actor.is_admin() => Scope::All; Scope::Owner(&actor.id))
    }

    /// Store filter selecting exactly the visible entities.
    pub fn filter(&self) -> Filter {
        match self {
            Scope::All => Filter::all(),
            Scope::Owner(id) => Filter::all().eq("assignedTo", *id),
        }
    }

    pub fn admits(&self, assigned_to: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Owner(id) => *id == assigned_to,
        }
    }
}

pub fn can_access<E: Owned>(actor: &Actor, entity: &E, action: Action) -> CrmResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    match action {
        Action::Delete => Err(CrmError::forbidden(E::DELETE_DENIED)),
        _ if !Scope::of(actor).admits(entity.assigned_to()) => Err(CrmError::forbidden(format!(
            "You are not authorized to access this {}",
            E::NAME.to_lowercase()
        ))),
        Action::Update if entity.locked() => Err(CrmError::invalid_state(
            "Cannot edit closed deals. Only Admins can make corrections to closed deals.",
        )),
        _ => Ok(()),
    }
}

/// Owner of a new entity: the requested user for an Admin, otherwise the
/// actor itself.
pub fn resolve_assignee<E: Owned>(actor: &Actor, requested: Option<&str>) -> CrmResult<String> {
    match requested {
        Some(id) if id != actor.id && !actor.is_admin() => {
            let noun = E::NAME.to_lowercase();
            Err(CrmError::forbidden(format!(
                "You can only assign {noun}s to yourself. Only Admins can assign {noun}s to other users."
            )))
        }
        Some(id) => Ok(id.to_owned()),
        None => Ok(actor.id.clone()),
    }
}

/// A patch carrying fields only an Admin may change.
pub trait Reassignable {
    /// Drops the Admin-only fields.
    fn degrade(&mut self);
}

impl Reassignable for LeadPatch {
    fn degrade(&mut self) {
        self.assigned_to = None;
    }
}

impl Reassignable for CustomerPatch {
    fn degrade(&mut self) {
        self.assigned_to = None;
    }
}

impl Reassignable for DealPatch {
    fn degrade(&mut self) {
        self.assigned_to = None;
        self.customer = None;
    }
}

impl Reassignable for TaskPatch {
    fn degrade(&mut self) {
        self.assigned_to = None;
    }
}

/// Non-Admin patches are silently degraded, never rejected.
pub fn restrict_patch<P: Reassignable>(actor: &Actor, patch: &mut P) {
    if !actor.is_admin() {
        patch.degrade();
    }
}

pub fn check_deal_customer(actor: &Actor, customer: &Customer) -> CrmResult<()> {
    if actor.is_admin() || customer.assigned_to == actor.id {
        Ok(())
    } else {
        Err(CrmError::forbidden(
            "You can only create deals for customers assigned to you. Only Admins can create deals for any customer.",
        ))
    }
}

pub fn require_admin(actor: &Actor) -> CrmResult<()> {
    op::ternary!(actor.is_admin() => Ok(()); Err(CrmError::forbidden(ROLE_DENIED)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        libs::now,
        model::{CustomerStatus, LeadSource, LeadStatus, Money, Stage},
        perm::roles::Role,
    };

    fn admin() -> Actor {
        Actor::new("admin", Role::Admin)
    }

    fn sales(id: &str) -> Actor {
        Actor::new(id, Role::SalesUser)
    }

    fn lead(owner: &str) -> Lead {
        Lead {
            id: "l1".into(),
            name: "Ann".into(),
            email: "ann@acme.com".into(),
            phone: "555".into(),
            company: None,
            source: LeadSource::Website,
            status: LeadStatus::New,
            assigned_to: owner.into(),
            notes: None,
            converted_to_customer: false,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn customer(owner: &str) -> Customer {
        Customer {
            id: "c1".into(),
            name: "Acme".into(),
            email: "ops@acme.com".into(),
            phone: "555".into(),
            company: None,
            address: None,
            lead_id: None,
            assigned_to: owner.into(),
            status: CustomerStatus::Active,
            total_deals: 0,
            total_revenue: Money::ZERO,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn deal(owner: &str, stage: Stage) -> Deal {
        Deal {
            id: "d1".into(),
            title: "Licences".into(),
            value: Money::from(1000),
            customer: "c1".into(),
            stage,
            probability: 10,
            expected_close_date: None,
            assigned_to: owner.into(),
            notes: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn owners_and_admins_can_read() {
        assert!(can_access(&sales("s1"), &lead("s1"), Action::Read).is_ok());
        assert!(can_access(&admin(), &lead("s1"), Action::Read).is_ok());
        assert!(matches!(
            can_access(&sales("s2"), &lead("s1"), Action::Read),
            Err(CrmError::Forbidden(_))
        ));
    }

    #[test]
    fn closed_deals_are_locked_for_sales_users() {
        let won = deal("s1", Stage::ClosedWon);
        assert!(matches!(
            can_access(&sales("s1"), &won, Action::Update),
            Err(CrmError::InvalidState(_))
        ));
        assert!(can_access(&admin(), &won, Action::Update).is_ok());
        // visibility is decided before the lock
        assert!(matches!(
            can_access(&sales("s2"), &won, Action::Update),
            Err(CrmError::Forbidden(_))
        ));
        assert!(can_access(&sales("s1"), &deal("s1", Stage::Proposal), Action::Update).is_ok());
    }

    #[test]
    fn only_admins_delete() {
        let task = Task {
            id: "t1".into(),
            title: "Call".into(),
            description: None,
            kind: crate::model::TaskType::Call,
            priority: Default::default(),
            status: Default::default(),
            due_date: now(),
            related: crate::model::Related::Lead("l1".into()),
            assigned_to: "s1".into(),
            created_by: "s1".into(),
            created_at: now(),
            updated_at: now(),
        };
        assert_eq!(
            can_access(&sales("s1"), &task, Action::Delete),
            Err(CrmError::forbidden(
                "Only Admins can delete tasks. You can mark tasks as 'Cancelled' instead."
            ))
        );
        assert_eq!(
            can_access(&sales("s1"), &customer("s1"), Action::Delete),
            Err(CrmError::forbidden(ROLE_DENIED))
        );
        assert!(can_access(&admin(), &task, Action::Delete).is_ok());
    }

    #[test]
    fn assignment_on_create() {
        assert_eq!(resolve_assignee::<Lead>(&sales("s1"), None), Ok("s1".into()));
        assert_eq!(resolve_assignee::<Lead>(&sales("s1"), Some("s1")), Ok("s1".into()));
        assert_eq!(
            resolve_assignee::<Lead>(&sales("s1"), Some("s2")),
            Err(CrmError::forbidden(
                "You can only assign leads to yourself. Only Admins can assign leads to other users."
            ))
        );
        assert_eq!(resolve_assignee::<Deal>(&admin(), Some("s2")), Ok("s2".into()));
    }

    #[test]
    fn sales_patches_lose_admin_fields() {
        let mut patch = DealPatch {
            title: Some("Renamed".into()),
            customer: Some("c2".into()),
            assigned_to: Some("s2".into()),
            ..Default::default()
        };
        restrict_patch(&sales("s1"), &mut patch);
        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert!(patch.customer.is_none());
        assert!(patch.assigned_to.is_none());

        let mut patch = LeadPatch {
            assigned_to: Some("s2".into()),
            ..Default::default()
        };
        restrict_patch(&admin(), &mut patch);
        assert_eq!(patch.assigned_to.as_deref(), Some("s2"));
    }

    #[test]
    fn deal_customer_must_belong_to_the_seller() {
        assert!(check_deal_customer(&sales("s1"), &customer("s1")).is_ok());
        assert!(check_deal_customer(&sales("s1"), &customer("s2")).is_err());
        assert!(check_deal_customer(&admin(), &customer("s2")).is_ok());
    }

    #[test]
    fn scope_filters_by_owner() {
        let sales = sales("s1");
        assert_eq!(Scope::of(&sales).filter(), Filter::all().eq("assignedTo", "s1"));
        assert_eq!(Scope::of(&admin()).filter(), Filter::all());
        assert!(!Scope::of(&sales).admits("s2"));
        assert!(require_admin(&sales).is_err());
        assert!(require_admin(&admin()).is_ok());
    }
}
