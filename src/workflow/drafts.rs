use chrono::{DateTime, Utc};

use super::records::{Draft, Patch};
use crate::{
    error::{CrmError, CrmResult},
    libs::{check_email, require},
    model::{
        Customer, CustomerPatch, Lead, LeadPatch, LeadStatus, Money, NewCustomer, NewLead, NewTask,
        Task, TaskPatch,
    },
    perm::roles::Actor,
};

const REQUIRED: &str = "Please provide all required fields";

impl Draft for NewLead {
    type Output = Lead;

    fn requested_assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn build(self, id: String, assigned_to: String, _: &Actor, at: DateTime<Utc>) -> CrmResult<Lead> {
        require(&[self.name.as_str(), self.email.as_str(), self.phone.as_str()], REQUIRED)?;
        let source = self.source.ok_or_else(|| CrmError::validation(REQUIRED))?;
        check_email(&self.email)?;
        // 转化状态只能由转化流程写入
        let status = match self.status {
            Some(LeadStatus::Converted) => {
                return Err(CrmError::invalid_state(
                    "Leads can only be marked Converted by converting them",
                ))
            }
            status => status.unwrap_or_default(),
        };
        Ok(Lead {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            source,
            status,
            assigned_to,
            notes: self.notes,
            converted_to_customer: false,
            created_at: at,
            updated_at: at,
        })
    }
}

impl Patch for LeadPatch {
    type Target = Lead;

    fn check(&self, current: &Lead) -> CrmResult<()> {
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        match self.status {
            Some(LeadStatus::Converted) if !current.converted_to_customer => Err(
                CrmError::invalid_state("Leads can only be marked Converted by converting them"),
            ),
            Some(status) if current.converted_to_customer && status != LeadStatus::Converted => Err(
                CrmError::invalid_state("The status of a converted lead cannot be changed"),
            ),
            _ => Ok(()),
        }
    }
}

impl Draft for NewCustomer {
    type Output = Customer;

    fn requested_assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn build(
        self,
        id: String,
        assigned_to: String,
        _: &Actor,
        at: DateTime<Utc>,
    ) -> CrmResult<Customer> {
        require(&[self.name.as_str(), self.email.as_str(), self.phone.as_str()], REQUIRED)?;
        check_email(&self.email)?;
        Ok(Customer {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            address: self.address,
            lead_id: None,
            assigned_to,
            status: self.status.unwrap_or_default(),
            total_deals: 0,
            total_revenue: Money::ZERO,
            created_at: at,
            updated_at: at,
        })
    }
}

impl Patch for CustomerPatch {
    type Target = Customer;

    fn check(&self, _: &Customer) -> CrmResult<()> {
        match &self.email {
            Some(email) => check_email(email),
            None => Ok(()),
        }
    }
}

impl Draft for NewTask {
    type Output = Task;

    fn requested_assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn build(self, id: String, assigned_to: String, actor: &Actor, at: DateTime<Utc>) -> CrmResult<Task> {
        require(&[self.title.as_str()], REQUIRED)?;
        let (Some(kind), Some(due_date), Some(related)) = (self.kind, self.due_date, self.related)
        else {
            return Err(CrmError::validation(REQUIRED));
        };
        if related.id().trim().is_empty() {
            return Err(CrmError::validation(REQUIRED));
        }
        Ok(Task {
            id,
            title: self.title,
            description: self.description,
            kind,
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            due_date,
            related,
            assigned_to,
            created_by: actor.id.clone(),
            created_at: at,
            updated_at: at,
        })
    }
}

impl Patch for TaskPatch {
    type Target = Task;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        libs::now,
        model::{LeadSource, Related, TaskStatus},
        perm::roles::Role,
    };

    fn actor() -> Actor {
        Actor::new("s1", Role::SalesUser)
    }

    #[test]
    fn leads_need_every_required_field() {
        let draft = NewLead {
            name: "Ann".into(),
            email: "ann@acme.com".into(),
            phone: "555".into(),
            ..Default::default()
        };
        assert_eq!(
            draft.build("l1".into(), "s1".into(), &actor(), now()),
            Err(CrmError::validation(REQUIRED))
        );

        let draft = NewLead {
            name: "Ann".into(),
            email: "ann@acme.com".into(),
            phone: "555".into(),
            source: Some(LeadSource::Referral),
            ..Default::default()
        };
        let lead = draft.build("l1".into(), "s1".into(), &actor(), now()).unwrap();
        assert_eq!(lead.status, LeadStatus::New);
        assert!(!lead.converted_to_customer);
    }

    #[test]
    fn converted_status_belongs_to_the_conversion() {
        let draft = NewLead {
            name: "Ann".into(),
            email: "ann@acme.com".into(),
            phone: "555".into(),
            source: Some(LeadSource::Website),
            status: Some(LeadStatus::Converted),
            ..Default::default()
        };
        assert!(matches!(
            draft.build("l1".into(), "s1".into(), &actor(), now()),
            Err(CrmError::InvalidState(_))
        ));
    }

    #[test]
    fn tasks_default_priority_and_status() {
        let draft = NewTask {
            title: "Call back".into(),
            kind: Some(crate::model::TaskType::Call),
            due_date: Some(now()),
            related: Some(Related::Customer("c1".into())),
            ..Default::default()
        };
        let task = draft.build("t1".into(), "s1".into(), &actor(), now()).unwrap();
        assert_eq!(task.priority, crate::model::Priority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_by, "s1");

        let missing = NewTask {
            title: "Call back".into(),
            ..Default::default()
        };
        assert!(missing.build("t2".into(), "s1".into(), &actor(), now()).is_err());
    }
}
