mod customer;
mod deal;
mod lead;
mod task;
mod user;

pub use customer::{Customer, CustomerPatch, CustomerStatus, NewCustomer};
pub use deal::{Deal, DealPatch, NewDeal, Stage};
pub use lead::{Lead, LeadPatch, LeadSource, LeadStatus, NewLead};
pub use task::{NewTask, Priority, Related, Task, TaskPatch, TaskStatus, TaskType};
pub use user::{NewUser, PublicUser, User, UserPatch, UserSummary};

/// 金额，十进制精确计算
pub type Money = rust_decimal::Decimal;
