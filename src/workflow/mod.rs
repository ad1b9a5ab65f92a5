//! Business workflows running on top of the policy in [`crate::perm`].

pub mod conversion;
mod drafts;
pub mod deletion;
pub mod lifecycle;
pub mod records;
pub mod users;
