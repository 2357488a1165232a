//! Domain models for the review console.

pub mod customer;
pub mod session;
pub mod staff;

pub use customer::Customer;
pub use session::CurrentStaff;
pub use staff::StaffMember;
