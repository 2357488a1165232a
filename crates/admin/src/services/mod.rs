//! Business logic services for the review console.

pub mod auth;
pub mod notifier;

pub use notifier::Notifier;
