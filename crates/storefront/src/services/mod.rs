//! Business logic services for the storefront.
//!
//! - `auth` - Customer registration and password login
//! - `cart_storage` - Session-backed storage for the cart store
//! - `email` - Order confirmation and welcome emails

pub mod auth;
pub mod cart_storage;
pub mod email;

pub use cart_storage::SessionCartStorage;
pub use email::{EmailError, EmailService};
