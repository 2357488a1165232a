//! Exhale Core - domain library.
//!
//! Shared by every Exhale component:
//! - `storefront` - Public catalog, cart, checkout and payment confirmation
//! - `admin` - Pharmacist review console for orders and assessments
//! - `cli` - Migrations, staff accounts and catalog tooling
//!
//! # Architecture
//!
//! The core crate holds types and pure logic only - no network, no database
//! access. Persistence enters through small ports (see [`cart::CartStorage`])
//! so every rule here can be tested with in-memory fakes.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails and status enums
//! - [`catalog`] - The static product list and access gating
//! - [`cart`] - Session cart store over an injected storage port
//! - [`checkout`] - Order total computation and payment line items
//! - [`order`] - Order lifecycle state machine
//! - [`assessment`] - Health intake validation and review decisions
//! - [`consultation`] - Paid pharmacist consultation bookings
//! - [`events`] - Domain events consumed by notifiers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assessment;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod consultation;
pub mod events;
pub mod order;
pub mod types;

pub use types::*;
