//! Exhale storefront library.
//!
//! Public JSON API for the pharmacy: catalog, session cart, Stripe checkout,
//! payment webhook, assessment submission and order history. Built as a
//! library so the router can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
