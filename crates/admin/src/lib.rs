//! Exhale review console library.
//!
//! Staff-only JSON API: the order review queue and status changes, the
//! assessment review queue and decisions, and the customer notifications
//! that follow them. Built as a library so the router and repositories can
//! be used by tests and the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
