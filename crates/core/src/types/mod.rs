//! Value types shared by every Exhale component.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Cents, CurrencyCode};
pub use status::*;
