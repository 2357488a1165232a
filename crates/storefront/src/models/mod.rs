//! Domain models for the storefront.

pub mod profile;
pub mod session;

pub use profile::Profile;
pub use session::CurrentUser;
