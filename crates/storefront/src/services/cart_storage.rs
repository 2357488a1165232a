//! Session-backed cart storage.
//!
//! Cart lines are kept in the server-side session under
//! [`keys::CART`](crate::models::session::keys::CART). They survive reloads
//! and logins on the same browser but are not shared across devices.

use exhale_core::cart::{CartLine, CartStorage};
use tower_sessions::Session;

use crate::models::session::keys;

/// [`CartStorage`] over a `tower_sessions::Session`.
#[derive(Debug, Clone)]
pub struct SessionCartStorage {
    session: Session,
}

impl SessionCartStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStorage for SessionCartStorage {
    type Error = tower_sessions::session::Error;

    async fn get(&self) -> Result<Vec<CartLine>, Self::Error> {
        Ok(self
            .session
            .get::<Vec<CartLine>>(keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn set(&self, lines: &[CartLine]) -> Result<(), Self::Error> {
        self.session.insert(keys::CART, lines).await
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.session.remove::<Vec<CartLine>>(keys::CART).await?;
        Ok(())
    }
}
