//! The customer an order or assessment belongs to.

use serde::Serialize;

use exhale_core::{Email, UserId};

/// Contact details needed to notify a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: UserId,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Customer {
    /// First name when known, otherwise the email address.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_falls_back_to_email() {
        let mut customer = Customer {
            id: UserId::new(1),
            email: Email::parse("sam@exhale.health").unwrap(),
            first_name: Some("  ".to_string()),
            last_name: None,
        };
        assert_eq!(customer.greeting_name(), "sam@exhale.health");

        customer.first_name = Some("Sam".to_string());
        assert_eq!(customer.greeting_name(), "Sam");
    }
}
