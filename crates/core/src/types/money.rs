//! Money in minor currency units.
//!
//! All arithmetic on prices happens in whole cents. Decimal conversion only
//! happens at the display edge.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative amount of money in minor units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(u64);

impl Cents {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a number of cents.
    #[must_use]
    pub const fn new(cents: u64) -> Self {
        Self(cents)
    }

    /// Get the raw number of cents.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Add two amounts, clamping at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiply by a quantity, clamping at `u64::MAX`.
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Amount in major units with two decimal places (e.g. `12.90`).
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), 2)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_decimal())
    }
}

impl From<u64> for Cents {
    fn from(cents: u64) -> Self {
        Self(cents)
    }
}

impl TryFrom<i64> for Cents {
    type Error = core::num::TryFromIntError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        u64::try_from(cents).map(Self)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

/// ISO 4217 currency codes accepted by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    AUD,
    NZD,
    USD,
}

impl CurrencyCode {
    /// Lowercase code as expected by the Stripe API.
    #[must_use]
    pub const fn stripe_code(self) -> &'static str {
        match self {
            Self::AUD => "aud",
            Self::NZD => "nzd",
            Self::USD => "usd",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUD" => Ok(Self::AUD),
            "NZD" => Ok(Self::NZD),
            "USD" => Ok(Self::USD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

// Stored as BIGINT; negative values are rejected on read.
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Cents {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Cents {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::try_from(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Cents {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let raw = i64::try_from(self.0)?;
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&raw, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats_dollars() {
        assert_eq!(Cents::new(1290).to_string(), "$12.90");
        assert_eq!(Cents::new(10_000).to_string(), "$100.00");
        assert_eq!(Cents::ZERO.to_string(), "$0.00");
        assert_eq!(Cents::new(5).to_string(), "$0.05");
    }

    #[test]
    fn test_checked_arithmetic_detects_overflow() {
        assert_eq!(Cents::new(u64::MAX).checked_add(Cents::new(1)), None);
        assert_eq!(Cents::new(u64::MAX).checked_mul(2), None);
        assert_eq!(Cents::new(3495).checked_mul(2), Some(Cents::new(6990)));
    }

    #[test]
    fn test_sum_saturates() {
        let total: Cents = [Cents::new(u64::MAX), Cents::new(10)].into_iter().sum();
        assert_eq!(total, Cents::new(u64::MAX));
    }

    #[test]
    fn test_negative_i64_rejected() {
        assert!(Cents::try_from(-1_i64).is_err());
        assert_eq!(Cents::try_from(42_i64).ok(), Some(Cents::new(42)));
    }

    #[test]
    fn test_currency_code_parsing() {
        assert_eq!("aud".parse::<CurrencyCode>().ok(), Some(CurrencyCode::AUD));
        assert!("xyz".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::AUD.stripe_code(), "aud");
    }
}
