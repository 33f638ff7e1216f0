//! Money arithmetic in currency minor units.

use serde::{Deserialize, Serialize};

/// A monetary amount in minor units (cents for USD, yen for JPY).
///
/// Storing minor units avoids floating point drift; amounts only become
/// display strings at the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: i64) -> Money {
        Money(self.0 * quantity)
    }

    /// Returns the absolute difference between two amounts.
    pub fn abs_diff(&self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Supported order currencies with their minor-unit exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    /// Parses an ISO 4217 code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            "JPY" => Some(Currency::Jpy),
            _ => None,
        }
    }

    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    /// Number of decimal digits in the minor unit (0 for JPY, 2 for USD).
    pub fn minor_unit_exponent(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// Rounding tolerance for monetary invariants.
    ///
    /// Amounts are stored in minor units, so the tolerance is one minor
    /// unit in every currency: one cent for USD/EUR/GBP, one yen for JPY.
    /// A zero-decimal currency therefore tolerates a whole unit, not 0.01.
    pub fn tolerance(&self) -> Money {
        Money::from_minor(1)
    }

    /// Formats an amount for display in this currency.
    pub fn format(&self, amount: Money) -> String {
        let exponent = self.minor_unit_exponent();
        if exponent == 0 {
            return format!("{} {}", amount.minor(), self.code());
        }
        let scale = 10_i64.pow(exponent);
        let sign = if amount.is_negative() { "-" } else { "" };
        let minor = amount.minor().abs();
        format!(
            "{}{}.{:0width$} {}",
            sign,
            minor / scale,
            minor % scale,
            self.code(),
            width = exponent as usize
        )
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!(a.multiply(3).minor(), 3000);
    }

    #[test]
    fn money_comparison() {
        assert!(Money::from_minor(100).is_positive());
        assert!(Money::from_minor(0).is_zero());
        assert!(Money::from_minor(-100).is_negative());
    }

    #[test]
    fn money_abs_diff_is_symmetric() {
        let a = Money::from_minor(100);
        let b = Money::from_minor(103);
        assert_eq!(a.abs_diff(b), Money::from_minor(3));
        assert_eq!(b.abs_diff(a), Money::from_minor(3));
    }

    #[test]
    fn money_sum() {
        let total: Money = [10, 20, 30].into_iter().map(Money::from_minor).sum();
        assert_eq!(total.minor(), 60);
    }

    #[test]
    fn money_assign_ops() {
        let mut m = Money::from_minor(100);
        m += Money::from_minor(50);
        m -= Money::from_minor(30);
        assert_eq!(m.minor(), 120);
    }

    #[test]
    fn currency_codes_roundtrip() {
        for currency in [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy] {
            assert_eq!(Currency::from_code(currency.code()), Some(currency));
        }
        assert_eq!(Currency::from_code("usd"), Some(Currency::Usd));
        assert_eq!(Currency::from_code("XXX"), None);
    }

    #[test]
    fn currency_tolerance_is_one_minor_unit() {
        assert_eq!(Currency::Usd.tolerance(), Money::from_minor(1));
        assert_eq!(Currency::Jpy.tolerance(), Money::from_minor(1));
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(Currency::Usd.format(Money::from_minor(1234)), "12.34 USD");
        assert_eq!(Currency::Usd.format(Money::from_minor(-5)), "-0.05 USD");
        assert_eq!(Currency::Jpy.format(Money::from_minor(1234)), "1234 JPY");
    }

    #[test]
    fn currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::Eur).unwrap();
        assert_eq!(json, "\"EUR\"");
        let back: Currency = serde_json::from_str("\"JPY\"").unwrap();
        assert_eq!(back, Currency::Jpy);
    }
}
