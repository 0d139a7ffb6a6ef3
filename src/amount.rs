use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency amount in naira, stored as scaled integer kobo (2 decimal places).
///
/// Monetary values are kept as exact integer minor units so repeated credits
/// never drift the way binary floats would. Serialized transparently as the
/// scaled integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    /// Parse from a float input (CSV rows, legacy task records), rounding to kobo.
    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    /// Construct from integer kobo.
    pub fn from_minor(value: i64) -> Self {
        Amount(value)
    }

    /// Construct from whole naira.
    pub fn from_major(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Subtract, refusing to go negative.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if rhs.0 > self.0 {
            None
        } else {
            Some(Amount(self.0 - rhs.0))
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_minor_preserves_value() {
        assert_eq!(Amount::from_minor(12345), Amount(12345));
    }

    #[test]
    fn from_major_scales() {
        assert_eq!(Amount::from_major(50), Amount::from_minor(5_000));
    }

    #[test]
    fn from_float_rounds_to_kobo() {
        assert_eq!(Amount::from_float(100.0), Amount::from_minor(10_000));
        assert_eq!(Amount::from_float(1.505), Amount::from_minor(151));
        assert_eq!(Amount::from_float(1.504), Amount::from_minor(150));
    }

    #[test]
    fn display_formats_two_places() {
        assert_eq!(Amount::from_minor(10_000).to_string(), "100.00");
        assert_eq!(Amount::from_minor(5).to_string(), "0.05");
        assert_eq!(Amount::from_minor(0).to_string(), "0.00");
        assert_eq!(Amount::from_minor(-150).to_string(), "-1.50");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }

    #[test]
    fn add_and_add_assign() {
        let mut a = Amount::from_minor(100);
        assert_eq!(a + Amount::from_minor(50), Amount::from_minor(150));
        a += Amount::from_minor(50);
        assert_eq!(a, Amount::from_minor(150));
    }

    #[test]
    fn checked_sub_refuses_negative() {
        let a = Amount::from_minor(100);
        assert_eq!(
            a.checked_sub(Amount::from_minor(30)),
            Some(Amount::from_minor(70))
        );
        assert_eq!(a.checked_sub(Amount::from_minor(100)), Some(Amount::ZERO));
        assert_eq!(a.checked_sub(Amount::from_minor(101)), None);
    }

    #[test]
    fn is_positive() {
        assert!(Amount::from_minor(1).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::from_minor(-1).is_positive());
    }

    #[test]
    fn serde_transparent_minor_units() {
        let json = serde_json::to_string(&Amount::from_minor(2500)).unwrap();
        assert_eq!(json, "2500");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::from_minor(2500));
    }

    #[test]
    fn ordering() {
        assert!(Amount::from_minor(100) < Amount::from_minor(200));
    }
}
