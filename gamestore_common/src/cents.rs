use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "usd";

//--------------------------------------       Cents         ---------------------------------------------------------
/// An amount of money expressed in the minor unit of its currency (cents for USD).
///
/// Prices and order amounts are always stored as whole minor units so that the value charged at the gateway
/// is exactly the value recorded on the order.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Parses a decimal amount in major units, e.g. `"9"`, `"9.5"` or `"12.99"`. At most two decimal places are
/// accepted.
impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(CentsConversionError(format!("'{s}' is not a valid amount")));
        }
        let whole = whole.parse::<i64>().map_err(|e| CentsConversionError(format!("{s}: {e}")))?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| CentsConversionError(format!("{s}: {e}")))? * 10,
            _ => frac.parse::<i64>().map_err(|e| CentsConversionError(format!("{s}: {e}")))?,
        };
        let value = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| CentsConversionError(format!("{s} overflows")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
