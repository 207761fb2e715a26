use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Amount in raw units, the smallest indivisible denomination.
///
/// Ledger balances are 128-bit, so a `u128` holds every valid amount. On the
/// wire and in JSON the amount travels as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RawAmount(u128);

impl RawAmount {
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u128> for RawAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RawAmount {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInput(format!(
                "raw amount must be a non-negative integer, got {:?}",
                s
            )));
        }
        trimmed
            .parse::<u128>()
            .map(RawAmount)
            .map_err(|e| AppError::InvalidInput(format!("raw amount out of range: {}", e)))
    }
}

impl Serialize for RawAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RawAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
            Repr::Number(n) => Ok(RawAmount(n as u128)),
        }
    }
}

/// Display unit of the currency: `10^decimals` raw make one whole unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denomination {
    symbol: String,
    decimals: u32,
}

impl Denomination {
    /// `10^38` is the largest power of ten a `u128` holds.
    pub const MAX_DECIMALS: u32 = 38;

    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals: decimals.min(Self::MAX_DECIMALS),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Plain decimal rendering of a raw amount, never in scientific notation.
    pub fn format(&self, amount: RawAmount) -> String {
        let unit = 10u128.pow(self.decimals);
        let whole = amount.get() / unit;
        let fraction = amount.get() % unit;

        let text = if fraction == 0 {
            whole.to_string()
        } else {
            let digits = format!("{:0width$}", fraction, width = self.decimals as usize);
            format!("{}.{}", whole, digits.trim_end_matches('0'))
        };
        with_leading_zero(text)
    }
}

impl Default for Denomination {
    fn default() -> Self {
        Self::new("BANANO", 29)
    }
}

/// Display values must not begin with a bare decimal point: `.5` becomes `0.5`.
pub fn with_leading_zero(text: String) -> String {
    if text.starts_with('.') {
        format!("0{}", text)
    } else {
        text
    }
}
