//! Decoders for the loosely typed fields of platform records.
//!
//! Account documents are schemaless on the server side, so numeric fields show
//! up as numbers, numeric strings, empty strings or `null` depending on which
//! code path last wrote them.

use crate::enums::TradingMode;
use rust_decimal::Decimal;
use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Decodes `null` as the type's default value.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a number, a numeric string, an empty string or `null` into a `Decimal`.
///
/// Empty and missing values count as zero.
pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()).map_err(de::Error::custom),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Some(Value::String(s)) => parse_decimal(s.trim()).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!(
            "expected a number or numeric string, got {other}"
        ))),
    }
}

/// Decodes a trading mode, treating blanks and unknown spellings as absent.
pub fn optional_mode<'de, D>(deserializer: D) -> Result<Option<TradingMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw))
}
