//! `YYYY-MM` month keys.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("invalid month: {month:02}. Must be 01-12");
        }
        if !(1900..=9999).contains(&year) {
            bail!("invalid year: {year}");
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Every month of `year`, January first.
    pub fn year_months(year: i32) -> impl Iterator<Item = MonthKey> {
        (1..=12).map(move |month| MonthKey { year, month })
    }

    pub fn abbr(&self) -> &'static str {
        month_abbr(self.month)
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

/// Three-letter month label; `month` must be 1..=12.
pub fn month_abbr(month: u32) -> &'static str {
    MONTH_ABBR[(month.clamp(1, 12) - 1) as usize]
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .with_context(|| format!("month key must be YYYY-MM, got {s:?}"))?;
        let year: i32 = y.parse().with_context(|| format!("bad year in {s:?}"))?;
        let month: u32 = m.parse().with_context(|| format!("bad month in {s:?}"))?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats() {
        let k: MonthKey = "2025-03".parse().unwrap();
        assert_eq!(k.year(), 2025);
        assert_eq!(k.month(), 3);
        assert_eq!(k.to_string(), "2025-03");
        assert_eq!(k.abbr(), "Mar");
        assert_eq!(k.name(), "March");
    }

    #[test]
    fn rejects_bad_keys() {
        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("abcd-01".parse::<MonthKey>().is_err());
    }

    #[test]
    fn orders_chronologically() {
        let a: MonthKey = "2024-12".parse().unwrap();
        let b: MonthKey = "2025-01".parse().unwrap();
        assert!(a < b);
        assert_eq!(MonthKey::year_months(2025).count(), 12);
    }

    #[test]
    fn serde_as_string_key() {
        let k = MonthKey::new(2025, 1).unwrap();
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"2025-01\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }
}
