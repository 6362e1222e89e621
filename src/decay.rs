//! Decay scoring for memories
//!
//! Two variants exist:
//!
//! - [`score_on_access`] runs when a memory is touched and includes an age
//!   factor `1 / (days_since_creation + 1)`.
//! - [`score_on_sweep`] runs in batch sweeps and omits the age factor.
//!
//! Scores carry four decimal digits. Threshold and ordering comparisons
//! use the rounded value, the same value that is written to disk.

use crate::types::Memory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Weight applied to `ln(access_count + 1)`
const ACCESS_WEIGHT: f64 = 0.1;

/// Recency/frequency score rounded to four decimals
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct DecayScore(f64);

impl DecayScore {
    /// Score given to new and freshly merged memories
    pub const FRESH: DecayScore = DecayScore(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self((value * 10_000.0).round() / 10_000.0)
        } else {
            Self(0.0)
        }
    }

    pub fn fresh() -> Self {
        Self::FRESH
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Score in ten-thousandths, used for exact tie detection
    pub fn units(&self) -> i64 {
        (self.0 * 10_000.0).round() as i64
    }
}

impl std::fmt::Display for DecayScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Serialize for DecayScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DecayScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(DecayScore::new(n)),
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(DecayScore::new)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Fractional days between `earlier` and `now`, never negative
pub fn days_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - earlier).num_milliseconds().max(0);
    millis as f64 / MILLIS_PER_DAY
}

fn access_factor(access_count: u64) -> f64 {
    ((access_count as f64) + 1.0).ln() * ACCESS_WEIGHT
}

fn recency_factor(memory: &Memory, now: DateTime<Utc>) -> f64 {
    1.0 / (days_between(memory.accessed_at, now) + 1.0)
}

/// Score recomputed when a memory is accessed. Includes the age factor.
pub fn score_on_access(memory: &Memory, now: DateTime<Utc>) -> DecayScore {
    let age_factor = 1.0 / (days_between(memory.created_at, now) + 1.0);
    DecayScore::new(access_factor(memory.access_count) * recency_factor(memory, now) * age_factor)
}

/// Score recomputed by batch sweeps. No age factor.
pub fn score_on_sweep(memory: &Memory, now: DateTime<Utc>) -> DecayScore {
    DecayScore::new(access_factor(memory.access_count) * recency_factor(memory, now))
}
