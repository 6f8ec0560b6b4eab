//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default quote currency for published prices
pub const DEFAULT_CURRENCY: &str = "USD";

/// Published result of one aggregation cycle.
///
/// A snapshot is never mutated after it is published; the state store swaps
/// in a new one instead. `price` and `last_updated` carry no meaning while
/// `stale` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSnapshot {
    pub price: f64,
    pub currency: String,
    pub sources_used: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl ConsensusSnapshot {
    /// Snapshot held before any cycle has completed
    pub fn initial(currency: impl Into<String>) -> Self {
        Self {
            price: 0.0,
            currency: currency.into(),
            sources_used: 0,
            last_updated: None,
            stale: true,
        }
    }

    /// Fresh snapshot produced by a cycle with at least one contributing source
    pub fn fresh(
        price: f64,
        currency: impl Into<String>,
        sources_used: usize,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            price,
            currency: currency.into(),
            sources_used,
            last_updated: Some(last_updated),
            stale: false,
        }
    }

    /// Stale successor of `self` after a cycle in which every source dropped out.
    ///
    /// Price and timestamp are carried over untouched; `sources_used` reads zero.
    pub fn into_stale(self) -> Self {
        Self {
            sources_used: 0,
            stale: true,
            ..self
        }
    }

    pub fn is_fresh(&self) -> bool {
        !self.stale
    }

    /// Age relative to `now`, `None` if no cycle has ever produced a price
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_updated
            .map(|ts| (now - ts).to_std().unwrap_or(Duration::ZERO))
    }
}

impl Default for ConsensusSnapshot {
    fn default() -> Self {
        Self::initial(DEFAULT_CURRENCY)
    }
}

impl fmt::Display for ConsensusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stale {
            write!(f, "stale ({})", self.currency)
        } else {
            write!(
                f,
                "{:.2} {} from {} sources",
                self.price, self.currency, self.sources_used
            )
        }
    }
}
