//! Engine clock, the single source of "now".
//!
//! RULE: engine code never calls Utc::now() directly.
//! Maturity proximity, breach projection and ledger timestamps
//! all read the clock so tests can pin the instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineClock {
    #[default]
    System,
    Fixed { at: DateTime<Utc> },
}

impl EngineClock {
    pub fn system() -> Self {
        Self::System
    }

    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed { at }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System      => Utc::now(),
            Self::Fixed { at } => *at,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }
}
