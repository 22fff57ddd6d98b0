//! Guest-to-account migration state machine.
//!
//! ```text
//! Idle ──begin──▶ Migrating ──finish──▶ Done
//!   ▲                 │                  │
//!   │                 └───fail────▶ Failed
//!   │                                    │
//!   └────────── reset (sign-out) ────────┘
//! ```
//!
//! `Done` and `Failed` may `begin` again, which is how a retry starts.

use serde::{Deserialize, Serialize};

/// What a successful migration moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Favorites inserted into the remote table.
    pub favorites: usize,
    /// Guest cart lines merged into the remote cart.
    pub cart_items: usize,
    /// Guest entries dropped because their product left the catalog.
    pub skipped: usize,
}

/// Migration progress for one shopper session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MigrationStatus {
    #[default]
    Idle,
    Migrating,
    Done(MigrationReport),
    Failed {
        reason: String,
    },
}

/// An operation that is not valid in the current state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action} while migration is {from}")]
pub struct TransitionError {
    pub action: &'static str,
    pub from: &'static str,
}

impl MigrationStatus {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Migrating => "migrating",
            Self::Done(_) => "done",
            Self::Failed { .. } => "failed",
        }
    }

    /// Start a migration.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if a migration is already in flight.
    pub fn begin(&self) -> Result<Self, TransitionError> {
        match self {
            Self::Migrating => Err(self.reject("begin")),
            Self::Idle | Self::Done(_) | Self::Failed { .. } => Ok(Self::Migrating),
        }
    }

    /// Record a successful migration.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless a migration is in flight.
    pub fn finish(&self, report: MigrationReport) -> Result<Self, TransitionError> {
        match self {
            Self::Migrating => Ok(Self::Done(report)),
            _ => Err(self.reject("finish")),
        }
    }

    /// Record a failed migration.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless a migration is in flight.
    pub fn fail(&self, reason: impl Into<String>) -> Result<Self, TransitionError> {
        match self {
            Self::Migrating => Ok(Self::Failed {
                reason: reason.into(),
            }),
            _ => Err(self.reject("fail")),
        }
    }

    const fn reject(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            from: self.name(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let report = MigrationReport {
            favorites: 2,
            cart_items: 1,
            skipped: 0,
        };
        let status = MigrationStatus::Idle
            .begin()
            .unwrap()
            .finish(report)
            .unwrap();
        assert_eq!(status, MigrationStatus::Done(report));
    }

    #[test]
    fn test_failed_can_retry() {
        let failed = MigrationStatus::Idle.begin().unwrap().fail("db down").unwrap();
        assert_eq!(failed.name(), "failed");
        assert_eq!(failed.begin().unwrap(), MigrationStatus::Migrating);
    }

    #[test]
    fn test_invalid_transitions() {
        let err = MigrationStatus::Migrating.begin().unwrap_err();
        assert_eq!(err.to_string(), "cannot begin while migration is migrating");

        assert!(MigrationStatus::Idle.finish(MigrationReport::default()).is_err());
        assert!(MigrationStatus::Idle.fail("x").is_err());
    }

    #[test]
    fn test_status_serialization() {
        let done = MigrationStatus::Done(MigrationReport {
            favorites: 3,
            cart_items: 0,
            skipped: 1,
        });
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "state": "done", "favorites": 3, "cartItems": 0, "skipped": 1 })
        );

        let parsed: MigrationStatus = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, done);
    }
}
