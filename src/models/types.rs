use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::time::Duration;

/// Unix timestamp in milliseconds, the storage format of every `*_at` column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, sqlx::Type)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether `self` is more than `window` older than `now`.
    pub fn is_older_than(&self, window: Duration, now: Timestamp) -> bool {
        let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        now.0.saturating_sub(self.0) > window
    }

    pub fn add_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for i64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(
            &self
                .to_datetime()
                .to_rfc3339_opts(SecondsFormat::Millis, false),
        )
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_boundary_is_inclusive() {
        let at = Timestamp::from(1_700_000_000_000);
        let window = Duration::from_secs(5);
        assert!(!at.is_older_than(window, at));
        assert!(!at.is_older_than(window, at.add_millis(5000)));
        assert!(at.is_older_than(window, at.add_millis(5001)));
        // a clock that went backwards is never stale
        assert!(!at.is_older_than(window, at.add_millis(-10_000)));
    }

    #[test]
    fn serializes_as_rfc3339() {
        let at = Timestamp::from(1_700_000_000_123);
        assert_eq!(
            serde_json::to_string(&at).unwrap(),
            "\"2023-11-14T22:13:20.123+00:00\""
        );
    }
}
