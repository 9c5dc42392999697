//! Per-source progress marker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The highest `(updated_at, id)` pair already propagated for a source.
///
/// Ordering is lexicographic over `(last_updated_at, last_id)`, which is the
/// same total order the extractor pages by. The default value sits before
/// every real record: the Unix epoch and the nil UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    pub last_updated_at: DateTime<Utc>,
    pub last_id: Uuid,
}

impl Watermark {
    pub fn new(last_updated_at: DateTime<Utc>, last_id: Uuid) -> Self {
        Self {
            last_updated_at,
            last_id,
        }
    }

    /// Whether this is the starting point of a source that was never synced.
    pub fn is_initial(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            last_updated_at: DateTime::<Utc>::UNIX_EPOCH,
            last_id: Uuid::nil(),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.last_updated_at.to_rfc3339(), self.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_epoch_and_nil() {
        let wm = Watermark::default();
        assert_eq!(wm.last_updated_at.timestamp(), 0);
        assert!(wm.last_id.is_nil());
        assert!(wm.is_initial());
    }

    #[test]
    fn test_ordering_breaks_ties_by_id() {
        let ts = Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap();
        let low = Watermark::new(ts, Uuid::from_u128(1));
        let high = Watermark::new(ts, Uuid::from_u128(2));
        let later = Watermark::new(ts + chrono::Duration::seconds(1), Uuid::nil());

        assert!(low < high);
        assert!(high < later);
        assert!(Watermark::default() < low);
    }

    #[test]
    fn test_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap();
        let wm = Watermark::new(ts, Uuid::from_u128(7));
        let value = serde_json::to_value(wm).unwrap();

        assert_eq!(value["last_updated_at"], "2024-08-01T10:00:00Z");
        assert_eq!(value["last_id"], "00000000-0000-0000-0000-000000000007");
    }
}
