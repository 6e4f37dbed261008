//! Database row types that have no counterpart in filmswap-types.
//! Participants and the exchange map straight onto the domain models.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, Clone)]
pub struct BannedRow {
    pub participant_id: i64,
    pub banned_at: String,
}

impl BannedRow {
    /// `banned_at` as UTC. SQLite stores "YYYY-MM-DD HH:MM:SS" with no zone.
    pub fn banned_at_utc(&self) -> Result<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.banned_at, "%Y-%m-%d %H:%M:%S")
            .with_context(|| {
                format!(
                    "unreadable banned_at {:?} for participant {}",
                    self.banned_at, self.participant_id
                )
            })?;
        Ok(naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn reads_sqlite_timestamps_as_utc() {
        let row = BannedRow {
            participant_id: 4,
            banned_at: "2024-12-01 18:30:05".into(),
        };
        let at = row.banned_at_utc().unwrap();
        assert_eq!((at.year(), at.month(), at.day()), (2024, 12, 1));
        assert_eq!((at.hour(), at.minute(), at.second()), (18, 30, 5));

        let garbled = BannedRow {
            participant_id: 4,
            banned_at: "yesterday".into(),
        };
        assert!(garbled.banned_at_utc().is_err());
    }
}
