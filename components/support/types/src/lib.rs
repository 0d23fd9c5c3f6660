/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Result as RusqliteResult;
use serde_derive::*;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch. Bookmark rows store `date_added`,
/// `server_modified` and `local_modified` in this unit.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Returns None if `other` is later than `self`.
    #[inline]
    pub fn duration_since(self, other: Timestamp) -> Option<Duration> {
        SystemTime::from(self).duration_since(other.into()).ok()
    }

    #[inline]
    pub fn checked_add(self, d: Duration) -> Option<Timestamp> {
        SystemTime::from(self).checked_add(d).map(Timestamp::from)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis_i64(self) -> i64 {
        self.0 as i64
    }
}

impl From<Timestamp> for u64 {
    #[inline]
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl From<SystemTime> for Timestamp {
    #[inline]
    fn from(st: SystemTime) -> Self {
        // A clock set before 1970 reads as the epoch.
        let d = st.duration_since(UNIX_EPOCH).unwrap_or_default();
        Timestamp(d.as_secs() * 1000 + u64::from(d.subsec_millis()))
    }
}

impl From<Timestamp> for SystemTime {
    #[inline]
    fn from(ts: Timestamp) -> Self {
        UNIX_EPOCH + Duration::from_millis(ts.into())
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(ts: u64) -> Self {
        Timestamp(ts)
    }
}

impl fmt::Display for Timestamp {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> RusqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0 as i64)) // hrm - no u64 in rusqlite
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_i64().map(|v| Timestamp(v.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_round_trip() {
        let st = UNIX_EPOCH + Duration::from_millis(1_234_567);
        let ts = Timestamp::from(st);
        assert_eq!(ts, Timestamp(1_234_567));
        assert_eq!(SystemTime::from(ts), st);
    }

    #[test]
    fn test_duration_since() {
        let early = Timestamp(1000);
        let late = Timestamp(2500);
        assert_eq!(late.duration_since(early), Some(Duration::from_millis(1500)));
        assert_eq!(early.duration_since(late), None);
        assert_eq!(
            early.checked_add(Duration::from_millis(1500)),
            Some(late)
        );
    }

    #[test]
    fn test_sql() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let ts: Timestamp = conn
            .query_row("SELECT ?", [Timestamp(42)], |row| row.get(0))
            .unwrap();
        assert_eq!(ts, Timestamp(42));
        let negative: Timestamp = conn.query_row("SELECT -5", [], |row| row.get(0)).unwrap();
        assert_eq!(negative, Timestamp(0));
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&Timestamp(99)).unwrap();
        assert_eq!(json, "99");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Timestamp(99));
    }
}
