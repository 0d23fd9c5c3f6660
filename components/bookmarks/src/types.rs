/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Result as RusqliteResult;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;

pub use types::Timestamp;

/// The `type` column of every bookmark value row. The values are what
/// the server (and every other client) uses, so they must never change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum BookmarkNodeType {
    Bookmark = 1,
    Folder = 2,
    Separator = 3,
    // Old desktop smart folders. We show them as (empty) folders.
    DynamicContainer = 4,
    Livemark = 5,
    Query = 6,
}

impl BookmarkNodeType {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(BookmarkNodeType::Bookmark),
            2 => Some(BookmarkNodeType::Folder),
            3 => Some(BookmarkNodeType::Separator),
            4 => Some(BookmarkNodeType::DynamicContainer),
            5 => Some(BookmarkNodeType::Livemark),
            6 => Some(BookmarkNodeType::Query),
            _ => None,
        }
    }

    /// Lenient decoding for columns that may hold a sentinel (the tree
    /// queries use -1 for "no live value row").
    #[inline]
    pub fn from_i64(v: i64) -> Option<Self> {
        u8::try_from(v).ok().and_then(Self::from_u8)
    }

    /// Types that own a child list in a structure table.
    #[inline]
    pub fn is_folder(self) -> bool {
        self == BookmarkNodeType::Folder
    }
}

impl FromSql for BookmarkNodeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let v = value.as_i64()?;
        BookmarkNodeType::from_i64(v).ok_or(FromSqlError::OutOfRange(v))
    }
}

impl ToSql for BookmarkNodeType {
    fn to_sql(&self) -> RusqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as u8))
    }
}

impl Serialize for BookmarkNodeType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

struct NodeTypeVisitor;

impl<'de> Visitor<'de> for NodeTypeVisitor {
    type Value = BookmarkNodeType;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an integer bookmark type between 1 and 6")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<BookmarkNodeType, E> {
        u8::try_from(value)
            .ok()
            .and_then(BookmarkNodeType::from_u8)
            .ok_or_else(|| E::custom(format!("unknown bookmark type: {}", value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<BookmarkNodeType, E> {
        BookmarkNodeType::from_i64(value)
            .ok_or_else(|| E::custom(format!("unknown bookmark type: {}", value)))
    }
}

impl<'de> Deserialize<'de> for BookmarkNodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_u64(NodeTypeVisitor)
    }
}

/// Sync status of a row in `bookmarksLocal`.
///
/// Rows only exist in the local table while they differ from the mirror,
/// so there's no "synced" row in practice: a record that matches the
/// server lives in the mirror alone. `Changed` rows were copied from the
/// mirror and must be tombstoned when removed; `New` rows were never
/// uploaded and can simply be dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum SyncStatus {
    Synced = 0,
    Changed = 1,
    New = 2,
}

impl SyncStatus {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SyncStatus::Synced),
            1 => Some(SyncStatus::Changed),
            2 => Some(SyncStatus::New),
            _ => None,
        }
    }
}

impl FromSql for SyncStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let v = value.as_i64()?;
        u8::try_from(v)
            .ok()
            .and_then(SyncStatus::from_u8)
            .ok_or(FromSqlError::OutOfRange(v))
    }
}

impl ToSql for SyncStatus {
    fn to_sql(&self) -> RusqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as u8))
    }
}

/// One of the three copies of the bookmark tree we keep.
///
/// Every plane has a value table (attributes, one row per GUID) and a
/// structure table (`parent, child, idx`). Reads go through views which
/// fold the mirror in underneath local or buffer rows, so a reader sees
/// what the tree looks like "from" that plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Plane {
    /// The last state we know the server agreed with.
    Mirror,
    /// Pending changes made on this device.
    Local,
    /// Records downloaded from the server but not merged yet.
    Buffer,
}

impl Plane {
    /// The raw value table. Writes go here.
    pub fn value_table(self) -> &'static str {
        match self {
            Plane::Mirror => "bookmarksMirror",
            Plane::Local => "bookmarksLocal",
            Plane::Buffer => "bookmarksBuffer",
        }
    }

    /// The raw structure table.
    pub fn structure_table(self) -> &'static str {
        match self {
            Plane::Mirror => "bookmarksMirrorStructure",
            Plane::Local => "bookmarksLocalStructure",
            Plane::Buffer => "bookmarksBufferStructure",
        }
    }

    /// The value rows visible from this plane (the plane's own rows shadowing
    /// the mirror). Includes tombstones.
    pub fn value_view(self) -> &'static str {
        match self {
            Plane::Mirror => "bookmarksMirror",
            Plane::Local => "view_bookmarksLocal_on_mirror",
            Plane::Buffer => "view_bookmarksBufferWithDeletions_on_mirror",
        }
    }

    /// The structure visible from this plane.
    pub fn structure_view(self) -> &'static str {
        match self {
            Plane::Mirror => "bookmarksMirrorStructure",
            Plane::Local => "view_bookmarksLocalStructure_on_mirror",
            Plane::Buffer => "view_bookmarksBufferStructure_on_mirror",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Plane::Mirror => "mirror",
            Plane::Local => "local",
            Plane::Buffer => "buffer",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_primitive() {
        assert_eq!(BookmarkNodeType::from_u8(5), Some(BookmarkNodeType::Livemark));
        assert_eq!(BookmarkNodeType::from_u8(0), None);
        assert_eq!(BookmarkNodeType::from_u8(7), None);
        assert_eq!(BookmarkNodeType::from_i64(-1), None);
        assert!(BookmarkNodeType::Folder.is_folder());
        assert!(!BookmarkNodeType::DynamicContainer.is_folder());
    }

    #[test]
    fn test_node_type_serde() {
        let t: BookmarkNodeType = serde_json::from_str("6").unwrap();
        assert_eq!(t, BookmarkNodeType::Query);
        assert_eq!(serde_json::to_string(&BookmarkNodeType::Separator).unwrap(), "3");
        assert!(serde_json::from_str::<BookmarkNodeType>("9").is_err());
    }

    #[test]
    fn test_sync_status_sql() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let status: SyncStatus = conn
            .query_row("SELECT ?", [SyncStatus::Changed], |row| row.get(0))
            .unwrap();
        assert_eq!(status, SyncStatus::Changed);
        let bad: rusqlite::Result<SyncStatus> = conn.query_row("SELECT 3", [], |row| row.get(0));
        assert!(bad.is_err());
    }
}
