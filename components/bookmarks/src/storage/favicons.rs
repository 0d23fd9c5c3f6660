/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The small part of favicon storage bookmarks care about. Icons are
//! fetched and owned elsewhere; we record which icon belongs to a page so
//! new bookmarks can point at it, and drop icons nothing refers to.

use crate::db::BookmarksDb;
use crate::error::*;
use crate::types::Timestamp;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{named_params, Connection, Row};
use sql_support::ConnExt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum IconType {
    Icon = 0,
    AppleIcon = 1,
    AppleIconPrecomposed = 2,
    Guess = 3,
    Local = 4,
    NoneFound = 5,
}

impl IconType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(IconType::Icon),
            1 => Some(IconType::AppleIcon),
            2 => Some(IconType::AppleIconPrecomposed),
            3 => Some(IconType::Guess),
            4 => Some(IconType::Local),
            5 => Some(IconType::NoneFound),
            _ => None,
        }
    }
}

impl FromSql for IconType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let v = value.as_i64()?;
        u8::try_from(v)
            .ok()
            .and_then(IconType::from_u8)
            .ok_or(FromSqlError::OutOfRange(v))
    }
}

impl ToSql for IconType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as u8))
    }
}

/// A reference to an icon. Nodes carry one of these when they're read with
/// icons; they never own the row it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Favicon {
    pub url: String,
    pub date: Timestamp,
    pub icon_type: IconType,
    pub width: Option<u32>,
}

impl Favicon {
    pub fn new(url: impl Into<String>, date: Timestamp, icon_type: IconType) -> Self {
        Self {
            url: url.into(),
            date,
            icon_type,
            width: None,
        }
    }

    /// Reads the `iconURL`, `iconDate` and `iconType` columns of a row that
    /// was left-joined against `favicons`. Returns `None` when the join
    /// found nothing.
    pub(crate) fn from_joined_row(row: &Row<'_>) -> Result<Option<Self>> {
        let url = row.get::<_, Option<String>>("iconURL")?;
        let date = row.get::<_, Option<Timestamp>>("iconDate")?;
        Ok(match (url, date) {
            (Some(url), Some(date)) => Some(Favicon {
                url,
                date,
                icon_type: row
                    .get::<_, Option<IconType>>("iconType")?
                    .unwrap_or(IconType::Guess),
                width: None,
            }),
            _ => None,
        })
    }
}

/// Remember that `page_url` uses `favicon`, returning the icon's id.
pub fn record_icon_for_url(db: &BookmarksDb, page_url: &str, favicon: &Favicon) -> Result<i64> {
    let tx = db.begin_transaction()?;
    let id = record_icon_for_url_in_tx(db, page_url, favicon)?;
    tx.commit()?;
    Ok(id)
}

pub(crate) fn record_icon_for_url_in_tx(
    db: &Connection,
    page_url: &str,
    favicon: &Favicon,
) -> Result<i64> {
    db.execute_cached(
        "INSERT INTO favicons (url, width, height, type, date)
         VALUES (:url, :width, :width, :type, :date)
         ON CONFLICT(url) DO UPDATE SET
            width = excluded.width,
            height = excluded.height,
            type = excluded.type,
            date = excluded.date",
        named_params! {
            ":url": favicon.url,
            ":width": favicon.width,
            ":type": favicon.icon_type,
            ":date": favicon.date,
        },
    )?;
    let id: i64 = db.query_row_and_then_cachable(
        "SELECT id FROM favicons WHERE url = :url",
        named_params! { ":url": favicon.url },
        |row| row.get(0),
        true,
    )?;
    db.execute_cached(
        "INSERT OR IGNORE INTO favicon_sites (url, faviconID) VALUES (:page_url, :id)",
        named_params! { ":page_url": page_url, ":id": id },
    )?;
    Ok(id)
}

/// The id of the most recent icon recorded for `page_url`.
pub fn icon_id_for_url(db: &Connection, page_url: &str) -> Result<Option<i64>> {
    Ok(db.try_query_one(
        "SELECT iconID FROM view_icon_for_url WHERE url = :url",
        named_params! { ":url": page_url },
        true,
    )?)
}

/// Deletes icons that no site and no local or mirror bookmark refers to.
/// Returns how many went.
pub fn cleanup_orphaned_favicons(db: &Connection) -> Result<usize> {
    let deleted = db.execute(
        "DELETE FROM favicons WHERE id NOT IN (
            SELECT faviconID FROM favicon_sites
            UNION ALL
            SELECT faviconID FROM bookmarksLocal WHERE faviconID IS NOT NULL
            UNION ALL
            SELECT faviconID FROM bookmarksMirror WHERE faviconID IS NOT NULL
        )",
        [],
    )?;
    log::debug!("Removed {} orphaned favicons", deleted);
    Ok(deleted)
}
