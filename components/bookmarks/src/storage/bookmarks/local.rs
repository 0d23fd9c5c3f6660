/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Reads of whole records, mostly for the sync engine: what's changed
//! locally, and what we'd upload.

use super::record::BookmarkMirrorItem;
use super::root_guid::BookmarkRootGuid;
use crate::error::*;
use crate::types::{BookmarkNodeType, Plane, SyncStatus, Timestamp};
use rusqlite::{named_params, params_from_iter, Connection};
use sql_support::{self, repeat_sql_vars, ConnExt};
use std::collections::HashMap;
use sync_guid::Guid;

fn fill_children(db: &Connection, plane: Plane, item: &mut BookmarkMirrorItem) -> Result<()> {
    if item.node_type.is_folder() && !item.is_deleted {
        let children: Vec<Guid> = db.query_rows_and_then_cached(
            &format!(
                "SELECT child FROM {} WHERE parent = :parent ORDER BY idx",
                plane.structure_table()
            ),
            named_params! { ":parent": item.guid },
            |row| row.get(0),
        )?;
        item.children = Some(children);
    }
    Ok(())
}

/// The raw row for `guid` in one plane's own table, ignoring the others.
/// Folders come back with their child lists from the same plane.
pub fn get_item_with_guid(
    db: &Connection,
    plane: Plane,
    guid: &Guid,
) -> Result<Option<BookmarkMirrorItem>> {
    let item = db.try_query_row(
        &format!("SELECT * FROM {} WHERE guid = :guid", plane.value_table()),
        named_params! { ":guid": guid },
        BookmarkMirrorItem::from_row,
        true,
    )?;
    match item {
        Some(mut item) => {
            fill_children(db, plane, &mut item)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Like `get_item_with_guid` for the local table, but a missing row is an
/// error.
pub fn get_local_item_with_guid(db: &Connection, guid: &Guid) -> Result<BookmarkMirrorItem> {
    get_item_with_guid(db, Plane::Local, guid)?
        .ok_or_else(|| InvalidBookmarkOperation::NoSuchGuid(guid.clone()).into())
}

/// The local rows for whichever of `guids` have one.
pub fn get_local_items_with_guids(
    db: &Connection,
    guids: &[Guid],
) -> Result<HashMap<Guid, BookmarkMirrorItem>> {
    let mut items = HashMap::with_capacity(guids.len());
    sql_support::each_chunk(guids, |chunk, _| -> Result<()> {
        let rows: Vec<BookmarkMirrorItem> = db.query_rows_and_then(
            &format!(
                "SELECT * FROM bookmarksLocal WHERE guid IN ({})",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
            BookmarkMirrorItem::from_row,
        )?;
        for mut item in rows {
            fill_children(db, Plane::Local, &mut item)?;
            items.insert(item.guid.clone(), item);
        }
        Ok(())
    })?;
    Ok(items)
}

/// True if nothing but the roots has been touched locally.
pub fn is_unchanged(db: &Connection) -> Result<bool> {
    Ok(db.query_row_and_then_cachable(
        "SELECT NOT EXISTS(SELECT 1 FROM bookmarksLocal WHERE parentid IS NOT :root)",
        named_params! { ":root": BookmarkRootGuid::Root.guid() },
        |row| row.get::<_, bool>(0),
        true,
    )?)
}

/// What we'd upload on the next sync, before the first merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalModifications {
    /// Buffer records the user deleted.
    pub deletions: Vec<Guid>,
    /// New bookmarks in the mobile folder that the server hasn't seen.
    pub additions: Vec<BookmarkMirrorItem>,
}

/// Up to `limit` pending changes, deletions first.
pub fn get_local_bookmarks_modifications(
    db: &Connection,
    limit: usize,
) -> Result<LocalModifications> {
    let deletions: Vec<Guid> = db.query_rows_and_then_cached(
        "SELECT id FROM pending_deletions LIMIT :limit",
        named_params! { ":limit": limit as i64 },
        |row| row.get(0),
    )?;
    let remaining = limit.saturating_sub(deletions.len());
    let additions = if remaining == 0 {
        Vec::new()
    } else {
        db.query_rows_and_then_cached(
            "SELECT * FROM bookmarksLocal AS bookmarks
             WHERE type = :bookmark AND sync_status = :new AND parentid = :mobile
               AND NOT EXISTS (SELECT 1 FROM bookmarksBuffer buf WHERE buf.guid = bookmarks.guid)
             LIMIT :limit",
            named_params! {
                ":bookmark": BookmarkNodeType::Bookmark,
                ":new": SyncStatus::New,
                ":mobile": BookmarkRootGuid::Mobile.guid(),
                ":limit": remaining as i64,
            },
            BookmarkMirrorItem::from_row,
        )?
    };
    log::debug!(
        "{} pending deletions, {} local additions",
        deletions.len(),
        additions.len()
    );
    Ok(LocalModifications {
        deletions,
        additions,
    })
}

/// Every local tombstone, with when it was made.
pub fn get_local_deletions(db: &Connection) -> Result<Vec<(Guid, Timestamp)>> {
    db.query_rows_and_then_cached(
        "SELECT guid, local_modified FROM bookmarksLocal WHERE is_deleted = 1",
        [],
        |row| -> Result<_> {
            Ok((
                row.get::<_, Guid>(0)?,
                row.get::<_, Option<Timestamp>>(1)?.unwrap_or_default(),
            ))
        },
    )
}
