/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::overrides::override_folders;
use super::{check_url_length, truncate_title};
use crate::db::BookmarksDb;
use crate::error::*;
use crate::storage::favicons::{record_icon_for_url_in_tx, Favicon};
use crate::types::{BookmarkNodeType, SyncStatus, Timestamp};
use rusqlite::named_params;
use sql_support::ConnExt;
use sync_guid::Guid;
use url::Url;

/// A new bookmark, appended as the last child of `parent_guid`.
#[derive(Debug, Clone)]
pub struct InsertableBookmark {
    pub url: Url,
    pub title: String,
    pub favicon: Option<Favicon>,
    pub parent_guid: Guid,
    pub parent_title: String,
}

/// Insert a bookmark into the local plane, returning its new GUID. Either
/// the whole insertion happens or none of it does.
pub fn insert_bookmark(db: &BookmarksDb, bm: InsertableBookmark) -> Result<Guid> {
    let tx = db.begin_transaction()?;
    let result = insert_bookmark_in_tx(db, bm);
    match result {
        Ok(_) => tx.commit()?,
        Err(_) => tx.rollback()?,
    }
    result
}

fn insert_bookmark_in_tx(db: &BookmarksDb, bm: InsertableBookmark) -> Result<Guid> {
    let url = bm.url.as_str();
    check_url_length(url)?;
    let title = truncate_title(&bm.title);
    if let Some(favicon) = &bm.favicon {
        record_icon_for_url_in_tx(db, url, favicon)?;
    }

    let guid = Guid::random();
    let now = Timestamp::now();
    log::debug!("Inserting {} into {}", guid, bm.parent_guid);

    db.execute_cached(
        "INSERT INTO bookmarksLocal
            (guid, type, date_added, bmkUri, title, parentid, parentName,
             local_modified, sync_status, faviconID)
         VALUES
            (:guid, :type, :now, :url, :title, :parent, :parent_name,
             :now, :sync_status,
             (SELECT iconID FROM view_icon_for_url WHERE url = :url))",
        named_params! {
            ":guid": guid,
            ":type": BookmarkNodeType::Bookmark,
            ":now": now,
            ":url": url,
            ":title": title,
            ":parent": bm.parent_guid,
            ":parent_name": bm.parent_title,
            ":sync_status": SyncStatus::New,
        },
    )?;

    // The parent's child list is about to change, so it needs a local row.
    let local_parent_deleted: Option<bool> = db.try_query_one(
        "SELECT is_deleted FROM bookmarksLocal WHERE guid = :guid",
        named_params! { ":guid": bm.parent_guid },
        true,
    )?;
    match local_parent_deleted {
        None => {
            let in_mirror = db.exists(
                "SELECT 1 FROM bookmarksMirror WHERE guid = :guid",
                named_params! { ":guid": bm.parent_guid },
            )?;
            if !in_mirror {
                return Err(InvalidBookmarkOperation::NoSuchFolder(bm.parent_guid).into());
            }
            override_folders(db, std::slice::from_ref(&bm.parent_guid), now)?;
        }
        Some(true) => {
            return Err(InvalidBookmarkOperation::FolderDeleted(bm.parent_guid).into());
        }
        Some(false) => {
            db.execute_cached(
                "UPDATE bookmarksLocal SET sync_status = :sync_status, local_modified = :now
                 WHERE guid = :guid",
                named_params! {
                    ":sync_status": SyncStatus::Changed,
                    ":now": now,
                    ":guid": bm.parent_guid,
                },
            )?;
        }
    }

    // Always append, so the new item has the largest index.
    db.execute_cached(
        "INSERT INTO bookmarksLocalStructure (parent, child, idx)
         VALUES (:parent, :child,
                 (SELECT coalesce(max(idx), -1) + 1 FROM bookmarksLocalStructure
                  WHERE parent = :parent))",
        named_params! { ":parent": bm.parent_guid, ":child": guid },
    )?;
    Ok(guid)
}
