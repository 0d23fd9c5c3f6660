/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Removing records from the local plane, and the other local edits.
//!
//! A removed record that was never synced (`New`) is dropped outright. One
//! that came from the mirror (`Changed`) becomes a tombstone, so that the
//! deletion itself can be uploaded.

use super::overrides::{override_folders, override_non_folders};
use super::root_guid::BookmarkRootGuid;
use super::{check_url_length, truncate_title};
use crate::db::BookmarksDb;
use crate::error::*;
use crate::storage::favicons::cleanup_orphaned_favicons;
use crate::types::{SyncStatus, Timestamp};
use rusqlite::{named_params, params_from_iter, Connection};
use sql_support::{self, repeat_sql_vars, ConnExt};
use std::collections::HashSet;
use sync_guid::Guid;
use url::Url;

// Tombstones keep their identity and nothing else.
fn mark_deleted_sql(where_fragment: &str, now: Timestamp) -> String {
    format!(
        "UPDATE bookmarksLocal SET
            date_added = NULL,
            is_deleted = 1,
            local_modified = {now},
            bmkUri = NULL,
            feedUri = NULL,
            siteUri = NULL,
            pos = NULL,
            title = NULL,
            tags = NULL,
            keyword = NULL,
            description = NULL,
            parentid = NULL,
            parentName = NULL,
            folderName = NULL,
            queryId = NULL,
            faviconID = NULL
         WHERE {fragment} AND sync_status = {changed}",
        now = now.as_millis_i64(),
        fragment = where_fragment,
        changed = SyncStatus::Changed as u8,
    )
}

/// Remove `guids`, and everything beneath any folders among them, from the
/// local plane.
///
/// Panics if any of the roots are named.
pub fn remove_guids(db: &BookmarksDb, guids: &[Guid]) -> Result<()> {
    assert!(
        !guids
            .iter()
            .any(|guid| BookmarkRootGuid::from_guid(guid).is_some()),
        "Can't remove a root"
    );
    if guids.is_empty() {
        return Ok(());
    }
    log::debug!("Removing {:?}", guids);
    let tx = db.begin_transaction()?;
    let result = remove_guids_in_tx(db, guids);
    match result {
        Ok(_) => tx.commit()?,
        Err(_) => tx.rollback()?,
    }
    result
}

fn remove_guids_in_tx(db: &Connection, guids: &[Guid]) -> Result<()> {
    let now = Timestamp::now();

    // We're about to remove children of these, so they need local copies of
    // their child lists.
    let parents = non_overridden_parents_of(db, guids)?;
    override_folders(db, &parents, now)?;

    // Everything below a removed folder goes too. We're removing whole
    // child lists, so there's no index repair to do down there.
    delete_children_of_guids(db, guids, now)?;

    override_non_folders(db, guids, now)?;

    // One at a time, so that removing several siblings keeps indices right.
    for guid in guids {
        remove_local_by_guid(db, guid, now)?;
    }
    Ok(())
}

fn non_overridden_parents_of(db: &Connection, guids: &[Guid]) -> Result<Vec<Guid>> {
    let mut parents = Vec::new();
    sql_support::each_chunk(guids, |chunk, _| -> Result<()> {
        let found: Vec<Guid> = db.query_rows_and_then(
            &format!(
                "SELECT DISTINCT parent FROM view_bookmarksLocalStructure_on_mirror
                 WHERE child IN ({}) AND is_overridden = 0",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
            |row| row.get(0),
        )?;
        parents.extend(found);
        Ok(())
    })?;
    parents.sort();
    parents.dedup();
    Ok(parents)
}

fn children_of(db: &Connection, parents: &[Guid]) -> Result<Vec<Guid>> {
    let mut children = Vec::new();
    sql_support::each_chunk(parents, |chunk, _| -> Result<()> {
        let found: Vec<Guid> = db.query_rows_and_then(
            &format!(
                "SELECT child FROM view_bookmarksLocalStructure_on_mirror
                 WHERE parent IN ({})",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
            |row| row.get(0),
        )?;
        children.extend(found);
        Ok(())
    })?;
    Ok(children)
}

/// Delete every descendant of `guids`. The whole affected subtree is read
/// first, a level at a time, then removed deepest level first.
fn delete_children_of_guids(
    db: &Connection,
    guids: &[Guid],
    now: Timestamp,
) -> Result<()> {
    // A target found below another target is removed on its own later, so
    // it's dropped from the walk. Anything else seen twice is a cycle.
    let targets: HashSet<&Guid> = guids.iter().collect();
    let mut seen: HashSet<Guid> = HashSet::new();
    let mut levels: Vec<(Vec<Guid>, Vec<Guid>)> = Vec::new();
    let mut parents = guids.to_vec();
    while !parents.is_empty() {
        let mut children = Vec::new();
        for child in children_of(db, &parents)? {
            if targets.contains(&child) {
                continue;
            }
            if !seen.insert(child.clone()) {
                return Err(Corruption::Cycle(child).into());
            }
            children.push(child);
        }
        log::debug!("Children of {:?} are {:?}", parents, children);
        levels.push((parents, children.clone()));
        parents = children;
    }

    for (parents, children) in levels.into_iter().rev() {
        // The children need local rows to tombstone. They're about to lose
        // their own children, so there's no structure worth copying.
        override_non_folders(db, &children, now)?;

        sql_support::each_chunk(&parents, |chunk, _| -> Result<()> {
            db.execute(
                &format!(
                    "DELETE FROM bookmarksLocalStructure WHERE parent IN ({})",
                    repeat_sql_vars(chunk.len())
                ),
                params_from_iter(chunk),
            )?;
            Ok(())
        })?;

        let mut removed = 0;
        sql_support::each_chunk(&children, |chunk, _| -> Result<()> {
            let vars = repeat_sql_vars(chunk.len());
            removed += db.execute(
                &format!(
                    "DELETE FROM bookmarksLocal WHERE guid IN ({}) AND sync_status = {}",
                    vars,
                    SyncStatus::New as u8
                ),
                params_from_iter(chunk),
            )?;
            removed += db.execute(
                &mark_deleted_sql(&format!("guid IN ({})", vars), now),
                params_from_iter(chunk),
            )?;
            Ok(())
        })?;
        if removed < children.len() {
            log::warn!(
                "{} of {} children were neither new nor changed, and were left alone",
                children.len() - removed,
                children.len()
            );
        }
    }
    Ok(())
}

/// Remove a single record whose parent already has a local child list,
/// closing the gap it leaves among its siblings.
fn remove_local_by_guid(db: &Connection, guid: &Guid, now: Timestamp) -> Result<()> {
    let position: Option<(Guid, i64)> = db.try_query_row(
        "SELECT parent, idx FROM bookmarksLocalStructure WHERE child = :guid",
        named_params! { ":guid": guid },
        |row| -> Result<_> { Ok((row.get(0)?, row.get(1)?)) },
        true,
    )?;
    if let Some((parent, idx)) = &position {
        db.execute_cached(
            "UPDATE bookmarksLocalStructure SET idx = idx - 1
             WHERE parent = :parent AND idx > :idx",
            named_params! { ":parent": parent, ":idx": idx },
        )?;
    }

    let mut removed = db.execute_cached(
        "DELETE FROM bookmarksLocal WHERE guid = :guid AND sync_status = :new",
        named_params! { ":guid": guid, ":new": SyncStatus::New },
    )?;
    removed += db.execute(
        &mark_deleted_sql("guid = :guid", now),
        named_params! { ":guid": guid },
    )?;
    if removed == 0 {
        log::warn!("{} was neither new nor changed, and was left alone", guid);
    }

    db.execute_cached(
        "DELETE FROM bookmarksLocalStructure WHERE child = :guid",
        named_params! { ":guid": guid },
    )?;

    if let Some((parent, _)) = position {
        db.execute_cached(
            "UPDATE bookmarksLocal SET local_modified = :now WHERE guid = :parent",
            named_params! { ":now": now, ":parent": parent },
        )?;
    }
    Ok(())
}

/// Change the title and URL of a record, overriding it first if it's only
/// in the mirror. Fails with `NoSuchGuid` if there's no live record.
pub fn update_guid(db: &BookmarksDb, guid: &Guid, title: &str, url: &Url) -> Result<()> {
    let url = url.as_str();
    check_url_length(url)?;
    let title = truncate_title(title);
    log::debug!("Updating {}", guid);

    let tx = db.begin_transaction()?;
    let now = Timestamp::now();
    override_non_folders(db, std::slice::from_ref(guid), now)?;
    let changed = db.execute_cached(
        "UPDATE bookmarksLocal SET title = :title, bmkUri = :url, local_modified = :now
         WHERE guid = :guid AND is_deleted = 0",
        named_params! {
            ":title": title,
            ":url": url,
            ":now": now,
            ":guid": guid,
        },
    )?;
    if changed == 0 {
        tx.rollback()?;
        return Err(InvalidBookmarkOperation::NoSuchGuid(guid.clone()).into());
    }
    tx.commit()?;
    Ok(())
}

/// Drop every local record except the roots, then tidy up favicons.
pub fn clear_bookmarks(db: &BookmarksDb) -> Result<()> {
    let tx = db.begin_transaction()?;
    let root = BookmarkRootGuid::Root.guid();
    db.execute_cached(
        "DELETE FROM bookmarksLocalStructure WHERE child IN
            (SELECT guid FROM bookmarksLocal WHERE parentid IS NOT :root)",
        named_params! { ":root": root },
    )?;
    let removed = db.execute_cached(
        "DELETE FROM bookmarksLocal WHERE parentid IS NOT :root",
        named_params! { ":root": root },
    )?;
    log::info!("Cleared {} local bookmarks", removed);
    cleanup_orphaned_favicons(db)?;
    tx.commit()?;
    Ok(())
}
