/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Where downloaded records wait to be merged.

use super::record::BookmarkMirrorItem;
use super::validation::validate_buffer;
use crate::db::BookmarksDb;
use crate::error::*;
use rusqlite::{named_params, params_from_iter, types::ToSql, Connection};
use sql_support::{self, repeat_multi_values, repeat_sql_vars, ConnExt};
use sync_guid::Guid;

/// The buffer, as the sync engine sees it. Meant for the `Sync` connection.
pub struct BookmarkBufferStorage<'a> {
    db: &'a BookmarksDb,
}

impl<'a> BookmarkBufferStorage<'a> {
    pub fn new(db: &'a BookmarksDb) -> Self {
        Self { db }
    }

    pub fn synchronous_buffer_count(&self) -> Result<usize> {
        let count: i64 = self.db.query_one("SELECT count(*) FROM bookmarksBuffer")?;
        Ok(count as usize)
    }

    /// How many records the server should have: everything in the buffer,
    /// plus everything in the mirror nothing has shadowed.
    pub fn upstream_record_count(&self) -> Result<usize> {
        let count: i64 = self.db.query_one(
            "SELECT (SELECT count(*) FROM bookmarksBuffer) +
                    (SELECT count(*) FROM bookmarksMirror WHERE is_overridden = 0)",
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self
            .db
            .query_one("SELECT NOT EXISTS(SELECT 1 FROM bookmarksBuffer)")?)
    }

    /// Store incoming records, replacing any we already had for the same
    /// GUIDs. An incoming folder's child list replaces the old one.
    pub fn apply_records(&self, records: &[BookmarkMirrorItem]) -> Result<()> {
        self.apply_records_with_max_vars(records, sql_support::default_max_variable_number())
    }

    /// `apply_records`, binding at most `max_vars` variables per statement.
    pub fn apply_records_with_max_vars(
        &self,
        records: &[BookmarkMirrorItem],
        max_vars: usize,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        log::info!("Applying {} records to the buffer", records.len());
        let tx = self.db.begin_transaction()?;
        let result = apply_records_in_tx(self.db, records, max_vars);
        match result {
            Ok(_) => tx.commit()?,
            Err(_) => tx.rollback()?,
        }
        result
    }

    /// Called once a download finishes. Gives the WAL a chance to shrink.
    pub fn done_applying_records_after_download(&self) -> Result<()> {
        let (busy, log_frames, checkpointed): (i64, i64, i64) = self.db.query_row(
            "PRAGMA wal_checkpoint(PASSIVE)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        log::debug!(
            "WAL checkpoint: busy {}, {} frames, {} checkpointed",
            busy,
            log_frames,
            checkpointed
        );
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_buffer(self.db)
    }
}

fn apply_records_in_tx(
    db: &Connection,
    records: &[BookmarkMirrorItem],
    max_vars: usize,
) -> Result<()> {
    for record in records {
        update_or_insert(db, record)?;
    }

    // Child lists arrive whole, so the old ones go. A deleted record has no
    // children any more either.
    let replaced: Vec<&Guid> = records
        .iter()
        .filter(|record| record.is_deleted || record.node_type.is_folder())
        .map(|record| &record.guid)
        .collect();
    sql_support::each_sized_chunk(&replaced, max_vars, |chunk, _| -> Result<()> {
        db.execute(
            &format!(
                "DELETE FROM bookmarksBufferStructure WHERE parent IN ({})",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
        )?;
        Ok(())
    })?;

    let structure: Vec<(&Guid, &Guid, u32)> = records
        .iter()
        .flat_map(BookmarkMirrorItem::child_structure)
        .collect();
    let rows_per_chunk = (max_vars / 3).max(1);
    sql_support::each_sized_chunk(&structure, rows_per_chunk, |chunk, _| -> Result<()> {
        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 3);
        for (parent, child, idx) in chunk {
            params.push(parent);
            params.push(child);
            params.push(idx);
        }
        db.execute(
            &format!(
                "INSERT INTO bookmarksBufferStructure (parent, child, idx) VALUES {}",
                repeat_multi_values(chunk.len(), 3)
            ),
            params.as_slice(),
        )?;
        Ok(())
    })?;
    log::debug!("Wrote {} buffer structure rows", structure.len());

    // A record that came back from the server wins over a deletion the user
    // queued for it.
    let guids: Vec<&Guid> = records.iter().map(|record| &record.guid).collect();
    sql_support::each_sized_chunk(&guids, max_vars, |chunk, _| -> Result<()> {
        db.execute(
            &format!(
                "DELETE FROM pending_deletions WHERE id IN ({})",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
        )?;
        Ok(())
    })?;
    Ok(())
}

fn update_or_insert(db: &Connection, record: &BookmarkMirrorItem) -> Result<()> {
    let parent_name = record.parent_name.as_deref().unwrap_or("");
    let params = named_params! {
        ":guid": record.guid,
        ":type": record.node_type,
        ":date_added": record.date_added,
        ":server_modified": record.server_modified,
        ":is_deleted": record.is_deleted,
        ":has_dupe": record.has_dupe,
        ":parentid": record.parent_id,
        ":parent_name": parent_name,
        ":feed_uri": record.feed_uri,
        ":site_uri": record.site_uri,
        ":pos": record.pos,
        ":title": record.title,
        ":description": record.description,
        ":bmk_uri": record.bmk_uri,
        ":tags": record.tags,
        ":keyword": record.keyword,
        ":folder_name": record.folder_name,
        ":query_id": record.query_id,
    };
    let updated = db.execute_cached(
        "UPDATE bookmarksBuffer SET
            type = :type, date_added = :date_added, server_modified = :server_modified,
            is_deleted = :is_deleted, hasDupe = :has_dupe, parentid = :parentid,
            parentName = :parent_name, feedUri = :feed_uri, siteUri = :site_uri,
            pos = :pos, title = :title, description = :description, bmkUri = :bmk_uri,
            tags = :tags, keyword = :keyword, folderName = :folder_name, queryId = :query_id
         WHERE guid = :guid",
        params,
    )?;
    if updated == 0 {
        db.execute_cached(
            "INSERT INTO bookmarksBuffer
                (guid, type, date_added, server_modified, is_deleted, hasDupe, parentid,
                 parentName, feedUri, siteUri, pos, title, description, bmkUri, tags,
                 keyword, folderName, queryId)
             VALUES
                (:guid, :type, :date_added, :server_modified, :is_deleted, :has_dupe,
                 :parentid, :parent_name, :feed_uri, :site_uri, :pos, :title,
                 :description, :bmk_uri, :tags, :keyword, :folder_name, :query_id)",
            params,
        )?;
    }
    Ok(())
}

/// Queue a buffer record for deletion. It stops showing up in buffer reads,
/// and is uploaded as a deletion, unless the server sends it again first.
pub fn mark_buffer_bookmark_as_deleted(db: &BookmarksDb, guid: &Guid) -> Result<()> {
    log::debug!("Queuing {} for deletion from the buffer", guid);
    db.execute_cached(
        "INSERT OR IGNORE INTO pending_deletions (id) VALUES (:guid)",
        named_params! { ":guid": guid },
    )?;
    Ok(())
}
