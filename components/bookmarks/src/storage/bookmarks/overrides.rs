/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Copying mirror rows into the local table so they can be changed.
//!
//! Local is the only plane we ever edit in place. Before a mirror record
//! can change, it's "overridden": its value row is copied into
//! `bookmarksLocal` as `Changed`, and the mirror row is flagged
//! `is_overridden` so the local-on-mirror views hide it. Structural changes
//! (adding or removing a child) override the parent folder, which also
//! copies its child list; attribute changes override just the record.

use crate::error::*;
use crate::types::Timestamp;
use rusqlite::{params_from_iter, Connection};
use sql_support::{self, repeat_sql_vars, ConnExt};
use sync_guid::Guid;

// Columns shared by the mirror and local tables, copied as-is.
const COPIED_COLUMNS: &str = "guid, type, date_added, bmkUri, title, parentid, parentName, \
     feedUri, siteUri, pos, description, tags, keyword, folderName, queryId, is_deleted";

// A record that already has a local row keeps it.
fn copy_to_local_sql(vars: usize, modified: Timestamp) -> String {
    format!(
        "INSERT OR IGNORE INTO bookmarksLocal ({cols}, local_modified, sync_status, faviconID)
         SELECT {cols}, {modified}, 1, faviconID
         FROM bookmarksMirror
         WHERE guid IN ({vars})",
        cols = COPIED_COLUMNS,
        modified = modified.as_millis_i64(),
        vars = repeat_sql_vars(vars),
    )
}

fn mark_overridden(db: &Connection, chunk: &[Guid]) -> Result<()> {
    db.execute(
        &format!(
            "UPDATE bookmarksMirror SET is_overridden = 1 WHERE guid IN ({})",
            repeat_sql_vars(chunk.len())
        ),
        params_from_iter(chunk),
    )?;
    Ok(())
}

/// Override mirror folders, copying each folder's mirror child list over its
/// local one. Folders that already have a local row, or that aren't in the
/// mirror at all, are left alone, so overriding twice is the same as once.
pub fn override_folders(db: &Connection, folders: &[Guid], modified: Timestamp) -> Result<()> {
    if folders.is_empty() {
        return Ok(());
    }
    let mut pending: Vec<Guid> = Vec::with_capacity(folders.len());
    sql_support::each_chunk(folders, |chunk, _| -> Result<()> {
        let found: Vec<Guid> = db.query_rows_and_then(
            &format!(
                "SELECT guid FROM bookmarksMirror
                 WHERE guid IN ({}) AND guid NOT IN (SELECT guid FROM bookmarksLocal)",
                repeat_sql_vars(chunk.len())
            ),
            params_from_iter(chunk),
            |row| row.get(0),
        )?;
        pending.extend(found);
        Ok(())
    })?;
    if pending.is_empty() {
        log::trace!("No folders left to override");
        return Ok(());
    }
    log::debug!("Overriding folders {:?}", pending);

    sql_support::each_chunk(&pending, |chunk, _| -> Result<()> {
        let vars = repeat_sql_vars(chunk.len());
        db.execute(
            &copy_to_local_sql(chunk.len(), modified),
            params_from_iter(chunk),
        )?;
        db.execute(
            &format!("DELETE FROM bookmarksLocalStructure WHERE parent IN ({})", vars),
            params_from_iter(chunk),
        )?;
        db.execute(
            &format!(
                "INSERT INTO bookmarksLocalStructure (parent, child, idx)
                 SELECT parent, child, idx FROM bookmarksMirrorStructure
                 WHERE parent IN ({})",
                vars
            ),
            params_from_iter(chunk),
        )?;
        mark_overridden(db, chunk)
    })
}

/// Override records whose children we won't touch: only the value rows are
/// copied. Records with a local row already are skipped.
pub fn override_non_folders(db: &Connection, guids: &[Guid], modified: Timestamp) -> Result<()> {
    if guids.is_empty() {
        return Ok(());
    }
    log::debug!("Overriding records {:?}", guids);
    sql_support::each_chunk(guids, |chunk, _| -> Result<()> {
        db.execute(
            &copy_to_local_sql(chunk.len(), modified),
            params_from_iter(chunk),
        )?;
        mark_overridden(db, chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bookmarks_api::test::new_mem_connection;
    use crate::tests::{insert_mirror, local_children, local_row_count};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn seed(conn: &Connection) {
        insert_mirror(
            conn,
            json!([
                { "id": "folderAAAAAA", "type": 2, "parentid": "unfiled_____",
                  "title": "A", "children": ["bookmarkBBBB", "bookmarkCCCC"] },
                { "id": "bookmarkBBBB", "type": 1, "parentid": "folderAAAAAA",
                  "title": "B", "bmkUri": "https://b.example/" },
                { "id": "bookmarkCCCC", "type": 1, "parentid": "folderAAAAAA",
                  "title": "C", "bmkUri": "https://c.example/" },
            ]),
        );
    }

    #[test]
    fn test_override_folder_idempotent() {
        let conn = new_mem_connection();
        seed(&conn);
        let folder = Guid::from("folderAAAAAA");
        let before = local_row_count(&conn);

        override_folders(&conn, &[folder.clone()], Timestamp(1000)).expect("should override");
        assert_eq!(local_row_count(&conn), before + 1);
        assert_eq!(
            local_children(&conn, "folderAAAAAA"),
            vec!["bookmarkBBBB", "bookmarkCCCC"]
        );
        let (status, modified): (i64, i64) = conn
            .query_row(
                "SELECT sync_status, local_modified FROM bookmarksLocal
                 WHERE guid = 'folderAAAAAA'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((status, modified), (1, 1000));
        assert!(conn
            .exists(
                "SELECT 1 FROM bookmarksMirror WHERE guid = 'folderAAAAAA' AND is_overridden = 1",
                []
            )
            .unwrap());

        // Change the local child list, then override again. Nothing moves.
        conn.execute(
            "DELETE FROM bookmarksLocalStructure WHERE child = 'bookmarkCCCC'",
            [],
        )
        .unwrap();
        override_folders(&conn, &[folder], Timestamp(2000)).expect("should override again");
        assert_eq!(local_row_count(&conn), before + 1);
        assert_eq!(local_children(&conn, "folderAAAAAA"), vec!["bookmarkBBBB"]);
    }

    #[test]
    fn test_override_leaves_local_only_folders() {
        let conn = new_mem_connection();
        // Mobile only exists locally; overriding it must keep its structure.
        conn.execute(
            "INSERT INTO bookmarksLocal (guid, type, parentid, sync_status, bmkUri)
             VALUES ('bookmarkDDDD', 1, 'mobile______', 2, 'https://d.example/')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO bookmarksLocalStructure (parent, child, idx)
             VALUES ('mobile______', 'bookmarkDDDD', 0)",
            [],
        )
        .unwrap();
        override_folders(&conn, &[Guid::from("mobile______")], Timestamp(1)).unwrap();
        assert_eq!(local_children(&conn, "mobile______"), vec!["bookmarkDDDD"]);
    }

    #[test]
    fn test_override_non_folders() {
        let conn = new_mem_connection();
        seed(&conn);
        let guids = vec![Guid::from("bookmarkBBBB"), Guid::from("folderAAAAAA")];
        let before = local_row_count(&conn);
        override_non_folders(&conn, &guids, Timestamp(5)).unwrap();
        override_non_folders(&conn, &guids, Timestamp(6)).unwrap();
        assert_eq!(local_row_count(&conn), before + 2);
        // No structure is copied.
        assert!(local_children(&conn, "folderAAAAAA").is_empty());
        let title: String = conn
            .query_row(
                "SELECT title FROM bookmarksLocal WHERE guid = 'bookmarkBBBB'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(title, "B");
    }
}
