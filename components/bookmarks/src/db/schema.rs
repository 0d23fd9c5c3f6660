/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::storage::bookmarks::{BookmarkRootGuid, ALL_ROOTS, USER_CONTENT_ROOTS};
use crate::types::{BookmarkNodeType, SyncStatus, Timestamp};
use rusqlite::{named_params, Connection};

pub const VERSION: u32 = 2;

const CREATE_SCHEMA_SQL: &str = include_str!("../../sql/create_schema.sql");
const CREATE_PENDING_DELETIONS_SQL: &str = include_str!("../../sql/create_pending_deletions.sql");

pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    log::debug!("Initializing schema");
    conn.execute_batch(CREATE_SCHEMA_SQL)?;
    conn.execute_batch(CREATE_PENDING_DELETIONS_SQL)?;
    create_local_roots(conn)?;
    Ok(())
}

/// The roots live in the local table from the start, as new records, so that
/// a device which never syncs still has somewhere to put bookmarks.
pub(crate) fn create_local_roots(conn: &Connection) -> rusqlite::Result<()> {
    let now = Timestamp::now();
    let mut insert = conn.prepare(
        "INSERT OR IGNORE INTO bookmarksLocal
            (guid, type, date_added, title, parentid, parentName,
             local_modified, sync_status)
         VALUES
            (:guid, :type, :now, :title, :parent, '', :now, :sync_status)",
    )?;
    for root in ALL_ROOTS.iter() {
        insert.execute(named_params! {
            ":guid": root.guid(),
            ":type": BookmarkNodeType::Folder,
            ":now": now,
            ":title": root.row_title(),
            // The root is its own parent, as it is on the server.
            ":parent": BookmarkRootGuid::Root.guid(),
            ":sync_status": SyncStatus::New,
        })?;
    }
    let mut structure = conn.prepare(
        "INSERT INTO bookmarksLocalStructure (parent, child, idx)
         SELECT :parent, :child, :idx
         WHERE NOT EXISTS (SELECT 1 FROM bookmarksLocalStructure WHERE child = :child)",
    )?;
    for (idx, root) in USER_CONTENT_ROOTS.iter().enumerate() {
        structure.execute(named_params! {
            ":parent": BookmarkRootGuid::Root.guid(),
            ":child": root.guid(),
            ":idx": idx as u32,
        })?;
    }
    Ok(())
}

/// Helper for migration. `stmts` run when upgrading from `ours`.
fn migration<F>(
    db: &Connection,
    cur_version: u32,
    ours: u32,
    stmts: &[&str],
    extra_logic: F,
) -> rusqlite::Result<()>
where
    F: FnOnce() -> rusqlite::Result<()>,
{
    if cur_version == ours {
        log::debug!("Upgrading schema from {} to {}", cur_version, ours + 1);
        for stmt in stmts {
            db.execute_batch(stmt)?;
        }
        extra_logic()?;
    }
    Ok(())
}

pub fn upgrade_from(db: &Connection, from: u32) -> rusqlite::Result<()> {
    log::debug!("Upgrading schema from {} to {}", from, VERSION);
    // Version 1 predates queueing deletions of buffer records.
    migration(db, from, 1, &[CREATE_PENDING_DELETIONS_SQL], || Ok(()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db::BookmarksInitializer;
    use sql_support::open_database::test_utils::MigratedDatabaseFile;
    use sql_support::ConnExt;

    #[test]
    fn test_create_schema_twice() {
        let conn = Connection::open_in_memory().expect("open");
        init(&conn).expect("should init");
        conn.execute_batch(CREATE_SCHEMA_SQL)
            .expect("should allow running twice");
        create_local_roots(&conn).expect("roots twice");
        assert_eq!(
            conn.query_one::<i64>("SELECT count(*) FROM bookmarksLocal")
                .unwrap(),
            5
        );
        assert_eq!(
            conn.query_one::<i64>("SELECT count(*) FROM bookmarksLocalStructure")
                .unwrap(),
            4
        );
    }

    #[test]
    fn test_check_constraints() {
        let conn = Connection::open_in_memory().expect("open");
        init(&conn).expect("should init");
        // A live record needs a parent.
        let e = conn
            .execute(
                "INSERT INTO bookmarksBuffer (guid, type, server_modified, is_deleted)
                 VALUES ('bookmarkAAAA', 1, 1, 0)",
                [],
            )
            .expect_err("should fail");
        assert!(e.to_string().contains("CHECK constraint failed"), "{}", e);
        // A tombstone doesn't.
        conn.execute(
            "INSERT INTO bookmarksBuffer (guid, type, server_modified, is_deleted)
             VALUES ('bookmarkAAAA', 1, 1, 1)",
            [],
        )
        .expect("tombstones don't need a parent");
    }

    #[test]
    fn test_upgrade_from_v1() {
        let db_file = MigratedDatabaseFile::new(
            BookmarksInitializer::new_for_test(),
            CREATE_SCHEMA_SQL,
            1,
        );
        assert!(!db_file
            .open()
            .exists(
                "SELECT 1 FROM sqlite_master WHERE name = 'pending_deletions'",
                []
            )
            .unwrap());
        let conn = db_file.open_upgraded().expect("should upgrade");
        assert!(conn
            .exists(
                "SELECT 1 FROM sqlite_master WHERE name = 'pending_deletions'",
                []
            )
            .unwrap());
        assert_eq!(conn.query_one::<u32>("PRAGMA user_version").unwrap(), VERSION);
    }
}
