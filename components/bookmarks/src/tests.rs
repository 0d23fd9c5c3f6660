/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use rusqlite::{named_params, Connection};
use serde_json::Value;

use crate::storage::bookmarks::{BookmarkMirrorItem, InsertableBookmark};

use pretty_assertions::assert_eq;
use sql_support::ConnExt;
use sync_guid::Guid;
use url::Url;

// Nothing in this crate writes the mirror; the merger does that. Tests use
// this to get the mirror into the state a finished merge would leave, which
// means the merged records no longer have local rows either.
pub fn insert_mirror(conn: &Connection, records: Value) {
    let items: Vec<BookmarkMirrorItem> =
        serde_json::from_value(records).expect("should be valid records");
    for item in &items {
        conn.execute_cached(
            "INSERT INTO bookmarksMirror
                (guid, type, date_added, server_modified, is_deleted, hasDupe, parentid,
                 parentName, feedUri, siteUri, pos, title, description, bmkUri, tags,
                 keyword, folderName, queryId)
             VALUES
                (:guid, :type, :date_added, :server_modified, :is_deleted, :has_dupe,
                 :parentid, :parent_name, :feed_uri, :site_uri, :pos, :title,
                 :description, :bmk_uri, :tags, :keyword, :folder_name, :query_id)",
            named_params! {
                ":guid": item.guid,
                ":type": item.node_type,
                ":date_added": item.date_added,
                ":server_modified": item.server_modified,
                ":is_deleted": item.is_deleted,
                ":has_dupe": item.has_dupe,
                ":parentid": item.parent_id,
                ":parent_name": item.parent_name,
                ":feed_uri": item.feed_uri,
                ":site_uri": item.site_uri,
                ":pos": item.pos,
                ":title": item.title,
                ":description": item.description,
                ":bmk_uri": item.bmk_uri,
                ":tags": item.tags,
                ":keyword": item.keyword,
                ":folder_name": item.folder_name,
                ":query_id": item.query_id,
            },
        )
        .expect("should insert mirror value");
        // Goes with its local structure too.
        conn.execute_cached(
            "DELETE FROM bookmarksLocal WHERE guid = :guid",
            named_params! { ":guid": item.guid },
        )
        .expect("should remove local row");
    }
    for (parent, child, idx) in items.iter().flat_map(BookmarkMirrorItem::child_structure) {
        conn.execute_cached(
            "INSERT INTO bookmarksMirrorStructure (parent, child, idx)
             VALUES (:parent, :child, :idx)",
            named_params! { ":parent": parent, ":child": child, ":idx": idx },
        )
        .expect("should insert mirror structure");
    }
}

pub fn local_children(conn: &Connection, parent: &str) -> Vec<String> {
    conn.query_rows_and_then(
        "SELECT child FROM bookmarksLocalStructure WHERE parent = :parent ORDER BY idx",
        named_params! { ":parent": parent },
        |row| row.get(0),
    )
    .expect("should read structure")
}

pub fn local_row_count(conn: &Connection) -> i64 {
    conn.query_one("SELECT count(*) FROM bookmarksLocal")
        .expect("should count")
}

pub fn insertable(url: &str, title: &str, parent: &Guid) -> InsertableBookmark {
    InsertableBookmark {
        url: Url::parse(url).expect("should be a valid url"),
        title: title.to_owned(),
        favicon: None,
        parent_guid: parent.clone(),
        parent_title: String::new(),
    }
}

// Check the children of every local folder are indexed 0..n, with no holes
// or duplicates.
pub fn check_local_positions(conn: &Connection) {
    // Use triangular numbers to detect skipped indices, then a subquery to
    // select enough fields to help diagnose when it fails.
    let sql = "
        WITH bad_parents(pid) AS (
            SELECT parent
            FROM bookmarksLocalStructure
            GROUP BY parent
            HAVING (SUM(DISTINCT idx + 1) - (count(*) * (count(*) + 1) / 2)) <> 0
                OR min(idx) <> 0
        )
        SELECT parent, child, idx FROM bookmarksLocalStructure
        WHERE parent IN bad_parents
        ORDER BY parent, idx
    ";
    let bad: Vec<(String, String, i64)> = conn
        .query_rows_and_then(sql, [], |row| -> rusqlite::Result<_> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .expect("should check positions");
    assert_eq!(bad, Vec::new());
}
