/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::node::{BookmarkNode, BootstrapState, NodeFactory};
use super::root_guid::USER_CONTENT_ROOTS;
use crate::error::*;
use crate::storage::MAX_EXCLUDED_GUIDS;
use crate::types::{BookmarkNodeType, Plane};
use rusqlite::{named_params, params_from_iter, types::ToSql, Connection};
use sql_support::{self, repeat_sql_vars, ConnExt};
use sync_guid::Guid;
use url::Url;

const ICON_COLUMNS: &str = ", f.url AS iconURL, f.date AS iconDate, f.type AS iconType";
const ICON_JOIN: &str = "LEFT JOIN favicons f ON f.id = vals.faviconID";

// Shows records the user deleted from the buffer before merging.
fn pending_deletions_filter(plane: Plane) -> &'static str {
    match plane {
        Plane::Buffer => "AND vals.guid NOT IN (SELECT id FROM pending_deletions)",
        _ => "",
    }
}

/// The children of `parent` as seen from `plane`, in order. Queries and old
/// smart folders are skipped, as are any GUIDs in `excluding`.
///
/// Panics if `excluding` names `MAX_EXCLUDED_GUIDS` or more GUIDs.
pub fn get_children_with_parent(
    db: &Connection,
    parent: &Guid,
    plane: Plane,
    excluding: Option<&[Guid]>,
    include_icon: bool,
    factory: NodeFactory,
    bootstrap: BootstrapState,
) -> Result<Vec<BookmarkNode>> {
    let excluding = excluding.unwrap_or(&[]);
    assert!(
        excluding.len() < MAX_EXCLUDED_GUIDS,
        "Too many GUIDs to exclude"
    );
    let exclusion = if excluding.is_empty() {
        String::new()
    } else {
        format!("AND vals.guid NOT IN ({})", repeat_sql_vars(excluding.len()))
    };
    let sql = format!(
        "SELECT vals.guid AS guid, vals.type AS type, vals.title AS title,
                vals.bmkUri AS bmkUri, vals.siteUri AS siteUri{icon_columns}
         FROM (SELECT parent, child, idx FROM {structure} WHERE parent = ?) AS structure
         JOIN {values} AS vals ON vals.guid = structure.child
         {icon_join}
         WHERE vals.type NOT IN ({query}, {dynamic}) AND vals.is_deleted IS NOT 1
         {exclusion} {pending}
         ORDER BY structure.idx ASC",
        icon_columns = if include_icon { ICON_COLUMNS } else { "" },
        structure = plane.structure_view(),
        values = plane.value_view(),
        icon_join = if include_icon { ICON_JOIN } else { "" },
        query = BookmarkNodeType::Query as u8,
        dynamic = BookmarkNodeType::DynamicContainer as u8,
        exclusion = exclusion,
        pending = pending_deletions_filter(plane),
    );
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(excluding.len() + 1);
    params.push(parent);
    params.extend(excluding.iter().map(|guid| guid as &dyn ToSql));

    let is_editable = bootstrap.is_editable(plane);
    db.query_rows_and_then(&sql, params.as_slice(), |row| {
        factory.decode(row, is_editable, include_icon)
    })
}

/// The live records among `guids`, as seen from `plane`, ordered by title.
pub fn get_records_with_guids(
    db: &Connection,
    guids: &[Guid],
    plane: Plane,
    include_icon: bool,
) -> Result<Vec<BookmarkNode>> {
    let is_editable = BootstrapState::fetch(db)?.is_editable(plane);
    let mut found: Vec<(Option<String>, BookmarkNode)> = Vec::with_capacity(guids.len());
    sql_support::each_chunk(guids, |chunk, _| -> Result<()> {
        let sql = format!(
            "SELECT vals.guid AS guid, vals.type AS type, vals.title AS title,
                    vals.bmkUri AS bmkUri, vals.siteUri AS siteUri{icon_columns}
             FROM {values} AS vals
             {icon_join}
             WHERE vals.guid IN ({vars}) AND NOT vals.is_deleted {pending}",
            icon_columns = if include_icon { ICON_COLUMNS } else { "" },
            values = plane.value_view(),
            icon_join = if include_icon { ICON_JOIN } else { "" },
            vars = repeat_sql_vars(chunk.len()),
            pending = pending_deletions_filter(plane),
        );
        let rows: Vec<(Option<String>, BookmarkNode)> =
            db.query_rows_and_then(&sql, params_from_iter(chunk), |row| -> Result<_> {
                Ok((
                    row.get("title")?,
                    NodeFactory::Default.decode(row, is_editable, include_icon)?,
                ))
            })?;
        found.extend(rows);
        Ok(())
    })?;
    // Sorted here rather than in SQL since the rows come from several chunks.
    found.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(found.into_iter().map(|(_, node)| node).collect())
}

/// Is there a live bookmark for `url` anywhere in `plane`?
pub fn is_bookmarked(db: &Connection, url: &Url, plane: Plane) -> Result<bool> {
    Ok(db.query_row_and_then_cachable(
        &format!(
            "SELECT EXISTS(
                SELECT 1 FROM {values} AS vals
                WHERE vals.bmkUri = :url AND vals.is_deleted IS NOT 1 {pending}
             )",
            values = plane.value_view(),
            pending = pending_deletions_filter(plane),
        ),
        named_params! { ":url": url.as_str() },
        |row| row.get::<_, bool>(0),
        true,
    )?)
}

/// GUIDs of the live local bookmarks for `url`.
pub(crate) fn non_deleted_guids_for_url(db: &Connection, url: &str) -> Result<Vec<Guid>> {
    db.query_rows_and_then_cached(
        "SELECT DISTINCT guid FROM view_bookmarksLocal_on_mirror
         WHERE bmkUri = :url AND is_deleted = 0",
        named_params! { ":url": url },
        |row| -> Result<_> { Ok(row.get(0)?) },
    )
}

/// Every live bookmark for `url` in the local or mirror tables, with its
/// icon. Overridden mirror rows are skipped in favor of their local copies.
pub fn bookmarks_by_url(db: &Connection, url: &Url) -> Result<Vec<BookmarkNode>> {
    let is_editable = BootstrapState::fetch(db)?.is_editable(Plane::Local);
    db.query_rows_and_then_cached(
        &format!(
            "SELECT vals.guid AS guid, vals.type AS type, vals.title AS title,
                    vals.bmkUri AS bmkUri, vals.siteUri AS siteUri{icon_columns}
             FROM (
                SELECT guid, type, title, bmkUri, siteUri, faviconID
                FROM bookmarksLocal
                WHERE type = {bookmark} AND is_deleted IS NOT 1 AND bmkUri = :url
                UNION ALL
                SELECT guid, type, title, bmkUri, siteUri, faviconID
                FROM bookmarksMirror
                WHERE type = {bookmark} AND is_overridden IS NOT 1
                  AND is_deleted IS NOT 1 AND bmkUri = :url
             ) AS vals
             {icon_join}",
            icon_columns = ICON_COLUMNS,
            bookmark = BookmarkNodeType::Bookmark as u8,
            icon_join = ICON_JOIN,
        ),
        named_params! { ":url": url.as_str() },
        |row| NodeFactory::Default.decode(row, is_editable, true),
    )
}

/// The URL of the first live local bookmark with `keyword`.
pub fn bookmarks_get_url_for_keyword(db: &Connection, keyword: &str) -> Result<Option<Url>> {
    db.try_query_row(
        "SELECT bmkUri FROM view_bookmarksLocal_on_mirror
         WHERE keyword = :keyword AND is_deleted IS NOT 1 AND bmkUri IS NOT NULL
         LIMIT 1",
        named_params! { ":keyword": keyword },
        |row| -> Result<Url> { Ok(Url::parse(&row.get::<_, String>(0)?)?) },
        true,
    )
}

/// True when we've never merged, but the buffer already holds children for
/// one of the user roots: the user has remote bookmarks they can't see in
/// the local tree yet.
pub fn has_only_unmerged_remote_bookmarks(db: &Connection) -> bool {
    let sql = format!(
        "SELECT NOT EXISTS(SELECT 1 FROM bookmarksMirror)
            AND EXISTS(SELECT 1 FROM bookmarksBufferStructure WHERE parent IN ({}))",
        repeat_sql_vars(USER_CONTENT_ROOTS.len())
    );
    let roots = USER_CONTENT_ROOTS.iter().map(|root| root.guid());
    match db.query_row(&sql, params_from_iter(roots), |row| row.get::<_, bool>(0)) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Couldn't tell whether there are unmerged bookmarks: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bookmarks_api::test::new_mem_connection;
    use crate::storage::bookmarks::{insert_bookmark, BookmarkRootGuid, InsertableBookmark};
    use crate::storage::favicons::{Favicon, IconType};
    use crate::tests::{insert_mirror, insertable};
    use crate::types::Timestamp;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn guids(nodes: &[BookmarkNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.guid().as_str()).collect()
    }

    fn local_children(
        conn: &Connection,
        parent: &str,
        excluding: Option<&[Guid]>,
    ) -> Vec<BookmarkNode> {
        let bootstrap = BootstrapState::fetch(conn).unwrap();
        get_children_with_parent(
            conn,
            &Guid::from(parent),
            Plane::Local,
            excluding,
            false,
            NodeFactory::Default,
            bootstrap,
        )
        .expect("should fetch children")
    }

    fn seed(conn: &Connection) {
        insert_mirror(
            conn,
            json!([
                { "id": "toolbar_____", "type": 2, "parentid": "root________",
                  "title": "toolbar",
                  "children": ["bookmarkAAAA", "queryAAAAAAA", "separatorAAA", "folderBBBBBB"] },
                { "id": "bookmarkAAAA", "type": 1, "parentid": "toolbar_____",
                  "title": "A", "bmkUri": "https://a.example/", "keyword": "aaa" },
                { "id": "queryAAAAAAA", "type": 6, "parentid": "toolbar_____",
                  "title": "Q", "bmkUri": "place:sort=8" },
                { "id": "separatorAAA", "type": 3, "parentid": "toolbar_____" },
                { "id": "folderBBBBBB", "type": 2, "parentid": "toolbar_____",
                  "title": "B", "children": [] },
            ]),
        );
    }

    #[test]
    fn test_children_in_order() {
        let conn = new_mem_connection();
        seed(&conn);
        let children = local_children(&conn, "toolbar_____", None);
        assert_eq!(
            guids(&children),
            vec!["bookmarkAAAA", "separatorAAA", "folderBBBBBB"]
        );
        // The buffer's empty, so everything can be edited.
        assert!(children.iter().all(BookmarkNode::is_editable));

        let excluding = [Guid::from("separatorAAA")];
        let children = local_children(&conn, "toolbar_____", Some(&excluding));
        assert_eq!(guids(&children), vec!["bookmarkAAAA", "folderBBBBBB"]);
    }

    #[test]
    #[should_panic(expected = "Too many GUIDs to exclude")]
    fn test_too_many_exclusions() {
        let conn = new_mem_connection();
        let excluding: Vec<Guid> = (0..MAX_EXCLUDED_GUIDS).map(|_| Guid::random()).collect();
        local_children(&conn, "toolbar_____", Some(&excluding));
    }

    #[test]
    fn test_children_with_icons() {
        let conn = new_mem_connection();
        let mobile = BookmarkRootGuid::Mobile.as_guid();
        let guid = insert_bookmark(
            &conn,
            InsertableBookmark {
                favicon: Some(Favicon::new(
                    "https://a.example/favicon.ico",
                    Timestamp(1000),
                    IconType::Icon,
                )),
                ..insertable("https://a.example/", "A", &mobile)
            },
        )
        .unwrap();
        let children = get_children_with_parent(
            &conn,
            &mobile,
            Plane::Local,
            None,
            true,
            NodeFactory::Default,
            BootstrapState::fetch(&conn).unwrap(),
        )
        .unwrap();
        assert_eq!(guids(&children), vec![guid.as_str()]);
        let icon = children[0].favicon().expect("should have an icon");
        assert_eq!(icon.url, "https://a.example/favicon.ico");
        assert_eq!(icon.icon_type, IconType::Icon);
        // Nothing's synced yet, so local records can be edited.
        assert!(children[0].is_editable());
    }

    #[test]
    fn test_records_with_guids() {
        let conn = new_mem_connection();
        let mobile = BookmarkRootGuid::Mobile.as_guid();
        let c = insert_bookmark(&conn, insertable("https://c.example/", "c", &mobile)).unwrap();
        let a = insert_bookmark(&conn, insertable("https://a.example/", "a", &mobile)).unwrap();
        let wanted = [c.clone(), a.clone(), Guid::random()];
        let records = get_records_with_guids(&conn, &wanted, Plane::Local, false).unwrap();
        assert_eq!(guids(&records), vec![a.as_str(), c.as_str()]);
    }

    #[test]
    fn test_is_bookmarked_and_by_url() {
        let conn = new_mem_connection();
        seed(&conn);
        let url = Url::parse("https://a.example/").unwrap();
        assert!(is_bookmarked(&conn, &url, Plane::Local).unwrap());
        assert!(is_bookmarked(&conn, &url, Plane::Mirror).unwrap());
        let other = Url::parse("https://z.example/").unwrap();
        assert!(!is_bookmarked(&conn, &other, Plane::Local).unwrap());

        let mobile = BookmarkRootGuid::Mobile.as_guid();
        let local = insert_bookmark(&conn, insertable("https://a.example/", "again", &mobile))
            .unwrap();
        let mut found: Vec<String> = bookmarks_by_url(&conn, &url)
            .unwrap()
            .iter()
            .map(|node| node.guid().to_string())
            .collect();
        found.sort();
        let mut expected = vec!["bookmarkAAAA".to_owned(), local.to_string()];
        expected.sort();
        assert_eq!(found, expected);

        let mut live = non_deleted_guids_for_url(&conn, url.as_str()).unwrap();
        live.sort();
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn test_keyword() {
        let conn = new_mem_connection();
        seed(&conn);
        assert_eq!(
            bookmarks_get_url_for_keyword(&conn, "aaa").unwrap(),
            Some(Url::parse("https://a.example/").unwrap())
        );
        assert_eq!(bookmarks_get_url_for_keyword(&conn, "zzz").unwrap(), None);
    }

    #[test]
    fn test_unmerged_remote_bookmarks() {
        let conn = new_mem_connection();
        assert!(!has_only_unmerged_remote_bookmarks(&conn));
        conn.execute_batch(
            "INSERT INTO bookmarksBuffer (guid, type, server_modified, parentid)
             VALUES ('menu________', 2, 1, 'root________');
             INSERT INTO bookmarksBufferStructure (parent, child, idx)
             VALUES ('menu________', 'bookmarkAAAA', 0);",
        )
        .unwrap();
        assert!(has_only_unmerged_remote_bookmarks(&conn));
        seed(&conn);
        assert!(!has_only_unmerged_remote_bookmarks(&conn));
    }
}
