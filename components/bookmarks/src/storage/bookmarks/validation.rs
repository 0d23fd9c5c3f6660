/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Consistency checks for the buffer, run by the sync engine before it
//! merges. Each query returns the rows that break its rule, so an empty
//! result means the buffer passes. Our own writes don't depend on these
//! holding.

use crate::error::*;
use rusqlite::Connection;
use sql_support::ConnExt;
use sync_guid::Guid;

/// A structure row whose child has no record in the buffer or mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingChild {
    pub child: Guid,
    pub parent: Guid,
}

/// A live buffer record that no folder claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFromStructure {
    pub guid: Guid,
    pub parent_id: Option<Guid>,
}

/// A buffer record whose `parentid` disagrees with the structure row
/// naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentidMismatch {
    pub guid: Guid,
    pub parent_id: Option<Guid>,
    pub structure_parent: Guid,
    pub idx: i64,
}

pub fn structures_without_records(db: &Connection) -> Result<Vec<DanglingChild>> {
    db.query_rows_and_then(
        "SELECT s.child AS pointee, s.parent AS pointer
         FROM view_bookmarksBufferStructure_on_mirror s
         LEFT JOIN view_bookmarksBuffer_on_mirror b ON b.guid = s.child
         WHERE b.guid IS NULL",
        [],
        |row| -> Result<_> {
            Ok(DanglingChild {
                child: row.get("pointee")?,
                parent: row.get("pointer")?,
            })
        },
    )
}

/// The roots' own records aren't expected to be anyone's child.
pub fn records_without_structure(db: &Connection) -> Result<Vec<MissingFromStructure>> {
    db.query_rows_and_then(
        "SELECT b.guid AS missing, b.parentid AS parent
         FROM view_bookmarksBuffer_on_mirror b
         LEFT JOIN view_bookmarksBufferStructure_on_mirror s ON b.guid = s.child
         WHERE s.child IS NULL AND b.is_deleted IS 0 AND b.parentid IS NOT 'root________'",
        [],
        |row| -> Result<_> {
            Ok(MissingFromStructure {
                guid: row.get("missing")?,
                parent_id: row.get("parent")?,
            })
        },
    )
}

/// Children named by more than one structure row, once per row.
pub fn children_of_multiple_parents(db: &Connection) -> Result<Vec<Guid>> {
    db.query_rows_and_then(
        "SELECT s.child
         FROM view_bookmarksBufferStructure_on_mirror s
         INNER JOIN (
            SELECT child, count(*) AS dupes
            FROM view_bookmarksBufferStructure_on_mirror
            GROUP BY child HAVING dupes > 1
         ) i ON s.child = i.child",
        [],
        |row| -> Result<_> { Ok(row.get(0)?) },
    )
}

pub fn parentid_mismatches(db: &Connection) -> Result<Vec<ParentidMismatch>> {
    db.query_rows_and_then(
        "SELECT b.guid AS guid, b.parentid AS parentid, s.parent AS parent, s.idx AS idx
         FROM bookmarksBuffer b JOIN bookmarksBufferStructure s ON b.guid = s.child
         WHERE b.is_deleted IS 0 AND b.parentid IS NOT s.parent",
        [],
        |row| -> Result<_> {
            Ok(ParentidMismatch {
                guid: row.get("guid")?,
                parent_id: row.get("parentid")?,
                structure_parent: row.get("parent")?,
                idx: row.get("idx")?,
            })
        },
    )
}

/// Runs every check, failing on the first one that finds anything.
pub fn validate_buffer(db: &Connection) -> Result<()> {
    let dangling = structures_without_records(db)?;
    if !dangling.is_empty() {
        log::warn!("Buffer structure refers to missing records: {:?}", dangling);
        return Err(inconsistent(BufferInconsistency::StructureWithoutRecord(
            dangling.len(),
        )));
    }
    let missing = records_without_structure(db)?;
    if !missing.is_empty() {
        log::warn!("Buffer records missing from structure: {:?}", missing);
        return Err(inconsistent(BufferInconsistency::RecordWithoutStructure(
            missing.len(),
        )));
    }
    let duplicates = children_of_multiple_parents(db)?;
    if !duplicates.is_empty() {
        log::warn!("Buffer children with several parents: {:?}", duplicates);
        return Err(inconsistent(BufferInconsistency::ChildOfMultipleParents(
            duplicates.len(),
        )));
    }
    let mismatches = parentid_mismatches(db)?;
    if !mismatches.is_empty() {
        log::warn!("Buffer parentids disagree with structure: {:?}", mismatches);
        return Err(inconsistent(BufferInconsistency::ParentidMismatch(
            mismatches.len(),
        )));
    }
    Ok(())
}

fn inconsistent(which: BufferInconsistency) -> Error {
    Corruption::BufferInconsistent(which).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bookmarks_api::test::new_mem_connection;
    use pretty_assertions::assert_eq;

    // menu________ > [folderAAAAAA > [bookmarkBBBB]]
    const WELL_FORMED: &str = "
        INSERT INTO bookmarksBuffer (guid, type, server_modified, parentid)
        VALUES ('menu________', 2, 1, 'root________'),
               ('folderAAAAAA', 2, 1, 'menu________'),
               ('bookmarkBBBB', 1, 1, 'folderAAAAAA');
        INSERT INTO bookmarksBufferStructure (parent, child, idx)
        VALUES ('menu________', 'folderAAAAAA', 0),
               ('folderAAAAAA', 'bookmarkBBBB', 0);";

    fn expect_inconsistency(conn: &Connection, expected: BufferInconsistency) {
        match validate_buffer(conn) {
            Err(Error::Corruption(Corruption::BufferInconsistent(which))) => {
                assert_eq!(which, expected)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_well_formed() {
        let conn = new_mem_connection();
        validate_buffer(&conn).expect("empty buffer should be valid");
        conn.execute_batch(WELL_FORMED).unwrap();
        validate_buffer(&conn).expect("should be valid");
        assert!(structures_without_records(&conn).unwrap().is_empty());
        assert!(records_without_structure(&conn).unwrap().is_empty());
        assert!(children_of_multiple_parents(&conn).unwrap().is_empty());
        assert!(parentid_mismatches(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_dangling_child() {
        let conn = new_mem_connection();
        conn.execute_batch(WELL_FORMED).unwrap();
        conn.execute_batch(
            "INSERT INTO bookmarksBufferStructure (parent, child, idx)
             VALUES ('folderAAAAAA', 'ghostAAAAAAA', 1)",
        )
        .unwrap();
        assert_eq!(
            structures_without_records(&conn).unwrap(),
            vec![DanglingChild {
                child: "ghostAAAAAAA".into(),
                parent: "folderAAAAAA".into(),
            }]
        );
        expect_inconsistency(&conn, BufferInconsistency::StructureWithoutRecord(1));
    }

    #[test]
    fn test_record_without_structure() {
        let conn = new_mem_connection();
        conn.execute_batch(WELL_FORMED).unwrap();
        conn.execute_batch(
            "INSERT INTO bookmarksBuffer (guid, type, server_modified, parentid)
             VALUES ('bookmarkCCCC', 1, 1, 'folderAAAAAA');
             INSERT INTO bookmarksBuffer (guid, type, server_modified, is_deleted)
             VALUES ('bookmarkDDDD', 1, 1, 1);",
        )
        .unwrap();
        // Tombstones don't need to be in a folder.
        assert_eq!(
            records_without_structure(&conn).unwrap(),
            vec![MissingFromStructure {
                guid: "bookmarkCCCC".into(),
                parent_id: Some("folderAAAAAA".into()),
            }]
        );
        expect_inconsistency(&conn, BufferInconsistency::RecordWithoutStructure(1));
    }

    #[test]
    fn test_child_of_multiple_parents() {
        let conn = new_mem_connection();
        conn.execute_batch(WELL_FORMED).unwrap();
        conn.execute_batch(
            "INSERT INTO bookmarksBuffer (guid, type, server_modified, parentid)
             VALUES ('folderEEEEEE', 2, 1, 'menu________');
             INSERT INTO bookmarksBufferStructure (parent, child, idx)
             VALUES ('menu________', 'folderEEEEEE', 1),
                    ('folderEEEEEE', 'bookmarkBBBB', 0);",
        )
        .unwrap();
        assert_eq!(
            children_of_multiple_parents(&conn).unwrap(),
            vec![Guid::from("bookmarkBBBB"), Guid::from("bookmarkBBBB")]
        );
        expect_inconsistency(&conn, BufferInconsistency::ChildOfMultipleParents(2));
    }

    #[test]
    fn test_parentid_mismatch() {
        let conn = new_mem_connection();
        conn.execute_batch(WELL_FORMED).unwrap();
        conn.execute(
            "UPDATE bookmarksBuffer SET parentid = 'toolbar_____' WHERE guid = 'bookmarkBBBB'",
            [],
        )
        .unwrap();
        assert_eq!(
            parentid_mismatches(&conn).unwrap(),
            vec![ParentidMismatch {
                guid: "bookmarkBBBB".into(),
                parent_id: Some("toolbar_____".into()),
                structure_parent: "folderAAAAAA".into(),
                idx: 0,
            }]
        );
        expect_inconsistency(&conn, BufferInconsistency::ParentidMismatch(1));
    }
}
