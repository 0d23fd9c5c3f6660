/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::root_guid::BookmarkRootGuid;
use crate::error::*;
use crate::types::{BookmarkNodeType, SyncStatus, Timestamp};
use rusqlite::Row;
use serde_derive::*;
use sync_guid::Guid;

fn tombstone_type() -> BookmarkNodeType {
    BookmarkNodeType::Bookmark
}

/// Every field a bookmark row can have, in any plane. This is what the sync
/// collaborator hands to `apply_records`, and what the local reads return.
///
/// The serialized form uses the server's field names, so an incoming record
/// can be deserialized straight into one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMirrorItem {
    #[serde(rename = "id")]
    pub guid: Guid,
    // Tombstones from the server carry no type.
    #[serde(rename = "type", default = "tombstone_type")]
    pub node_type: BookmarkNodeType,
    #[serde(default)]
    pub date_added: Option<Timestamp>,
    #[serde(default)]
    pub server_modified: Timestamp,
    #[serde(rename = "deleted", default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub has_dupe: bool,
    #[serde(rename = "parentid", default)]
    pub parent_id: Option<Guid>,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub feed_uri: Option<String>,
    #[serde(default)]
    pub site_uri: Option<String>,
    #[serde(default)]
    pub pos: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bmk_uri: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(rename = "queryId", default)]
    pub query_id: Option<String>,
    /// Only meaningful for folders. `None` when read back from a value
    /// table, since children live in the structure tables.
    #[serde(default)]
    pub children: Option<Vec<Guid>>,

    // Local and mirror only.
    #[serde(skip)]
    pub favicon_id: Option<i64>,
    // Local only.
    #[serde(skip)]
    pub local_modified: Option<Timestamp>,
    #[serde(skip)]
    pub sync_status: Option<SyncStatus>,
}

impl BookmarkMirrorItem {
    /// An item with nothing but an identity. Fill in the rest by hand.
    pub fn new(guid: Guid, node_type: BookmarkNodeType) -> Self {
        Self {
            guid,
            node_type,
            date_added: None,
            server_modified: Timestamp(0),
            is_deleted: false,
            has_dupe: false,
            parent_id: None,
            parent_name: None,
            feed_uri: None,
            site_uri: None,
            pos: None,
            title: None,
            description: None,
            bmk_uri: None,
            tags: None,
            keyword: None,
            folder_name: None,
            query_id: None,
            children: None,
            favicon_id: None,
            local_modified: None,
            sync_status: None,
        }
    }

    /// A server tombstone.
    pub fn deleted(guid: Guid, server_modified: Timestamp) -> Self {
        let mut item = Self::new(guid, tombstone_type());
        item.is_deleted = true;
        item.server_modified = server_modified;
        item
    }

    /// Reads `SELECT *` from any of the value tables. Columns a table doesn't
    /// have are left empty.
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self> {
        let stmt = row.as_ref();
        let has = |name: &str| stmt.column_index(name).is_ok();
        Ok(Self {
            guid: row.get("guid")?,
            node_type: row.get("type")?,
            date_added: row.get("date_added")?,
            server_modified: if has("server_modified") {
                row.get::<_, Option<Timestamp>>("server_modified")?
                    .unwrap_or_default()
            } else {
                Timestamp(0)
            },
            is_deleted: row.get("is_deleted")?,
            has_dupe: if has("hasDupe") {
                row.get("hasDupe")?
            } else {
                false
            },
            parent_id: row.get("parentid")?,
            parent_name: row.get("parentName")?,
            feed_uri: row.get("feedUri")?,
            site_uri: row.get("siteUri")?,
            pos: row.get("pos")?,
            title: row.get("title")?,
            description: row.get("description")?,
            bmk_uri: row.get("bmkUri")?,
            tags: row.get("tags")?,
            keyword: row.get("keyword")?,
            folder_name: row.get("folderName")?,
            query_id: row.get("queryId")?,
            children: None,
            favicon_id: if has("faviconID") {
                row.get("faviconID")?
            } else {
                None
            },
            local_modified: if has("local_modified") {
                row.get("local_modified")?
            } else {
                None
            },
            sync_status: if has("sync_status") {
                row.get("sync_status")?
            } else {
                None
            },
        })
    }

    /// The `(parent, child, idx)` rows this record contributes to a
    /// structure table. Only live folders have children, and the root's
    /// children are ours to manage, never the server's.
    pub(crate) fn child_structure(&self) -> Vec<(&Guid, &Guid, u32)> {
        if self.is_deleted
            || self.node_type != BookmarkNodeType::Folder
            || self.guid == BookmarkRootGuid::Root
        {
            return Vec::new();
        }
        match &self.children {
            Some(children) => children
                .iter()
                .enumerate()
                .map(|(idx, child)| (&self.guid, child, idx as u32))
                .collect(),
            None => Vec::new(),
        }
    }
}
