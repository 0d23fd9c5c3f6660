/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The nodes handed to display code, and the codec between them and rows
//! of the plane views.

use super::record::BookmarkMirrorItem;
use super::root_guid::title_for_special_guid;
use crate::error::*;
use crate::storage::favicons::Favicon;
use crate::types::{BookmarkNodeType, Plane, Timestamp};
use rusqlite::{Connection, Row};
use sync_guid::Guid;

pub const DEFAULT_FOLDER_TITLE: &str = "Untitled";
pub const DEFAULT_ITEM_TITLE: &str = "Untitled";
const DEFAULT_LIVEMARK_TITLE: &str = "Livemark";
// Queries are never rendered as links.
const PLACEHOLDER_URL: &str = "about:blank";

/// A bookmark, livemark or query. Livemarks carry their site URL in `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkItem {
    pub guid: Guid,
    pub node_type: BookmarkNodeType,
    pub title: String,
    pub url: String,
    pub favicon: Option<Favicon>,
    pub is_editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkFolder {
    pub guid: Guid,
    /// `Folder`, or `DynamicContainer` for the old smart folders we show as
    /// plain folders.
    pub node_type: BookmarkNodeType,
    pub title: String,
    pub favicon: Option<Favicon>,
    pub is_editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkSeparator {
    pub guid: Guid,
    pub is_editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkNode {
    Item(BookmarkItem),
    Folder(BookmarkFolder),
    Separator(BookmarkSeparator),
}

impl BookmarkNode {
    pub fn guid(&self) -> &Guid {
        match self {
            BookmarkNode::Item(i) => &i.guid,
            BookmarkNode::Folder(f) => &f.guid,
            BookmarkNode::Separator(s) => &s.guid,
        }
    }

    pub fn node_type(&self) -> BookmarkNodeType {
        match self {
            BookmarkNode::Item(i) => i.node_type,
            BookmarkNode::Folder(f) => f.node_type,
            BookmarkNode::Separator(_) => BookmarkNodeType::Separator,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            BookmarkNode::Item(i) => Some(&i.title),
            BookmarkNode::Folder(f) => Some(&f.title),
            BookmarkNode::Separator(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            BookmarkNode::Item(i) => Some(&i.url),
            _ => None,
        }
    }

    pub fn favicon(&self) -> Option<&Favicon> {
        match self {
            BookmarkNode::Item(i) => i.favicon.as_ref(),
            BookmarkNode::Folder(f) => f.favicon.as_ref(),
            BookmarkNode::Separator(_) => None,
        }
    }

    pub fn is_editable(&self) -> bool {
        match self {
            BookmarkNode::Item(i) => i.is_editable,
            BookmarkNode::Folder(f) => f.is_editable,
            BookmarkNode::Separator(s) => s.is_editable,
        }
    }

    /// The record we'd store for this node as a child of `parent`. Children
    /// of folders aren't known here, so folders come back with none.
    pub fn to_mirror_item(&self, parent: &Guid, server_modified: Timestamp) -> BookmarkMirrorItem {
        let mut item = BookmarkMirrorItem::new(self.guid().clone(), self.node_type());
        item.parent_id = Some(parent.clone());
        item.server_modified = server_modified;
        match self {
            BookmarkNode::Item(i) => {
                item.title = Some(i.title.clone());
                if i.node_type == BookmarkNodeType::Livemark {
                    item.site_uri = Some(i.url.clone());
                } else {
                    item.bmk_uri = Some(i.url.clone());
                }
            }
            BookmarkNode::Folder(f) => {
                item.title = Some(f.title.clone());
                item.children = Some(Vec::new());
            }
            BookmarkNode::Separator(_) => {}
        }
        item
    }
}

/// How rows are turned into nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NodeFactory {
    #[default]
    Default,
    /// Items are always editable, whatever the bootstrap state says. Used
    /// for the Mobile folder when showing unmerged remote bookmarks, since
    /// those were added on this device.
    EditableItems,
}

impl NodeFactory {
    /// Decode a row with `guid`, `type`, `title`, `bmkUri` and `siteUri`
    /// columns, plus `iconURL`, `iconDate` and `iconType` when `with_icon`.
    ///
    /// Panics on a type code we don't know: that's a corrupt row, not
    /// something callers can deal with.
    pub fn decode(self, row: &Row<'_>, is_editable: bool, with_icon: bool) -> Result<BookmarkNode> {
        let guid: Guid = row.get("guid")?;
        let type_code: i64 = row.get("type")?;
        let node_type = match BookmarkNodeType::from_i64(type_code) {
            Some(t) => t,
            None => panic!("Invalid bookmark data: {} has type {}", guid, type_code),
        };
        let favicon = if with_icon {
            Favicon::from_joined_row(row)?
        } else {
            None
        };
        let title = row.get::<_, Option<String>>("title")?;
        let item_editable = is_editable || self == NodeFactory::EditableItems;

        Ok(match node_type {
            BookmarkNodeType::Bookmark => {
                let url = match row.get::<_, Option<String>>("bmkUri")? {
                    Some(url) => url,
                    None => {
                        log::warn!("Bookmark {} has no URL", guid);
                        PLACEHOLDER_URL.to_owned()
                    }
                };
                BookmarkNode::Item(BookmarkItem {
                    guid,
                    node_type,
                    title: title.unwrap_or_else(|| url.clone()),
                    url,
                    favicon,
                    is_editable: item_editable,
                })
            }
            BookmarkNodeType::Folder | BookmarkNodeType::DynamicContainer => {
                let title = match title_for_special_guid(&guid) {
                    Some(special) => special.to_owned(),
                    None => title.unwrap_or_else(|| DEFAULT_FOLDER_TITLE.to_owned()),
                };
                BookmarkNode::Folder(BookmarkFolder {
                    guid,
                    node_type,
                    title,
                    favicon,
                    is_editable,
                })
            }
            BookmarkNodeType::Separator => BookmarkNode::Separator(BookmarkSeparator {
                guid,
                is_editable,
            }),
            BookmarkNodeType::Livemark => {
                let url = match row.get::<_, Option<String>>("siteUri")? {
                    Some(url) => url,
                    None => {
                        log::warn!("Livemark {} has no site URL", guid);
                        PLACEHOLDER_URL.to_owned()
                    }
                };
                BookmarkNode::Item(BookmarkItem {
                    guid,
                    node_type,
                    title: title.unwrap_or_else(|| DEFAULT_LIVEMARK_TITLE.to_owned()),
                    url,
                    favicon,
                    is_editable,
                })
            }
            BookmarkNodeType::Query => {
                log::warn!("Creating a bookmark item from query {}", guid);
                BookmarkNode::Item(BookmarkItem {
                    guid,
                    node_type,
                    title: title.unwrap_or_else(|| DEFAULT_ITEM_TITLE.to_owned()),
                    url: PLACEHOLDER_URL.to_owned(),
                    favicon,
                    is_editable,
                })
            }
        })
    }
}

/// Whether we've synced yet, as far as editing is concerned. Resolve it
/// once per request and hand it to whatever decodes rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootstrapState {
    pub buffer_empty: bool,
    pub mirror_empty: bool,
}

impl BootstrapState {
    pub fn fetch(db: &Connection) -> Result<Self> {
        Ok(db.query_row(
            "SELECT NOT EXISTS(SELECT 1 FROM bookmarksBuffer),
                    NOT EXISTS(SELECT 1 FROM bookmarksMirror)",
            [],
            |row| {
                Ok(BootstrapState {
                    buffer_empty: row.get(0)?,
                    mirror_empty: row.get(1)?,
                })
            },
        )?)
    }

    /// Buffer rows are never editable. Everything else is, unless we're
    /// midway through a first sync: both the buffer and the mirror hold
    /// something.
    pub fn is_editable(self, plane: Plane) -> bool {
        plane != Plane::Buffer && (self.buffer_empty || self.mirror_empty)
    }
}
