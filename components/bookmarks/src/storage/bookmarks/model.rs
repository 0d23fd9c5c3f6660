/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::buffer::mark_buffer_bookmark_as_deleted;
use super::delete::{clear_bookmarks, remove_guids, update_guid};
use super::fetch::{
    get_children_with_parent, has_only_unmerged_remote_bookmarks, is_bookmarked,
    non_deleted_guids_for_url,
};
use super::node::{BookmarkNode, BootstrapState, NodeFactory, DEFAULT_FOLDER_TITLE};
use super::root_guid::{title_for_special_guid, BookmarkRootGuid};
use crate::db::BookmarksDb;
use crate::error::*;
use crate::types::Plane;
use sync_guid::Guid;
use url::Url;

/// One folder's worth of nodes, ready to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkFolderModel {
    pub guid: Guid,
    pub title: String,
    pub children: Vec<BookmarkNode>,
}

impl BookmarkFolderModel {
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BookmarkNode> {
        self.children.get(index)
    }
}

/// Reads folders from one plane and routes edits to the right place.
///
/// Only the local plane can be edited in general. The exception is the
/// editable buffer: before the first merge, a user may delete records that
/// so far only exist in the buffer.
pub struct BookmarksModelFactory<'a> {
    db: &'a BookmarksDb,
    plane: Plane,
    editable_buffer: bool,
}

impl<'a> BookmarksModelFactory<'a> {
    pub fn new(db: &'a BookmarksDb, plane: Plane) -> Self {
        Self {
            db,
            plane,
            editable_buffer: false,
        }
    }

    pub fn editable_buffer(db: &'a BookmarksDb) -> Self {
        Self {
            db,
            plane: Plane::Buffer,
            editable_buffer: true,
        }
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn is_editable_buffer(&self) -> bool {
        self.editable_buffer
    }

    fn children_of(&self, guid: &Guid, excluding: Option<&[Guid]>) -> Result<Vec<BookmarkNode>> {
        let factory = if self.editable_buffer && *guid == BookmarkRootGuid::Mobile {
            NodeFactory::EditableItems
        } else {
            NodeFactory::Default
        };
        let bootstrap = BootstrapState::fetch(self.db)?;
        get_children_with_parent(
            self.db,
            guid,
            self.plane,
            excluding,
            true,
            factory,
            bootstrap,
        )
    }

    /// The Mobile folder is always shown as the root.
    pub fn model_for_folder(
        &self,
        guid: &Guid,
        title: Option<&str>,
    ) -> Result<BookmarkFolderModel> {
        if *guid == BookmarkRootGuid::Mobile {
            return self.model_for_root();
        }
        let title = title_for_special_guid(guid)
            .or(title)
            .unwrap_or(DEFAULT_FOLDER_TITLE);
        Ok(BookmarkFolderModel {
            guid: guid.clone(),
            title: title.to_owned(),
            children: self.children_of(guid, None)?,
        })
    }

    pub fn model_for_root(&self) -> Result<BookmarkFolderModel> {
        let mobile = BookmarkRootGuid::Mobile;
        Ok(BookmarkFolderModel {
            guid: mobile.as_guid(),
            title: mobile.title().to_owned(),
            children: self.children_of(mobile.guid(), None)?,
        })
    }

    /// The folders directly under the root.
    pub fn root_children(&self) -> Result<Vec<BookmarkNode>> {
        let root = BookmarkRootGuid::Root.as_guid();
        self.children_of(&root, Some(std::slice::from_ref(&root)))
    }

    pub fn is_bookmarked(&self, url: &Url) -> Result<bool> {
        is_bookmarked(self.db, url, self.plane)
    }

    fn check_writable(&self, op: &'static str) -> Result<()> {
        match self.plane {
            Plane::Local => Ok(()),
            plane => {
                log::warn!("Refusing to {} in the {} plane", op, plane);
                Err(InvalidBookmarkOperation::RefusedForPlane { op, plane }.into())
            }
        }
    }

    /// Removes every live local bookmark for `url`.
    pub fn remove_by_url(&self, url: &Url) -> Result<()> {
        self.check_writable("remove by URL")?;
        let guids = non_deleted_guids_for_url(self.db, url.as_str())?;
        remove_guids(self.db, &guids)
    }

    pub fn remove_by_guid(&self, guid: &Guid) -> Result<()> {
        if self.editable_buffer {
            return mark_buffer_bookmark_as_deleted(self.db, guid);
        }
        self.check_writable("remove by GUID")?;
        remove_guids(self.db, std::slice::from_ref(guid))
    }

    pub fn update_by_guid(&self, guid: &Guid, title: &str, url: &Url) -> Result<()> {
        self.check_writable("update by GUID")?;
        update_guid(self.db, guid, title, url)
    }

    /// Clears the local plane whichever plane this factory reads.
    pub fn clear_bookmarks(&self) -> Result<()> {
        clear_bookmarks(self.db)
    }
}

/// The factory to show the user: the editable buffer while they have
/// remote bookmarks we haven't merged yet, and the local plane otherwise.
pub fn model_factory(db: &BookmarksDb) -> BookmarksModelFactory<'_> {
    if has_only_unmerged_remote_bookmarks(db) {
        log::debug!("Showing unmerged buffer bookmarks");
        BookmarksModelFactory::editable_buffer(db)
    } else {
        BookmarksModelFactory::new(db, Plane::Local)
    }
}
