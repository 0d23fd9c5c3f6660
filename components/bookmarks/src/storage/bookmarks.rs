/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::{TITLE_LENGTH_MAX, URL_LENGTH_MAX};
use crate::error::*;
use crate::util::slice_up_to;

pub use buffer::{mark_buffer_bookmark_as_deleted, BookmarkBufferStorage};
pub use delete::{clear_bookmarks, remove_guids, update_guid};
pub use fetch::{
    bookmarks_by_url, bookmarks_get_url_for_keyword, get_children_with_parent,
    get_records_with_guids, has_only_unmerged_remote_bookmarks, is_bookmarked,
};
pub use insert::{insert_bookmark, InsertableBookmark};
pub use local::{
    get_item_with_guid, get_local_bookmarks_modifications, get_local_deletions,
    get_local_item_with_guid, get_local_items_with_guids, is_unchanged, LocalModifications,
};
pub use model::{model_factory, BookmarkFolderModel, BookmarksModelFactory};
pub use node::{
    BookmarkFolder, BookmarkItem, BookmarkNode, BookmarkSeparator, BootstrapState, NodeFactory,
};
pub use overrides::{override_folders, override_non_folders};
pub use record::BookmarkMirrorItem;
pub use root_guid::{
    title_for_special_guid, BookmarkRootGuid, ALL_ROOTS, USER_CONTENT_ROOTS,
};
pub use tree::{tree_for_plane, BookmarkTree, BookmarkTreeNode};
pub use validation::validate_buffer;

mod buffer;
mod delete;
mod fetch;
mod insert;
mod local;
mod model;
mod node;
mod overrides;
mod record;
mod root_guid;
mod tree;
pub mod validation;

/// Titles longer than `TITLE_LENGTH_MAX` bytes are cut short.
pub fn truncate_title(title: &str) -> &str {
    slice_up_to(title, TITLE_LENGTH_MAX)
}

pub(crate) fn check_url_length(url: &str) -> Result<()> {
    if url.len() > URL_LENGTH_MAX {
        return Err(InvalidBookmarkOperation::UrlTooLong.into());
    }
    Ok(())
}
