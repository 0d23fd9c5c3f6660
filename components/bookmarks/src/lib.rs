/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![allow(unknown_lints)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod db;
pub mod error;
pub mod storage;
#[cfg(test)]
mod tests;
pub mod types;
mod util;

pub use crate::api::bookmarks_api::{BookmarksApi, ConnectionType};
pub use crate::db::{BookmarksDb, SharedBookmarksDb};
pub use crate::error::*;
pub use crate::storage::bookmarks::{
    BookmarkBufferStorage, BookmarkMirrorItem, BookmarkNode, BookmarkRootGuid,
    BookmarksModelFactory, InsertableBookmark,
};
pub use crate::storage::favicons::{Favicon, IconType};
pub use crate::types::*;
pub use sync_guid::Guid;
