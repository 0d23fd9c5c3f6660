/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

// The layer between the API and the database: everything that reads or
// writes the bookmark planes lives below here.

pub mod bookmarks;
pub mod favicons;

/// Longest URL, in bytes, we'll store for a bookmark.
pub const URL_LENGTH_MAX: usize = 65536;
/// Titles are truncated (on a char boundary) to this many bytes.
pub const TITLE_LENGTH_MAX: usize = 4096;
/// Upper bound on the GUIDs a caller may exclude from a child listing.
pub const MAX_EXCLUDED_GUIDS: usize = 100;
