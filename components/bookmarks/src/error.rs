/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::types::Plane;
use sync_guid::Guid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid bookmark operation: {0}")]
    InvalidBookmarkOperation(#[from] InvalidBookmarkOperation),

    #[error("The store is corrupt: {0}")]
    Corruption(#[from] Corruption),

    #[error("Error executing SQL: {0}")]
    SqlError(#[from] rusqlite::Error),

    #[error("Error opening database: {0}")]
    OpenDatabaseError(#[from] sql_support::open_database::Error),

    #[error("Error parsing URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("A connection of this type is already open")]
    ConnectionAlreadyOpen,

    #[error("An invalid connection type was specified")]
    InvalidConnectionType,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tried to close connection on wrong BookmarksApi instance")]
    WrongApiForClose,

    // This will happen if you provide something absurd like
    // "/" or "" as your database path. For more subtley broken paths,
    // we'll likely return an IoError.
    #[error("Illegal database path: {0:?}")]
    IllegalDatabasePath(std::path::PathBuf),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors a caller can provoke with valid-looking input. The transaction
/// the operation ran in is rolled back before these are returned.
#[derive(Debug, thiserror::Error)]
pub enum InvalidBookmarkOperation {
    // Like elsewhere, the URL itself is private info, so it's not in the error.
    #[error("URL too long")]
    UrlTooLong,

    // Guids aren't considered private, so it's fine for them to end up in logs.
    #[error("Folder {0} doesn't exist in either mirror or local")]
    NoSuchFolder(Guid),

    #[error("Local folder {0} is deleted")]
    FolderDeleted(Guid),

    #[error("No such item: {0}")]
    NoSuchGuid(Guid),

    #[error("Refusing to {op} in the {plane} plane")]
    RefusedForPlane { op: &'static str, plane: Plane },
}

/// Logical corruption: the tables disagree with each other in a way our
/// own writes should never produce.
#[derive(Debug, thiserror::Error)]
pub enum Corruption {
    #[error("The buffer is inconsistent: {0}")]
    BufferInconsistent(BufferInconsistency),

    #[error("Bookmark '{0}' is its own ancestor")]
    Cycle(Guid),
}

/// Which buffer consistency check failed, and how many rows it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferInconsistency {
    StructureWithoutRecord(usize),
    RecordWithoutStructure(usize),
    ChildOfMultipleParents(usize),
    ParentidMismatch(usize),
}

impl std::fmt::Display for BufferInconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferInconsistency::StructureWithoutRecord(n) => {
                write!(f, "{} structure rows refer to missing records", n)
            }
            BufferInconsistency::RecordWithoutStructure(n) => {
                write!(f, "{} records are missing from structure", n)
            }
            BufferInconsistency::ChildOfMultipleParents(n) => {
                write!(f, "{} structure rows name a child more than once", n)
            }
            BufferInconsistency::ParentidMismatch(n) => {
                write!(f, "{} records disagree with structure about their parent", n)
            }
        }
    }
}
