/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::db::db::{BookmarksDb, SharedBookmarksDb};
use crate::error::*;
use crate::util::normalize_path;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use rusqlite::OpenFlags;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    ReadOnly = 1,
    ReadWrite = 2,
    Sync = 3,
}

impl ConnectionType {
    pub fn from_primitive(p: u8) -> Option<Self> {
        match p {
            1 => Some(ConnectionType::ReadOnly),
            2 => Some(ConnectionType::ReadWrite),
            3 => Some(ConnectionType::Sync),
            _ => None,
        }
    }

    pub fn rusqlite_flags(self) -> OpenFlags {
        let common_flags = OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        match self {
            ConnectionType::ReadOnly => common_flags | OpenFlags::SQLITE_OPEN_READ_ONLY,
            ConnectionType::ReadWrite => {
                common_flags | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_READ_WRITE
            }
            ConnectionType::Sync => common_flags | OpenFlags::SQLITE_OPEN_READ_WRITE,
        }
    }
}

impl TryFrom<u8> for ConnectionType {
    type Error = Error;
    fn try_from(p: u8) -> Result<Self> {
        ConnectionType::from_primitive(p).ok_or(Error::InvalidConnectionType)
    }
}

// We only allow a single BookmarksApi per filename.
lazy_static! {
    static ref APIS: Mutex<HashMap<PathBuf, Weak<BookmarksApi>>> = Mutex::new(HashMap::new());
}

static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// The entry-point to the bookmarks store. This object gives access to
/// database connections. It enforces that only 1 write connection can exist
/// to the database at once; the sync collaborator shares a single extra
/// connection through `get_sync_connection`.
pub struct BookmarksApi {
    db_name: PathBuf,
    write_connection: Mutex<Option<BookmarksDb>>,
    // The weak facilitates connection sharing: while an `Arc` handed out by
    // `get_sync_connection()` is alive, later calls reuse it.
    sync_connection: Mutex<Weak<SharedBookmarksDb>>,
    id: usize,
}

impl BookmarksApi {
    /// Create a new, or fetch an already open, BookmarksApi backed by a file on disk.
    pub fn new(db_name: impl AsRef<Path>) -> Result<Arc<Self>> {
        let db_name = normalize_path(db_name)?;
        Self::new_or_existing(db_name)
    }

    /// Create a new, or fetch an already open, memory-based BookmarksApi. You must
    /// provide a name, but you are still able to have a single writer and many
    /// reader connections to the same memory DB open.
    pub fn new_memory(db_name: &str) -> Result<Arc<Self>> {
        let name = PathBuf::from(format!("file:{}?mode=memory&cache=shared", db_name));
        Self::new_or_existing(name)
    }

    fn new_or_existing_into(
        target: &mut HashMap<PathBuf, Weak<BookmarksApi>>,
        db_name: PathBuf,
    ) -> Result<Arc<Self>> {
        match target.get(&db_name).and_then(Weak::upgrade) {
            Some(existing) => Ok(existing),
            None => {
                let id = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
                // We always create a new read-write connection for an initial open so
                // we can create the schema and/or do version upgrades.
                let connection = BookmarksDb::open(&db_name, ConnectionType::ReadWrite, id)?;
                let new = BookmarksApi {
                    db_name: db_name.clone(),
                    write_connection: Mutex::new(Some(connection)),
                    sync_connection: Mutex::new(Weak::new()),
                    id,
                };
                let arc = Arc::new(new);
                target.insert(db_name, Arc::downgrade(&arc));
                Ok(arc)
            }
        }
    }

    fn new_or_existing(db_name: PathBuf) -> Result<Arc<Self>> {
        let mut guard = APIS.lock();
        Self::new_or_existing_into(&mut guard, db_name)
    }

    /// Open a connection to the database.
    pub fn open_connection(&self, conn_type: ConnectionType) -> Result<BookmarksDb> {
        match conn_type {
            ConnectionType::ReadOnly => {
                // make a new one - we can have as many of these as we want.
                BookmarksDb::open(self.db_name.clone(), ConnectionType::ReadOnly, self.id)
            }
            ConnectionType::ReadWrite => {
                // We only allow one of these.
                let mut guard = self.write_connection.lock();
                match guard.take() {
                    None => Err(Error::ConnectionAlreadyOpen),
                    Some(db) => Ok(db),
                }
            }
            ConnectionType::Sync => Err(Error::InvalidConnectionType),
        }
    }

    /// Get the database connection the sync collaborator uses to fill the
    /// buffer. Each connection is wrapped in a `Mutex<>` to synchronize
    /// access, and reused while the last returned `Arc` is alive.
    pub fn get_sync_connection(&self) -> Result<Arc<SharedBookmarksDb>> {
        let mut conn = self.sync_connection.lock();
        match conn.upgrade() {
            Some(db) => Ok(db),
            None => {
                let db = Arc::new(SharedBookmarksDb::new(BookmarksDb::open(
                    self.db_name.clone(),
                    ConnectionType::Sync,
                    self.id,
                )?));
                *conn = Arc::downgrade(&db);
                Ok(db)
            }
        }
    }

    /// Close a connection to the database. If the connection is the write
    /// connection, you can re-fetch it using open_connection.
    pub fn close_connection(&self, connection: BookmarksDb) -> Result<()> {
        if connection.api_id() != self.id {
            return Err(Error::WrongApiForClose);
        }
        if connection.conn_type() == ConnectionType::ReadWrite {
            // We only allow one of these.
            let mut guard = self.write_connection.lock();
            assert!((*guard).is_none());
            *guard = Some(connection);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test::*;
    use super::*;
    use sql_support::ConnExt;

    #[test]
    fn test_multi_writers_fails() {
        let api = new_mem_api();
        let writer1 = api
            .open_connection(ConnectionType::ReadWrite)
            .expect("should get writer");
        api.open_connection(ConnectionType::ReadWrite)
            .expect_err("should fail to get second writer");
        // But we should be able to re-get it after closing it.
        api.close_connection(writer1)
            .expect("should be able to close");
        api.open_connection(ConnectionType::ReadWrite)
            .expect("should get a writer after closing the other");
    }

    #[test]
    fn test_reader_sees_writer() {
        let api = new_mem_api();
        let reader = api
            .open_connection(ConnectionType::ReadOnly)
            .expect("should get reader");
        let writer = api
            .open_connection(ConnectionType::ReadWrite)
            .expect("should get writer");
        writer
            .execute_batch("INSERT INTO pending_deletions (id) VALUES ('bookmarkAAAA')")
            .expect("should insert");
        let val = reader
            .query_one::<i64>("SELECT count(*) FROM pending_deletions")
            .expect("should get value");
        assert_eq!(val, 1);
    }

    #[test]
    fn test_sync_connection_is_shared() {
        let api = new_mem_api();
        let a = api.get_sync_connection().expect("should get sync connection");
        let b = api.get_sync_connection().expect("should get it again");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().conn_type(), ConnectionType::Sync);
        assert!(matches!(
            api.open_connection(ConnectionType::Sync),
            Err(Error::InvalidConnectionType)
        ));
    }

    #[test]
    fn test_same_name_same_api() {
        let first = BookmarksApi::new_memory("test-bookmarks-api-same").unwrap();
        let second = BookmarksApi::new_memory("test-bookmarks-api-same").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let other = new_mem_api();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_on_disk_api() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookmarks.db");
        let api = BookmarksApi::new(&path).expect("should open");
        let again = BookmarksApi::new(&path).expect("should open again");
        assert!(Arc::ptr_eq(&api, &again));
        let writer = api
            .open_connection(ConnectionType::ReadWrite)
            .expect("should get writer");
        api.close_connection(writer).expect("should close");
        assert!(path.exists());
    }

    #[test]
    fn test_writer_and_sync_share_api() {
        let conns = new_mem_connections();
        assert_eq!(conns.write.conn_type(), ConnectionType::ReadWrite);
        assert_eq!(conns.sync.lock().api_id(), conns.api.id);
    }

    #[test]
    fn test_wrong_writer_close() {
        let api = new_mem_api();
        // Grab this so `api` doesn't think it still has a writer.
        let _writer = api
            .open_connection(ConnectionType::ReadWrite)
            .expect("should get writer");

        let fake_api = new_mem_api();
        let fake_writer = fake_api
            .open_connection(ConnectionType::ReadWrite)
            .expect("should get writer 2");

        assert!(matches!(
            api.close_connection(fake_writer).unwrap_err(),
            Error::WrongApiForClose
        ));
    }

    #[test]
    fn test_connection_type_from_primitive() {
        assert_eq!(ConnectionType::try_from(3).unwrap(), ConnectionType::Sync);
        assert!(matches!(
            ConnectionType::try_from(9),
            Err(Error::InvalidConnectionType)
        ));
    }
}
