/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use super::schema;
use crate::api::bookmarks_api::ConnectionType;
use crate::error::*;
use parking_lot::Mutex;
use rusqlite::{self, Connection, Transaction};
use sql_support::{
    open_database::{self, open_database_with_flags, ConnectionInitializer},
    ConnExt, UncheckedTransaction,
};
use std::ops::Deref;
use std::path::Path;

pub struct BookmarksInitializer {
    conn_type: ConnectionType,
}

impl BookmarksInitializer {
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self {
            conn_type: ConnectionType::ReadWrite,
        }
    }
}

impl ConnectionInitializer for BookmarksInitializer {
    const NAME: &'static str = "bookmarks";
    const END_VERSION: u32 = schema::VERSION;

    fn init(&self, tx: &Transaction<'_>) -> open_database::Result<()> {
        Ok(schema::init(tx)?)
    }

    fn upgrade_from(&self, tx: &Transaction<'_>, version: u32) -> open_database::Result<()> {
        if version < 1 {
            return Err(open_database::Error::IncompatibleVersion(version));
        }
        Ok(schema::upgrade_from(tx, version)?)
    }

    fn prepare(&self, conn: &Connection, _db_empty: bool) -> open_database::Result<()> {
        let initial_pragmas = "
            -- `temp_store = 2` is required on Android to force the DB to keep temp
            -- files in memory, since on Android there's no tmp partition.
            PRAGMA temp_store = 2;

            -- We want foreign-key support: structure rows go away with their parent.
            PRAGMA foreign_keys = ON;

            -- How long to wait for a lock before returning SQLITE_BUSY (in ms)
            PRAGMA busy_timeout = 5000;
        ";
        conn.execute_batch(initial_pragmas)?;
        if self.conn_type != ConnectionType::ReadOnly {
            // Ignored (and harmless) for memory databases.
            conn.execute_one("PRAGMA journal_mode = WAL")?;
        }
        conn.set_prepared_statement_cache_capacity(128);
        Ok(())
    }
}

/// A connection to the bookmarks database, opened through `BookmarksApi`.
#[derive(Debug)]
pub struct BookmarksDb {
    pub db: Connection,
    conn_type: ConnectionType,
    api_id: usize,
}

impl BookmarksDb {
    fn with_connection(db: Connection, conn_type: ConnectionType, api_id: usize) -> Self {
        Self {
            db,
            conn_type,
            api_id,
        }
    }

    pub fn open(path: impl AsRef<Path>, conn_type: ConnectionType, api_id: usize) -> Result<Self> {
        let initializer = BookmarksInitializer { conn_type };
        let conn = open_database_with_flags(path, conn_type.rusqlite_flags(), &initializer)?;
        Ok(Self::with_connection(conn, conn_type, api_id))
    }

    #[cfg(test)]
    // Useful for some tests (although most tests should use helper functions
    // in api::bookmarks_api::test)
    pub fn open_in_memory(conn_type: ConnectionType) -> Result<Self> {
        let initializer = BookmarksInitializer { conn_type };
        let conn = open_database::open_memory_database_with_flags(
            conn_type.rusqlite_flags(),
            &initializer,
        )?;
        Ok(Self::with_connection(conn, conn_type, 0))
    }

    /// Every multi-statement write runs inside one of these. Dropping it
    /// without calling `commit` rolls everything back.
    pub fn begin_transaction(&self) -> Result<UncheckedTransaction<'_>> {
        Ok(self.db.unchecked_transaction_imm()?)
    }

    #[inline]
    pub fn conn_type(&self) -> ConnectionType {
        self.conn_type
    }

    #[inline]
    pub fn api_id(&self) -> usize {
        self.api_id
    }
}

impl Drop for BookmarksDb {
    fn drop(&mut self) {
        // In line with the recommendations from SQLite, we run `PRAGMA optimize`
        // before closing the connection.
        if let ConnectionType::ReadOnly = self.conn_type() {
            // A reader connection can't execute an optimize
            return;
        }
        let res = self.db.execute_batch("PRAGMA optimize(0x02);");
        if let Err(e) = res {
            log::warn!("Failed to execute pragma optimize (DB locked?): {}", e);
        }
    }
}

impl ConnExt for BookmarksDb {
    #[inline]
    fn conn(&self) -> &Connection {
        &self.db
    }
}

impl Deref for BookmarksDb {
    type Target = Connection;
    #[inline]
    fn deref(&self) -> &Connection {
        &self.db
    }
}

/// BookmarksDb that's behind a Mutex so it can be shared between threads.
/// This is what the sync collaborator gets.
pub struct SharedBookmarksDb {
    db: Mutex<BookmarksDb>,
}

impl SharedBookmarksDb {
    pub fn new(db: BookmarksDb) -> Self {
        Self { db: Mutex::new(db) }
    }
}

// Deref to a Mutex<BookmarksDb>, which is how we will use SharedBookmarksDb most of the time
impl Deref for SharedBookmarksDb {
    type Target = Mutex<BookmarksDb>;

    #[inline]
    fn deref(&self) -> &Mutex<BookmarksDb> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = BookmarksDb::open_in_memory(ConnectionType::ReadWrite).expect("should open");
        assert_eq!(db.conn_type(), ConnectionType::ReadWrite);
        assert_eq!(
            db.query_one::<i64>("PRAGMA foreign_keys").unwrap(),
            1,
            "foreign keys should be on"
        );
        assert_eq!(
            db.query_one::<u32>("PRAGMA user_version").unwrap(),
            schema::VERSION
        );
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let db = BookmarksDb::open_in_memory(ConnectionType::ReadWrite).expect("should open");
        {
            let tx = db.begin_transaction().expect("should begin");
            tx.execute("DELETE FROM bookmarksLocalStructure", [])
                .expect("should delete");
        }
        assert_eq!(
            db.query_one::<i64>("SELECT count(*) FROM bookmarksLocalStructure")
                .unwrap(),
            4
        );
    }
}
