/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use rusqlite::{self, limits::Limit, types::ToSql};

/// Returns SQLITE_LIMIT_VARIABLE_NUMBER as read from an in-memory connection and cached.
/// Lowering the limit on a connection at runtime isn't supported; this will
/// then return the wrong value.
///
/// If the actual value was set to a negative number or zero we panic, but it's
/// unlikely you can run useful queries if this happened anyway.
pub fn default_max_variable_number() -> usize {
    lazy_static! {
        static ref MAX_VARIABLE_NUMBER: usize = {
            let conn = rusqlite::Connection::open_in_memory()
                .expect("Failed to initialize in-memory connection (out of memory?)");

            let limit = conn.limit(Limit::SQLITE_LIMIT_VARIABLE_NUMBER);
            assert!(
                limit > 0,
                "Illegal value for SQLITE_LIMIT_VARIABLE_NUMBER (must be > 0) {}",
                limit
            );
            limit as usize
        };
    }
    *MAX_VARIABLE_NUMBER
}

/// Helper for the case where you have a `&[impl ToSql]` of arbitrary length, but need
/// to bind no more than `default_max_variable_number()` of them per statement.
///
/// The `do_chunk` callback is called with a slice of no more than
/// `default_max_variable_number()` items as its first argument, and the offset
/// from the start as its second. Pass the slice to `rusqlite::params_from_iter`.
pub fn each_chunk<'a, T, E, F>(items: &'a [T], do_chunk: F) -> Result<(), E>
where
    T: 'a,
    F: FnMut(&'a [T], usize) -> Result<(), E>,
{
    each_sized_chunk(items, default_max_variable_number(), do_chunk)
}

/// A version of `each_chunk` for the case when binding requires converting
/// each item first, for example taking the guid off of a record.
pub fn each_chunk_mapped<'a, T, U, E, Mapper, DoChunk>(
    items: &'a [T],
    to_sql: Mapper,
    do_chunk: DoChunk,
) -> Result<(), E>
where
    T: 'a,
    U: ToSql + 'a,
    Mapper: Fn(&'a T) -> U,
    DoChunk: FnMut(&[U], usize) -> Result<(), E>,
{
    each_sized_chunk_mapped(items, default_max_variable_number(), to_sql, do_chunk)
}

/// `each_chunk` with an explicit chunk size. Used when every item binds more
/// than one variable, or when a caller wants a smaller batch than SQLite's
/// limit.
pub fn each_sized_chunk<'a, T, E, F>(
    items: &'a [T],
    chunk_size: usize,
    mut do_chunk: F,
) -> Result<(), E>
where
    T: 'a,
    F: FnMut(&'a [T], usize) -> Result<(), E>,
{
    assert!(chunk_size > 0, "chunk size must be positive");
    let mut offset = 0;
    for chunk in items.chunks(chunk_size) {
        do_chunk(chunk, offset)?;
        offset += chunk.len();
    }
    Ok(())
}

/// The low-level version of `each_chunk_mapped`, taking both the mapping
/// function and the chunk size.
pub fn each_sized_chunk_mapped<'a, T, U, E, Mapper, DoChunk>(
    items: &'a [T],
    chunk_size: usize,
    to_sql: Mapper,
    mut do_chunk: DoChunk,
) -> Result<(), E>
where
    T: 'a,
    U: ToSql + 'a,
    Mapper: Fn(&'a T) -> U,
    DoChunk: FnMut(&[U], usize) -> Result<(), E>,
{
    if items.is_empty() {
        return Ok(());
    }
    let mut vec = Vec::with_capacity(chunk_size.min(items.len()));
    each_sized_chunk(items, chunk_size, |chunk, offset| {
        vec.clear();
        vec.extend(chunk.iter().map(&to_sql));
        do_chunk(&vec, offset)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_separate() {
        let mut seen = Vec::new();
        each_sized_chunk(&[1, 2, 3, 4, 5], 3, |chunk, offset| {
            seen.push((chunk.to_vec(), offset));
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(seen, vec![(vec![1, 2, 3], 0), (vec![4, 5], 3)]);
    }

    #[test]
    fn test_leq_chunk_size() {
        for &check_size in &[5, 6] {
            let mut iterations = 0;
            each_sized_chunk(&[1, 2, 3, 4, 5], check_size, |chunk, offset| {
                iterations += 1;
                assert_eq!(offset, 0);
                assert_eq!(chunk, &[1, 2, 3, 4, 5]);
                Ok::<(), ()>(())
            })
            .unwrap();
            assert_eq!(iterations, 1);
        }
    }

    #[test]
    fn test_empty_chunk() {
        let items: &[i64] = &[];
        each_sized_chunk_mapped::<_, _, (), _, _>(
            items,
            100,
            |item| *item,
            |_, _| {
                panic!("Should never be called");
            },
        )
        .unwrap();
    }

    #[test]
    fn test_mapped() {
        let items = vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)];
        let mut seen = Vec::new();
        each_sized_chunk_mapped(
            &items,
            2,
            |(name, _)| name.as_str(),
            |chunk, offset| {
                seen.push((chunk.join(""), offset));
                Ok::<(), ()>(())
            },
        )
        .unwrap();
        assert_eq!(seen, vec![("ab".to_string(), 0), ("c".to_string(), 2)]);
    }

    #[test]
    fn test_error() {
        let mut iteration = 0;
        let e = each_sized_chunk(&[1, 2, 3, 4, 5, 6, 7], 3, |_, offset| {
            iteration += 1;
            match offset {
                0 => Ok(()),
                3 => Err("testing".to_string()),
                // Make sure we stopped after the error.
                _ => panic!("Shouldn't get called with offset of {}", offset),
            }
        })
        .expect_err("Should be an error");
        assert_eq!(e, "testing");
        assert_eq!(iteration, 2);
    }

    #[test]
    fn test_binds_in_real_statement() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT)").unwrap();
        let values: Vec<String> = (0..10).map(|i| format!("v{}", i)).collect();
        each_sized_chunk(&values, 4, |chunk, _| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO t (v) VALUES {}",
                    crate::repeat_sql_values(chunk.len())
                ),
                rusqlite::params_from_iter(chunk),
            )?;
            Ok(())
        })
        .unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 10);
        assert!(default_max_variable_number() >= 999);
    }
}
