use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError, QueryResult};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, warn};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Attempts made by [`with_retry`] before giving up on a locked database
const MAX_LOCK_RETRIES: u32 = 5;

/// Creates a connection pool for the given SQLite URL
///
/// ### Errors
///
/// Returns an error if the pool cannot open its first connection
pub fn init_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .build(manager)
        .with_context(|| format!("Failed to create pool for {}", database_url))
}

/// Applies connection pragmas and runs the embedded migrations
///
/// ### Arguments
///
/// * `conn` - A mutable reference to a SQLite connection
///
/// ### Errors
///
/// Returns an error if a pragma or a migration fails
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to run migrations: {}", e))?;
    debug!("Applied {} migrations", applied.len());
    Ok(())
}

fn is_locked(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::Unknown, info) => {
            let msg = info.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

/// Runs a query, retrying with a growing delay while SQLite reports the
/// database as locked
///
/// Any other error is returned immediately.
pub fn with_retry<T, F>(mut op: F) -> QueryResult<T>
where
    F: FnMut() -> QueryResult<T>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Err(err) if is_locked(&err) && attempt < MAX_LOCK_RETRIES => {
                attempt += 1;
                warn!("Database locked, retrying (attempt {})", attempt);
                thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn locked_error() -> DieselError {
        DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("database is locked".to_string()),
        )
    }

    #[test]
    fn test_with_retry_recovers_from_lock() {
        let calls = Cell::new(0);
        let result = with_retry(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(locked_error()) } else { Ok(7) }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_with_retry_gives_up() {
        let calls = Cell::new(0);
        let result: QueryResult<()> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(locked_error())
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), MAX_LOCK_RETRIES + 1);
    }

    #[test]
    fn test_with_retry_passes_other_errors_through() {
        let calls = Cell::new(0);
        let result: QueryResult<()> = with_retry(|| {
            calls.set(calls.get() + 1);
            Err(DieselError::NotFound)
        });
        assert!(matches!(result, Err(DieselError::NotFound)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_migrations_create_tables() {
        let url = format!("file:db_test_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let pool = init_pool(&url).unwrap();
        let mut conn = pool.get().unwrap();
        run_migrations(&mut conn).unwrap();
        // A second run is a no-op
        run_migrations(&mut conn).unwrap();
    }
}
