use crate::core::error::{CrmError, CrmResult};
use chrono::{NaiveDateTime, SubsecRound, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};

pub type DbConn = SqliteConnection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Opens the store with foreign keys enforced and the schema up to date.
pub fn establish_connection(database_url: &str) -> CrmResult<DbConn> {
    let mut conn = SqliteConnection::establish(database_url)
        .map_err(|e| CrmError::Database(format!("Failed to open {database_url}: {e}")))?;
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
    run_migrations(&mut conn)?;
    debug!(database = %database_url, "database ready");
    Ok(conn)
}

pub fn run_migrations(conn: &mut DbConn) -> CrmResult<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| CrmError::Database(format!("Migration error: {e}")))?;
    if !applied.is_empty() {
        info!(count = applied.len(), "applied database migrations");
    }
    Ok(())
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}
