//! Database layer for odontogram storage.

mod schema;
mod patients;
mod charts;
mod audit;

pub use schema::*;
#[allow(unused_imports)]
pub use patients::*;
#[allow(unused_imports)]
pub use charts::*;
#[allow(unused_imports)]
pub use audit::*;

use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Turn SQLite constraint failures (UNIQUE, CHECK, trigger aborts) into
/// [`DbError::Constraint`] so callers can tell them apart from I/O failures.
pub(crate) fn constraint_aware(err: rusqlite::Error, context: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(format!(
                "{}: {}",
                context,
                msg.as_deref().unwrap_or("constraint failed")
            ))
        }
        _ => DbError::Sqlite(err),
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
