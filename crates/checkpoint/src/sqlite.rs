// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! SQLite implementation of [`CheckpointStore`].
//!
//! One row per collection in the `checkpoint` table, written with an upsert so
//! a persist either creates the row or replaces it atomically.

use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tidepool_core::ResumeToken;
use tracing::{debug, instrument};

use crate::{CheckpointError, CheckpointRecord, CheckpointResult, CheckpointStore, now_millis};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS checkpoint (
	collection TEXT PRIMARY KEY,
	token      BLOB NOT NULL,
	updated_at INTEGER NOT NULL
)";

const UPSERT: &str = "INSERT INTO checkpoint (collection, token, updated_at) VALUES (?1, ?2, ?3)
	ON CONFLICT(collection) DO UPDATE SET token = excluded.token, updated_at = excluded.updated_at";

/// Location of the checkpoint database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbPath {
	/// Database file; a path without extension is treated as a directory
	/// holding `checkpoint.db`.
	File(PathBuf),
	/// Private in-memory database, lost on drop.
	Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
	Delete,
	Wal,
	Memory,
}

impl JournalMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			JournalMode::Delete => "DELETE",
			JournalMode::Wal => "WAL",
			JournalMode::Memory => "MEMORY",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousMode {
	Off,
	Normal,
	Full,
}

impl SynchronousMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			SynchronousMode::Off => "OFF",
			SynchronousMode::Normal => "NORMAL",
			SynchronousMode::Full => "FULL",
		}
	}
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
	pub path: DbPath,
	pub journal_mode: JournalMode,
	pub synchronous_mode: SynchronousMode,
}

impl SqliteConfig {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: DbPath::File(path.into()),
			journal_mode: JournalMode::Wal,
			synchronous_mode: SynchronousMode::Full,
		}
	}

	pub fn in_memory() -> Self {
		Self {
			path: DbPath::Memory,
			journal_mode: JournalMode::Memory,
			synchronous_mode: SynchronousMode::Off,
		}
	}

	pub fn journal_mode(mut self, mode: JournalMode) -> Self {
		self.journal_mode = mode;
		self
	}

	pub fn synchronous_mode(mut self, mode: SynchronousMode) -> Self {
		self.synchronous_mode = mode;
		self
	}
}

/// SQLite-backed checkpoint store.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
	conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
	#[instrument(name = "checkpoint::sqlite::new", level = "info", skip(config), fields(
		db_path = ?config.path,
		journal_mode = %config.journal_mode.as_str()
	))]
	pub fn new(config: SqliteConfig) -> CheckpointResult<Self> {
		let conn = connect(&resolve_db_path(config.path)?)?;

		conn.pragma_update(None, "journal_mode", config.journal_mode.as_str())?;
		conn.pragma_update(None, "synchronous", config.synchronous_mode.as_str())?;
		conn.execute(SCHEMA, [])?;

		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	pub fn in_memory() -> CheckpointResult<Self> {
		Self::new(SqliteConfig::in_memory())
	}
}

impl CheckpointStore for SqliteCheckpointStore {
	#[instrument(name = "checkpoint::sqlite::fetch", level = "trace", skip(self))]
	fn fetch(&self, collection: &str) -> CheckpointResult<Option<ResumeToken>> {
		let conn = self.conn.lock();
		let token = conn
			.query_row("SELECT token FROM checkpoint WHERE collection = ?1", params![collection], |row| {
				row.get::<_, Vec<u8>>(0)
			})
			.optional()?;
		Ok(token.map(ResumeToken))
	}

	#[instrument(name = "checkpoint::sqlite::persist", level = "debug", skip(self, token))]
	fn persist(&self, collection: &str, token: &ResumeToken) -> CheckpointResult<()> {
		let conn = self.conn.lock();
		let changed = conn.execute(UPSERT, params![collection, token.as_bytes(), now_millis()])?;
		if changed != 1 {
			return Err(CheckpointError::Internal(format!(
				"upsert of checkpoint for {} touched {} rows",
				collection, changed
			)));
		}
		debug!(collection, token = %token, "checkpoint persisted");
		Ok(())
	}

	fn list(&self) -> CheckpointResult<Vec<CheckpointRecord>> {
		let conn = self.conn.lock();
		let mut stmt = conn.prepare("SELECT collection, token, updated_at FROM checkpoint ORDER BY collection")?;
		let rows = stmt.query_map([], |row| {
			Ok(CheckpointRecord {
				collection: row.get(0)?,
				token: ResumeToken(row.get(1)?),
				updated_at: row.get(2)?,
			})
		})?;
		Ok(rows.collect::<Result<Vec<_>, _>>()?)
	}
}

fn connect(path: &DbPath) -> CheckpointResult<Connection> {
	let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
	let conn = match path {
		DbPath::File(path) => Connection::open_with_flags(path, flags)?,
		DbPath::Memory => Connection::open_in_memory_with_flags(flags)?,
	};
	Ok(conn)
}

/// Resolves the database path, creating parent directories as needed.
fn resolve_db_path(db_path: DbPath) -> CheckpointResult<DbPath> {
	let DbPath::File(path) = db_path else {
		return Ok(db_path);
	};

	let file = if path.extension().is_none() {
		path.join("checkpoint.db")
	} else {
		path
	};

	if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Open {
			path: file.display().to_string(),
			source,
		})?;
	}

	Ok(DbPath::File(file))
}
