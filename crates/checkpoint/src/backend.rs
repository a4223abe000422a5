// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tidepool_core::ResumeToken;

use crate::{
	CheckpointRecord, CheckpointResult, CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore,
	SqliteConfig,
};

/// Checkpoint store selected at startup.
///
/// Dispatches to either the in-memory or the SQLite implementation.
#[derive(Clone)]
#[repr(u8)]
pub enum CheckpointBackend {
	/// In-memory storage (non-persistent)
	Memory(MemoryCheckpointStore) = 0,
	/// SQLite-based persistent storage
	Sqlite(SqliteCheckpointStore) = 1,
}

impl CheckpointBackend {
	pub fn memory() -> Self {
		Self::Memory(MemoryCheckpointStore::new())
	}

	pub fn sqlite(config: SqliteConfig) -> CheckpointResult<Self> {
		Ok(Self::Sqlite(SqliteCheckpointStore::new(config)?))
	}
}

impl CheckpointStore for CheckpointBackend {
	#[inline]
	fn fetch(&self, collection: &str) -> CheckpointResult<Option<ResumeToken>> {
		match self {
			Self::Memory(s) => s.fetch(collection),
			Self::Sqlite(s) => s.fetch(collection),
		}
	}

	#[inline]
	fn persist(&self, collection: &str, token: &ResumeToken) -> CheckpointResult<()> {
		match self {
			Self::Memory(s) => s.persist(collection, token),
			Self::Sqlite(s) => s.persist(collection, token),
		}
	}

	#[inline]
	fn list(&self) -> CheckpointResult<Vec<CheckpointRecord>> {
		match self {
			Self::Memory(s) => s.list(),
			Self::Sqlite(s) => s.list(),
		}
	}
}
