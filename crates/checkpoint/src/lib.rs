// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Checkpoint storage for change capture.
//!
//! A checkpoint maps a collection to the resume token of the last event whose
//! data has been durably flushed. Workers fetch it once on start and persist
//! it strictly after a successful flush, so a stored token is never ahead of
//! the data in the sink.

#![cfg_attr(not(debug_assertions), deny(warnings))]

mod backend;
mod error;
mod memory;
pub mod sqlite;

pub use backend::CheckpointBackend;
pub use error::{CheckpointError, CheckpointResult};
pub use memory::MemoryCheckpointStore;
pub use sqlite::{DbPath, SqliteCheckpointStore, SqliteConfig};
use tidepool_core::ResumeToken;

/// A stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
	pub collection: String,
	pub token: ResumeToken,
	/// Unix millis of the last upsert.
	pub updated_at: i64,
}

/// Durable mapping from collection name to its last acknowledged resume token.
///
/// Shared by all workers; each worker only reads and writes its own key.
pub trait CheckpointStore: Send + Sync {
	/// Last persisted token, or `None` to start from the tail of the stream.
	fn fetch(&self, collection: &str) -> CheckpointResult<Option<ResumeToken>>;

	/// Creates or atomically overwrites the checkpoint of `collection`.
	fn persist(&self, collection: &str, token: &ResumeToken) -> CheckpointResult<()>;

	/// All stored checkpoints ordered by collection.
	fn list(&self) -> CheckpointResult<Vec<CheckpointRecord>>;
}

pub(crate) fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}
