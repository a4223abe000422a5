// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use tidepool_core::ResumeToken;

use crate::{CheckpointRecord, CheckpointResult, CheckpointStore, now_millis};

/// Non-persistent checkpoint store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
	records: Arc<RwLock<BTreeMap<String, (ResumeToken, i64)>>>,
}

impl MemoryCheckpointStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl CheckpointStore for MemoryCheckpointStore {
	fn fetch(&self, collection: &str) -> CheckpointResult<Option<ResumeToken>> {
		Ok(self.records.read().get(collection).map(|(token, _)| token.clone()))
	}

	fn persist(&self, collection: &str, token: &ResumeToken) -> CheckpointResult<()> {
		self.records.write().insert(collection.to_string(), (token.clone(), now_millis()));
		Ok(())
	}

	fn list(&self) -> CheckpointResult<Vec<CheckpointRecord>> {
		Ok(self.records
			.read()
			.iter()
			.map(|(collection, (token, updated_at))| CheckpointRecord {
				collection: collection.clone(),
				token: token.clone(),
				updated_at: *updated_at,
			})
			.collect())
	}
}
