// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};

use tidepool_checkpoint::{
	CheckpointError, CheckpointRecord, CheckpointResult, CheckpointStore, MemoryCheckpointStore,
};
use tidepool_core::ResumeToken;

/// In-memory checkpoint store whose writes can be made to fail, simulating a
/// crash between a successful flush and the checkpoint update.
#[derive(Clone, Default)]
pub struct FlakyCheckpointStore {
	inner: MemoryCheckpointStore,
	fail_persist: Arc<AtomicBool>,
}

impl FlakyCheckpointStore {
	pub fn new(inner: MemoryCheckpointStore) -> Self {
		Self {
			inner,
			fail_persist: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn fail_persist(&self, fail: bool) {
		self.fail_persist.store(fail, Ordering::SeqCst);
	}

	pub fn inner(&self) -> &MemoryCheckpointStore {
		&self.inner
	}
}

impl CheckpointStore for FlakyCheckpointStore {
	fn fetch(&self, collection: &str) -> CheckpointResult<Option<ResumeToken>> {
		self.inner.fetch(collection)
	}

	fn persist(&self, collection: &str, token: &ResumeToken) -> CheckpointResult<()> {
		if self.fail_persist.load(Ordering::SeqCst) {
			return Err(CheckpointError::Internal(format!("injected persist failure for {}", collection)));
		}
		self.inner.persist(collection, token)
	}

	fn list(&self) -> CheckpointResult<Vec<CheckpointRecord>> {
		self.inner.list()
	}
}
