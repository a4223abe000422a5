// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use bytes::Bytes;
use tidepool_sink::{MemorySink, ObjectSink, SinkError, SinkResult};

/// [`MemorySink`] whose uploads can be made to fail on demand.
///
/// Namespace markers (keys ending with `/`) are never refused so that a
/// failing run still exercises the marker logic.
#[derive(Clone, Default)]
pub struct FlakySink {
	inner: MemorySink,
	fail_puts: Arc<AtomicBool>,
	failed: Arc<AtomicUsize>,
}

impl FlakySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing() -> Self {
		let sink = Self::new();
		sink.fail_puts(true);
		sink
	}

	pub fn fail_puts(&self, fail: bool) {
		self.fail_puts.store(fail, Ordering::SeqCst);
	}

	/// Number of uploads refused so far.
	pub fn failed(&self) -> usize {
		self.failed.load(Ordering::SeqCst)
	}

	pub fn memory(&self) -> &MemorySink {
		&self.inner
	}

	/// Keys of the data files written so far, markers excluded.
	pub fn files(&self) -> Vec<String> {
		self.inner.keys().into_iter().filter(|key| !key.ends_with('/')).collect()
	}

	pub fn markers(&self) -> Vec<String> {
		self.inner.keys().into_iter().filter(|key| key.ends_with('/')).collect()
	}

	fn refuse(&self, key: &str) -> SinkResult<()> {
		if !key.ends_with('/') && self.fail_puts.load(Ordering::SeqCst) {
			self.failed.fetch_add(1, Ordering::SeqCst);
			return Err(SinkError::Internal(format!("injected upload failure for {}", key)));
		}
		Ok(())
	}
}

impl ObjectSink for FlakySink {
	fn list(&self, prefix: &str) -> SinkResult<Vec<String>> {
		self.inner.list(prefix)
	}

	fn contains_prefix(&self, prefix: &str) -> SinkResult<bool> {
		self.inner.contains_prefix(prefix)
	}

	fn fetch(&self, key: &str) -> SinkResult<Option<Bytes>> {
		self.inner.fetch(key)
	}

	fn put(&self, key: &str, body: Bytes) -> SinkResult<()> {
		self.refuse(key)?;
		self.inner.put(key, body)
	}

	fn create(&self, key: &str, body: Bytes) -> SinkResult<()> {
		self.refuse(key)?;
		self.inner.create(key, body)
	}
}

