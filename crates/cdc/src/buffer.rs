// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{mem, time::Duration};

use tidepool_core::{Batch, NormalizedRecord, ResumeToken};

/// Accumulates records of one collection for the current time window.
///
/// The window opens at `window_start` and is due once `flush_interval` has
/// elapsed. Besides the records, the buffer remembers the newest resume token
/// it has seen, including tokens of events that produced no record.
#[derive(Debug)]
pub struct BatchBuffer {
	flush_interval: Duration,
	batch: Batch,
}

impl BatchBuffer {
	pub fn new(flush_interval: Duration, now: u64) -> Self {
		Self {
			flush_interval,
			batch: Batch::new(now),
		}
	}

	pub fn append(&mut self, record: NormalizedRecord, token: ResumeToken) {
		self.batch.records.push(record);
		self.batch.resume_token = Some(token);
	}

	/// Advances the remembered token without adding a record.
	pub fn observe(&mut self, token: ResumeToken) {
		self.batch.resume_token = Some(token);
	}

	pub fn should_flush(&self, now: u64) -> bool {
		now.saturating_sub(self.batch.window_start) >= self.flush_interval.as_millis() as u64
	}

	/// Takes the current window and opens a new, empty one at `now`.
	pub fn drain(&mut self, now: u64) -> Batch {
		mem::replace(&mut self.batch, Batch::new(now))
	}

	/// Puts back a batch whose flush failed.
	///
	/// Its records go in front of anything buffered since; the newer token
	/// wins. The window start of the current window is kept.
	pub fn restore(&mut self, mut batch: Batch) {
		batch.records.append(&mut self.batch.records);
		self.batch.records = batch.records;
		if self.batch.resume_token.is_none() {
			self.batch.resume_token = batch.resume_token;
		}
	}

	pub fn reset_window(&mut self, now: u64) {
		self.batch.window_start = now;
	}

	pub fn window_start(&self) -> u64 {
		self.batch.window_start
	}

	pub fn resume_token(&self) -> Option<&ResumeToken> {
		self.batch.resume_token.as_ref()
	}

	pub fn len(&self) -> usize {
		self.batch.len()
	}

	pub fn is_empty(&self) -> bool {
		self.batch.is_empty()
	}
}
