// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one collection worker, shared with the telemetry reporter.
#[derive(Debug, Default)]
pub struct WorkerStats {
	events: AtomicU64,
	malformed: AtomicU64,
	records_flushed: AtomicU64,
	flushes: AtomicU64,
	flush_failures: AtomicU64,
	checkpoint_failures: AtomicU64,
	reconnects: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
	pub events: u64,
	pub malformed: u64,
	pub records_flushed: u64,
	pub flushes: u64,
	pub flush_failures: u64,
	pub checkpoint_failures: u64,
	pub reconnects: u64,
}

impl WorkerStats {
	pub fn snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			events: self.events.load(Ordering::Relaxed),
			malformed: self.malformed.load(Ordering::Relaxed),
			records_flushed: self.records_flushed.load(Ordering::Relaxed),
			flushes: self.flushes.load(Ordering::Relaxed),
			flush_failures: self.flush_failures.load(Ordering::Relaxed),
			checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
			reconnects: self.reconnects.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn record_event(&self) {
		self.events.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_malformed(&self) {
		self.malformed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_flush(&self, records: usize) {
		self.records_flushed.fetch_add(records as u64, Ordering::Relaxed);
		self.flushes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_flush_failure(&self) {
		self.flush_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_checkpoint_failure(&self) {
		self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reconnect(&self) {
		self.reconnects.fetch_add(1, Ordering::Relaxed);
	}
}
