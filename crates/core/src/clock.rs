// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use chrono::{DateTime, Utc};

/// Source of wall-clock time for window bookkeeping and file names.
#[derive(Debug, Clone, Default)]
pub enum Clock {
	#[default]
	System,
	Mock(MockClock),
}

impl Clock {
	/// Milliseconds since the unix epoch.
	pub fn now_millis(&self) -> u64 {
		match self {
			Clock::System => Utc::now().timestamp_millis().max(0) as u64,
			Clock::Mock(mock) => mock.now_millis(),
		}
	}

	pub fn now_utc(&self) -> DateTime<Utc> {
		match self {
			Clock::System => Utc::now(),
			Clock::Mock(mock) => DateTime::from_timestamp_millis(mock.now_millis() as i64).unwrap_or_default(),
		}
	}
}

/// Manually driven clock shared between a test and the code under test.
#[derive(Debug, Clone)]
pub struct MockClock {
	millis: Arc<AtomicU64>,
}

impl MockClock {
	pub fn new(start_millis: u64) -> Self {
		Self {
			millis: Arc::new(AtomicU64::new(start_millis)),
		}
	}

	pub fn now_millis(&self) -> u64 {
		self.millis.load(Ordering::Acquire)
	}

	pub fn set(&self, millis: u64) {
		self.millis.store(millis, Ordering::Release);
	}

	pub fn advance(&self, by: Duration) {
		self.millis.fetch_add(by.as_millis() as u64, Ordering::AcqRel);
	}

	pub fn clock(&self) -> Clock {
		Clock::Mock(self.clone())
	}
}
