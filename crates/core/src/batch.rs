// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::{event::ResumeToken, record::NormalizedRecord};

/// Records of one collection accumulated during a single flush window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
	pub records: Vec<NormalizedRecord>,
	/// Wall-clock millis at which the window opened.
	pub window_start: u64,
	/// Token of the last event seen in the window, including skipped ones.
	pub resume_token: Option<ResumeToken>,
}

impl Batch {
	pub fn new(window_start: u64) -> Self {
		Self {
			records: Vec::new(),
			window_start,
			resume_token: None,
		}
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Token up to which this batch makes the stream durable once flushed.
	pub fn checkpoint(&self) -> Option<&ResumeToken> {
		self.resume_token.as_ref()
	}
}
