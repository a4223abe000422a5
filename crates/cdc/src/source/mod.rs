// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Change stream transport.
//!
//! A [`ChangeSource`] enumerates collections and opens one ordered
//! [`ChangeStream`] per collection, optionally resuming after a token.

mod file;
mod memory;

pub use file::{DEFAULT_POLL_INTERVAL, FEED_EXTENSION, FileSource};
pub use memory::MemorySource;
use tidepool_core::{ChangeEvent, ResumeToken};

use crate::CdcResult;

pub trait ChangeSource: Send + Sync {
	/// Names of all collections that currently exist.
	fn collections(&self) -> CdcResult<Vec<String>>;

	/// Opens a stream for `collection`.
	///
	/// With a token the stream continues right after it; without one it
	/// starts at the current tail and sees only later changes.
	fn subscribe(&self, collection: &str, resume_after: Option<&ResumeToken>) -> CdcResult<Box<dyn ChangeStream>>;
}

/// Ordered change events of one collection.
pub trait ChangeStream: Send {
	/// Blocks until the next event is available.
	///
	/// `Ok(None)` means the source closed the stream cleanly; an error means
	/// the subscription is no longer usable.
	fn next_event(&mut self) -> CdcResult<Option<ChangeEvent>>;
}
