// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! CDC error types.

use tidepool_checkpoint::CheckpointError;
use tidepool_core::ResumeToken;
use tidepool_sink::SinkError;

#[derive(Debug, thiserror::Error)]
pub enum CdcError {
	/// The event cannot be turned into a record; it is skipped.
	#[error("malformed change event at {token:?}: {reason}")]
	MalformedEvent {
		token: ResumeToken,
		reason: String,
	},

	#[error("invalid capture configuration: {0}")]
	Config(String),

	#[error("failed to start worker for {collection}: {reason}")]
	Spawn {
		collection: String,
		reason: String,
	},

	#[error("failed to list collections: {0}")]
	Discovery(String),

	#[error("failed to subscribe to {collection}: {reason}")]
	Subscribe {
		collection: String,
		reason: String,
	},

	/// The transport failed underneath an open subscription.
	#[error("change stream of {collection} failed: {reason}")]
	Stream {
		collection: String,
		reason: String,
	},

	#[error(transparent)]
	Checkpoint(#[from] CheckpointError),

	#[error(transparent)]
	Sink(#[from] SinkError),
}

pub type CdcResult<T> = Result<T, CdcError>;
