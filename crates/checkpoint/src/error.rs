// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
	#[error("checkpoint storage error: {0}")]
	Sqlite(#[from] rusqlite::Error),

	#[error("failed to prepare checkpoint database at {path}: {source}")]
	Open {
		path: String,
		source: std::io::Error,
	},

	#[error("checkpoint storage error: {0}")]
	Internal(String),
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
