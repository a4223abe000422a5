// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use arrow_schema::ArrowError;
use parquet::errors::ParquetError;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
	#[error("object store error: {0}")]
	ObjectStore(#[from] object_store::Error),

	#[error("failed to build record batch: {0}")]
	Arrow(#[from] ArrowError),

	#[error("failed to encode parquet: {0}")]
	Parquet(#[from] ParquetError),

	#[error("batch for {collection} is empty")]
	EmptyBatch {
		collection: String,
	},

	/// Files are never replaced; a second flush into the same key fails.
	#[error("object {key} already exists")]
	AlreadyExists {
		key: String,
	},

	#[error("failed to prepare local store at {path}: {source}")]
	Io {
		path: String,
		source: std::io::Error,
	},

	#[error("sink error: {0}")]
	Internal(String),
}

pub type SinkResult<T> = Result<T, SinkError>;
