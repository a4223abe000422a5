// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tidepool_core::Batch;
use tracing::{debug, info, instrument};

use crate::{NullPolicy, ObjectSink, ParquetEncoder, SchemaTracker, SinkError, SinkResult};

pub const FILE_EXTENSION: &str = "parquet";

/// Object keys carry the flush time to the second; windows must not be
/// shorter or two flushes would compete for one key.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Marker key establishing a collection's namespace.
pub fn namespace_path(collection: &str) -> String {
	format!("{}/", collection)
}

/// Object key of the file flushed for `collection` at `flushed_at`.
pub fn object_path(collection: &str, flushed_at: DateTime<Utc>) -> String {
	format!("{}/{}_{}.{}", collection, collection, flushed_at.format("%Y%m%d%H%M%S"), FILE_EXTENSION)
}

/// Publishes closed batches as Parquet files.
///
/// Stateless apart from its configuration and shared by all workers; each
/// worker passes its own [`SchemaTracker`].
pub struct ParquetWriter {
	sink: Arc<dyn ObjectSink>,
	encoder: ParquetEncoder,
}

impl ParquetWriter {
	pub fn new(sink: Arc<dyn ObjectSink>, null_policy: NullPolicy) -> Self {
		Self {
			sink,
			encoder: ParquetEncoder::new(null_policy),
		}
	}

	pub fn sink(&self) -> &Arc<dyn ObjectSink> {
		&self.sink
	}

	/// Creates the namespace marker unless something already lives under the
	/// collection's prefix. Returns whether a marker was written.
	#[instrument(name = "sink::ensure_namespace", level = "debug", skip(self))]
	pub fn ensure_namespace(&self, collection: &str) -> SinkResult<bool> {
		let prefix = namespace_path(collection);
		if self.sink.contains_prefix(&prefix)? {
			return Ok(false);
		}

		self.sink.put(&prefix, Bytes::new())?;
		info!(collection, "created namespace {}", prefix);
		Ok(true)
	}

	/// Column types of the newest file of `collection`, or an empty tracker
	/// when nothing has been written yet.
	#[instrument(name = "sink::load_schema", level = "debug", skip(self))]
	pub fn load_schema(&self, collection: &str) -> SinkResult<SchemaTracker> {
		let suffix = format!(".{}", FILE_EXTENSION);
		// keys differ only in the fixed-width timestamp, so the largest is the newest
		let newest =
			self.sink.list(&namespace_path(collection))?.into_iter().filter(|key| key.ends_with(&suffix)).max();

		let Some(path) = newest else {
			return Ok(SchemaTracker::new());
		};
		let Some(body) = self.sink.fetch(&path)? else {
			return Ok(SchemaTracker::new());
		};

		let builder = ParquetRecordBatchReaderBuilder::try_new(body)?;
		let tracker = SchemaTracker::from_schema(builder.schema());
		debug!(collection, path = %path, "restored column types");
		Ok(tracker)
	}

	/// Encodes `batch` and uploads it, returning the object key.
	///
	/// The tracker is only updated once the upload succeeded. Any error leaves
	/// the caller's batch and checkpoint untouched; an existing file under the
	/// same key is never replaced.
	#[instrument(name = "sink::write_batch", level = "debug", skip(self, batch, schema), fields(records = batch.len()))]
	pub fn write_batch(
		&self,
		collection: &str,
		batch: &Batch,
		schema: &mut SchemaTracker,
		flushed_at: DateTime<Utc>,
	) -> SinkResult<String> {
		if batch.is_empty() {
			return Err(SinkError::EmptyBatch {
				collection: collection.to_string(),
			});
		}

		self.ensure_namespace(collection)?;

		let resolved = schema.resolve(collection, &batch.records);
		let body = self.encoder.encode(&resolved, &batch.records)?;
		let path = object_path(collection, flushed_at);
		let size = body.len();

		self.sink.create(&path, body)?;
		schema.commit(&resolved);

		debug!(collection, path = %path, bytes = size, columns = resolved.fields().len(), "batch uploaded");
		Ok(path)
	}
}
