// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Parquet encoding of normalized records.
//!
//! Encodes a batch into a self-contained Parquet file held in memory, using
//! `ArrowWriter<Vec<u8>>` with fixed writer properties so that every file of
//! a collection carries the same format version and metadata.

use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, SchemaRef};
use bytes::Bytes;
use parquet::{
	arrow::ArrowWriter,
	basic::Compression,
	file::properties::{WriterProperties, WriterVersion},
};
use serde::{Deserialize, Serialize};
use tidepool_core::{NormalizedRecord, Value};

use crate::{SinkError, SinkResult};

/// Stand-in for a missing number in [`NullPolicy::Sentinel`] mode.
pub const NUMERIC_SENTINEL: f64 = 9_999_999_999.0;

/// Stand-in for a missing string in [`NullPolicy::Sentinel`] mode.
pub const STRING_SENTINEL: &str = "";

const CREATED_BY: &str = concat!("tidepool version ", env!("CARGO_PKG_VERSION"));

/// How missing and null cells are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
	/// Native Parquet nulls.
	#[default]
	Nullable,
	/// Legacy layout: empty string for `Utf8`, [`NUMERIC_SENTINEL`] for
	/// `Float64`. Booleans stay null.
	Sentinel,
}

#[derive(Debug, Clone)]
pub struct ParquetEncoder {
	null_policy: NullPolicy,
	properties: WriterProperties,
}

impl ParquetEncoder {
	pub fn new(null_policy: NullPolicy) -> Self {
		let properties = WriterProperties::builder()
			.set_writer_version(WriterVersion::PARQUET_2_0)
			.set_compression(Compression::SNAPPY)
			.set_created_by(CREATED_BY.to_string())
			.build();

		Self {
			null_policy,
			properties,
		}
	}

	pub fn null_policy(&self) -> NullPolicy {
		self.null_policy
	}

	/// Builds the Arrow record batch for `records` under `schema`.
	pub fn record_batch(&self, schema: &SchemaRef, records: &[NormalizedRecord]) -> SinkResult<RecordBatch> {
		let sentinel = self.null_policy == NullPolicy::Sentinel;

		let columns = schema
			.fields()
			.iter()
			.map(|field| {
				let cells = records.iter().map(|record| record.get(field.name()));
				let array: ArrayRef = match field.data_type() {
					DataType::Float64 => Arc::new(
						cells.map(|cell| match cell {
							Some(Value::Float64(n)) => Some(*n),
							_ if sentinel => Some(NUMERIC_SENTINEL),
							_ => None,
						})
						.collect::<Float64Array>(),
					),
					DataType::Boolean => Arc::new(
						cells.map(|cell| match cell {
							Some(Value::Boolean(b)) => Some(*b),
							_ => None,
						})
						.collect::<BooleanArray>(),
					),
					DataType::Utf8 => Arc::new(
						cells.map(|cell| match cell.and_then(Value::to_utf8) {
							Some(s) => Some(s),
							None if sentinel => Some(STRING_SENTINEL.to_string()),
							None => None,
						})
						.collect::<StringArray>(),
					),
					other => {
						return Err(SinkError::Internal(format!(
							"unsupported column type {} for {}",
							other,
							field.name()
						)));
					}
				};
				Ok(array)
			})
			.collect::<SinkResult<Vec<_>>>()?;

		Ok(RecordBatch::try_new(schema.clone(), columns)?)
	}

	/// Encodes `records` as one Parquet file.
	pub fn encode(&self, schema: &SchemaRef, records: &[NormalizedRecord]) -> SinkResult<Bytes> {
		let batch = self.record_batch(schema, records)?;

		let mut buf = Vec::new();
		let mut writer = ArrowWriter::try_new(&mut buf, schema.clone(), Some(self.properties.clone()))?;
		writer.write(&batch)?;
		writer.close()?;

		Ok(Bytes::from(buf))
	}
}
