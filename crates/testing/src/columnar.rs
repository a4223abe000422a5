// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Reading flushed files back in assertions.

use arrow_array::{Array, RecordBatch, cast::AsArray};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Decodes a Parquet file into its record batches.
pub fn read_batches(bytes: Bytes) -> Vec<RecordBatch> {
	ParquetRecordBatchReaderBuilder::try_new(bytes)
		.expect("valid parquet footer")
		.build()
		.expect("parquet reader")
		.map(|batch| batch.expect("readable record batch"))
		.collect()
}

pub fn row_count(bytes: Bytes) -> usize {
	read_batches(bytes).iter().map(RecordBatch::num_rows).sum()
}

/// Values of a `Utf8` column across all batches; nulls become `None`.
pub fn utf8_column(bytes: Bytes, name: &str) -> Vec<Option<String>> {
	read_batches(bytes)
		.iter()
		.flat_map(|batch| {
			let column = batch.column_by_name(name).unwrap_or_else(|| panic!("column {} missing", name));
			let strings = column.as_string::<i32>();
			(0..strings.len())
				.map(|i| if strings.is_null(i) { None } else { Some(strings.value(i).to_string()) })
				.collect::<Vec<_>>()
		})
		.collect()
}
