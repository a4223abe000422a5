// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Column type resolution for a batch.
//!
//! A column is `Float64` when every non-null cell is numeric, `Boolean` when
//! every non-null cell is a boolean, and `Utf8` otherwise. The
//! [`SchemaTracker`] carries the types of earlier flushes of the same
//! collection forward: once a column has been written as `Utf8` it stays
//! `Utf8`, and a disagreement between batches widens to `Utf8`.
//!
//! Every written schema carries the tracker's column types under
//! [`COLUMN_TYPES_KEY`], so the newest file of a collection is enough to
//! restore the tracker after a restart.

use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use indexmap::IndexMap;
use tidepool_core::{NormalizedRecord, Value};
use tracing::warn;

/// Schema metadata key holding the column types of all flushes so far, as a
/// JSON object of column name to type name.
pub const COLUMN_TYPES_KEY: &str = "tidepool.column_types";

fn type_name(data_type: &DataType) -> Option<&'static str> {
	match data_type {
		DataType::Utf8 => Some("Utf8"),
		DataType::Float64 => Some("Float64"),
		DataType::Boolean => Some("Boolean"),
		_ => None,
	}
}

fn parse_type(name: &str) -> Option<DataType> {
	match name {
		"Utf8" => Some(DataType::Utf8),
		"Float64" => Some(DataType::Float64),
		"Boolean" => Some(DataType::Boolean),
		_ => None,
	}
}

fn cell_type(value: &Value) -> Option<DataType> {
	match value {
		Value::Null => None,
		Value::Boolean(_) => Some(DataType::Boolean),
		Value::Float64(_) => Some(DataType::Float64),
		Value::Utf8(_) => Some(DataType::Utf8),
	}
}

/// Types observed per column, in order of first appearance. `None` means the
/// column only held nulls.
fn observe(records: &[NormalizedRecord]) -> IndexMap<String, Option<DataType>> {
	let mut columns: IndexMap<String, Option<DataType>> = IndexMap::new();
	for record in records {
		for (name, value) in record.columns() {
			let seen = cell_type(value);
			let entry = columns.entry(name.to_string()).or_insert(None);
			*entry = match (entry.take(), seen) {
				(None, seen) => seen,
				(current, None) => current,
				(Some(current), Some(seen)) if current == seen => Some(current),
				(Some(_), Some(_)) => Some(DataType::Utf8),
			};
		}
	}
	columns
}

/// Column types written so far for one collection.
#[derive(Debug, Clone, Default)]
pub struct SchemaTracker {
	columns: HashMap<String, DataType>,
}

impl SchemaTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Restores a tracker from the schema of a previously written file.
	///
	/// Uses the recorded column types when present and falls back to the
	/// file's own fields.
	pub fn from_schema(schema: &Schema) -> Self {
		let mut tracker = Self::new();
		tracker.commit(schema);

		if let Some(encoded) = schema.metadata().get(COLUMN_TYPES_KEY) {
			match serde_json::from_str::<BTreeMap<String, String>>(encoded) {
				Ok(columns) => {
					for (name, encoded) in columns {
						if let Some(data_type) = parse_type(&encoded) {
							tracker.columns.entry(name).or_insert(data_type);
						}
					}
				}
				Err(err) => warn!(error = %err, "ignoring unreadable column types in file metadata"),
			}
		}
		tracker
	}

	pub fn column_type(&self, name: &str) -> Option<&DataType> {
		self.columns.get(name)
	}

	/// Arrow schema for `records`, honouring the types of earlier flushes.
	///
	/// All fields are nullable so files of the same collection stay
	/// append-compatible.
	pub fn resolve(&self, collection: &str, records: &[NormalizedRecord]) -> SchemaRef {
		let fields: Vec<Field> = observe(records)
			.into_iter()
			.map(|(name, seen)| {
				let data_type = match (self.columns.get(&name), seen) {
					(None, None) => DataType::Utf8,
					(None, Some(seen)) => seen,
					(Some(previous), None) => previous.clone(),
					(Some(previous), Some(seen)) if *previous == seen => seen,
					(Some(previous), Some(seen)) => {
						if *previous != DataType::Utf8 {
							warn!(
								collection,
								column = %name,
								previous = %previous,
								seen = %seen,
								"column type changed between batches, widening to Utf8"
							);
						}
						DataType::Utf8
					}
				};
				Field::new(name, data_type, true)
			})
			.collect();

		let mut known: BTreeMap<&str, &'static str> = BTreeMap::new();
		for (name, data_type) in &self.columns {
			if let Some(encoded) = type_name(data_type) {
				known.insert(name, encoded);
			}
		}
		for field in &fields {
			if let Some(encoded) = type_name(field.data_type()) {
				known.insert(field.name(), encoded);
			}
		}

		let mut metadata = HashMap::new();
		if let Ok(encoded) = serde_json::to_string(&known) {
			metadata.insert(COLUMN_TYPES_KEY.to_string(), encoded);
		}

		Arc::new(Schema::new(fields).with_metadata(metadata))
	}

	/// Records the types of a schema that has been durably written.
	pub fn commit(&mut self, schema: &Schema) {
		for field in schema.fields() {
			self.columns.insert(field.name().clone(), field.data_type().clone());
		}
	}
}
