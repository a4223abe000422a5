// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use crate::{ID_COLUMN, OPERATION_COLUMN, event::OperationType};

/// A type-stabilized cell of a normalized record.
///
/// Every number is carried as `Float64` so a column never mixes numeric
/// widths across records; anything object-like has already been rendered to
/// `Utf8` by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Boolean(bool),
	Float64(f64),
	Utf8(String),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// String form used when a column is materialized as `Utf8`.
	pub fn to_utf8(&self) -> Option<String> {
		match self {
			Value::Null => None,
			Value::Boolean(b) => Some(b.to_string()),
			Value::Float64(f) => Some(f.to_string()),
			Value::Utf8(s) => Some(s.clone()),
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Boolean(b) => write!(f, "{}", b),
			Value::Float64(n) => write!(f, "{}", n),
			Value::Utf8(s) => f.write_str(s),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Utf8(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Utf8(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float64(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Boolean(value)
	}
}

/// Flat, sink-ready form of one change event.
///
/// Columns keep insertion order: `operationType`, `_id`, then the document's
/// own fields in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
	pub operation: OperationType,
	columns: IndexMap<String, Value>,
}

impl NormalizedRecord {
	pub fn new(operation: OperationType, id: impl Into<String>) -> Self {
		let mut columns = IndexMap::new();
		columns.insert(OPERATION_COLUMN.to_string(), Value::Utf8(operation.as_str().to_string()));
		columns.insert(ID_COLUMN.to_string(), Value::Utf8(id.into()));
		Self {
			operation,
			columns,
		}
	}

	/// Sets a document column. The reserved columns cannot be overwritten.
	pub fn set(&mut self, name: impl Into<String>, value: Value) {
		let name = name.into();
		if name == OPERATION_COLUMN || name == ID_COLUMN {
			return;
		}
		self.columns.insert(name, value);
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.columns.get(name)
	}

	pub fn id(&self) -> &str {
		match self.columns.get(ID_COLUMN) {
			Some(Value::Utf8(id)) => id,
			_ => "",
		}
	}

	pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.columns.iter().map(|(name, value)| (name.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}
}
