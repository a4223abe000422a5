// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Flattening of change events into [`NormalizedRecord`]s.
//!
//! Every record starts with the operation type and the document identifier.
//! Top-level document fields follow in document order:
//!
//! - numbers become `Float64` so that integer and fractional values of the
//!   same field never disagree between batches
//! - booleans and strings keep their type
//! - extended JSON wrappers (`$oid`, `$date`, `$numberLong`, ...) are
//!   unwrapped to the scalar they stand for
//! - nested objects and arrays are stored as compact JSON text
//! - loose fields are always stored as text, whatever their value

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value as Json};
use tidepool_core::{ChangeEvent, ID_COLUMN, NormalizedRecord, Value};

use crate::{CdcError, CdcResult};

/// Fields known to carry values of varying type across documents.
pub const DEFAULT_LOOSE_FIELDS: &[&str] = &["BallAction", "PadNumber"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
	loose_fields: HashSet<String>,
}

impl Default for NormalizeOptions {
	fn default() -> Self {
		Self::new(DEFAULT_LOOSE_FIELDS.iter().copied())
	}
}

impl NormalizeOptions {
	pub fn new<I, S>(loose_fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			loose_fields: loose_fields.into_iter().map(Into::into).collect(),
		}
	}

	pub fn is_loose(&self, field: &str) -> bool {
		self.loose_fields.contains(field)
	}
}

/// Turns one change event into a record.
///
/// Fails with [`CdcError::MalformedEvent`] when the event carries no document
/// identifier.
pub fn normalize(event: &ChangeEvent, options: &NormalizeOptions) -> CdcResult<NormalizedRecord> {
	let id = event.document_id().ok_or_else(|| CdcError::MalformedEvent {
		token: event.resume_token.clone(),
		reason: "no document identifier".to_string(),
	})?;

	let mut record = NormalizedRecord::new(event.operation, identifier(id));

	if let Some(document) = &event.document {
		for (field, value) in document {
			if field == ID_COLUMN {
				continue;
			}

			let value = if options.is_loose(field) {
				loose_value(value)
			} else {
				column_value(value)
			};
			record.set(field.as_str(), value);
		}
	}

	Ok(record)
}

fn identifier(id: &Json) -> String {
	match column_value(id) {
		Value::Utf8(text) => text,
		other => other.to_utf8().unwrap_or_else(|| id.to_string()),
	}
}

fn column_value(value: &Json) -> Value {
	match value {
		Json::Null => Value::Null,
		Json::Bool(b) => Value::Boolean(*b),
		Json::Number(n) => n.as_f64().map_or(Value::Null, Value::Float64),
		Json::String(s) => Value::Utf8(s.clone()),
		Json::Object(map) => extended_scalar(map).unwrap_or_else(|| Value::Utf8(value.to_string())),
		Json::Array(_) => Value::Utf8(value.to_string()),
	}
}

fn loose_value(value: &Json) -> Value {
	match column_value(value) {
		Value::Null => Value::Null,
		Value::Utf8(text) => Value::Utf8(text),
		other => other.to_utf8().map_or(Value::Null, Value::Utf8),
	}
}

/// Unwraps a single-key extended JSON object such as `{"$oid": "..."}`.
fn extended_scalar(map: &Map<String, Json>) -> Option<Value> {
	if map.len() != 1 {
		return None;
	}
	let (key, inner) = map.iter().next()?;

	match (key.as_str(), inner) {
		("$oid", Json::String(hex)) => Some(Value::Utf8(hex.clone())),
		("$symbol", Json::String(text)) => Some(Value::Utf8(text.clone())),
		("$date", Json::String(text)) => Some(Value::Utf8(text.clone())),
		("$date", Json::Number(millis)) => millis.as_i64().and_then(timestamp),
		("$date", Json::Object(nested)) => match extended_scalar(nested)? {
			Value::Float64(millis) => timestamp(millis as i64),
			other => Some(other),
		},
		("$numberInt" | "$numberLong" | "$numberDouble" | "$numberDecimal", Json::String(text)) => {
			Some(text.parse::<f64>().map_or_else(|_| Value::Utf8(text.clone()), Value::Float64))
		}
		_ => None,
	}
}

fn timestamp(millis: i64) -> Option<Value> {
	DateTime::from_timestamp_millis(millis).map(|at| Value::Utf8(at.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

#[cfg(test)]
pub mod tests {
	use serde_json::json;
	use tidepool_core::{OPERATION_COLUMN, OperationType, ResumeToken};

	use super::*;

	fn event(operation: OperationType, key: Option<Json>, document: Option<Json>) -> ChangeEvent {
		ChangeEvent::new(
			operation,
			key,
			document.and_then(|document| document.as_object().cloned()),
			ResumeToken::from_u64(1),
		)
	}

	#[test]
	fn test_insert_keeps_field_order_after_reserved_columns() {
		let insert = event(
			OperationType::Insert,
			Some(json!({"_id": "a1"})),
			Some(json!({"zeta": "z", "_id": "a1", "alpha": 1})),
		);

		let record = normalize(&insert, &NormalizeOptions::default()).unwrap();
		let names: Vec<&str> = record.columns().map(|(name, _)| name).collect();
		assert_eq!(names, vec![OPERATION_COLUMN, ID_COLUMN, "zeta", "alpha"]);
		assert_eq!(record.get(OPERATION_COLUMN), Some(&Value::Utf8("insert".to_string())));
		assert_eq!(record.id(), "a1");
	}

	#[test]
	fn test_numbers_become_float() {
		let insert =
			event(OperationType::Insert, None, Some(json!({"_id": 7, "qty": 3, "price": 2.5, "ok": true, "note": null})));

		let record = normalize(&insert, &NormalizeOptions::default()).unwrap();
		assert_eq!(record.id(), "7");
		assert_eq!(record.get("qty"), Some(&Value::Float64(3.0)));
		assert_eq!(record.get("price"), Some(&Value::Float64(2.5)));
		assert_eq!(record.get("ok"), Some(&Value::Boolean(true)));
		assert_eq!(record.get("note"), Some(&Value::Null));
	}

	#[test]
	fn test_nested_values_are_stringified() {
		let insert = event(
			OperationType::Insert,
			None,
			Some(json!({"_id": "a1", "pad": {"x": 1, "y": [1, 2]}, "tags": ["a", "b"]})),
		);

		let record = normalize(&insert, &NormalizeOptions::default()).unwrap();
		assert_eq!(record.get("pad"), Some(&Value::Utf8(r#"{"x":1,"y":[1,2]}"#.to_string())));
		assert_eq!(record.get("tags"), Some(&Value::Utf8(r#"["a","b"]"#.to_string())));
	}

	#[test]
	fn test_extended_json_is_unwrapped() {
		let insert = event(
			OperationType::Insert,
			None,
			Some(json!({
				"_id": {"$oid": "64b7f0c2a1"},
				"created": {"$date": {"$numberLong": "0"}},
				"seen": {"$date": "2024-01-01T00:00:00Z"},
				"count": {"$numberLong": "42"}
			})),
		);

		let record = normalize(&insert, &NormalizeOptions::default()).unwrap();
		assert_eq!(record.id(), "64b7f0c2a1");
		assert_eq!(record.get("created"), Some(&Value::Utf8("1970-01-01T00:00:00.000Z".to_string())));
		assert_eq!(record.get("seen"), Some(&Value::Utf8("2024-01-01T00:00:00Z".to_string())));
		assert_eq!(record.get("count"), Some(&Value::Float64(42.0)));
	}

	#[test]
	fn test_loose_fields_are_text() {
		let options = NormalizeOptions::default();
		let numeric = event(OperationType::Insert, None, Some(json!({"_id": "a", "PadNumber": 4, "BallAction": null})));
		let text = event(OperationType::Insert, None, Some(json!({"_id": "b", "PadNumber": "4B"})));

		let numeric = normalize(&numeric, &options).unwrap();
		let text = normalize(&text, &options).unwrap();
		assert_eq!(numeric.get("PadNumber"), Some(&Value::Utf8("4".to_string())));
		assert_eq!(numeric.get("BallAction"), Some(&Value::Null));
		assert_eq!(text.get("PadNumber"), Some(&Value::Utf8("4B".to_string())));
	}

	#[test]
	fn test_custom_loose_fields() {
		let options = NormalizeOptions::new(["score"]);
		let insert = event(OperationType::Insert, None, Some(json!({"_id": "a", "score": 1.5, "PadNumber": 2})));

		let record = normalize(&insert, &options).unwrap();
		assert_eq!(record.get("score"), Some(&Value::Utf8("1.5".to_string())));
		assert_eq!(record.get("PadNumber"), Some(&Value::Float64(2.0)));
	}

	#[test]
	fn test_delete_has_only_reserved_columns() {
		let delete = event(OperationType::Delete, Some(json!({"_id": "a1"})), None);

		let record = normalize(&delete, &NormalizeOptions::default()).unwrap();
		assert_eq!(record.len(), 2);
		assert_eq!(record.get(OPERATION_COLUMN), Some(&Value::Utf8("delete".to_string())));
		assert_eq!(record.id(), "a1");
	}

	#[test]
	fn test_missing_identifier_is_malformed() {
		let update = event(OperationType::Update, None, Some(json!({"qty": 1})));

		let err = normalize(&update, &NormalizeOptions::default()).unwrap_err();
		assert!(matches!(err, CdcError::MalformedEvent { .. }));
	}
}
