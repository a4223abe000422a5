// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Kind of write a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
	Insert,
	Update,
	Delete,
	Replace,
}

impl OperationType {
	pub fn as_str(&self) -> &'static str {
		match self {
			OperationType::Insert => "insert",
			OperationType::Update => "update",
			OperationType::Delete => "delete",
			OperationType::Replace => "replace",
		}
	}
}

impl Display for OperationType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OperationType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"insert" => Ok(OperationType::Insert),
			"update" => Ok(OperationType::Update),
			"delete" => Ok(OperationType::Delete),
			"replace" => Ok(OperationType::Replace),
			other => Err(format!("unknown operation type: {}", other)),
		}
	}
}

/// Opaque stream position.
///
/// The bytes are defined by the change source and handed back verbatim on
/// resubscribe. Sources that count positions encode them as big-endian `u64`
/// so that bytewise order matches stream order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResumeToken(pub Vec<u8>);

impl ResumeToken {
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	pub fn from_u64(position: u64) -> Self {
		Self(position.to_be_bytes().to_vec())
	}

	/// Decodes a token produced by [`ResumeToken::from_u64`].
	pub fn as_u64(&self) -> Option<u64> {
		let bytes: [u8; 8] = self.0.as_slice().try_into().ok()?;
		Some(u64::from_be_bytes(bytes))
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Debug for ResumeToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.as_u64() {
			Some(position) => write!(f, "ResumeToken({})", position),
			None => write!(f, "ResumeToken(0x{})", hex(&self.0)),
		}
	}
}

impl Display for ResumeToken {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&hex(&self.0))
	}
}

fn hex(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A single write on a source collection, as delivered by its change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
	pub operation: OperationType,
	/// Key of the changed document; present on every operation, including deletes.
	pub document_key: Option<Json>,
	/// Full document after the change; absent for deletes.
	pub document: Option<Map<String, Json>>,
	pub resume_token: ResumeToken,
}

impl ChangeEvent {
	pub fn new(
		operation: OperationType,
		document_key: Option<Json>,
		document: Option<Map<String, Json>>,
		resume_token: ResumeToken,
	) -> Self {
		Self {
			operation,
			document_key,
			document,
			resume_token,
		}
	}

	/// Identifier of the changed document.
	///
	/// Taken from the full document's `_id`, falling back to the document key
	/// (its `_id` field when it is an object). `None` when neither carries a
	/// non-null identifier.
	pub fn document_id(&self) -> Option<&Json> {
		let from_document = self.document.as_ref().and_then(|doc| doc.get(crate::ID_COLUMN));
		let from_key = || match self.document_key.as_ref()? {
			Json::Object(key) => key.get(crate::ID_COLUMN),
			other => Some(other),
		};

		from_document.filter(|id| !id.is_null()).or_else(|| from_key().filter(|id| !id.is_null()))
	}
}
