// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::{Map, Value as Json, json};
use tidepool_core::{ChangeEvent, OperationType, ResumeToken};

use super::{ChangeSource, ChangeStream};
use crate::{CdcError, CdcResult};

/// In-process change source.
///
/// Keeps the full change history of every collection, so a subscription can
/// resume after any token it has handed out. Tokens are 1-based positions in
/// that history.
#[derive(Clone, Default)]
pub struct MemorySource {
	feeds: Arc<RwLock<BTreeMap<String, Arc<Feed>>>>,
}

#[derive(Default)]
struct Feed {
	state: Mutex<FeedState>,
	signal: Condvar,
}

#[derive(Default)]
struct FeedState {
	events: Vec<ChangeEvent>,
	closed: bool,
	fault: Option<String>,
	subscribe_fault: Option<String>,
	subscriptions: usize,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_collections<I, S>(collections: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let source = Self::new();
		for collection in collections {
			source.create_collection(collection.as_ref());
		}
		source
	}

	pub fn create_collection(&self, collection: &str) {
		self.feed(collection);
	}

	fn feed(&self, collection: &str) -> Arc<Feed> {
		if let Some(feed) = self.feeds.read().get(collection) {
			return Arc::clone(feed);
		}
		Arc::clone(self.feeds.write().entry(collection.to_string()).or_default())
	}

	/// Appends an insert of `document`, keyed by its `_id`.
	pub fn insert(&self, collection: &str, document: Json) -> ResumeToken {
		let key = document.get("_id").map(|id| json!({ "_id": id }));
		self.push(collection, OperationType::Insert, key, document.as_object().cloned())
	}

	pub fn update(&self, collection: &str, document: Json) -> ResumeToken {
		let key = document.get("_id").map(|id| json!({ "_id": id }));
		self.push(collection, OperationType::Update, key, document.as_object().cloned())
	}

	pub fn delete(&self, collection: &str, id: Json) -> ResumeToken {
		self.push(collection, OperationType::Delete, Some(json!({ "_id": id })), None)
	}

	pub fn push(
		&self,
		collection: &str,
		operation: OperationType,
		document_key: Option<Json>,
		document: Option<Map<String, Json>>,
	) -> ResumeToken {
		let feed = self.feed(collection);
		let mut state = feed.state.lock();
		let token = ResumeToken::from_u64(state.events.len() as u64 + 1);
		state.events.push(ChangeEvent::new(operation, document_key, document, token.clone()));
		feed.signal.notify_all();
		token
	}

	/// Ends every stream of `collection` once it has drained the history.
	pub fn close(&self, collection: &str) {
		let feed = self.feed(collection);
		feed.state.lock().closed = true;
		feed.signal.notify_all();
	}

	/// Makes the next read on a stream of `collection` fail.
	pub fn inject_fault(&self, collection: &str, reason: impl Into<String>) {
		let feed = self.feed(collection);
		feed.state.lock().fault = Some(reason.into());
		feed.signal.notify_all();
	}

	/// Makes the next subscription to `collection` fail.
	pub fn fail_next_subscribe(&self, collection: &str, reason: impl Into<String>) {
		self.feed(collection).state.lock().subscribe_fault = Some(reason.into());
	}

	/// Number of successful subscriptions to `collection`.
	pub fn subscriptions(&self, collection: &str) -> usize {
		self.feed(collection).state.lock().subscriptions
	}

	/// Number of events ever published to `collection`.
	pub fn len(&self, collection: &str) -> usize {
		self.feed(collection).state.lock().events.len()
	}
}

impl ChangeSource for MemorySource {
	fn collections(&self) -> CdcResult<Vec<String>> {
		Ok(self.feeds.read().keys().cloned().collect())
	}

	fn subscribe(&self, collection: &str, resume_after: Option<&ResumeToken>) -> CdcResult<Box<dyn ChangeStream>> {
		let feed = self.feed(collection);
		let mut state = feed.state.lock();

		if let Some(reason) = state.subscribe_fault.take() {
			return Err(CdcError::Subscribe {
				collection: collection.to_string(),
				reason,
			});
		}

		let position = match resume_after {
			None => state.events.len(),
			Some(token) => token
				.as_u64()
				.map(|position| position as usize)
				.filter(|position| *position <= state.events.len())
				.ok_or_else(|| CdcError::Subscribe {
					collection: collection.to_string(),
					reason: format!("resume token {:?} is not in the change history", token),
				})?,
		};

		state.subscriptions += 1;
		drop(state);

		Ok(Box::new(MemoryStream {
			collection: collection.to_string(),
			feed,
			position,
		}))
	}
}

struct MemoryStream {
	collection: String,
	feed: Arc<Feed>,
	position: usize,
}

impl ChangeStream for MemoryStream {
	fn next_event(&mut self) -> CdcResult<Option<ChangeEvent>> {
		let mut state = self.feed.state.lock();
		loop {
			if let Some(reason) = state.fault.take() {
				return Err(CdcError::Stream {
					collection: self.collection.clone(),
					reason,
				});
			}
			if let Some(event) = state.events.get(self.position) {
				self.position += 1;
				return Ok(Some(event.clone()));
			}
			if state.closed {
				return Ok(None);
			}
			self.feed.signal.wait(&mut state);
		}
	}
}
