// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::{self, File},
	io::{BufRead, BufReader, Seek, SeekFrom},
	path::{Path, PathBuf},
	thread,
	time::Duration,
};

use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tidepool_core::{ChangeEvent, OperationType, ResumeToken};
use tracing::{debug, warn};

use super::{ChangeSource, ChangeStream};
use crate::{CdcError, CdcResult};

pub const FEED_EXTENSION: &str = "jsonl";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Change feed backed by append-only files.
///
/// Every `{collection}.jsonl` file in the directory is one collection; each
/// line is a change event in the change stream's document shape:
///
/// ```json
/// {"operationType": "insert", "documentKey": {"_id": "a1"}, "fullDocument": {"_id": "a1", "qty": 2}}
/// ```
///
/// The resume token of a line is the byte offset right after it. Unparseable
/// lines are skipped.
#[derive(Debug, Clone)]
pub struct FileSource {
	dir: PathBuf,
	poll_interval: Duration,
	follow: bool,
}

impl FileSource {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			poll_interval: DEFAULT_POLL_INTERVAL,
			follow: true,
		}
	}

	/// How long a following stream sleeps when it reached the end of a file.
	pub fn poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	/// Whether streams wait for more lines at end of file. When disabled the
	/// end of the file closes the stream.
	pub fn follow(mut self, follow: bool) -> Self {
		self.follow = follow;
		self
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn feed_path(&self, collection: &str) -> PathBuf {
		self.dir.join(format!("{}.{}", collection, FEED_EXTENSION))
	}
}

impl ChangeSource for FileSource {
	fn collections(&self) -> CdcResult<Vec<String>> {
		let entries = fs::read_dir(&self.dir)
			.map_err(|err| CdcError::Discovery(format!("{}: {}", self.dir.display(), err)))?;

		let mut collections = Vec::new();
		for entry in entries {
			let path = entry.map_err(|err| CdcError::Discovery(err.to_string()))?.path();
			if path.extension().is_some_and(|ext| ext == FEED_EXTENSION) {
				if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
					collections.push(stem.to_string());
				}
			}
		}
		collections.sort();
		Ok(collections)
	}

	fn subscribe(&self, collection: &str, resume_after: Option<&ResumeToken>) -> CdcResult<Box<dyn ChangeStream>> {
		let subscribe_error = |reason: String| CdcError::Subscribe {
			collection: collection.to_string(),
			reason,
		};

		let path = self.feed_path(collection);
		let file = File::open(&path).map_err(|err| subscribe_error(format!("{}: {}", path.display(), err)))?;
		let len = file.metadata().map_err(|err| subscribe_error(err.to_string()))?.len();

		let offset = match resume_after {
			None => len,
			Some(token) => token
				.as_u64()
				.filter(|offset| *offset <= len)
				.ok_or_else(|| subscribe_error(format!("resume token {:?} is past the end of the feed", token)))?,
		};

		let mut reader = BufReader::new(file);
		reader.seek(SeekFrom::Start(offset)).map_err(|err| subscribe_error(err.to_string()))?;
		debug!(collection, offset, "opened file feed");

		Ok(Box::new(FileStream {
			collection: collection.to_string(),
			reader,
			offset,
			line: Vec::new(),
			poll_interval: self.poll_interval,
			follow: self.follow,
		}))
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedLine {
	operation_type: OperationType,
	document_key: Option<Json>,
	full_document: Option<Map<String, Json>>,
}

struct FileStream {
	collection: String,
	reader: BufReader<File>,
	offset: u64,
	line: Vec<u8>,
	poll_interval: Duration,
	follow: bool,
}

impl FileStream {
	fn stream_error(&self, err: std::io::Error) -> CdcError {
		CdcError::Stream {
			collection: self.collection.clone(),
			reason: err.to_string(),
		}
	}
}

impl ChangeStream for FileStream {
	fn next_event(&mut self) -> CdcResult<Option<ChangeEvent>> {
		loop {
			self.line.clear();
			let read = self.reader.read_until(b'\n', &mut self.line).map_err(|err| self.stream_error(err))?;

			// a line still being written is only consumed once complete
			let partial = read > 0 && self.line.last() != Some(&b'\n');
			if read == 0 || (partial && self.follow) {
				if partial {
					self.reader.seek(SeekFrom::Start(self.offset)).map_err(|err| self.stream_error(err))?;
				}
				if !self.follow {
					return Ok(None);
				}
				thread::sleep(self.poll_interval);
				continue;
			}

			self.offset += read as u64;
			if self.line.iter().all(u8::is_ascii_whitespace) {
				continue;
			}

			match serde_json::from_slice::<FeedLine>(&self.line) {
				Ok(line) => {
					return Ok(Some(ChangeEvent::new(
						line.operation_type,
						line.document_key,
						line.full_document,
						ResumeToken::from_u64(self.offset),
					)));
				}
				Err(err) => {
					warn!(collection = %self.collection, offset = self.offset, error = %err, "skipping unparseable feed line");
				}
			}
		}
	}
}

#[cfg(test)]
pub mod tests {
	use std::io::Write;

	use serde_json::json;
	use tidepool_testing::tempdir::temp_dir;

	use super::*;

	fn append(dir: &Path, collection: &str, line: &str) {
		let mut file =
			fs::OpenOptions::new().create(true).append(true).open(dir.join(format!("{}.jsonl", collection))).unwrap();
		file.write_all(line.as_bytes()).unwrap();
	}

	#[test]
	fn test_collections_from_feed_files() {
		temp_dir(|dir| {
			append(dir, "Orders", "");
			append(dir, "Pads", "");
			fs::write(dir.join("notes.txt"), "ignored")?;

			let source = FileSource::new(dir);
			assert_eq!(source.collections().unwrap(), vec!["Orders", "Pads"]);
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_replay_from_start_and_tokens_are_offsets() {
		temp_dir(|dir| {
			let first = r#"{"operationType":"insert","documentKey":{"_id":"a1"},"fullDocument":{"_id":"a1","qty":1}}"#;
			let second = r#"{"operationType":"delete","documentKey":{"_id":"a1"}}"#;
			append(dir, "Orders", &format!("{}\n{}\n", first, second));

			let source = FileSource::new(dir).follow(false);
			let mut stream = source.subscribe("Orders", Some(&ResumeToken::from_u64(0))).unwrap();

			let insert = stream.next_event().unwrap().unwrap();
			assert_eq!(insert.operation, OperationType::Insert);
			assert_eq!(insert.resume_token.as_u64(), Some(first.len() as u64 + 1));
			assert_eq!(insert.document.as_ref().unwrap().get("qty"), Some(&json!(1)));

			let delete = stream.next_event().unwrap().unwrap();
			assert_eq!(delete.operation, OperationType::Delete);
			assert!(delete.document.is_none());
			assert!(stream.next_event().unwrap().is_none());

			let mut resumed = source.subscribe("Orders", Some(&insert.resume_token)).unwrap();
			assert_eq!(resumed.next_event().unwrap().unwrap().resume_token, delete.resume_token);
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_unparseable_lines_are_skipped() {
		temp_dir(|dir| {
			append(dir, "Orders", "{not json\n\n");
			append(dir, "Orders", "{\"operationType\":\"insert\",\"documentKey\":{\"_id\":\"a2\"}}\n");

			let source = FileSource::new(dir).follow(false);
			let mut stream = source.subscribe("Orders", Some(&ResumeToken::from_u64(0))).unwrap();
			let event = stream.next_event().unwrap().unwrap();
			assert_eq!(event.document_id(), Some(&json!("a2")));
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_invalid_utf8_lines_are_skipped() {
		temp_dir(|dir| {
			let path = dir.join("Orders.jsonl");
			let mut feed = b"\xff\xfe garbage\n".to_vec();
			feed.extend_from_slice(b"{\"operationType\":\"insert\",\"documentKey\":{\"_id\":\"a4\"}}\n");
			fs::write(&path, &feed)?;

			let source = FileSource::new(dir).follow(false);
			let mut stream = source.subscribe("Orders", Some(&ResumeToken::from_u64(0))).unwrap();
			let event = stream.next_event().unwrap().unwrap();
			assert_eq!(event.document_id(), Some(&json!("a4")));
			assert_eq!(event.resume_token.as_u64(), Some(feed.len() as u64));
			assert!(stream.next_event().unwrap().is_none());

			// resubscribing from the start skips the same line again
			let mut again = source.subscribe("Orders", Some(&ResumeToken::from_u64(0))).unwrap();
			assert_eq!(again.next_event().unwrap().unwrap().document_id(), Some(&json!("a4")));
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_follow_waits_for_complete_lines() {
		temp_dir(|dir| {
			append(dir, "Orders", "");

			let source = FileSource::new(dir).poll_interval(Duration::from_millis(5));
			let mut stream = source.subscribe("Orders", None).unwrap();

			let writer_dir = dir.to_path_buf();
			let handle = thread::spawn(move || {
				append(&writer_dir, "Orders", r#"{"operationType":"insert","#);
				thread::sleep(Duration::from_millis(30));
				append(&writer_dir, "Orders", "\"documentKey\":{\"_id\":\"a3\"}}\n");
			});

			let event = stream.next_event().unwrap().unwrap();
			assert_eq!(event.document_id(), Some(&json!("a3")));
			handle.join().unwrap();
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_token_past_end_is_rejected() {
		temp_dir(|dir| {
			append(dir, "Orders", "");

			let source = FileSource::new(dir);
			let result = source.subscribe("Orders", Some(&ResumeToken::from_u64(10)));
			assert!(matches!(result, Err(CdcError::Subscribe { .. })));
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_missing_feed_fails_subscription() {
		temp_dir(|dir| {
			let result = FileSource::new(dir).subscribe("Nope", None);
			assert!(matches!(result, Err(CdcError::Subscribe { .. })));
			Ok(())
		})
		.unwrap();
	}
}
