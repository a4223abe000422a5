// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, path::Path as FsPath, sync::Arc};

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{
	ObjectStore, PutMode, PutPayload, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path,
};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::instrument;

use crate::{SinkError, SinkResult};

/// File name standing in for a `dir/` marker key on stores that cannot hold
/// an object whose key ends with the delimiter.
const DIRECTORY_MARKER: &str = ".keep";

/// Object storage with put/list semantics.
///
/// Keys are `/`-delimited. A key ending with `/` denotes an empty directory
/// marker. How a marker is stored depends on the backend: [`MemorySink`]
/// keeps the key as given, [`ObjectStoreSink`] writes `{prefix}.keep`
/// because `object_store` paths cannot end with the delimiter. Either way
/// the marker shows up when listing the prefix.
pub trait ObjectSink: Send + Sync {
	/// Keys of all objects whose key starts with `prefix`.
	fn list(&self, prefix: &str) -> SinkResult<Vec<String>>;

	/// Whether at least one object key starts with `prefix`.
	fn contains_prefix(&self, prefix: &str) -> SinkResult<bool> {
		Ok(!self.list(prefix)?.is_empty())
	}

	fn fetch(&self, key: &str) -> SinkResult<Option<Bytes>>;

	/// Writes `key`, replacing any previous object.
	fn put(&self, key: &str, body: Bytes) -> SinkResult<()>;

	/// Writes `key` unless it exists, in which case
	/// [`SinkError::AlreadyExists`] is returned and the stored object is left
	/// alone.
	fn create(&self, key: &str, body: Bytes) -> SinkResult<()>;
}

/// In-process object sink keeping every object in a sorted map.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
	objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<Bytes> {
		self.objects.read().get(key).cloned()
	}

	pub fn keys(&self) -> Vec<String> {
		self.objects.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.objects.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.read().is_empty()
	}
}

impl ObjectSink for MemorySink {
	fn list(&self, prefix: &str) -> SinkResult<Vec<String>> {
		Ok(self.objects.read().keys().filter(|key| key.starts_with(prefix)).cloned().collect())
	}

	fn fetch(&self, key: &str) -> SinkResult<Option<Bytes>> {
		Ok(self.get(key))
	}

	fn put(&self, key: &str, body: Bytes) -> SinkResult<()> {
		self.objects.write().insert(key.to_string(), body);
		Ok(())
	}

	fn create(&self, key: &str, body: Bytes) -> SinkResult<()> {
		let mut objects = self.objects.write();
		if objects.contains_key(key) {
			return Err(SinkError::AlreadyExists {
				key: key.to_string(),
			});
		}
		objects.insert(key.to_string(), body);
		Ok(())
	}
}

/// [`ObjectSink`] over any `object_store` backend.
///
/// Calls block the current thread on the given runtime handle, so this must
/// not be used from inside an async task.
#[derive(Clone)]
pub struct ObjectStoreSink {
	store: Arc<dyn ObjectStore>,
	runtime: Handle,
}

impl ObjectStoreSink {
	pub fn new(store: Arc<dyn ObjectStore>, runtime: Handle) -> Self {
		Self {
			store,
			runtime,
		}
	}

	/// S3 bucket; credentials and region come from the standard `AWS_*`
	/// environment variables.
	#[instrument(name = "sink::s3::new", level = "info", skip(runtime))]
	pub fn s3(bucket: &str, runtime: Handle) -> SinkResult<Self> {
		let store = AmazonS3Builder::from_env().with_bucket_name(bucket).build()?;
		Ok(Self::new(Arc::new(store), runtime))
	}

	/// Directory on the local filesystem, created if missing.
	#[instrument(name = "sink::local::new", level = "info", skip(runtime))]
	pub fn local(root: &FsPath, runtime: Handle) -> SinkResult<Self> {
		std::fs::create_dir_all(root).map_err(|source| SinkError::Io {
			path: root.display().to_string(),
			source,
		})?;
		let store = LocalFileSystem::new_with_prefix(root)?;
		Ok(Self::new(Arc::new(store), runtime))
	}

	pub fn memory(runtime: Handle) -> Self {
		Self::new(Arc::new(InMemory::new()), runtime)
	}

	fn location(key: &str) -> Path {
		if key.ends_with('/') {
			Path::from(format!("{}{}", key, DIRECTORY_MARKER))
		} else {
			Path::from(key)
		}
	}
}

impl ObjectSink for ObjectStoreSink {
	fn list(&self, prefix: &str) -> SinkResult<Vec<String>> {
		let prefix = Path::from(prefix);
		let objects: Vec<_> = self.runtime.block_on(self.store.list(Some(&prefix)).try_collect())?;
		Ok(objects.into_iter().map(|meta| meta.location.to_string()).collect())
	}

	fn contains_prefix(&self, prefix: &str) -> SinkResult<bool> {
		let prefix = Path::from(prefix);
		let first = self.runtime.block_on(async { self.store.list(Some(&prefix)).try_next().await })?;
		Ok(first.is_some())
	}

	fn fetch(&self, key: &str) -> SinkResult<Option<Bytes>> {
		let location = Self::location(key);
		self.runtime.block_on(async {
			match self.store.get(&location).await {
				Ok(result) => result.bytes().await.map(Some).map_err(SinkError::from),
				Err(object_store::Error::NotFound {
					..
				}) => Ok(None),
				Err(err) => Err(SinkError::from(err)),
			}
		})
	}

	fn put(&self, key: &str, body: Bytes) -> SinkResult<()> {
		let location = Self::location(key);
		self.runtime.block_on(self.store.put(&location, PutPayload::from(body)))?;
		Ok(())
	}

	fn create(&self, key: &str, body: Bytes) -> SinkResult<()> {
		let location = Self::location(key);
		let payload = PutPayload::from(body);
		let already_exists = || SinkError::AlreadyExists {
			key: key.to_string(),
		};

		match self.runtime.block_on(self.store.put_opts(&location, payload.clone(), PutMode::Create.into())) {
			Ok(_) => Ok(()),
			Err(object_store::Error::AlreadyExists {
				..
			}) => Err(already_exists()),
			// backends without conditional writes
			Err(object_store::Error::NotImplemented) => match self.runtime.block_on(self.store.head(&location)) {
				Ok(_) => Err(already_exists()),
				Err(object_store::Error::NotFound {
					..
				}) => {
					self.runtime.block_on(self.store.put(&location, payload))?;
					Ok(())
				}
				Err(err) => Err(err.into()),
			},
			Err(err) => Err(err.into()),
		}
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_memory_sink_lists_by_prefix() {
		let sink = MemorySink::new();
		sink.put("Orders/", Bytes::new()).unwrap();
		sink.put("Orders/Orders_20250101000000.parquet", Bytes::from_static(b"x")).unwrap();
		sink.put("OrdersArchive/", Bytes::new()).unwrap();

		assert_eq!(sink.list("Orders/").unwrap().len(), 2);
		assert_eq!(sink.list("Pads/").unwrap().len(), 0);
		assert_eq!(sink.len(), 3);
	}

	#[test]
	fn test_memory_sink_create_never_replaces() {
		let sink = MemorySink::new();
		sink.create("Orders/a.parquet", Bytes::from_static(b"first")).unwrap();

		let result = sink.create("Orders/a.parquet", Bytes::from_static(b"second"));
		assert!(matches!(result, Err(SinkError::AlreadyExists { .. })));
		assert_eq!(sink.fetch("Orders/a.parquet").unwrap(), Some(Bytes::from_static(b"first")));
		assert!(sink.contains_prefix("Orders/").unwrap());
		assert!(!sink.contains_prefix("Pads/").unwrap());
	}

	#[test]
	fn test_marker_keys_map_to_placeholder_object() {
		assert_eq!(ObjectStoreSink::location("Orders/").as_ref(), "Orders/.keep");
		assert_eq!(ObjectStoreSink::location("Orders/a.parquet").as_ref(), "Orders/a.parquet");
	}
}
