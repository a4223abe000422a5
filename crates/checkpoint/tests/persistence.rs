// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Checkpoints written through one store instance are visible after reopening the file.

use tidepool_checkpoint::{CheckpointBackend, CheckpointStore, SqliteConfig};
use tidepool_core::ResumeToken;
use tidepool_testing::tempdir::temp_dir;

#[test]
fn test_checkpoint_survives_reopen() {
	temp_dir(|dir| {
		let path = dir.join("state").join("checkpoints.db");
		{
			let store = CheckpointBackend::sqlite(SqliteConfig::new(&path)).unwrap();
			store.persist("Orders", &ResumeToken::from_u64(3)).unwrap();
			store.persist("Pads", &ResumeToken::from_u64(9)).unwrap();
		}

		let reopened = CheckpointBackend::sqlite(SqliteConfig::new(&path)).unwrap();
		assert_eq!(reopened.fetch("Orders").unwrap(), Some(ResumeToken::from_u64(3)));
		assert_eq!(reopened.fetch("Pads").unwrap(), Some(ResumeToken::from_u64(9)));
		assert_eq!(reopened.fetch("Wells").unwrap(), None);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_directory_path_gets_default_file_name() {
	temp_dir(|dir| {
		let store = CheckpointBackend::sqlite(SqliteConfig::new(dir.join("checkpoints"))).unwrap();
		store.persist("Orders", &ResumeToken::from_u64(1)).unwrap();
		assert!(dir.join("checkpoints").join("checkpoint.db").exists());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_sequence_of_persists_is_monotonic_for_each_collection() {
	let store = CheckpointBackend::memory();
	let mut last = None;
	for position in [1u64, 4, 9, 12] {
		let token = ResumeToken::from_u64(position);
		store.persist("Orders", &token).unwrap();
		let stored = store.fetch("Orders").unwrap();
		assert!(stored >= last);
		last = stored;
	}
	assert_eq!(last, Some(ResumeToken::from_u64(12)));
}
