// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device identity resolution.

use beacon_analytics_core::generate_device_id;
use tracing::{debug, warn};

use crate::storage::DeviceStorage;

/// Resolves the device id used as `distinct_id`.
///
/// Precedence is the configured id, then the stored id, then a freshly
/// generated one. The winner is always written back to storage. Storage
/// failures are logged and never fail resolution.
pub fn resolve_device_id(configured: Option<&str>, storage: &dyn DeviceStorage, key: &str) -> String {
	let (device_id, source) = match configured.filter(|id| !id.is_empty()) {
		Some(id) => (id.to_string(), "configured"),
		None => match read_stored(storage, key) {
			Some(id) => (id, "stored"),
			None => (generate_device_id(), "generated"),
		},
	};

	if let Err(e) = storage.set(key, &device_id) {
		warn!(error = %e, key, "Failed to persist device id");
	}

	debug!(source, "Resolved device id");
	device_id
}

fn read_stored(storage: &dyn DeviceStorage, key: &str) -> Option<String> {
	match storage.get(key) {
		Ok(value) => value.filter(|id| !id.is_empty()),
		Err(e) => {
			warn!(error = %e, key, "Failed to read stored device id");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::{FileStorage, MemoryStorage, StorageError};
	use beacon_analytics_core::is_device_id_shaped;
	use tempfile::TempDir;

	const KEY: &str = "_analytics_device_id";

	#[derive(Debug)]
	struct BrokenStorage;

	impl DeviceStorage for BrokenStorage {
		fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
			Err(StorageError::Unavailable("disabled".to_string()))
		}

		fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
			Err(StorageError::Unavailable("disabled".to_string()))
		}
	}

	#[test]
	fn configured_id_wins_and_is_persisted() {
		let storage = MemoryStorage::new();
		storage.set(KEY, "stored-id").unwrap();

		let id = resolve_device_id(Some("custom-id"), &storage, KEY);
		assert_eq!(id, "custom-id");
		assert_eq!(storage.get(KEY).unwrap().as_deref(), Some("custom-id"));
	}

	#[test]
	fn stored_id_is_reused() {
		let storage = MemoryStorage::new();
		storage.set(KEY, "stored-id").unwrap();

		assert_eq!(resolve_device_id(None, &storage, KEY), "stored-id");
	}

	#[test]
	fn generated_id_is_stable_across_resolutions() {
		let storage = MemoryStorage::new();
		let first = resolve_device_id(None, &storage, KEY);
		assert!(is_device_id_shaped(&first));

		let second = resolve_device_id(None, &storage, KEY);
		assert_eq!(first, second);
	}

	#[test]
	fn generated_id_survives_reopening_file_storage() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("storage.json");

		let first = resolve_device_id(None, &FileStorage::new(&path), KEY);
		let second = resolve_device_id(None, &FileStorage::new(&path), KEY);
		assert!(is_device_id_shaped(&first));
		assert_eq!(first, second);
	}

	#[test]
	fn corrupt_file_storage_is_repaired_on_first_resolution() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("storage.json");
		std::fs::write(&path, "{not json").unwrap();

		let first = resolve_device_id(None, &FileStorage::new(&path), KEY);
		let second = resolve_device_id(None, &FileStorage::new(&path), KEY);
		assert_eq!(first, second);
		assert_eq!(
			FileStorage::new(&path).get(KEY).unwrap().as_deref(),
			Some(first.as_str())
		);
	}

	#[test]
	fn empty_configured_id_is_ignored() {
		let storage = MemoryStorage::new();
		storage.set(KEY, "stored-id").unwrap();
		assert_eq!(resolve_device_id(Some(""), &storage, KEY), "stored-id");
	}

	#[test]
	fn storage_failures_fall_back_to_generation() {
		let id = resolve_device_id(None, &BrokenStorage, KEY);
		assert!(is_device_id_shaped(&id));

		assert_eq!(resolve_device_id(Some("custom"), &BrokenStorage, KEY), "custom");
	}
}
