// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable key-value storage for device identity.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
	#[error("storage I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("storage file is corrupt: {0}")]
	Corrupt(#[from] serde_json::Error),

	#[error("storage unavailable: {0}")]
	Unavailable(String),
}

/// A string key-value store that survives process restarts.
///
/// Implementations must be callable from synchronous code; the client reads
/// and writes the device id while it is being built.
pub trait DeviceStorage: Send + Sync + std::fmt::Debug {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// JSON file store. Writes go to a temp file that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
	path: PathBuf,
}

impl FileStorage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
		if !self.path.exists() {
			return Ok(HashMap::new());
		}
		let contents = fs::read_to_string(&self.path)?;
		if contents.trim().is_empty() {
			return Ok(HashMap::new());
		}
		Ok(serde_json::from_str(&contents)?)
	}

	fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}

		let contents = serde_json::to_string_pretty(map)?;
		let temp_path = self.path.with_extension("tmp");
		let mut file = fs::File::create(&temp_path)?;
		file.write_all(contents.as_bytes())?;
		file.sync_all()?;
		drop(file);

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = fs::Permissions::from_mode(0o600);
			if let Err(e) = fs::set_permissions(&temp_path, perms) {
				warn!(path = ?temp_path, error = %e, "Failed to set storage file permissions to 0600");
			}
		}

		fs::rename(&temp_path, &self.path)?;
		debug!(path = ?self.path, "Device storage written");
		Ok(())
	}
}

impl DeviceStorage for FileStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.read_map()?.remove(key))
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut map = match self.read_map() {
			Ok(map) => map,
			Err(StorageError::Corrupt(e)) => {
				warn!(path = ?self.path, error = %e, "Overwriting corrupt device storage");
				HashMap::new()
			}
			Err(e) => return Err(e),
		};
		if map.get(key).map(String::as_str) == Some(value) {
			return Ok(());
		}
		map.insert(key.to_string(), value.to_string());
		self.write_map(&map)
	}
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

impl DeviceStorage for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		let values = self
			.values
			.read()
			.map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
		Ok(values.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut values = self
			.values
			.write()
			.map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
		values.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// Default location of the storage file: `<data_local_dir>/beacon/storage.json`.
pub fn default_storage_path() -> Option<PathBuf> {
	dirs::data_local_dir().map(|dir| dir.join("beacon").join("storage.json"))
}

/// File storage at the default location, or memory storage when the platform
/// has no data directory.
pub fn default_storage() -> Arc<dyn DeviceStorage> {
	match default_storage_path() {
		Some(path) => Arc::new(FileStorage::new(path)),
		None => {
			warn!("No local data directory; device id will not persist across restarts");
			Arc::new(MemoryStorage::new())
		}
	}
}
