// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event records as captured by the SDK and sent to the capture endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Maximum event name length accepted by the capture endpoint.
pub const MAX_EVENT_NAME_LENGTH: usize = 4096;

/// A single captured event.
///
/// Records are immutable once queued. Field names match the capture
/// endpoint's JSON schema, including the `$`-prefixed library metadata.
///
/// # Example
///
/// ```
/// use beacon_analytics_core::EventRecord;
///
/// let record = EventRecord::new("signup_click", "device-123", serde_json::json!({"plan": "pro"}))
///     .with_lib("beacon-analytics", "0.1.0")
///     .with_project_id(Some("default".to_string()));
///
/// assert_eq!(record.properties["plan"], "pro");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
	pub event: String,
	pub distinct_id: String,
	#[serde(with = "iso_millis")]
	pub timestamp: DateTime<Utc>,
	pub properties: Map<String, Value>,
	pub uuid: Uuid,
	#[serde(rename = "$lib")]
	pub lib: String,
	#[serde(rename = "$lib_version")]
	pub lib_version: String,
	#[serde(rename = "$device_id")]
	pub device_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project_id: Option<String>,
}

impl EventRecord {
	/// Creates a record stamped with the current time and a fresh v4 UUID.
	///
	/// `properties` that are not a JSON object are replaced by an empty map.
	/// The device id defaults to `distinct_id`.
	pub fn new(event: impl Into<String>, distinct_id: impl Into<String>, properties: Value) -> Self {
		let distinct_id = distinct_id.into();
		Self {
			event: event.into(),
			device_id: distinct_id.clone(),
			distinct_id,
			timestamp: Utc::now(),
			properties: normalize_properties(properties),
			uuid: Uuid::new_v4(),
			lib: String::new(),
			lib_version: String::new(),
			project_id: None,
		}
	}

	/// Sets the SDK library name and version.
	pub fn with_lib(mut self, lib: impl Into<String>, version: impl Into<String>) -> Self {
		self.lib = lib.into();
		self.lib_version = version.into();
		self
	}

	/// Sets the `$device_id` metadata when it differs from `distinct_id`.
	pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
		self.device_id = device_id.into();
		self
	}

	/// Overrides the capture timestamp.
	pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}

	/// Attaches the project id, if any.
	pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
		self.project_id = project_id;
		self
	}
}

/// Returns the properties as a map, or an empty map for non-object values.
pub fn normalize_properties(properties: Value) -> Map<String, Value> {
	match properties {
		Value::Object(map) => map,
		_ => Map::new(),
	}
}

/// Validates an event name.
///
/// Valid names are non-empty and at most [`MAX_EVENT_NAME_LENGTH`] bytes.
pub fn validate_event_name(name: &str) -> bool {
	!name.is_empty() && name.len() <= MAX_EVENT_NAME_LENGTH
}

/// Formats a timestamp as `2024-01-02T03:04:05.678Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
	timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

mod iso_millis {
	use chrono::{DateTime, Utc};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&super::format_timestamp(ts))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
		let raw = String::deserialize(deserializer)?;
		DateTime::parse_from_rfc3339(&raw)
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(serde::de::Error::custom)
	}
}

/// Well-known system event names that start with `$`.
pub mod special_events {
	/// A page (or screen) view.
	pub const PAGEVIEW: &str = "$pageview";
	/// A click captured by autocapture.
	pub const AUTOCAPTURE_CLICK: &str = "$autocapture_click";
}

/// Property keys set by autocapture.
pub mod special_properties {
	pub const TAG: &str = "$tag";
	pub const TEXT: &str = "$text";
	pub const HREF: &str = "$href";
	pub const PATH: &str = "$path";
	pub const URL: &str = "$url";
	pub const TITLE: &str = "$title";
}
