// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration and environment loading.

use std::time::Duration;

use beacon_common_http::RetryConfig;
use thiserror::Error;

use crate::error::{AnalyticsError, Result};

/// Events queued before an immediate flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Idle time before queued events are flushed.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5000);
/// Timeout applied to each capture request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Durable storage key holding the device id.
pub const DEVICE_ID_STORAGE_KEY: &str = "_analytics_device_id";

pub const ENV_HOST: &str = "BEACON_HOST";
pub const ENV_API_KEY: &str = "BEACON_API_KEY";
pub const ENV_PROJECT_ID: &str = "BEACON_PROJECT_ID";
pub const ENV_BATCH_SIZE: &str = "BEACON_BATCH_SIZE";
pub const ENV_FLUSH_INTERVAL_MS: &str = "BEACON_FLUSH_INTERVAL_MS";
pub const ENV_AUTOCAPTURE: &str = "BEACON_AUTOCAPTURE";
pub const ENV_DEVICE_ID: &str = "BEACON_DEVICE_ID";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("missing required environment variable: {0}")]
	MissingEnvVar(String),

	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },
}

/// Configuration for the analytics client. Immutable once the client is built.
#[derive(Clone)]
pub struct ClientConfig {
	/// Ingestion host, e.g. `https://events.example.com`. No trailing slash.
	pub host: String,
	/// Sent as `X-API-Key` when present.
	pub api_key: Option<String>,
	/// Attached to every event and to batch payloads.
	pub project_id: Option<String>,
	pub batch_size: usize,
	pub flush_interval: Duration,
	pub autocapture: bool,
	/// Overrides the stored/generated device id.
	pub device_id: Option<String>,
	pub request_timeout: Duration,
	pub retry_config: RetryConfig,
	pub storage_key: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			host: String::new(),
			api_key: None,
			project_id: None,
			batch_size: DEFAULT_BATCH_SIZE,
			flush_interval: DEFAULT_FLUSH_INTERVAL,
			autocapture: true,
			device_id: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			retry_config: RetryConfig::default(),
			storage_key: DEVICE_ID_STORAGE_KEY.to_string(),
		}
	}
}

impl std::fmt::Debug for ClientConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClientConfig")
			.field("host", &self.host)
			.field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
			.field("project_id", &self.project_id)
			.field("batch_size", &self.batch_size)
			.field("flush_interval", &self.flush_interval)
			.field("autocapture", &self.autocapture)
			.field("device_id", &self.device_id)
			.field("request_timeout", &self.request_timeout)
			.field("retry_config", &self.retry_config)
			.field("storage_key", &self.storage_key)
			.finish()
	}
}

impl ClientConfig {
	/// Loads configuration from `BEACON_*` environment variables.
	///
	/// `BEACON_HOST` is required; everything else falls back to the defaults.
	pub fn from_env() -> std::result::Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub(crate) fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let host = require_env(&lookup, ENV_HOST)?;
		let batch_size = optional_env_parse(&lookup, ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE)?;
		let flush_interval_ms = optional_env_parse(
			&lookup,
			ENV_FLUSH_INTERVAL_MS,
			DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
		)?;
		let autocapture = match lookup(ENV_AUTOCAPTURE) {
			Some(raw) => parse_bool(ENV_AUTOCAPTURE, &raw)?,
			None => true,
		};

		Ok(Self {
			host,
			api_key: lookup(ENV_API_KEY).filter(|v| !v.is_empty()),
			project_id: lookup(ENV_PROJECT_ID).filter(|v| !v.is_empty()),
			batch_size,
			flush_interval: Duration::from_millis(flush_interval_ms),
			autocapture,
			device_id: lookup(ENV_DEVICE_ID).filter(|v| !v.is_empty()),
			..Self::default()
		})
	}

	/// Checks invariants and normalizes the host (trailing slashes removed).
	pub(crate) fn validated(mut self) -> Result<Self> {
		let host = self.host.trim().trim_end_matches('/').to_string();
		if host.is_empty() {
			return Err(AnalyticsError::InvalidHost("host is required".to_string()));
		}
		if !(host.starts_with("http://") || host.starts_with("https://")) {
			return Err(AnalyticsError::InvalidHost(host));
		}
		self.host = host;

		if self.batch_size == 0 {
			return Err(AnalyticsError::InvalidConfig(
				"batch_size must be at least 1".to_string(),
			));
		}
		if self.flush_interval.is_zero() {
			return Err(AnalyticsError::InvalidConfig(
				"flush_interval must be greater than zero".to_string(),
			));
		}
		if !self.retry_config.is_valid() {
			return Err(AnalyticsError::InvalidConfig(
				"retry backoff factor must be finite and positive".to_string(),
			));
		}
		if self.storage_key.is_empty() {
			return Err(AnalyticsError::InvalidConfig(
				"storage_key must not be empty".to_string(),
			));
		}
		Ok(self)
	}

	/// Full URL of the capture endpoint.
	pub fn capture_url(&self) -> String {
		format!("{}/capture", self.host)
	}
}

fn require_env<F>(lookup: &F, name: &str) -> std::result::Result<String, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name)
		.filter(|v| !v.trim().is_empty())
		.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env_parse<F, T>(lookup: &F, name: &str, default: T) -> std::result::Result<T, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	match lookup(name) {
		Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
			name: name.to_string(),
			message: e.to_string(),
		}),
		None => Ok(default),
	}
}

fn parse_bool(name: &str, raw: &str) -> std::result::Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		other => Err(ConfigError::InvalidValue {
			name: name.to_string(),
			message: format!("expected a boolean, got {other:?}"),
		}),
	}
}
