// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.
//!
//! Only construction and the transport seam return errors. `capture` never
//! does: invalid input is dropped and delivery failures end in a retry or a
//! silent drop.

use thiserror::Error;

/// Analytics SDK errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// Host is missing or not an http(s) URL.
	#[error("invalid host: {0}")]
	InvalidHost(String),

	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The client was built outside of a Tokio runtime.
	#[error("no Tokio runtime available; build the client from within a runtime")]
	NoRuntime,

	/// HTTP request failed before a response was received.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// A custom transport failed without a response.
	#[error("transport failed: {0}")]
	Transport(String),

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
