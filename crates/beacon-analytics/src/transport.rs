// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport seam between the delivery engine and the capture endpoint.

use std::time::Duration;

use beacon_analytics_core::CapturePayload;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::error::Result;

/// Header carrying the project API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Sends one capture payload and reports the HTTP status.
///
/// An `Err` means no response was received (connect failure, timeout). The
/// delivery engine treats errors and non-success statuses the same way.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, payload: &CapturePayload) -> Result<u16>;
}

/// Default transport: `POST {host}/capture` over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
	client: Client,
	url: String,
	api_key: Option<String>,
}

impl HttpTransport {
	/// Creates a transport posting to `url`, sending `api_key` when present.
	pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
		let client = beacon_common_http::builder().timeout(timeout).build()?;
		Ok(Self::with_client(client, url, api_key))
	}

	/// Creates a transport around an existing reqwest client.
	pub fn with_client(client: Client, url: impl Into<String>, api_key: Option<String>) -> Self {
		Self {
			client,
			url: url.into(),
			api_key,
		}
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

impl std::fmt::Debug for HttpTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpTransport")
			.field("url", &self.url)
			.field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
			.finish()
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn send(&self, payload: &CapturePayload) -> Result<u16> {
		let body = serde_json::to_vec(payload)?;

		debug!(url = %self.url, count = payload.len(), bytes = body.len(), "Posting capture payload");

		let mut request = self
			.client
			.post(&self.url)
			.header(CONTENT_TYPE, "application/json")
			.body(body);
		if let Some(api_key) = &self.api_key {
			request = request.header(API_KEY_HEADER, api_key);
		}

		let response = request.send().await?;
		Ok(response.status().as_u16())
	}
}
