// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use beacon_analytics_core::CapturePayload;
use tokio::time::Instant;

use crate::error::{AnalyticsError, Result};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub(crate) struct SentPayload {
	pub at: Instant,
	pub payload: CapturePayload,
}

impl SentPayload {
	pub fn names(&self) -> Vec<String> {
		self.payload.events().map(|e| e.event.clone()).collect()
	}
}

/// Records every payload and answers from a script, then with `fallback`.
#[derive(Debug)]
pub(crate) struct RecordingTransport {
	script: Mutex<VecDeque<Option<u16>>>,
	fallback: Option<u16>,
	latency: Duration,
	sent: Mutex<Vec<SentPayload>>,
}

impl RecordingTransport {
	/// Always answers `status`.
	pub fn with_status(status: u16) -> Self {
		Self::scripted(Vec::new(), Some(status))
	}

	/// `None` entries simulate a transport error.
	pub fn scripted(script: Vec<Option<u16>>, fallback: Option<u16>) -> Self {
		Self {
			script: Mutex::new(script.into()),
			fallback,
			latency: Duration::ZERO,
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = latency;
		self
	}

	pub fn sent(&self) -> Vec<SentPayload> {
		self.sent.lock().unwrap().clone()
	}

	pub fn send_count(&self) -> usize {
		self.sent.lock().unwrap().len()
	}
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
	async fn send(&self, payload: &CapturePayload) -> Result<u16> {
		self.sent.lock().unwrap().push(SentPayload {
			at: Instant::now(),
			payload: payload.clone(),
		});
		let answer = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
		if !self.latency.is_zero() {
			tokio::time::sleep(self.latency).await;
		}
		answer.ok_or_else(|| AnalyticsError::Transport("connection refused".to_string()))
	}
}
