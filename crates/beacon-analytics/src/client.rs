// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client for capturing events from an application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use beacon_analytics_core::{validate_event_name, EventRecord};
use beacon_common_http::RetryConfig;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::autocapture::EventSource;
use crate::config::{ClientConfig, ConfigError};
use crate::delivery::DeliveryEngine;
use crate::error::{AnalyticsError, Result};
use crate::identity::resolve_device_id;
use crate::pipeline::Pipeline;
use crate::scheduler::FlushScheduler;
use crate::storage::{default_storage, DeviceStorage};
use crate::transport::{HttpTransport, Transport};

/// SDK version for the `$lib_version` field.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for the `$lib` field.
pub const SDK_NAME: &str = "beacon-analytics";

/// Per-call overrides for [`AnalyticsClient::capture_with`].
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
	/// Replaces the device id as `distinct_id`. `$device_id` is unchanged.
	pub distinct_id: Option<String>,
	/// Replaces the capture time.
	pub timestamp: Option<DateTime<Utc>>,
}

impl CaptureOptions {
	pub fn distinct_id(mut self, distinct_id: impl Into<String>) -> Self {
		self.distinct_id = Some(distinct_id.into());
		self
	}

	pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}
}

/// Builder for constructing an AnalyticsClient.
#[derive(Default)]
pub struct AnalyticsClientBuilder {
	config: ClientConfig,
	storage: Option<Arc<dyn DeviceStorage>>,
	transport: Option<Arc<dyn Transport>>,
}

impl AnalyticsClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a builder from `BEACON_*` environment variables.
	pub fn from_env() -> std::result::Result<Self, ConfigError> {
		Ok(Self::from_config(ClientConfig::from_env()?))
	}

	pub fn from_config(config: ClientConfig) -> Self {
		Self {
			config,
			..Self::default()
		}
	}

	/// Sets the ingestion host.
	///
	/// Example: `https://events.example.com`
	pub fn host(mut self, host: impl Into<String>) -> Self {
		self.config.host = host.into();
		self
	}

	/// Sets the API key sent as `X-API-Key`.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.config.api_key = Some(key.into());
		self
	}

	pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
		self.config.project_id = Some(project_id.into());
		self
	}

	/// Sets the queue length that triggers an immediate flush.
	pub fn batch_size(mut self, size: usize) -> Self {
		self.config.batch_size = size;
		self
	}

	/// Sets how long queued events wait before a timed flush.
	pub fn flush_interval(mut self, interval: Duration) -> Self {
		self.config.flush_interval = interval;
		self
	}

	pub fn autocapture(mut self, enabled: bool) -> Self {
		self.config.autocapture = enabled;
		self
	}

	/// Uses a fixed device id instead of the stored or generated one.
	pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
		self.config.device_id = Some(device_id.into());
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Sets the retry configuration.
	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.config.retry_config = config;
		self
	}

	/// Sets the storage key holding the device id.
	pub fn storage_key(mut self, key: impl Into<String>) -> Self {
		self.config.storage_key = key.into();
		self
	}

	/// Replaces the default file storage.
	pub fn storage(mut self, storage: Arc<dyn DeviceStorage>) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Replaces the default HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Builds the AnalyticsClient.
	///
	/// Must be called from within a Tokio runtime; timers and deliveries are
	/// spawned on it.
	pub fn build(self) -> Result<AnalyticsClient> {
		let config = self.config.validated()?;
		let runtime = Handle::try_current().map_err(|_| AnalyticsError::NoRuntime)?;

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(
				config.capture_url(),
				config.api_key.clone(),
				config.request_timeout,
			)?),
		};
		let storage = self.storage.unwrap_or_else(default_storage);
		let device_id = resolve_device_id(
			config.device_id.as_deref(),
			storage.as_ref(),
			&config.storage_key,
		);

		let shutdown = CancellationToken::new();
		let pipeline = Pipeline::new(
			FlushScheduler::new(config.batch_size, config.flush_interval),
			Arc::new(DeliveryEngine::new(transport, config.retry_config.clone())),
			config.project_id.clone(),
			shutdown.clone(),
			runtime.clone(),
		);

		info!(
			host = %config.host,
			batch_size = config.batch_size,
			flush_interval_ms = config.flush_interval.as_millis() as u64,
			autocapture = config.autocapture,
			"Analytics client initialized"
		);

		Ok(AnalyticsClient {
			inner: Arc::new(ClientInner {
				config,
				device_id,
				pipeline,
				shutdown,
				runtime,
				closed: AtomicBool::new(false),
			}),
		})
	}
}

#[derive(Debug)]
struct ClientInner {
	config: ClientConfig,
	device_id: String,
	pipeline: Arc<Pipeline>,
	shutdown: CancellationToken,
	runtime: Handle,
	closed: AtomicBool,
}

impl ClientInner {
	fn capture(&self, event: Option<&str>, properties: Value, options: CaptureOptions) {
		if self.closed.load(Ordering::SeqCst) {
			debug!("Capture after shutdown ignored");
			return;
		}
		let Some(event) = event.filter(|name| validate_event_name(name)) else {
			debug!("Capture with missing or invalid event name ignored");
			return;
		};

		let distinct_id = options.distinct_id.unwrap_or_else(|| self.device_id.clone());
		let mut record = EventRecord::new(event, distinct_id, properties)
			.with_lib(SDK_NAME, SDK_VERSION)
			.with_device_id(self.device_id.as_str())
			.with_project_id(self.config.project_id.clone());
		if let Some(timestamp) = options.timestamp {
			record = record.with_timestamp(timestamp);
		}

		self.pipeline.enqueue(record);
	}
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		self.shutdown.cancel();
		self.pipeline.cancel_timer();
	}
}

/// Client for capturing product analytics events.
///
/// Cheap to clone; clones share one queue and one delivery engine. Dropping
/// the last clone stops pending timers and retries. Events still queued at
/// that point are lost, so call [`AnalyticsClient::flush_and_wait`] first
/// when they matter.
///
/// # Example
///
/// ```no_run
/// use beacon_analytics::{AnalyticsClient, Properties};
/// use std::time::Duration;
///
/// # async fn run() -> beacon_analytics::Result<()> {
/// let client = AnalyticsClient::builder()
///     .host("https://events.example.com")
///     .api_key("key_123")
///     .project_id("default")
///     .flush_interval(Duration::from_secs(5))
///     .build()?;
///
/// client.capture("signup_click", Properties::new().insert("plan", "pro"));
/// client.flush_and_wait().await;
/// client.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl AnalyticsClient {
	/// Creates a new builder for constructing an AnalyticsClient.
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Queues an event.
	///
	/// Never blocks on I/O and never fails. A missing, empty or oversized
	/// event name is ignored; properties that are not a JSON object are
	/// replaced by an empty object.
	pub fn capture<'a>(&self, event: impl Into<Option<&'a str>>, properties: impl Into<Value>) {
		self
			.inner
			.capture(event.into(), properties.into(), CaptureOptions::default());
	}

	/// Queues an event with per-call overrides.
	pub fn capture_with<'a>(
		&self,
		event: impl Into<Option<&'a str>>,
		properties: impl Into<Value>,
		options: CaptureOptions,
	) {
		self.inner.capture(event.into(), properties.into(), options);
	}

	/// Starts delivery of one batch now.
	///
	/// Returns `false` when there is nothing to send or a delivery is
	/// already in progress.
	pub fn flush(&self) -> bool {
		self.inner.pipeline.flush()
	}

	/// Flushes until the queue is empty and no delivery is in progress.
	///
	/// Batches that exhaust their retries count as done. Returns immediately
	/// once the client is shut down.
	pub async fn flush_and_wait(&self) {
		let pipeline = &self.inner.pipeline;
		loop {
			if self.is_closed() {
				return;
			}
			let mut completed = pipeline.engine().subscribe();
			pipeline.flush();
			if pipeline.queue().is_empty() && !pipeline.engine().is_in_flight() {
				return;
			}
			if completed.changed().await.is_err() {
				return;
			}
		}
	}

	/// Forwards UI signals from `source` as autocapture events.
	///
	/// Captures the source's current page as the initial `$pageview`, then
	/// spawns a task that runs until the source ends or the client shuts
	/// down. Returns `None` when autocapture is disabled.
	pub fn start<S>(&self, source: S) -> Option<JoinHandle<()>>
	where
		S: EventSource + 'static,
	{
		if !self.inner.config.autocapture || self.is_closed() {
			debug!("Autocapture disabled; source not started");
			return None;
		}

		if let Some(page) = source.current_page() {
			if let Some((event, properties)) = crate::autocapture::UiSignal::Navigation(page).to_event() {
				self.capture(event, properties);
			}
		}

		let inner = Arc::downgrade(&self.inner);
		let shutdown = self.inner.shutdown.clone();
		Some(self.inner.runtime.spawn(forward_signals(source, inner, shutdown)))
	}

	/// Stops timers and pending retries and rejects further captures.
	///
	/// Queued events are not sent. A request already on the wire is allowed
	/// to finish.
	pub fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.shutdown.cancel();
		self.inner.pipeline.cancel_timer();
		info!(
			discarded = self.inner.pipeline.queue().len(),
			"Analytics client shut down"
		);
	}

	/// The device id used as the default `distinct_id`.
	pub fn distinct_id(&self) -> &str {
		&self.inner.device_id
	}

	pub fn queue_len(&self) -> usize {
		self.inner.pipeline.queue().len()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}
}

async fn forward_signals<S>(mut source: S, inner: Weak<ClientInner>, shutdown: CancellationToken)
where
	S: EventSource,
{
	debug!("Autocapture started");
	loop {
		let signal = tokio::select! {
			_ = shutdown.cancelled() => break,
			signal = source.next_signal() => signal,
		};
		let Some(signal) = signal else {
			break;
		};
		let Some(client) = inner.upgrade() else {
			break;
		};
		if let Some((event, properties)) = signal.to_event() {
			client.capture(Some(event), properties.into_value(), CaptureOptions::default());
		}
	}
	debug!("Autocapture stopped");
}
