// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end delivery against a mock capture endpoint.

use std::sync::Arc;
use std::time::Duration;

use beacon_analytics::{AnalyticsClient, Backoff, MemoryStorage, RetryConfig};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn fast_retries() -> RetryConfig {
	RetryConfig {
		max_retries: 3,
		base_delay: Duration::from_millis(10),
		max_delay: Duration::from_secs(1),
		backoff: Backoff::Linear,
		jitter: false,
	}
}

fn client(server: &MockServer, batch_size: usize) -> AnalyticsClient {
	AnalyticsClient::builder()
		.host(server.uri())
		.api_key("key_123")
		.project_id("default")
		.device_id("device-abc")
		.batch_size(batch_size)
		.flush_interval(Duration::from_millis(50))
		.retry_config(fast_retries())
		.storage(Arc::new(MemoryStorage::new()))
		.build()
		.unwrap()
}

async fn received(server: &MockServer) -> Vec<Request> {
	server.received_requests().await.unwrap_or_default()
}

fn body(request: &Request) -> Value {
	serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn batch_is_posted_with_headers() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/capture"))
		.and(header("X-API-Key", "key_123"))
		.and(header("Content-Type", "application/json"))
		.respond_with(ResponseTemplate::new(202))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server, 2);
	client.capture("demo_pageview", json!({"page": "examples"}));
	client.capture("signup_click", json!({"source": "test"}));
	tokio::time::timeout(Duration::from_secs(5), client.flush_and_wait())
		.await
		.unwrap();

	let requests = received(&server).await;
	assert_eq!(requests.len(), 1);

	let user_agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
	assert!(user_agent.starts_with("beacon/"));

	let body = body(&requests[0]);
	assert_eq!(body["project_id"], "default");
	let batch = body["batch"].as_array().unwrap();
	assert_eq!(batch.len(), 2);
	assert_eq!(batch[0]["event"], "demo_pageview");
	assert_eq!(batch[0]["distinct_id"], "device-abc");
	assert_eq!(batch[0]["$device_id"], "device-abc");
	assert_eq!(batch[0]["$lib"], "beacon-analytics");
	assert_eq!(batch[0]["properties"]["page"], "examples");
	assert_eq!(batch[1]["event"], "signup_click");
}

#[tokio::test]
async fn single_event_is_posted_bare_after_interval() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/capture"))
		.respond_with(ResponseTemplate::new(200))
		.mount(&server)
		.await;

	let client = client(&server, 10);
	client.capture("x", json!({"k": 1}));

	tokio::time::sleep(Duration::from_millis(400)).await;

	let requests = received(&server).await;
	assert_eq!(requests.len(), 1);
	let body = body(&requests[0]);
	assert!(body.get("batch").is_none());
	assert_eq!(body["event"], "x");
	assert_eq!(body["project_id"], "default");
	let timestamp = body["timestamp"].as_str().unwrap();
	assert!(timestamp.ends_with('Z'));
	assert_eq!(client.queue_len(), 0);
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/capture"))
		.respond_with(ResponseTemplate::new(500))
		.up_to_n_times(2)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/capture"))
		.respond_with(ResponseTemplate::new(200))
		.mount(&server)
		.await;

	let client = client(&server, 1);
	client.capture("retry_me", json!({}));
	tokio::time::timeout(Duration::from_secs(5), client.flush_and_wait())
		.await
		.unwrap();

	let requests = received(&server).await;
	assert_eq!(requests.len(), 3);
	let uuids: Vec<Value> = requests.iter().map(|r| body(r)["uuid"].clone()).collect();
	assert!(uuids.iter().all(|uuid| *uuid == uuids[0]));
}

#[tokio::test]
async fn exhausted_batch_is_dropped_after_four_attempts() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/capture"))
		.respond_with(ResponseTemplate::new(400))
		.mount(&server)
		.await;

	let client = client(&server, 1);
	client.capture("rejected", json!({}));
	tokio::time::timeout(Duration::from_secs(5), client.flush_and_wait())
		.await
		.unwrap();

	assert_eq!(received(&server).await.len(), 4);
	assert_eq!(client.queue_len(), 0);
}

#[tokio::test]
async fn unreachable_host_is_retried_then_dropped() {
	// Port 1 is reserved and nothing listens on it.
	let client = AnalyticsClient::builder()
		.host("http://127.0.0.1:1")
		.batch_size(1)
		.request_timeout(Duration::from_millis(200))
		.retry_config(fast_retries())
		.storage(Arc::new(MemoryStorage::new()))
		.build()
		.unwrap();

	client.capture("lost", json!({}));
	tokio::time::timeout(Duration::from_secs(5), client.flush_and_wait())
		.await
		.unwrap();
	assert_eq!(client.queue_len(), 0);
}
