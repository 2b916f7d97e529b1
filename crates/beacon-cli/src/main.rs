// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use anyhow::{Context, Result};
use beacon_analytics::AnalyticsClient;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sends events to a Beacon capture host through the Rust SDK.
#[derive(Parser, Debug)]
#[command(name = "beacon-send-events", about = "Send analytics events to a Beacon host", version)]
struct Args {
	/// Ingestion host, e.g. http://localhost:8000
	#[arg(long, env = "BEACON_HOST", default_value = "http://localhost:8000")]
	host: String,

	#[arg(long, env = "BEACON_API_KEY")]
	api_key: Option<String>,

	#[arg(long, env = "BEACON_PROJECT_ID", default_value = "default")]
	project_id: String,

	#[arg(long, env = "BEACON_BATCH_SIZE", default_value_t = 5)]
	batch_size: usize,

	#[arg(long, env = "BEACON_FLUSH_INTERVAL_MS", default_value_t = 1000)]
	flush_interval_ms: u64,

	/// Seconds to wait for queued events to be delivered.
	#[arg(long, default_value_t = 30)]
	wait_secs: u64,

	/// Event to send; repeat for several. Sends a demo set when omitted.
	#[arg(long = "event", value_name = "NAME")]
	events: Vec<String>,

	/// Emit logs as JSON.
	#[arg(long)]
	json_logs: bool,
}

fn init_tracing(json_logs: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(filter);
	if json_logs {
		registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

fn demo_events() -> Vec<(String, Value)> {
	vec![
		(
			"demo_pageview".to_string(),
			json!({"page": "examples", "source": "beacon-send-events"}),
		),
		("demo_action".to_string(), json!({"action": "run_script"})),
		("signup_click".to_string(), json!({"source": "rust_example"})),
	]
}

fn events_to_send(args: &Args) -> Vec<(String, Value)> {
	if args.events.is_empty() {
		demo_events()
	} else {
		args
			.events
			.iter()
			.map(|name| (name.clone(), json!({"source": "beacon-send-events"})))
			.collect()
	}
}

fn build_client(args: &Args) -> Result<AnalyticsClient> {
	let mut builder = AnalyticsClient::builder()
		.host(&args.host)
		.project_id(&args.project_id)
		.batch_size(args.batch_size)
		.flush_interval(Duration::from_millis(args.flush_interval_ms))
		.autocapture(false);
	if let Some(api_key) = &args.api_key {
		builder = builder.api_key(api_key);
	}
	builder.build().context("failed to build analytics client")
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(args.json_logs);

	let client = build_client(&args)?;
	info!(
		host = %args.host,
		device_id = %client.distinct_id(),
		"Sending events"
	);

	let events = events_to_send(&args);
	for (name, properties) in &events {
		client.capture(name.as_str(), properties.clone());
	}

	let wait = Duration::from_secs(args.wait_secs);
	if tokio::time::timeout(wait, client.flush_and_wait()).await.is_err() {
		warn!(
			queued = client.queue_len(),
			wait_secs = args.wait_secs,
			"Timed out waiting for delivery"
		);
	}
	client.shutdown();

	println!("Sent {} events to {}", events.len(), args.host);
	Ok(())
}
