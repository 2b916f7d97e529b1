// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client builder with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// Creates a new HTTP client builder with the standard Beacon User-Agent header.
///
/// Callers customize the builder (timeouts, proxies) before building.
///
/// # Example
/// ```ignore
/// let client = beacon_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the platform string in `{os}-{arch}` format, e.g. "linux-x86_64".
pub fn platform() -> String {
	format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Returns the standard Beacon User-Agent string.
///
/// Format: `beacon/{platform}/{version}`
pub fn user_agent() -> String {
	format!("beacon/{}/{}", platform(), env!("CARGO_PKG_VERSION"))
}
