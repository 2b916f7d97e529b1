// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Beacon.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with a consistent User-Agent header
//! - Backoff configuration and delay calculation for retried deliveries

mod backoff;
mod client;

pub use backoff::{delay_for_retry, Backoff, RetryConfig};
pub use client::{builder, platform, user_agent};
