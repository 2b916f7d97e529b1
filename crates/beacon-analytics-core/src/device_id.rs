// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous device identifiers.
//!
//! Device ids only need to be unique per installation, not unguessable, so
//! they come from `fastrand` rather than a cryptographic source.

const TEMPLATE: &str = "xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx";
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Generates a UUID-v4-shaped identifier.
pub fn generate_device_id() -> String {
	generate_with(&mut fastrand::Rng::new())
}

/// Generates an identifier from the given RNG (seedable for tests).
pub fn generate_with(rng: &mut fastrand::Rng) -> String {
	TEMPLATE
		.chars()
		.map(|c| match c {
			'x' => HEX[rng.usize(..16)] as char,
			// variant nibble: 10xx
			'y' => HEX[(rng.usize(..16) & 0x3) | 0x8] as char,
			other => other,
		})
		.collect()
}

/// Returns true if `id` has the `8-4-4-4-12` lowercase hex shape with a
/// version 4 nibble and an RFC 4122 variant nibble.
pub fn is_device_id_shaped(id: &str) -> bool {
	id.len() == TEMPLATE.len()
		&& id.chars().zip(TEMPLATE.chars()).all(|(c, t)| match t {
			'x' => c.is_ascii_digit() || ('a'..='f').contains(&c),
			'y' => matches!(c, '8' | '9' | 'a' | 'b'),
			fixed => c == fixed,
		})
}
