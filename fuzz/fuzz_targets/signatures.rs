// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

#![no_main]

use ab_committee::ring::LinkableRingSignature;
use libfuzzer_sys::fuzz_target;

// Test basic deserialization and canonical serialization
fuzz_target!(|data: &[u8]| {
	// If deserialization succeeds, serialization should be canonical
	if let Ok(signature) = LinkableRingSignature::from_bytes(data) {
		assert_eq!(&signature.to_bytes(), data);
	}
});
