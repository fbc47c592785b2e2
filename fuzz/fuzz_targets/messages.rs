// Copyright (c) 2024, The AB Committee Developers
// SPDX-License-Identifier: BSD-3-Clause

#![no_main]

use ab_committee::message::{PubShareMessage, MESSAGE_TAG, TAG_LENGTH};
use libfuzzer_sys::fuzz_target;

// Test message decoding and canonical encoding
fuzz_target!(|data: &str| {
	// If decoding succeeds, encoding should reproduce everything after the tag
	if let Ok(message) = PubShareMessage::decode(data) {
		let encoded = message.encode();
		assert!(encoded.starts_with(MESSAGE_TAG));
		assert_eq!(&encoded[TAG_LENGTH..], &data[TAG_LENGTH..]);

		// Decoded share data always splits into whole entries
		assert_eq!(message.entries().unwrap().len() as u64, message.share_count());
	}
});
