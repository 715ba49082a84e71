//! String formatting utilities.
//!
//! Hex prefix management and identifier truncation for logs.

/// Truncates an identifier for display, keeping the first 8 characters.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		None => id.to_string(),
		Some((idx, _)) => format!("{}..", &id[..idx]),
	}
}

/// Adds a "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}
