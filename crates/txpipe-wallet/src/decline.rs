//! Decline detection for signing failures.
//!
//! Delegates report a user refusal the same way they report a crash: as an
//! error with free-text content. Until the delegate contract carries a
//! structured discriminator, a refusal is recognized by the words it uses.
//! Every caller goes through `is_decline` so the rule can be swapped in one
//! place.

/// Tokens that mark a signing failure as a user decline.
const DECLINE_TOKENS: [&str; 3] = ["reject", "denied", "cancel"];

/// Returns true if a signing failure message describes a user refusal.
pub fn is_decline(message: &str) -> bool {
	let message = message.to_lowercase();
	DECLINE_TOKENS.iter().any(|token| message.contains(token))
}
