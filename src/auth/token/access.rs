//! Immutable bearer token issued by the credential exchange.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of an [`AccessToken`] relative to a safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token outlives the safety margin and may be handed out.
	Fresh,
	/// Token is still valid but inside the safety margin; refresh before use.
	RefreshDue,
	/// Token reached its expiry instant.
	Expired,
}

/// Short-lived bearer credential. Replaced, never mutated, on refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Opaque token value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Instant the remote system stops accepting the token.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	///
	/// Returns `None` when the expiry instant falls outside the representable date range.
	pub fn new(
		value: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Option<Self> {
		let expires_at = issued_at.checked_add(expires_in)?;

		Some(Self { value: TokenSecret::new(value), issued_at, expires_at })
	}

	/// Computes the status at `instant` for the provided safety margin.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		// A margin reaching past the representable range can never be satisfied.
		if instant.checked_add(margin).is_some_and(|due| self.expires_at > due) {
			return TokenStatus::Fresh;
		}

		TokenStatus::RefreshDue
	}

	/// Returns `true` when the token may be returned without refreshing.
	pub fn is_usable_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant, margin), TokenStatus::Fresh)
	}

	/// Returns `true` once the expiry instant has passed.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before expiry; zero once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Renders the `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.value.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("value", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
