//! Identifiers for remote records and token cache entries.
//!
//! Record identifiers are assigned by the remote system, so the only local requirement is that one
//! was returned at all; spaces, punctuation, and long opaque handles are passed through untouched
//! and percent-encoded when placed in a URL. Cache keys are chosen locally and follow stricter
//! rules so that keys stay printable and bounded.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Longest cache key accepted, in bytes.
pub const CACHE_KEY_MAX_LEN: usize = 256;

macro_rules! def_id {
	($name:ident, $doc:literal, $label:literal, $check:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(Arc<str>);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}

			/// Borrowed string form.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$check(&value)?;

				Ok(Self(value.into()))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0.as_ref().to_owned()
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($label, "({:?})"), &*self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// No record identifier was supplied.
	#[error("Record identifier cannot be empty.")]
	EmptyRecordId,
	/// The cache key was empty or whitespace only.
	#[error("Cache key cannot be blank.")]
	BlankCacheKey,
	/// The cache key contains whitespace or control characters.
	#[error("Cache key contains whitespace or control characters.")]
	UnprintableCacheKey,
	/// The cache key exceeded the allowed length.
	#[error("Cache key exceeds {max} bytes.")]
	CacheKeyTooLong {
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

def_id! {
	RecordId,
	"Identifier the remote system assigned to a created record.",
	"RecordId",
	check_record_id
}
def_id! {
	CacheKey,
	"Key under which a credential identity's token is cached.",
	"CacheKey",
	check_cache_key
}

fn check_record_id(raw: &str) -> Result<(), IdentifierError> {
	if raw.is_empty() {
		return Err(IdentifierError::EmptyRecordId);
	}

	Ok(())
}

fn check_cache_key(raw: &str) -> Result<(), IdentifierError> {
	if raw.trim().is_empty() {
		return Err(IdentifierError::BlankCacheKey);
	}
	if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::UnprintableCacheKey);
	}
	if raw.len() > CACHE_KEY_MAX_LEN {
		return Err(IdentifierError::CacheKeyTooLong { max: CACHE_KEY_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_ids_accept_any_non_empty_remote_value() {
		let long = "x".repeat(4 * CACHE_KEY_MAX_LEN);

		assert_eq!(RecordId::new(""), Err(IdentifierError::EmptyRecordId));

		for raw in ["Project 9", " 42", "a/b?c", long.as_str()] {
			let id = RecordId::new(raw).expect("Remote-assigned identifiers should pass through.");

			assert_eq!(id.as_str(), raw);
		}
	}

	#[test]
	fn cache_keys_stay_printable_and_bounded() {
		assert_eq!(CacheKey::new("   "), Err(IdentifierError::BlankCacheKey));
		assert_eq!(CacheKey::new("with space"), Err(IdentifierError::UnprintableCacheKey));
		assert_eq!(CacheKey::new("tab\there"), Err(IdentifierError::UnprintableCacheKey));

		CacheKey::new("k".repeat(CACHE_KEY_MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			CacheKey::new("k".repeat(CACHE_KEY_MAX_LEN + 1)),
			Err(IdentifierError::CacheKeyTooLong { max: CACHE_KEY_MAX_LEN })
		);
	}

	#[test]
	fn serde_goes_through_validation() {
		let id: RecordId = serde_json::from_str("\"Project 9\"")
			.expect("Record id with a space should deserialize.");

		assert_eq!(serde_json::to_string(&id).expect("Record id should serialize."), "\"Project 9\"");
		assert!(serde_json::from_str::<RecordId>("\"\"").is_err());
		assert!(serde_json::from_str::<CacheKey>("\"with space\"").is_err());
	}

	#[test]
	fn debug_labels_and_borrowed_lookup() {
		let key = CacheKey::new("client-1").expect("Key should be valid.");

		assert_eq!(format!("{key:?}"), "CacheKey(\"client-1\")");

		let map: HashMap<CacheKey, u8> = HashMap::from_iter([(key, 7_u8)]);

		assert_eq!(map.get("client-1"), Some(&7));
	}
}
