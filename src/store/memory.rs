//! Thread-safe in-memory [`TokenCache`] for single-instance deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CacheKey},
	store::{CacheFuture, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, AccessToken>>>;

/// Process-local cache; readers never block each other.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl MemoryTokenCache {
	/// Number of entries currently held, including ones that expired but were not yet read.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn get_now(map: &CacheMap, key: &CacheKey, now: OffsetDateTime) -> Option<AccessToken> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(token) if !token.is_expired_at(now) => return Some(token.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|token| token.is_expired_at(now)) {
			guard.remove(key);
		}

		None
	}
}
impl TokenCache for MemoryTokenCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AccessToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(&map, key, OffsetDateTime::now_utc())) })
	}

	fn set<'a>(&'a self, key: &'a CacheKey, token: AccessToken) -> CacheFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.clone(), token);

			Ok(())
		})
	}

	fn evict<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AccessToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}
}
