// crates.io
use time::macros;
// self
use record_broker::{
	_preludet::*,
	auth::{AccessToken, CacheKey},
	store::{MemoryTokenCache, TokenCache},
};

fn make_key(raw: &str) -> CacheKey {
	CacheKey::new(raw).expect("Failed to build cache key for memory cache tests.")
}

fn live_token(value: &str) -> AccessToken {
	AccessToken::new(value, OffsetDateTime::now_utc(), Duration::hours(1))
		.expect("Token expiry should be representable.")
}

#[tokio::test]
async fn set_and_get_round_trip() {
	let cache = MemoryTokenCache::default();
	let key = make_key("client-a|https://records.example.com/.default");
	let token = live_token("access-1");

	cache.set(&key, token.clone()).await.expect("Saving token into memory cache should succeed.");

	let fetched = cache
		.get(&key)
		.await
		.expect("Reading from memory cache should succeed.")
		.expect("Stored token should remain present.");

	assert_eq!(fetched, token);
	assert_eq!(
		cache.get(&make_key("client-b")).await.expect("Reading an unknown key should succeed."),
		None
	);
}

#[tokio::test]
async fn set_replaces_previous_token() {
	let cache = MemoryTokenCache::default();
	let key = make_key("client-a");

	cache.set(&key, live_token("access-old")).await.expect("Saving first token should succeed.");
	cache.set(&key, live_token("access-new")).await.expect("Saving second token should succeed.");

	let fetched = cache
		.get(&key)
		.await
		.expect("Reading replaced token should succeed.")
		.expect("Replacement token should remain present.");

	assert_eq!(fetched.value.expose(), "access-new");
	assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn expired_tokens_are_never_returned_and_get_dropped() {
	let cache = MemoryTokenCache::default();
	let key = make_key("client-a");
	let issued = macros::datetime!(2025-11-10 12:00 UTC);

	cache
		.set(
			&key,
			AccessToken::new("access-expired", issued, Duration::hours(1))
				.expect("Token expiry should be representable."),
		)
		.await
		.expect("Saving expired token should succeed.");

	assert_eq!(cache.len(), 1);
	assert_eq!(cache.get(&key).await.expect("Reading expired entry should succeed."), None);
	assert!(cache.is_empty());
}

#[tokio::test]
async fn evict_returns_removed_token() {
	let cache = MemoryTokenCache::default();
	let key = make_key("client-a");
	let token = live_token("access-evicted");

	cache.set(&key, token.clone()).await.expect("Saving evictable token should succeed.");

	let evicted = cache.evict(&key).await.expect("Eviction should succeed.");

	assert_eq!(evicted, Some(token));
	assert_eq!(cache.evict(&key).await.expect("Second eviction should succeed."), None);
	assert!(cache.is_empty());
}

#[tokio::test]
async fn clones_share_entries_across_tasks() {
	let cache = MemoryTokenCache::default();
	let writer = cache.clone();
	let task = tokio::spawn(async move {
		writer
			.set(&make_key("client-a"), live_token("access-shared"))
			.await
			.expect("Writing from a spawned task should succeed.");
	});

	task.await.expect("Writer task should not panic.");

	let fetched = cache
		.get(&make_key("client-a"))
		.await
		.expect("Reading shared entry should succeed.")
		.expect("Entry written by the clone should be visible.");

	assert_eq!(fetched.value.expose(), "access-shared");
}
