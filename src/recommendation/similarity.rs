//! Item-similarity store (C5): shrinkage-damped cosine similarity between
//! items, TTL-cached per item.
//!
//! Profile-building and cosine step grounded on
//! `original_source/myutils/collaborative_filtering.py::get_item_similarities`.
//! The shrinkage term is spec.md §4.5's own addition on top of that
//! algorithm (the distillation source does not shrink at this layer);
//! implemented per spec.md, which is authoritative over the source where the
//! two diverge. Cache shape grounded on the teacher's
//! `cache_recommendations`/`get_cached_recommendations` TTL-plus-invalidation
//! pattern in `recommendation/engine.rs`, generalized from a `sqlx`-backed
//! table to the `Cache` trait per spec.md §9's design note.

use crate::recommendation::cache::{keys, Cache};
use crate::recommendation::domain::{ItemId, ItemKind};
use crate::recommendation::repository::RatingRepository;
use crate::recommendation::scoring::cosine;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Serialize, Deserialize)]
struct Cached {
    entries: Vec<(f64, ItemId)>,
}

/// `(shrunk_sim, other_item_id)`, descending by `shrunk_sim`.
pub async fn similarities<R: RatingRepository>(
    repo: &R,
    cache: &dyn Cache,
    item_id: ItemId,
    kind: ItemKind,
    shrinkage: f64,
    ttl: Duration,
) -> Vec<(f64, ItemId)> {
    let cache_key = keys::item_sim(kind, item_id, shrinkage);
    if let Some(raw) = cache.get(&cache_key).await {
        if let Ok(cached) = serde_json::from_str::<Cached>(&raw) {
            return cached.entries;
        }
    }

    let computed = compute(repo, item_id, kind, shrinkage).await;

    if let Ok(serialized) = serde_json::to_string(&Cached {
        entries: computed.clone(),
    }) {
        cache.set(&cache_key, serialized, ttl).await;
    }

    computed
}

async fn compute<R: RatingRepository>(
    repo: &R,
    item_id: ItemId,
    kind: ItemKind,
    shrinkage: f64,
) -> Vec<(f64, ItemId)> {
    let raters = repo.raters_of(item_id, kind).await;
    if raters.is_empty() {
        return Vec::new();
    }

    let ratings = repo.ratings_of_users(&raters, kind).await;

    // item_profiles: item -> (user -> rating)
    let mut profiles: HashMap<ItemId, HashMap<u64, f64>> = HashMap::new();
    for (user_id, other_item_id, value) in ratings {
        profiles
            .entry(other_item_id)
            .or_default()
            .insert(user_id.0, value as f64);
    }

    let Some(target_profile) = profiles.get(&item_id).cloned() else {
        return Vec::new();
    };
    let target_users: HashSet<u64> = target_profile.keys().copied().collect();

    let mut results: Vec<(f64, ItemId)> = profiles
        .iter()
        .filter(|(other_id, _)| **other_id != item_id)
        .filter_map(|(other_id, other_profile)| {
            let common: HashSet<u64> = other_profile
                .keys()
                .copied()
                .filter(|u| target_users.contains(u))
                .collect();
            let n = common.len();
            if n == 0 {
                return None;
            }
            let sim = cosine(&target_profile, other_profile);
            let shrunk = (n as f64 / (n as f64 + shrinkage)) * sim;
            if shrunk > 0.0 {
                Some((shrunk, *other_id))
            } else {
                None
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    results
}

/// Invalidate the cached similarity entries for `item_id` across every
/// shrinkage value this engine is configured with. Must be called whenever a
/// rating touching `item_id` is written (§4.5 "Invalidation").
pub async fn invalidate(cache: &dyn Cache, item_id: ItemId, kind: ItemKind, shrinkage: f64) {
    cache.invalidate(&keys::item_sim(kind, item_id, shrinkage)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::cache::InMemoryCache;
    use crate::recommendation::domain::{BookItem, Genre, Item, UserId};
    use crate::recommendation::repository::InMemoryRepository;
    use std::collections::HashSet as StdHashSet;
    use uuid::Uuid;

    fn item_id(n: u128) -> ItemId {
        ItemId(Uuid::from_u128(n))
    }

    async fn setup() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        let genre_id = crate::recommendation::domain::GenreId(1);
        repo.add_genre(Genre {
            id: genre_id,
            name: "g".to_string(),
            kind: ItemKind::Book,
        });
        for n in 1..=3u128 {
            repo.add_item(Item::Book(BookItem {
                id: item_id(n),
                title: format!("b{n}"),
                genres: StdHashSet::from([genre_id]),
                author: "a".to_string(),
                language: "en".to_string(),
                liked_percent: 50,
            }));
        }
        repo
    }

    #[tokio::test]
    async fn s2_cf_minimal_similarity_surfaces_shared_item() {
        // S2: users u1,u2,u3; books b1,b2,b3.
        // (u1,b1,9),(u1,b2,10),(u2,b1,8),(u2,b2,9),(u3,b1,10)
        let repo = setup().await;
        let (b1, b2) = (item_id(1), item_id(2));
        repo.seed_rating(UserId(1), b1, 9);
        repo.seed_rating(UserId(1), b2, 10);
        repo.seed_rating(UserId(2), b1, 8);
        repo.seed_rating(UserId(2), b2, 9);
        repo.seed_rating(UserId(3), b1, 10);

        let cache = InMemoryCache::new();
        let sims = similarities(
            &repo,
            &cache,
            b1,
            ItemKind::Book,
            25.0,
            Duration::from_secs(21_600),
        )
        .await;
        assert!(sims.iter().any(|(_, id)| *id == b2));
    }

    #[tokio::test]
    async fn shrinkage_never_exceeds_raw_similarity_p8() {
        let repo = setup().await;
        let (b1, b2) = (item_id(1), item_id(2));
        repo.seed_rating(UserId(1), b1, 9);
        repo.seed_rating(UserId(1), b2, 9);
        repo.seed_rating(UserId(2), b1, 8);
        repo.seed_rating(UserId(2), b2, 8);

        let cache = InMemoryCache::new();
        let shrunk = similarities(&repo, &cache, b1, ItemKind::Book, 25.0, Duration::from_secs(60))
            .await;
        let raw = similarities(&repo, &cache, b1, ItemKind::Book, 0.0, Duration::from_secs(60))
            .await;
        let shrunk_sim = shrunk.iter().find(|(_, id)| *id == b2).unwrap().0;
        let raw_sim = raw.iter().find(|(_, id)| *id == b2).unwrap().0;
        assert!(shrunk_sim <= raw_sim + 1e-12);
    }

    #[tokio::test]
    async fn cache_hit_avoids_recompute_and_returns_same_result() {
        let repo = setup().await;
        let (b1, b2) = (item_id(1), item_id(2));
        repo.seed_rating(UserId(1), b1, 9);
        repo.seed_rating(UserId(1), b2, 9);
        let cache = InMemoryCache::new();
        let first = similarities(&repo, &cache, b1, ItemKind::Book, 25.0, Duration::from_secs(60)).await;
        let second = similarities(&repo, &cache, b1, ItemKind::Book, 25.0, Duration::from_secs(60)).await;
        assert_eq!(first, second);
    }
}
