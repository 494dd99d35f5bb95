//! Collaborative scorer (C6): weighted neighbor aggregation over a user's
//! highly-rated items, using item-item similarity from C5.
//!
//! Grounded on
//! `original_source/myutils/collaborative_filtering.py::get_collaborative_recommendations`
//! for the accumulate-scores/accumulate-weights/average shape. spec.md §4.6
//! additionally bounds to "top 10 by rating" and "up to 50 similar items per
//! seed" (a resource bound the distillation source does not state
//! explicitly) — implemented per spec.md, per §5's "Resource bounds" policy.

use crate::recommendation::cache::Cache;
use crate::recommendation::domain::{Item, ItemId, ItemKind, UserId};
use crate::recommendation::repository::{ItemRepository, RatingRepository};
use crate::recommendation::scoring::clamp_to;
use crate::recommendation::similarity;
use std::collections::{HashMap, HashSet};

const SEED_LIMIT: usize = 10;
const NEIGHBORS_PER_SEED: usize = 50;
const SEED_MIN_RATING: u8 = 7;

/// `(score in [0,100], item)`, descending by score.
pub async fn cf_recs<R>(
    repo: &R,
    cache: &dyn Cache,
    user_id: UserId,
    kind: ItemKind,
    top_n: usize,
    already_rated: &HashSet<ItemId>,
    shrinkage: f64,
    item_sim_ttl: std::time::Duration,
) -> Vec<(f64, Item)>
where
    R: ItemRepository + RatingRepository,
{
    let ratings = repo.user_ratings(user_id, kind).await;
    let mut highly_rated: Vec<(ItemId, u8)> = ratings
        .into_iter()
        .filter(|(_, v)| *v >= SEED_MIN_RATING)
        .collect();
    if highly_rated.is_empty() {
        return Vec::new();
    }

    // Top 10 by rating, ties broken by item id ascending.
    highly_rated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    highly_rated.truncate(SEED_LIMIT);

    let mut scores: HashMap<ItemId, f64> = HashMap::new();
    let mut weights: HashMap<ItemId, f64> = HashMap::new();

    for (seed_item, seed_rating) in &highly_rated {
        let mut neighbors =
            similarity::similarities(repo, cache, *seed_item, kind, shrinkage, item_sim_ttl).await;
        neighbors.truncate(NEIGHBORS_PER_SEED);
        for (sim, other_id) in neighbors {
            *scores.entry(other_id).or_insert(0.0) += sim * (*seed_rating as f64);
            *weights.entry(other_id).or_insert(0.0) += sim;
        }
    }

    let mut averaged: Vec<(f64, ItemId)> = weights
        .into_iter()
        .filter(|(item_id, weight)| !already_rated.contains(item_id) && *weight > 0.0)
        .map(|(item_id, weight)| {
            let avg = scores.get(&item_id).copied().unwrap_or(0.0) / weight;
            (clamp_to(avg * 10.0, 0.0, 100.0), item_id)
        })
        .collect();

    averaged.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    averaged.truncate(top_n);

    let mut out = Vec::with_capacity(averaged.len());
    for (score, item_id) in averaged {
        if let Some(item) = repo.item(item_id).await {
            out.push((score, item));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::cache::InMemoryCache;
    use crate::config::EngineConfig;
    use crate::recommendation::domain::{BookItem, Genre, GenreId};
    use crate::recommendation::repository::InMemoryRepository;
    use std::collections::HashSet as StdHashSet;
    use uuid::Uuid;

    fn item_id(n: u128) -> ItemId {
        ItemId(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn s2_cf_minimal_contains_b2() {
        let repo = InMemoryRepository::new();
        let genre_id = GenreId(1);
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
        let (b1, b2) = (item_id(1), item_id(2));
        repo.seed_rating(UserId(1), b1, 9);
        repo.seed_rating(UserId(1), b2, 10);
        repo.seed_rating(UserId(2), b1, 8);
        repo.seed_rating(UserId(2), b2, 9);
        repo.seed_rating(UserId(3), b1, 10);

        let cache = InMemoryCache::new();
        let config = EngineConfig::default();
        let already_rated = StdHashSet::from([b1]);
        let recs = cf_recs(
            &repo,
            &cache,
            UserId(3),
            ItemKind::Book,
            10,
            &already_rated,
            config.shrinkage,
            config.item_similarity_ttl,
        )
        .await;
        assert!(recs.iter().any(|(_, item)| item.id() == b2));
    }

    #[tokio::test]
    async fn already_rated_items_never_returned_p4() {
        let repo = InMemoryRepository::new();
        let genre_id = GenreId(1);
        repo.add_genre(Genre {
            id: genre_id,
            name: "g".to_string(),
            kind: ItemKind::Book,
        });
        for n in 1..=2u128 {
            repo.add_item(Item::Book(BookItem {
                id: item_id(n),
                title: format!("b{n}"),
                genres: StdHashSet::from([genre_id]),
                author: "a".to_string(),
                language: "en".to_string(),
                liked_percent: 50,
            }));
        }
        let (b1, b2) = (item_id(1), item_id(2));
        repo.seed_rating(UserId(1), b1, 9);
        repo.seed_rating(UserId(1), b2, 9);
        repo.seed_rating(UserId(2), b1, 8);
        repo.seed_rating(UserId(2), b2, 8);

        let cache = InMemoryCache::new();
        let config = EngineConfig::default();
        let already_rated = StdHashSet::from([b2]);
        let recs = cf_recs(
            &repo,
            &cache,
            UserId(2),
            ItemKind::Book,
            10,
            &already_rated,
            config.shrinkage,
            config.item_similarity_ttl,
        )
        .await;
        assert!(!recs.iter().any(|(_, item)| item.id() == b2));
    }

    #[tokio::test]
    async fn no_high_ratings_yields_empty() {
        let repo = InMemoryRepository::new();
        let cache = InMemoryCache::new();
        let config = EngineConfig::default();
        let recs = cf_recs(
            &repo,
            &cache,
            UserId(1),
            ItemKind::Book,
            10,
            &StdHashSet::new(),
            config.shrinkage,
            config.item_similarity_ttl,
        )
        .await;
        assert!(recs.is_empty());
    }
}
