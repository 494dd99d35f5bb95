//! Content scorer (C4): from a genre→weight map, produce candidate items
//! with a relativity score in `[0,100]`.
//!
//! Grounded on `original_source/myutils/content_based_filtering.py`'s four
//! helpers (`_sort_and_select_top_genres`, `_gather_recommendation_candidates`,
//! `_calculate_media_recommendation_score`, `_normalize_and_format_scores`),
//! distilled verbatim into spec.md §4.4.

use crate::recommendation::domain::{GenreId, Item, ItemKind};
use crate::recommendation::repository::ItemRepository;
use crate::recommendation::scoring::{clamp_to, round_to};
use std::collections::HashMap;

/// `scoring_fn = None` defaults to identity over the preference value —
/// confirmed from public-endpoint usage and spec.md §9(c).
pub type ScoringFn<'a> = dyn Fn(GenreId, f64) -> f64 + Send + Sync + 'a;

pub struct ContentScorerParams<'a> {
    pub max_num_genres: usize,
    pub max_items_per_genre: usize,
    pub scoring_fn: Option<&'a ScoringFn<'a>>,
    pub relativity_decimals: u32,
    pub default_pref: f64,
    pub item_kind: ItemKind,
}

/// Runs the content scorer against `needed` (a user's interest per genre,
/// keyed by genre id). Empty `needed` yields empty output (S3).
pub async fn content_scores<R: ItemRepository>(
    repo: &R,
    needed: &HashMap<GenreId, f64>,
    params: &ContentScorerParams<'_>,
) -> Vec<(f64, Item)> {
    if needed.is_empty() {
        return Vec::new();
    }

    // Step 1: pick top genres by value, descending.
    let mut ranked: Vec<(GenreId, f64)> = needed.iter().map(|(g, v)| (*g, *v)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(params.max_num_genres);

    // Step 2: gather up to `max_items_per_genre` candidates per top genre,
    // deduplicated across genres by item id.
    let mut seen = std::collections::HashSet::new();
    let mut candidates: Vec<Item> = Vec::new();
    for (genre_id, _) in &ranked {
        let items = repo
            .items_by_genre(*genre_id, params.item_kind, params.max_items_per_genre)
            .await;
        for item in items {
            if seen.insert(item.id()) {
                candidates.push(item);
            }
        }
    }

    // Step 3: score each candidate.
    let scoring_fn: &ScoringFn = params.scoring_fn.unwrap_or(&|_genre_id, pref| pref);
    let scored: Vec<(f64, Item)> = candidates
        .into_iter()
        .map(|item| {
            let raw: f64 = item
                .genres()
                .iter()
                .map(|g| scoring_fn(*g, *needed.get(g).unwrap_or(&params.default_pref)))
                .sum();
            (raw.max(0.0), item)
        })
        .collect();

    // Step 4: normalize against the observed maximum (substituting 1 when
    // the maximum is 0, per spec.md §9(b) — this makes every relativity 0).
    let max_raw = scored.iter().map(|(s, _)| *s).fold(0.0_f64, f64::max);
    let s_max = if max_raw == 0.0 { 1.0 } else { max_raw };

    scored
        .into_iter()
        .map(|(raw, item)| {
            let relativity = clamp_to(
                round_to(raw / s_max * 100.0, params.relativity_decimals),
                0.0,
                100.0,
            );
            (relativity, item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::domain::{BookItem, Genre, ItemId};
    use crate::recommendation::repository::InMemoryRepository;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn item_id(n: u128) -> ItemId {
        ItemId(Uuid::from_u128(n))
    }

    fn default_params(item_kind: ItemKind) -> ContentScorerParams<'static> {
        ContentScorerParams {
            max_num_genres: 5,
            max_items_per_genre: 6,
            scoring_fn: None,
            relativity_decimals: 2,
            default_pref: 6.0,
            item_kind,
        }
    }

    #[tokio::test]
    async fn empty_needed_yields_empty_output_s3() {
        let repo = InMemoryRepository::new();
        let needed = HashMap::new();
        let params = default_params(ItemKind::Book);
        let out = content_scores(&repo, &needed, &params).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn zero_max_score_yields_zero_relativities() {
        // S9(b): when every candidate raw score is 0 (e.g. a genre whose
        // preference value is itself 0 and scoring_fn is identity), the
        // normalizer substitutes 1 and every relativity collapses to 0.
        let repo = InMemoryRepository::new();
        let genre_id = GenreId(1);
        repo.add_genre(Genre {
            id: genre_id,
            name: "Horror".to_string(),
            kind: ItemKind::Book,
        });
        repo.add_item(Item::Book(BookItem {
            id: item_id(1),
            title: "a".to_string(),
            genres: HashSet::from([genre_id]),
            author: "author".to_string(),
            language: "en".to_string(),
            liked_percent: 10,
        }));
        let needed: HashMap<GenreId, f64> = [(genre_id, 0.0)].into_iter().collect();
        let params = default_params(ItemKind::Book);
        let out = content_scores(&repo, &needed, &params).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, 0.0);
    }

    #[tokio::test]
    async fn relativity_is_bounded_0_to_100() {
        let repo = InMemoryRepository::new();
        let genre_id = GenreId(1);
        repo.add_genre(Genre {
            id: genre_id,
            name: "Sci-Fi".to_string(),
            kind: ItemKind::Book,
        });
        for i in 1..=3u128 {
            repo.add_item(Item::Book(BookItem {
                id: item_id(i),
                title: format!("book-{i}"),
                genres: HashSet::from([genre_id]),
                author: "author".to_string(),
                language: "en".to_string(),
                liked_percent: 50,
            }));
        }
        let needed: HashMap<GenreId, f64> = [(genre_id, 9.0)].into_iter().collect();
        let params = default_params(ItemKind::Book);
        let out = content_scores(&repo, &needed, &params).await;
        for (relativity, _) in &out {
            assert!((0.0..=100.0).contains(relativity));
        }
    }
}
