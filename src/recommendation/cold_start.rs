//! Cold-start module (C7): genre-filtered popularity fallback, and a boost
//! for under-rated items so the catalog's long tail stays reachable.
//!
//! Grounded on `original_source/myutils/cold_start.py::get_popular_by_genre`
//! /`boost_new_items` verbatim, including the exact constants spec.md §4.7
//! distills them to. The original queries a concrete item-model table
//! directly (`item_model.objects.filter(genre__pk__in=...)`); since C1 only
//! exposes `items_by_genre` per single genre, this implementation unions
//! per-genre candidate lists (or, with no genre preference, unions across
//! every genre in the taxonomy) and re-sorts — behaviourally equivalent
//! given every catalog item carries at least one genre (see DESIGN.md).

use crate::recommendation::domain::{GenreId, Item, ItemKind};
use crate::recommendation::repository::ItemRepository;
use crate::recommendation::scoring::{clamp_to, round_to};
use std::collections::{HashMap, HashSet};

const MEDIA_YEAR_FLOOR: f64 = 1970.0;
const MEDIA_YEAR_CEILING: f64 = 2026.0;

fn popularity_score(item: &Item) -> f64 {
    match item {
        Item::Book(b) => b.liked_percent as f64,
        Item::Media(m) => round_to(
            clamp_to(
                (m.start_year as f64 - MEDIA_YEAR_FLOOR) / (MEDIA_YEAR_CEILING - MEDIA_YEAR_FLOOR)
                    * 100.0,
                0.0,
                100.0,
            ),
            2,
        ),
    }
}

/// Popular items overall, or within the genres a user already prefers.
/// Descending by score.
pub async fn popular_by_genre<R: ItemRepository>(
    repo: &R,
    kind: ItemKind,
    genre_prefs: &HashMap<GenreId, f64>,
    limit: usize,
) -> Vec<(f64, Item)> {
    let candidate_genres: Vec<GenreId> = if genre_prefs.is_empty() {
        repo.genres(kind).await.into_iter().map(|g| g.id).collect()
    } else {
        genre_prefs.keys().copied().collect()
    };

    let mut seen = HashSet::new();
    let mut candidates: Vec<Item> = Vec::new();
    for genre_id in candidate_genres {
        for item in repo.items_by_genre(genre_id, kind, limit).await {
            if seen.insert(item.id()) {
                candidates.push(item);
            }
        }
    }

    let mut scored: Vec<(f64, Item)> = candidates
        .into_iter()
        .map(|item| (popularity_score(&item), item))
        .collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.id().cmp(&b.1.id()))
    });
    scored.truncate(limit);
    scored
}

/// Inject under-rated items with genre overlap against `genre_prefs`, re-sort
/// descending. A no-op when `genre_prefs` is empty.
pub async fn boost_new_items<R: ItemRepository>(
    repo: &R,
    recommendations: Vec<(f64, Item)>,
    genre_prefs: &HashMap<GenreId, f64>,
    kind: ItemKind,
    min_ratings: u32,
    boost_factor: f64,
    max_boosted: usize,
) -> Vec<(f64, Item)> {
    if genre_prefs.is_empty() {
        return recommendations;
    }

    let existing: HashSet<_> = recommendations.iter().map(|(_, item)| item.id()).collect();
    let genre_keys: HashSet<GenreId> = genre_prefs.keys().copied().collect();

    let scan = repo
        .items_with_rating_count_lt(kind, min_ratings, max_boosted * 3)
        .await;

    let mut boosted: Vec<(f64, Item)> = Vec::new();
    for item in scan {
        if boosted.len() >= max_boosted {
            break;
        }
        if existing.contains(&item.id()) {
            continue;
        }
        let overlap = item.genres().intersection(&genre_keys).count();
        if overlap == 0 {
            continue;
        }
        let bonus = round_to(
            boost_factor * overlap as f64 / (item.genres().len().max(1) as f64),
            2,
        );
        boosted.push((bonus, item));
    }

    let mut combined = recommendations;
    combined.extend(boosted);
    combined.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.id().cmp(&b.1.id()))
    });
    combined
}
