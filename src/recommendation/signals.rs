//! Feature-signal bonus layer (C8): a small, capped additive bonus on top of
//! the blended hybrid score, from signals outside the genre/CF model.
//!
//! Grounded on `original_source/myutils/feature_signals.py`'s five signal
//! functions, distilled into spec.md §4.8. Applied only on the private
//! request path (§4.9 call graph), never on the public one — see DESIGN.md's
//! C9 entry.

use crate::recommendation::domain::{GenreId, Item, ItemKind, UserId};
use crate::recommendation::repository::{ItemRepository, PreferenceRepository, RatingRepository};
use crate::recommendation::scoring::clamp_to;
use std::collections::{BTreeMap, HashMap};

pub const MAX_SIGNAL_BONUS: f64 = 30.0;

const POPULARITY_WEIGHT: f64 = 10.0;
const RECENCY_WEIGHT: f64 = 8.0;
const AUTHOR_AFFINITY_WEIGHT: f64 = 12.0;
const LANGUAGE_PREF_WEIGHT: f64 = 5.0;
const MEDIA_TYPE_WEIGHT: f64 = 8.0;

const AUTHOR_AFFINITY_MIN_COUNT: u32 = 2;
const AUTHOR_AFFINITY_MIN_AVERAGE: f64 = 7.0;
const TASTE_MODE_MIN_RATING: u8 = 7;

const RECENCY_FLOOR_YEAR: i32 = 1970;
const RECENCY_CEILING_YEAR: i32 = 2026;

/// The genre-weighted, author/language/media-type/popularity/recency signal
/// bonus for `item` as seen by `user_id`, capped at `MAX_SIGNAL_BONUS`.
pub async fn signal_bonus<R>(repo: &R, user_id: UserId, item: &Item, kind: ItemKind) -> f64
where
    R: ItemRepository + RatingRepository + PreferenceRepository,
{
    let mut bonus = popularity_signal(item);
    bonus += recency_signal(item);

    match item {
        crate::recommendation::domain::Item::Book(book) => {
            bonus += author_affinity_signal(repo, user_id, book, kind).await;
            bonus += language_preference_signal(repo, user_id, book, kind).await;
        }
        crate::recommendation::domain::Item::Media(media) => {
            bonus += media_type_match_signal(repo, user_id, media, kind).await;
        }
    }

    clamp_to(bonus, 0.0, MAX_SIGNAL_BONUS)
}

/// `clamp(likedPercent/100, 0, 1) * POPULARITY_WEIGHT`, books only — media
/// has no liked-percent field (§4.8).
fn popularity_signal(item: &Item) -> f64 {
    match item {
        Item::Book(book) => clamp_to(book.liked_percent as f64 / 100.0, 0.0, 1.0) * POPULARITY_WEIGHT,
        Item::Media(_) => 0.0,
    }
}

fn recency_signal(item: &Item) -> f64 {
    let year = match item {
        Item::Book(_) => return 0.0,
        Item::Media(m) => m.start_year,
    };
    let span = (RECENCY_CEILING_YEAR - RECENCY_FLOOR_YEAR) as f64;
    let frac = clamp_to((year - RECENCY_FLOOR_YEAR) as f64 / span, 0.0, 1.0);
    frac * RECENCY_WEIGHT
}

/// Binary: 1 if the user has rated at least `AUTHOR_AFFINITY_MIN_COUNT` books
/// by this author with an average rating of at least
/// `AUTHOR_AFFINITY_MIN_AVERAGE`, else 0 (§4.8).
async fn author_affinity_signal<R: RatingRepository + ItemRepository>(
    repo: &R,
    user_id: UserId,
    book: &crate::recommendation::domain::BookItem,
    kind: ItemKind,
) -> f64 {
    let ratings = repo.user_ratings(user_id, kind).await;
    let mut count = 0u32;
    let mut sum = 0u32;
    for (other_item_id, value) in ratings {
        if let Some(other) = repo.item(other_item_id).await {
            if let Some(other_book) = other.as_book() {
                if other_book.author == book.author {
                    count += 1;
                    sum += value as u32;
                }
            }
        }
    }
    if count >= AUTHOR_AFFINITY_MIN_COUNT && (sum as f64 / count as f64) >= AUTHOR_AFFINITY_MIN_AVERAGE {
        AUTHOR_AFFINITY_WEIGHT
    } else {
        0.0
    }
}

/// Binary: 1 if `book`'s language equals the user's most-frequent language
/// among books they rated `TASTE_MODE_MIN_RATING` or above, else 0 (§4.8).
async fn language_preference_signal<R: RatingRepository + ItemRepository>(
    repo: &R,
    user_id: UserId,
    book: &crate::recommendation::domain::BookItem,
    kind: ItemKind,
) -> f64 {
    let ratings = repo.user_ratings(user_id, kind).await;
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for (other_item_id, value) in &ratings {
        if *value < TASTE_MODE_MIN_RATING {
            continue;
        }
        if let Some(other) = repo.item(*other_item_id).await {
            if let Some(other_book) = other.as_book() {
                *counts.entry(other_book.language.clone()).or_insert(0) += 1;
            }
        }
    }
    match mode_key(&counts) {
        Some(lang) if lang == book.language => LANGUAGE_PREF_WEIGHT,
        _ => 0.0,
    }
}

/// Binary: 1 if `media`'s type equals the user's most-frequent media type
/// among items they rated `TASTE_MODE_MIN_RATING` or above, else 0 (§4.8).
async fn media_type_match_signal<R: RatingRepository + ItemRepository>(
    repo: &R,
    user_id: UserId,
    media: &crate::recommendation::domain::MediaItem,
    kind: ItemKind,
) -> f64 {
    let ratings = repo.user_ratings(user_id, kind).await;
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for (other_item_id, value) in ratings {
        if value < TASTE_MODE_MIN_RATING {
            continue;
        }
        if let Some(other) = repo.item(other_item_id).await {
            if let Some(other_media) = other.as_media() {
                *counts.entry(other_media.media_type.clone()).or_insert(0) += 1;
            }
        }
    }
    match mode_key(&counts) {
        Some(media_type) if media_type == media.media_type => MEDIA_TYPE_WEIGHT,
        _ => 0.0,
    }
}

/// The key with the highest count, breaking ties in favor of the
/// lexicographically smallest key (iteration order is ascending since
/// `counts` is a `BTreeMap`).
fn mode_key(counts: &BTreeMap<String, u32>) -> Option<String> {
    let mut best: Option<(&String, u32)> = None;
    for (key, count) in counts {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((key, *count));
        }
    }
    best.map(|(key, _)| key.clone())
}

/// Resolve a genre preference map's preference value for `genre_id`, with
/// `default` when absent. Small helper shared across signal callers that
/// need to fall back consistently (spec.md §9(c)).
pub fn preference_or_default(prefs: &HashMap<GenreId, f64>, genre_id: GenreId, default: f64) -> f64 {
    prefs.get(&genre_id).copied().unwrap_or(default)
}
