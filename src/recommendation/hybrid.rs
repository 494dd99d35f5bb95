//! Hybrid fusion and request orchestration (C9): blends content and
//! collaborative scores with an adaptive weight, resolves public genre-name
//! input against the catalog, and wires every other component into the two
//! request shapes spec.md §6 exposes.
//!
//! Genre-name resolution grounded on `original_source/api_mixins.py::_resolve_genres`'s
//! three-tier match (exact, normalized, substring). Call-graph order for
//! both request kinds grounded on spec.md §4.9, which is itself distilled
//! from `original_source/recommendations/views.py`'s two endpoint handlers.

use crate::error::{Error, Result};
use crate::recommendation::cache::{keys, Cache};
use crate::recommendation::cold_start;
use crate::recommendation::collaborative;
use crate::recommendation::content::{self, ContentScorerParams};
use crate::recommendation::domain::{GenreId, Item, ItemId, ItemKind, UserId};
use crate::recommendation::repository::{ItemRepository, PreferenceRepository, RatingRepository};
use crate::recommendation::scoring::{clamp01, clamp_to, rescale, round_to, topk_stable};
use crate::recommendation::signals;
use crate::recommendation::similarity;
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

const MAX_NUM_GENRES: usize = 5;
const MAX_ITEMS_PER_GENRE: usize = 6;
const RELATIVITY_DECIMALS: u32 = 2;
const DEFAULT_PREF: f64 = 0.0;
const PUBLIC_DEFAULT_PREF: f64 = 6.0;

/// §4.4/§4.9's public scoring transform: a genre weight clamped to `[1,10]`,
/// rescaled to `[-5,5]`, then scaled by 20 — distinct from the private
/// path's identity `scoring_fn`, which uses a user's raw derived preference
/// value.
fn public_scoring_fn(_genre_id: GenreId, value: f64) -> f64 {
    rescale(clamp_to(value, 1.0, 10.0), (1.0, 10.0), (-5.0, 5.0)) * 20.0
}

/// `alpha(rating_count, cf_weight, threshold)`: the content-side weight in
/// the blend. 1 when a user has no ratings yet, shrinking toward
/// `1 - cf_weight` as `rating_count` approaches `threshold` (§4.9).
pub fn alpha(rating_count: usize, cf_weight: f64, threshold: f64) -> f64 {
    let ratio = if threshold <= 0.0 {
        1.0
    } else {
        (rating_count as f64 / threshold).min(1.0)
    };
    round_to(1.0 - ratio * cf_weight, 4)
}

/// Weighted blend of a content score and a CF score, both already on a
/// `[0,100]` scale.
pub fn blend(content_score: f64, cf_score: f64, alpha: f64) -> f64 {
    round_to(alpha * content_score + (1.0 - alpha) * cf_score, RELATIVITY_DECIMALS)
}

/// Resolve a single genre name to its id using the three-tier match:
/// exact case-insensitive, then alphanumeric-normalized, then substring.
/// Ambiguity at any tier (more than one candidate) is reported as ambiguous
/// rather than falling through to the next tier.
fn resolve_one(name: &str, catalog: &[crate::recommendation::domain::Genre]) -> ResolveOutcome {
    let lower = name.to_lowercase();
    let exact: Vec<_> = catalog.iter().filter(|g| g.name.to_lowercase() == lower).collect();
    if exact.len() == 1 {
        return ResolveOutcome::Found(exact[0].id);
    }
    if exact.len() > 1 {
        return ResolveOutcome::Ambiguous;
    }

    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect()
    };
    let normalized_name = normalize(name);
    let normalized: Vec<_> = catalog
        .iter()
        .filter(|g| normalize(&g.name) == normalized_name)
        .collect();
    if normalized.len() == 1 {
        return ResolveOutcome::Found(normalized[0].id);
    }
    if normalized.len() > 1 {
        return ResolveOutcome::Ambiguous;
    }

    let substring: Vec<_> = catalog
        .iter()
        .filter(|g| g.name.to_lowercase().contains(&lower))
        .collect();
    match substring.len() {
        0 => ResolveOutcome::NotFound,
        1 => ResolveOutcome::Found(substring[0].id),
        _ => ResolveOutcome::Ambiguous,
    }
}

enum ResolveOutcome {
    Found(GenreId),
    NotFound,
    Ambiguous,
}

/// Resolve every name in `weights` against the catalog's genre taxonomy for
/// `kind`. All-or-nothing: any unresolved or ambiguous name aborts the whole
/// request with every failure reported at once (§7).
pub async fn resolve_genres<R: ItemRepository>(
    repo: &R,
    kind: ItemKind,
    weights: &HashMap<String, f64>,
) -> Result<HashMap<GenreId, f64>> {
    let catalog = repo.genres(kind).await;
    let mut resolved = HashMap::new();
    let mut not_found = Vec::new();
    let mut ambiguous = Vec::new();

    for (name, weight) in weights {
        match resolve_one(name, &catalog) {
            ResolveOutcome::Found(genre_id) => {
                resolved.insert(genre_id, *weight);
            }
            ResolveOutcome::NotFound => not_found.push(name.clone()),
            ResolveOutcome::Ambiguous => ambiguous.push(name.clone()),
        }
    }

    if !not_found.is_empty() || !ambiguous.is_empty() {
        let mut available_genres: Vec<String> = catalog.into_iter().map(|g| g.name).collect();
        available_genres.sort();
        return Err(Error::GenreUnresolved {
            not_found,
            ambiguous,
            available_genres,
        });
    }

    Ok(resolved)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRecommendationRequest {
    pub kind: ItemKind,
    pub genre_weights: HashMap<String, f64>,
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub item_id: ItemId,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub length: usize,
    pub data: BTreeMap<String, RecommendationEntry>,
}

fn to_response(ranked: Vec<(f64, ItemId, Item)>) -> RecommendationResponse {
    let mut data = BTreeMap::new();
    for (index, (score, item_id, item)) in ranked.into_iter().enumerate() {
        data.insert(
            index.to_string(),
            RecommendationEntry {
                item_id,
                title: item.title().to_string(),
                score,
            },
        );
    }
    RecommendationResponse {
        length: data.len(),
        data,
    }
}

/// C9 public path: content-only scoring against caller-supplied genre
/// weights, genre names resolved against the catalog first. No CF, no
/// feature-signal bonus, no cold-start fallback — the caller is not a known
/// user (§4.9 public call graph).
pub async fn public_request<R: ItemRepository>(
    repo: &R,
    request: &PublicRecommendationRequest,
) -> Result<RecommendationResponse> {
    let needed = resolve_genres(repo, request.kind, &request.genre_weights).await?;

    let params = ContentScorerParams {
        max_num_genres: MAX_NUM_GENRES,
        max_items_per_genre: MAX_ITEMS_PER_GENRE,
        scoring_fn: Some(&public_scoring_fn),
        relativity_decimals: RELATIVITY_DECIMALS,
        default_pref: PUBLIC_DEFAULT_PREF,
        item_kind: request.kind,
    };
    let scored = content::content_scores(repo, &needed, &params).await;

    let ranked = topk_stable(
        scored
            .into_iter()
            .map(|(score, item)| (score, item.id(), item))
            .collect(),
        request.top_n,
    );
    Ok(to_response(ranked))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrivateRecommendationRequest {
    pub kind: ItemKind,
    pub user_id: UserId,
    pub top_n: usize,
    pub enable_cf: bool,
}

/// C9 private path: known-user recommendations blending content and CF
/// (when enabled), cold-start fallback when the user has no derived
/// preferences yet, a new-item boost pass (only when CF is enabled, per the
/// §4.9 call graph), and a feature-signal bonus applied on every item
/// regardless of CF.
pub async fn private_request<R>(
    repo: &R,
    cache: &dyn Cache,
    config: &EngineConfig,
    request: &PrivateRecommendationRequest,
) -> Result<RecommendationResponse>
where
    R: ItemRepository + RatingRepository + PreferenceRepository,
{
    let cache_key = keys::rec(request.kind, request.user_id);
    if let Some(raw) = cache.get(&cache_key).await {
        if let Ok(cached) = serde_json::from_str::<RecommendationResponse>(&raw) {
            return Ok(cached);
        }
    }

    let prefs: HashMap<GenreId, f64> = repo
        .user_preferences(request.user_id, request.kind)
        .await
        .into_iter()
        .collect();

    let already_rated: HashSet<ItemId> = repo
        .user_ratings(request.user_id, request.kind)
        .await
        .into_iter()
        .map(|(item_id, _)| item_id)
        .collect();

    let combined: Vec<(f64, Item)> = if prefs.is_empty() {
        cold_start::popular_by_genre(repo, request.kind, &prefs, request.top_n * 3).await
    } else {
        let params = ContentScorerParams {
            max_num_genres: MAX_NUM_GENRES,
            max_items_per_genre: MAX_ITEMS_PER_GENRE,
            scoring_fn: None,
            relativity_decimals: RELATIVITY_DECIMALS,
            default_pref: DEFAULT_PREF,
            item_kind: request.kind,
        };
        let content_scored = content::content_scores(repo, &prefs, &params).await;

        if request.enable_cf {
            let rating_count = repo.user_ratings(request.user_id, request.kind).await.len();
            let a = alpha(rating_count, config.cf_weight, config.cf_weight_threshold);

            let cf_scored = collaborative::cf_recs(
                repo,
                cache,
                request.user_id,
                request.kind,
                request.top_n * 3,
                &already_rated,
                config.shrinkage,
                config.item_similarity_ttl,
            )
            .await;
            let cf_by_id: HashMap<ItemId, f64> =
                cf_scored.iter().map(|(score, item)| (item.id(), *score)).collect();
            let content_by_id: HashMap<ItemId, f64> =
                content_scored.iter().map(|(score, item)| (item.id(), *score)).collect();

            // Union of content and CF candidates — an item with a CF score
            // but no content score (or vice versa) still gets blended
            // against a 0 on the side it's missing from (§4.9).
            let mut items_by_id: HashMap<ItemId, Item> = HashMap::new();
            for (_, item) in &content_scored {
                items_by_id.entry(item.id()).or_insert_with(|| item.clone());
            }
            for (_, item) in &cf_scored {
                items_by_id.entry(item.id()).or_insert_with(|| item.clone());
            }

            let blended: Vec<(f64, Item)> = items_by_id
                .into_iter()
                .map(|(item_id, item)| {
                    let content_score = content_by_id.get(&item_id).copied().unwrap_or(0.0);
                    let cf_score = cf_by_id.get(&item_id).copied().unwrap_or(0.0);
                    (blend(content_score, cf_score, a), item)
                })
                .collect();

            cold_start::boost_new_items(
                repo,
                blended,
                &prefs,
                request.kind,
                config.min_ratings,
                config.boost_factor,
                config.max_boosted,
            )
            .await
        } else {
            content_scored
        }
    };

    let mut with_signals = Vec::with_capacity(combined.len());
    for (score, item) in combined {
        if already_rated.contains(&item.id()) {
            continue;
        }
        let bonus = signals::signal_bonus(repo, request.user_id, &item, request.kind).await;
        with_signals.push((clamp01((score + bonus) / 100.0) * 100.0, item));
    }

    let ranked = topk_stable(
        with_signals
            .into_iter()
            .map(|(score, item)| (score, item.id(), item))
            .collect(),
        request.top_n,
    );
    let response = to_response(ranked);

    if let Ok(serialized) = serde_json::to_string(&response) {
        cache.set(&cache_key, serialized, config.recommendation_ttl).await;
    }

    Ok(response)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingWriteRequest {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub value: u8,
}

/// §6's "Rating write" five-step contract: validate (delegated to
/// `upsert_rating`'s I1 check) → upsert → invalidate the user's cached
/// recommendation and preference results → re-derive preferences (§4.3) →
/// invalidate the touched item's cached similarity lists (§4.5
/// "Invalidation"), since a changed rating can change who is similar to it.
pub async fn write_rating<R>(
    repo: &R,
    cache: &dyn Cache,
    config: &EngineConfig,
    request: &RatingWriteRequest,
) -> Result<()>
where
    R: ItemRepository + RatingRepository + PreferenceRepository,
{
    repo.upsert_rating(request.user_id, request.item_id, request.kind, request.value)
        .await?;

    cache.invalidate(&keys::rec(request.kind, request.user_id)).await;
    cache.invalidate(&keys::prefs(request.kind, request.user_id)).await;

    crate::recommendation::preferences::derive_and_persist(repo, cache, request.user_id, request.kind)
        .await?;

    similarity::invalidate(cache, request.item_id, request.kind, config.shrinkage).await;

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenrePreferenceEntry {
    pub genre_id: GenreId,
    pub preference: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesResponse {
    pub books: Vec<GenrePreferenceEntry>,
    pub media: Vec<GenrePreferenceEntry>,
}

/// A user's current preference vector across both taxonomies, descending by
/// preference within each.
pub async fn preferences_response<R: PreferenceRepository>(
    repo: &R,
    user_id: UserId,
) -> PreferencesResponse {
    let to_entries = |prefs: Vec<(GenreId, f64)>| -> Vec<GenrePreferenceEntry> {
        prefs
            .into_iter()
            .map(|(genre_id, preference)| GenrePreferenceEntry { genre_id, preference })
            .collect()
    };
    PreferencesResponse {
        books: to_entries(repo.user_preferences(user_id, ItemKind::Book).await),
        media: to_entries(repo.user_preferences(user_id, ItemKind::Media).await),
    }
}
