//! Offline evaluation (C10): deterministic train/test split over the
//! rating set, ranking-quality metrics, and a bounded-concurrency batch
//! runner over every user in the split.
//!
//! Split and metrics grounded on `original_source/myutils/evaluation.py`.
//! The batch runner's concurrency shape is grounded on the teacher's
//! `recommendation/updater.rs::update_all_recommendations` (`JoinSet` +
//! `Arc<Semaphore>`), generalized from a warm-up fan-out over a Postgres
//! pool to a fan-out over `evaluate_one_user` calls against the repository
//! trait.

use crate::recommendation::cache::Cache;
use crate::recommendation::cold_start;
use crate::recommendation::domain::{ItemId, ItemKind, UserId};
use crate::recommendation::hybrid::{self, PrivateRecommendationRequest};
use crate::recommendation::repository::{InMemoryRepository, ItemRepository, PreferenceRepository, RatingRepository};
use crate::config::EngineConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One user's ratings split into a training set (left in the repository
/// view passed to the engine) and a held-out test set (items the user
/// actually liked, used to judge recommendation quality).
#[derive(Debug, Clone)]
pub struct UserSplit {
    pub user_id: UserId,
    pub train: Vec<(ItemId, u8)>,
    pub test: Vec<(ItemId, u8)>,
}

/// Deterministic per-user train/test split: a manual Fisher-Yates shuffle
/// driven by `StdRng::seed_from_u64(seed)`, not `SliceRandom::shuffle` --
/// pinning the exact algorithm to this module rather than to whatever
/// `rand` happens to implement in a given crate version, so a fixed seed
/// reproduces the same split across `rand` upgrades.
pub fn train_test_split(
    ratings_by_user: &HashMap<UserId, Vec<(ItemId, u8)>>,
    test_fraction: f64,
    seed: u64,
) -> Vec<UserSplit> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut splits = Vec::with_capacity(ratings_by_user.len());

    let mut user_ids: Vec<UserId> = ratings_by_user.keys().copied().collect();
    user_ids.sort();

    for user_id in user_ids {
        let mut items = ratings_by_user[&user_id].clone();
        items.sort_by_key(|(item_id, _)| *item_id);
        fisher_yates_shuffle(&mut items, &mut rng);

        let test_len = ((items.len() as f64) * test_fraction).round() as usize;
        let test_len = test_len.min(items.len());
        let (train, test) = items.split_at(items.len() - test_len);

        splits.push(UserSplit {
            user_id,
            train: train.to_vec(),
            test: test.to_vec(),
        });
    }

    splits
}

fn fisher_yates_shuffle<T>(items: &mut [T], rng: &mut StdRng) {
    if items.len() < 2 {
        return;
    }
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Fraction of the top-`k` recommendations that appear in the held-out
/// relevant set.
pub fn precision_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    let top_k: Vec<&ItemId> = recommended.iter().take(k).collect();
    if top_k.is_empty() {
        return 0.0;
    }
    let hits = top_k.iter().filter(|id| relevant.contains(*id)).count();
    hits as f64 / top_k.len() as f64
}

/// Fraction of the held-out relevant set captured within the top-`k`
/// recommendations.
pub fn recall_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k: Vec<&ItemId> = recommended.iter().take(k).collect();
    let hits = top_k.iter().filter(|id| relevant.contains(*id)).count();
    hits as f64 / relevant.len() as f64
}

/// Discounted cumulative gain over the top-`k`, with binary relevance
/// (1.0 if the item is in `relevant`, else 0.0).
pub fn dcg_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    recommended
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, item_id)| {
            let gain = if relevant.contains(item_id) { 1.0 } else { 0.0 };
            gain / ((i as f64 + 2.0).log2())
        })
        .sum()
}

/// `dcg_at_k / ideal_dcg_at_k`, where the ideal orders every relevant item
/// first. Zero when `relevant` is empty.
pub fn ndcg_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let dcg = dcg_at_k(recommended, relevant, k);
    let ideal_hits = relevant.len().min(k);
    let ideal: f64 = (0..ideal_hits).map(|i| 1.0 / ((i as f64 + 2.0).log2())).sum();
    if ideal == 0.0 {
        0.0
    } else {
        dcg / ideal
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserMetrics {
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
}

/// Which recommendation strategy the batch runner evaluates (§6 CLI
/// surface): the full hybrid blend, content-only (no CF), or a
/// non-personalized popularity baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Hybrid,
    Content,
    Popularity,
}

/// Score one user's recommendations against their held-out test set, for
/// ratings valued `min_relevant_rating` or above (a user "liking" an item).
pub fn evaluate_recommendations(
    recommended: &[ItemId],
    test: &[(ItemId, u8)],
    k: usize,
    min_relevant_rating: u8,
) -> UserMetrics {
    let relevant: HashSet<ItemId> = test
        .iter()
        .filter(|(_, value)| *value >= min_relevant_rating)
        .map(|(item_id, _)| *item_id)
        .collect();

    UserMetrics {
        precision: precision_at_k(recommended, &relevant, k),
        recall: recall_at_k(recommended, &relevant, k),
        ndcg: ndcg_at_k(recommended, &relevant, k),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateMetrics {
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_ndcg: f64,
    pub users_evaluated: usize,
}

const BATCH_CONCURRENCY_LIMIT: usize = 10;

/// Run one user's recommendation + metric computation against a repository
/// view where only their `train` ratings are visible. Used by the batch
/// runner, spawned onto the `JoinSet` below.
async fn evaluate_one_user(
    repo: Arc<InMemoryRepository>,
    cache: Arc<dyn Cache>,
    config: Arc<EngineConfig>,
    kind: ItemKind,
    mode: EvaluationMode,
    split: UserSplit,
    k: usize,
    min_relevant_rating: u8,
) -> (UserId, Option<UserMetrics>) {
    let recommended: Vec<ItemId> = match mode {
        EvaluationMode::Popularity => {
            let already_rated: HashSet<ItemId> = split.train.iter().map(|(item_id, _)| *item_id).collect();
            let popular =
                cold_start::popular_by_genre(repo.as_ref(), kind, &HashMap::new(), k + already_rated.len()).await;
            popular
                .into_iter()
                .map(|(_, item)| item.id())
                .filter(|item_id| !already_rated.contains(item_id))
                .take(k)
                .collect()
        }
        EvaluationMode::Hybrid | EvaluationMode::Content => {
            let request = PrivateRecommendationRequest {
                kind,
                user_id: split.user_id,
                top_n: k,
                enable_cf: mode == EvaluationMode::Hybrid,
            };
            match hybrid::private_request(repo.as_ref(), cache.as_ref(), config.as_ref(), &request).await {
                Ok(response) => {
                    let mut entries: Vec<_> = response.data.into_values().collect();
                    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                    entries.into_iter().map(|entry| entry.item_id).collect()
                }
                Err(err) => {
                    warn!(user_id = split.user_id.0, error = %err, "evaluation request failed for user");
                    return (split.user_id, None);
                }
            }
        }
    };
    let metrics = evaluate_recommendations(&recommended, &split.test, k, min_relevant_rating);
    (split.user_id, Some(metrics))
}

/// Evaluate every user in `splits` concurrently, bounded to
/// `BATCH_CONCURRENCY_LIMIT` in-flight requests at a time, and aggregate the
/// per-user metrics into a mean. Repository must already contain only the
/// `train` side of each split (the caller builds that view); `splits`
/// additionally carries each user's held-out `test` set for scoring.
///
/// `cancellation` is checked before each user is spawned (§5 "Cancellation &
/// timeouts"): once cancelled, no new work is spawned, but in-flight tasks
/// run to completion and their results are still aggregated. Pass
/// `CancellationToken::new()` when the caller has no cancellation source.
pub async fn run_batch_evaluation(
    repo: Arc<InMemoryRepository>,
    cache: Arc<dyn Cache>,
    config: Arc<EngineConfig>,
    kind: ItemKind,
    mode: EvaluationMode,
    splits: Vec<UserSplit>,
    k: usize,
    min_relevant_rating: u8,
    cancellation: CancellationToken,
) -> AggregateMetrics {
    let semaphore = Arc::new(Semaphore::new(BATCH_CONCURRENCY_LIMIT));
    let mut set = JoinSet::new();
    let total = splits.len();
    let mut spawned = 0;

    for split in splits {
        if cancellation.is_cancelled() {
            warn!(spawned, total, "batch evaluation cancelled, skipping remaining users");
            break;
        }
        let repo = repo.clone();
        let cache = cache.clone();
        let config = config.clone();
        let permit = semaphore.clone().acquire_owned().await.unwrap();

        set.spawn(async move {
            let _permit = permit;
            evaluate_one_user(repo, cache, config, kind, mode, split, k, min_relevant_rating).await
        });
        spawned += 1;
    }

    let mut precisions = Vec::new();
    let mut recalls = Vec::new();
    let mut ndcgs = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Some(metrics))) => {
                precisions.push(metrics.precision);
                recalls.push(metrics.recall);
                ndcgs.push(metrics.ndcg);
            }
            Ok((user_id, None)) => {
                warn!(user_id = user_id.0, "skipped user with failed evaluation");
            }
            Err(join_err) => warn!(error = %join_err, "evaluation task panicked"),
        }
    }

    let n = precisions.len();
    if n == 0 {
        return AggregateMetrics::default();
    }
    AggregateMetrics {
        mean_precision: precisions.iter().sum::<f64>() / n as f64,
        mean_recall: recalls.iter().sum::<f64>() / n as f64,
        mean_ndcg: ndcgs.iter().sum::<f64>() / n as f64,
        users_evaluated: n,
    }
}
