//! Offline evaluation CLI: seeds a deterministic synthetic catalog, splits
//! every user's ratings into train/test, and reports mean precision/recall/
//! nDCG at `k` over a bounded-concurrency batch run.
//!
//! `init_tracing` grounded on the teacher's `main.rs::init_tracing`.
//! `clap` derive usage confirmed as a corpus idiom via
//! `danielmriley-aigent`'s `Cargo.toml` (`clap = { version = "4.5", features
//! = ["derive"] }`).

use clap::{Parser, ValueEnum};
use recanthology::config::EngineConfig;
use recanthology::recommendation::cache::InMemoryCache;
use recanthology::recommendation::domain::ItemKind;
use recanthology::recommendation::evaluation::{run_batch_evaluation, train_test_split, EvaluationMode, UserSplit};
use recanthology::recommendation::repository::{InMemoryRepository, ItemRepository};
use recanthology::recommendation::seed;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Book,
    Media,
}

impl From<KindArg> for ItemKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Book => ItemKind::Book,
            KindArg::Media => ItemKind::Media,
        }
    }
}

/// Which recommendation strategy to evaluate (§6 CLI surface).
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Hybrid,
    Content,
    Popularity,
}

impl From<ModeArg> for EvaluationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Hybrid => EvaluationMode::Hybrid,
            ModeArg::Content => EvaluationMode::Content,
            ModeArg::Popularity => EvaluationMode::Popularity,
        }
    }
}

/// Evaluate the hybrid recommendation engine offline against a synthetic
/// catalog, reporting precision/recall/nDCG at `k`.
#[derive(Debug, Parser)]
#[command(name = "evaluate_engine", version, about)]
struct Cli {
    /// Which catalog taxonomy to evaluate.
    #[arg(long, value_enum, default_value_t = KindArg::Book)]
    kind: KindArg,

    /// Which recommendation strategy to evaluate.
    #[arg(long, value_enum, default_value_t = ModeArg::Hybrid)]
    mode: ModeArg,

    /// Cutoff rank for precision/recall/nDCG.
    #[arg(long, default_value_t = 10)]
    k: usize,

    /// Fraction of each user's ratings held out for testing.
    #[arg(long, default_value_t = 0.2)]
    split: f64,

    /// Seed driving both the synthetic catalog and the train/test split.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of synthetic users to generate.
    #[arg(long, default_value_t = 200)]
    users: u64,

    /// Number of synthetic items to generate per kind.
    #[arg(long, default_value_t = 150)]
    items: usize,

    /// Minimum rating value counted as "relevant" when scoring metrics.
    #[arg(long, default_value_t = 7)]
    min_relevant_rating: u8,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("recanthology=info,evaluate_engine=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let kind: ItemKind = cli.kind.into();
    let mode: EvaluationMode = cli.mode.into();

    info!(
        kind = kind.as_str(),
        mode = ?mode,
        k = cli.k,
        split = cli.split,
        seed = cli.seed,
        "starting offline evaluation"
    );

    let catalog = InMemoryRepository::new();
    let user_ids = seed::populate(&catalog, cli.seed, cli.users, cli.items);

    let mut ratings_by_user: HashMap<_, Vec<(_, u8)>> = HashMap::new();
    for (user_id, item_id, value) in catalog.all_ratings(kind) {
        ratings_by_user.entry(user_id).or_default().push((item_id, value));
    }

    let splits: Vec<UserSplit> = train_test_split(&ratings_by_user, cli.split, cli.seed)
        .into_iter()
        .filter(|split| !split.test.is_empty())
        .collect();

    if splits.is_empty() {
        info!("no users had a non-empty test split; nothing to evaluate");
        return std::process::ExitCode::FAILURE;
    }

    // Build a fresh repository view exposing only each user's training
    // ratings, so recommendations aren't computed against their held-out
    // test items (see train_test_split's doc comment).
    let train_view = InMemoryRepository::new();
    for genre in catalog.genres(kind).await {
        train_view.add_genre(genre);
    }
    for item_id in catalog.all_ratings(kind).into_iter().map(|(_, item_id, _)| item_id) {
        if let Some(item) = catalog.item(item_id).await {
            train_view.add_item(item);
        }
    }
    for split in &splits {
        for (item_id, value) in &split.train {
            train_view.seed_rating(split.user_id, *item_id, *value);
        }
    }

    info!(user_count = user_ids.len(), eligible_users = splits.len(), "running batch evaluation");

    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, winding down in-flight evaluation tasks");
            ctrl_c_token.cancel();
        }
    });

    let metrics = run_batch_evaluation(
        Arc::new(train_view),
        Arc::new(InMemoryCache::new()),
        Arc::new(EngineConfig::default()),
        kind,
        mode,
        splits,
        cli.k,
        cli.min_relevant_rating,
        cancellation,
    )
    .await;

    info!(
        users_evaluated = metrics.users_evaluated,
        mean_precision = metrics.mean_precision,
        mean_recall = metrics.mean_recall,
        mean_ndcg = metrics.mean_ndcg,
        "evaluation complete"
    );

    println!(
        "users_evaluated={} precision@{k}={:.4} recall@{k}={:.4} ndcg@{k}={:.4}",
        metrics.users_evaluated,
        metrics.mean_precision,
        metrics.mean_recall,
        metrics.mean_ndcg,
        k = cli.k,
    );

    if metrics.users_evaluated == 0 {
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}
