//! Hybrid recommendation engine for books and TV/film media.
//!
//! ## Architecture
//!
//! 1. **Repository contracts** (`repository`, `cache`) — the abstract
//!    read/write surface everything else depends on, never a concrete store.
//! 2. **Preferences** (`preferences`) — derive a user's per-genre taste
//!    vector from their ratings.
//! 3. **Content scoring** (`content`) — genre-affinity candidates.
//! 4. **Collaborative filtering** (`similarity`, `collaborative`) —
//!    item-item similarity and neighbor-weighted recommendations.
//! 5. **Cold start** (`cold_start`) — popularity fallback and a new-item
//!    boost so under-rated items stay reachable.
//! 6. **Feature signals** (`signals`) — a small capped bonus from signals
//!    outside the genre/CF model.
//! 7. **Hybrid fusion** (`hybrid`) — blends content and CF, resolves public
//!    genre-name input, and is the crate's request entry point.
//! 8. **Evaluation** (`evaluation`) — offline train/test split and ranking
//!    metrics for the `evaluate_engine` binary.

pub mod cache;
pub mod cold_start;
pub mod collaborative;
pub mod content;
pub mod domain;
pub mod evaluation;
pub mod hybrid;
pub mod preferences;
pub mod repository;
pub mod scoring;
pub mod seed;
pub mod signals;
pub mod similarity;

pub use domain::{BookItem, Genre, GenreId, Item, ItemId, ItemKind, MediaItem, Rating, UserId};
pub use hybrid::{
    PreferencesResponse, PrivateRecommendationRequest, PublicRecommendationRequest,
    RatingWriteRequest, RecommendationResponse,
};
pub use repository::{InMemoryRepository, ItemRepository, PreferenceRepository, RatingRepository, Repository};
