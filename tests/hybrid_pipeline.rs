//! End-to-end integration test over the in-memory repository and cache:
//! rate some books, derive preferences, ask for private recommendations,
//! and confirm the public genre-weighted path works independently of any
//! user history.

use recanthology::config::EngineConfig;
use recanthology::recommendation::cache::InMemoryCache;
use recanthology::recommendation::domain::{BookItem, Genre, GenreId, Item, ItemId, ItemKind, UserId};
use recanthology::recommendation::hybrid::{private_request, public_request, PrivateRecommendationRequest, PublicRecommendationRequest};
use recanthology::recommendation::preferences::derive_and_persist;
use recanthology::recommendation::repository::{InMemoryRepository, RatingRepository};
use std::collections::HashMap;
use uuid::Uuid;

fn item_id(n: u128) -> ItemId {
    ItemId(Uuid::from_u128(n))
}

fn seeded_catalog() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    let scifi = GenreId(1);
    let fantasy = GenreId(2);
    repo.add_genre(Genre {
        id: scifi,
        name: "Science Fiction".to_string(),
        kind: ItemKind::Book,
    });
    repo.add_genre(Genre {
        id: fantasy,
        name: "Fantasy".to_string(),
        kind: ItemKind::Book,
    });

    repo.add_item(Item::Book(BookItem {
        id: item_id(1),
        title: "Asteroid Dawn".to_string(),
        genres: [scifi].into_iter().collect(),
        author: "N. Orlov".to_string(),
        language: "en".to_string(),
        liked_percent: 88,
    }));
    repo.add_item(Item::Book(BookItem {
        id: item_id(2),
        title: "Quiet Orbit".to_string(),
        genres: [scifi].into_iter().collect(),
        author: "N. Orlov".to_string(),
        language: "en".to_string(),
        liked_percent: 74,
    }));
    repo.add_item(Item::Book(BookItem {
        id: item_id(3),
        title: "The Wolf Throne".to_string(),
        genres: [fantasy].into_iter().collect(),
        author: "K. Vane".to_string(),
        language: "en".to_string(),
        liked_percent: 91,
    }));
    repo
}

#[tokio::test]
async fn rating_then_private_recommendation_surfaces_genre_affine_items() {
    let repo = seeded_catalog();
    let cache = InMemoryCache::new();
    let config = EngineConfig::default();
    let user_id = UserId(1);

    repo.upsert_rating(user_id, item_id(1), ItemKind::Book, 9)
        .await
        .unwrap();
    derive_and_persist(&repo, &cache, user_id, ItemKind::Book)
        .await
        .unwrap();

    let request = PrivateRecommendationRequest {
        kind: ItemKind::Book,
        user_id,
        top_n: 5,
        enable_cf: false,
    };
    let response = private_request(&repo, &cache, &config, &request).await.unwrap();

    let titles: Vec<String> = response.data.values().map(|entry| entry.title.clone()).collect();
    assert!(titles.contains(&"Quiet Orbit".to_string()));
    assert!(!titles.contains(&"Asteroid Dawn".to_string()));
}

#[tokio::test]
async fn public_request_resolves_genre_name_case_insensitively() {
    let repo = seeded_catalog();
    let mut genre_weights = HashMap::new();
    genre_weights.insert("fantasy".to_string(), 5.0);

    let request = PublicRecommendationRequest {
        kind: ItemKind::Book,
        genre_weights,
        top_n: 5,
    };
    let response = public_request(&repo, &request).await.unwrap();
    let titles: Vec<String> = response.data.values().map(|entry| entry.title.clone()).collect();
    assert!(titles.contains(&"The Wolf Throne".to_string()));
}

#[tokio::test]
async fn public_request_rejects_unresolvable_genre_name() {
    let repo = seeded_catalog();
    let mut genre_weights = HashMap::new();
    genre_weights.insert("Poetry".to_string(), 5.0);

    let request = PublicRecommendationRequest {
        kind: ItemKind::Book,
        genre_weights,
        top_n: 5,
    };
    assert!(public_request(&repo, &request).await.is_err());
}
