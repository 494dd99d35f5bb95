//! Deterministic synthetic demo catalog, so `evaluate_engine` is runnable
//! without wiring a real persistence layer (§1's explicit scope cut means no
//! shipped SQL backend exists to seed from).
//!
//! Not grounded in any one file of the source corpus; the catalog shape
//! (genres, books, media, ratings) mirrors the entities spec.md §3 defines,
//! generated with a seeded `StdRng` for reproducibility across runs.

use crate::recommendation::domain::{BookItem, Genre, GenreId, Item, ItemId, ItemKind, MediaItem, UserId};
use crate::recommendation::repository::InMemoryRepository;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use uuid::Uuid;

const BOOK_GENRE_NAMES: &[&str] = &[
    "Science Fiction",
    "Fantasy",
    "Mystery",
    "Romance",
    "Horror",
    "Biography",
];

const MEDIA_GENRE_NAMES: &[&str] = &[
    "Drama",
    "Comedy",
    "Action",
    "Documentary",
    "Animation",
    "Thriller",
];

const AUTHORS: &[&str] = &["A. Ward", "M. Okafor", "J. Lindqvist", "S. Haddad", "R. Moreau"];
const LANGUAGES: &[&str] = &["en", "fr", "es", "de"];
const MEDIA_TYPES: &[&str] = &["movie", "series"];

/// Populate `repo` with a deterministic catalog and rating history, seeded
/// from `seed`. Returns the ids of every user present in the generated
/// rating history, sorted ascending.
pub fn populate(repo: &InMemoryRepository, seed: u64, user_count: u64, items_per_kind: usize) -> Vec<UserId> {
    let mut rng = StdRng::seed_from_u64(seed);

    let book_genres = add_genres(repo, BOOK_GENRE_NAMES, ItemKind::Book);
    let media_genres = add_genres(repo, MEDIA_GENRE_NAMES, ItemKind::Media);

    let book_ids = add_books(repo, &mut rng, &book_genres, items_per_kind);
    let media_ids = add_media(repo, &mut rng, &media_genres, items_per_kind);

    let mut user_ids = Vec::with_capacity(user_count as usize);
    for user_index in 1..=user_count {
        let user_id = UserId(user_index);
        user_ids.push(user_id);
        rate_random_subset(repo, &mut rng, user_id, &book_ids);
        rate_random_subset(repo, &mut rng, user_id, &media_ids);
    }

    user_ids
}

fn add_genres(repo: &InMemoryRepository, names: &[&str], kind: ItemKind) -> Vec<GenreId> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let genre_id = GenreId(genre_id_seed(kind, index));
            repo.add_genre(Genre {
                id: genre_id,
                name: name.to_string(),
                kind,
            });
            genre_id
        })
        .collect()
}

fn genre_id_seed(kind: ItemKind, index: usize) -> u64 {
    let base = match kind {
        ItemKind::Book => 1_000,
        ItemKind::Media => 2_000,
    };
    base + index as u64
}

fn add_books(repo: &InMemoryRepository, rng: &mut StdRng, genres: &[GenreId], count: usize) -> Vec<ItemId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let id = ItemId(Uuid::from_u128(10_000 + i as u128));
        let assigned = random_genre_subset(rng, genres);
        repo.add_item(Item::Book(BookItem {
            id,
            title: format!("Book {}", i + 1),
            genres: assigned,
            author: AUTHORS[rng.gen_range(0..AUTHORS.len())].to_string(),
            language: LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string(),
            liked_percent: rng.gen_range(10..=99),
        }));
        ids.push(id);
    }
    ids
}

fn add_media(repo: &InMemoryRepository, rng: &mut StdRng, genres: &[GenreId], count: usize) -> Vec<ItemId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let id = ItemId(Uuid::from_u128(20_000 + i as u128));
        let assigned = random_genre_subset(rng, genres);
        repo.add_item(Item::Media(MediaItem {
            id,
            title: format!("Show {}", i + 1),
            genres: assigned,
            media_type: MEDIA_TYPES[rng.gen_range(0..MEDIA_TYPES.len())].to_string(),
            start_year: rng.gen_range(1975..=2026),
        }));
        ids.push(id);
    }
    ids
}

fn random_genre_subset(rng: &mut StdRng, genres: &[GenreId]) -> HashSet<GenreId> {
    let pick_count = rng.gen_range(1..=genres.len().min(3));
    let mut subset = HashSet::new();
    while subset.len() < pick_count {
        subset.insert(genres[rng.gen_range(0..genres.len())]);
    }
    subset
}

fn rate_random_subset(repo: &InMemoryRepository, rng: &mut StdRng, user_id: UserId, item_ids: &[ItemId]) {
    if item_ids.is_empty() {
        return;
    }
    let rated_count = rng.gen_range(3..=item_ids.len().min(15).max(3));
    let mut seen = HashSet::new();
    while seen.len() < rated_count {
        let item_id = item_ids[rng.gen_range(0..item_ids.len())];
        if seen.insert(item_id) {
            repo.seed_rating(user_id, item_id, rng.gen_range(1..=10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_is_deterministic_for_a_fixed_seed() {
        let a = InMemoryRepository::new();
        let b = InMemoryRepository::new();
        let users_a = populate(&a, 7, 5, 20);
        let users_b = populate(&b, 7, 5, 20);
        assert_eq!(users_a, users_b);
        assert_eq!(a.all_ratings(ItemKind::Book), b.all_ratings(ItemKind::Book));
    }

    #[test]
    fn populate_produces_nonempty_catalog() {
        let repo = InMemoryRepository::new();
        let users = populate(&repo, 1, 10, 15);
        assert_eq!(users.len(), 10);
        assert!(!repo.all_ratings(ItemKind::Book).is_empty());
        assert!(!repo.all_ratings(ItemKind::Media).is_empty());
    }
}
