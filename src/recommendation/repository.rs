//! Repository contracts (C1): the abstract read/write surface the engine
//! depends on instead of a concrete persistence layer, per spec.md §4.1 and
//! §1's explicit scope cut ("persistence layer schema ... only their
//! contracts are specified").
//!
//! All read methods are side-effect-free. `InMemoryRepository` is the
//! crate's only shipped implementation — a real deployment would implement
//! these traits against whatever store it already has (SQL, document store,
//! ...), exactly as spec.md §4.1 allows ("implementations may be SQL,
//! in-memory, or mocked in tests").

use crate::error::{Error, Result};
use crate::recommendation::domain::{Genre, GenreId, Item, ItemId, ItemKind, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Most-relevant-first items carrying `genre_id`, for the given kind.
    /// Books order by descending `liked_percent`, media by descending
    /// `start_year`; ties break ascending by item id.
    async fn items_by_genre(&self, genre_id: GenreId, kind: ItemKind, limit: usize) -> Vec<Item>;

    /// A single item with its genre set pre-fetched, or `None` if absent.
    async fn item(&self, item_id: ItemId) -> Option<Item>;

    /// Every genre in a taxonomy.
    async fn genres(&self, kind: ItemKind) -> Vec<Genre>;

    /// Count of ratings an item has received.
    async fn item_rating_count(&self, item_id: ItemId) -> usize;

    /// Items of `kind` whose rating count is below `threshold`, ordered
    /// descending by rating count, with genres pre-fetched.
    async fn items_with_rating_count_lt(
        &self,
        kind: ItemKind,
        threshold: u32,
        limit: usize,
    ) -> Vec<Item>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// `(user_id, item_id, rating)` for every rating held by `user_ids`,
    /// scoped to `kind`.
    async fn ratings_of_users(&self, user_ids: &[UserId], kind: ItemKind) -> Vec<(UserId, ItemId, u8)>;

    /// `(item_id, rating)` for one user, scoped to `kind`.
    async fn user_ratings(&self, user_id: UserId, kind: ItemKind) -> Vec<(ItemId, u8)>;

    /// Every user who has rated `item_id` (grounded in
    /// `original_source/myutils/collaborative_filtering.py::get_item_similarities`,
    /// which issues exactly this query before fetching full profiles —
    /// required by §4.5 step 2, not itemized in spec.md's C1 bullet list).
    async fn raters_of(&self, item_id: ItemId, kind: ItemKind) -> Vec<UserId>;

    /// Validate (I1) and upsert a rating. Overwrites any previous value for
    /// `(user_id, item_id)`.
    async fn upsert_rating(&self, user_id: UserId, item_id: ItemId, kind: ItemKind, value: u8) -> Result<()>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// `(genre, preference)` for a user, sorted descending by preference.
    async fn user_preferences(&self, user_id: UserId, kind: ItemKind) -> Vec<(GenreId, f64)>;

    /// Atomic upsert: `updates` overwrite existing rows, `inserts` create
    /// new ones. Rows absent from both are left untouched.
    async fn write_preferences_bulk(
        &self,
        user_id: UserId,
        kind: ItemKind,
        updates: Vec<(GenreId, f64)>,
        inserts: Vec<(GenreId, f64)>,
    ) -> Result<()>;
}

/// Everything the engine needs from a data store, bundled for convenience.
pub trait Repository: ItemRepository + RatingRepository + PreferenceRepository {}
impl<T: ItemRepository + RatingRepository + PreferenceRepository> Repository for T {}

#[derive(Default)]
struct Inner {
    genres: HashMap<GenreId, Genre>,
    items: HashMap<ItemId, Item>,
    // (user_id, item_id) -> rating value; item kind is derived via `items`.
    ratings: HashMap<(UserId, ItemId), u8>,
    preferences: HashMap<(UserId, GenreId), f64>,
}

/// An in-memory repository over a fixed catalog, suitable for tests and for
/// the `evaluate_engine` CLI's synthetic demo catalog.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_genre(&self, genre: Genre) {
        self.inner.write().unwrap().genres.insert(genre.id, genre);
    }

    pub fn add_item(&self, item: Item) {
        self.inner.write().unwrap().items.insert(item.id(), item);
    }

    /// Seed a rating directly, bypassing `upsert_rating`'s I1 validation —
    /// used by test/seed fixtures that are already known-valid.
    pub fn seed_rating(&self, user_id: UserId, item_id: ItemId, value: u8) {
        self.inner
            .write()
            .unwrap()
            .ratings
            .insert((user_id, item_id), value);
    }

    pub fn seed_preference(&self, user_id: UserId, genre_id: GenreId, value: f64) {
        self.inner
            .write()
            .unwrap()
            .preferences
            .insert((user_id, genre_id), value);
    }

    /// All ratings currently stored, scoped to `kind`. Exposed for the
    /// evaluation pipeline, which needs the full rating set to build a
    /// train/test split (outside any single user's view).
    pub fn all_ratings(&self, kind: ItemKind) -> Vec<(UserId, ItemId, u8)> {
        let inner = self.inner.read().unwrap();
        inner
            .ratings
            .iter()
            .filter_map(|(&(u, i), &v)| {
                inner
                    .items
                    .get(&i)
                    .filter(|item| item.kind() == kind)
                    .map(|_| (u, i, v))
            })
            .collect()
    }
}

fn sort_items_by_popularity(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| {
        let ord = match (a, b) {
            (Item::Book(x), Item::Book(y)) => y.liked_percent.cmp(&x.liked_percent),
            (Item::Media(x), Item::Media(y)) => y.start_year.cmp(&x.start_year),
            _ => std::cmp::Ordering::Equal,
        };
        ord.then_with(|| a.id().cmp(&b.id()))
    });
    items
}

#[async_trait]
impl ItemRepository for InMemoryRepository {
    async fn items_by_genre(&self, genre_id: GenreId, kind: ItemKind, limit: usize) -> Vec<Item> {
        let inner = self.inner.read().unwrap();
        let mut matching: Vec<Item> = inner
            .items
            .values()
            .filter(|item| item.kind() == kind && item.genres().contains(&genre_id))
            .cloned()
            .collect();
        matching = sort_items_by_popularity(matching);
        matching.truncate(limit);
        matching
    }

    async fn item(&self, item_id: ItemId) -> Option<Item> {
        self.inner.read().unwrap().items.get(&item_id).cloned()
    }

    async fn genres(&self, kind: ItemKind) -> Vec<Genre> {
        let mut genres: Vec<Genre> = self
            .inner
            .read()
            .unwrap()
            .genres
            .values()
            .filter(|g| g.kind == kind)
            .cloned()
            .collect();
        genres.sort_by(|a, b| a.id.cmp(&b.id));
        genres
    }

    async fn item_rating_count(&self, item_id: ItemId) -> usize {
        self.inner
            .read()
            .unwrap()
            .ratings
            .keys()
            .filter(|(_, i)| *i == item_id)
            .count()
    }

    async fn items_with_rating_count_lt(
        &self,
        kind: ItemKind,
        threshold: u32,
        limit: usize,
    ) -> Vec<Item> {
        let inner = self.inner.read().unwrap();
        let mut counts: HashMap<ItemId, u32> = HashMap::new();
        for (_, item_id) in inner.ratings.keys() {
            *counts.entry(*item_id).or_insert(0) += 1;
        }
        let mut matching: Vec<(u32, Item)> = inner
            .items
            .values()
            .filter(|item| item.kind() == kind)
            .map(|item| (*counts.get(&item.id()).unwrap_or(&0), item.clone()))
            .filter(|(count, _)| *count < threshold)
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id().cmp(&b.1.id())));
        matching.into_iter().take(limit).map(|(_, item)| item).collect()
    }
}

#[async_trait]
impl RatingRepository for InMemoryRepository {
    async fn ratings_of_users(&self, user_ids: &[UserId], kind: ItemKind) -> Vec<(UserId, ItemId, u8)> {
        let wanted: std::collections::HashSet<UserId> = user_ids.iter().copied().collect();
        let inner = self.inner.read().unwrap();
        inner
            .ratings
            .iter()
            .filter_map(|(&(u, i), &v)| {
                if !wanted.contains(&u) {
                    return None;
                }
                inner.items.get(&i).filter(|item| item.kind() == kind).map(|_| (u, i, v))
            })
            .collect()
    }

    async fn user_ratings(&self, user_id: UserId, kind: ItemKind) -> Vec<(ItemId, u8)> {
        let inner = self.inner.read().unwrap();
        inner
            .ratings
            .iter()
            .filter_map(|(&(u, i), &v)| {
                if u != user_id {
                    return None;
                }
                inner.items.get(&i).filter(|item| item.kind() == kind).map(|_| (i, v))
            })
            .collect()
    }

    async fn raters_of(&self, item_id: ItemId, kind: ItemKind) -> Vec<UserId> {
        let inner = self.inner.read().unwrap();
        if inner.items.get(&item_id).map(|i| i.kind()) != Some(kind) {
            return Vec::new();
        }
        inner
            .ratings
            .keys()
            .filter_map(|&(u, i)| if i == item_id { Some(u) } else { None })
            .collect()
    }

    async fn upsert_rating(&self, user_id: UserId, item_id: ItemId, kind: ItemKind, value: u8) -> Result<()> {
        if !(1..=10).contains(&value) {
            return Err(Error::input_invalid(format!(
                "rating value {} out of range [1,10]",
                value
            )));
        }
        let mut inner = self.inner.write().unwrap();
        match inner.items.get(&item_id) {
            Some(item) if item.kind() == kind => {}
            Some(_) => {
                return Err(Error::input_invalid("item kind mismatch"));
            }
            None => return Err(Error::not_found(item_id)),
        }
        inner.ratings.insert((user_id, item_id), value);
        Ok(())
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryRepository {
    async fn user_preferences(&self, user_id: UserId, kind: ItemKind) -> Vec<(GenreId, f64)> {
        let inner = self.inner.read().unwrap();
        let mut prefs: Vec<(GenreId, f64)> = inner
            .preferences
            .iter()
            .filter_map(|(&(u, g), &v)| {
                if u != user_id {
                    return None;
                }
                inner.genres.get(&g).filter(|genre| genre.kind == kind).map(|_| (g, v))
            })
            .collect();
        prefs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        prefs
    }

    async fn write_preferences_bulk(
        &self,
        user_id: UserId,
        _kind: ItemKind,
        updates: Vec<(GenreId, f64)>,
        inserts: Vec<(GenreId, f64)>,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for (genre_id, value) in updates.into_iter().chain(inserts.into_iter()) {
            inner.preferences.insert((user_id, genre_id), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::domain::BookItem;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn book(id: u128, liked_percent: u8, genres: &[u64]) -> Item {
        Item::Book(BookItem {
            id: ItemId(Uuid::from_u128(id)),
            title: format!("book-{id}"),
            genres: genres.iter().map(|g| GenreId(*g)).collect::<HashSet<_>>(),
            author: "author".to_string(),
            language: "en".to_string(),
            liked_percent,
        })
    }

    #[tokio::test]
    async fn upsert_rating_rejects_out_of_range_value() {
        let repo = InMemoryRepository::new();
        repo.add_item(book(1, 50, &[1]));
        let err = repo
            .upsert_rating(UserId(1), ItemId(Uuid::from_u128(1)), ItemKind::Book, 11)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InputInvalid { .. }));
    }

    #[tokio::test]
    async fn items_by_genre_orders_by_liked_percent_desc_then_id_asc() {
        let repo = InMemoryRepository::new();
        repo.add_item(book(2, 80, &[1]));
        repo.add_item(book(1, 80, &[1]));
        repo.add_item(book(3, 90, &[1]));
        let items = repo.items_by_genre(GenreId(1), ItemKind::Book, 10).await;
        let ids: Vec<u128> = items.iter().map(|i| i.id().0.as_u128()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn items_with_rating_count_lt_filters_and_orders() {
        let repo = InMemoryRepository::new();
        repo.add_item(book(1, 50, &[1]));
        repo.add_item(book(2, 50, &[1]));
        repo.seed_rating(UserId(1), ItemId(Uuid::from_u128(1)), 9);
        let items = repo
            .items_with_rating_count_lt(ItemKind::Book, 5, 10)
            .await;
        let ids: HashSet<u128> = items.iter().map(|i| i.id().0.as_u128()).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
    }
}
