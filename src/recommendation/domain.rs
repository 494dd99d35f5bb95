//! Core entities shared by every scoring component.
//!
//! Two disjoint genre taxonomies (books, media) share this module but never
//! mix: a `GenreId` or `ItemId` from one taxonomy is never looked up against
//! the other.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable item identity. Items keep UUID identity, matching the source
/// catalog's UUID primary keys on books and TV/media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Stable genre identity, scoped to one taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenreId(pub u64);

/// Which of the two disjoint catalogs an item, genre, rating or preference
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Book,
    Media,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Book => "book",
            ItemKind::Media => "media",
        }
    }
}

/// A named genre within one taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
    pub kind: ItemKind,
}

/// Book-specific metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookItem {
    pub id: ItemId,
    pub title: String,
    pub genres: HashSet<GenreId>,
    pub author: String,
    pub language: String,
    /// Percent of readers who liked the book, in [0,100].
    pub liked_percent: u8,
}

/// Media-specific metadata (movie, series, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: ItemId,
    pub title: String,
    pub genres: HashSet<GenreId>,
    pub media_type: String,
    pub start_year: i32,
}

/// A catalog entry: either a book or a media entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Book(BookItem),
    Media(MediaItem),
}

impl Item {
    pub fn id(&self) -> ItemId {
        match self {
            Item::Book(b) => b.id,
            Item::Media(m) => m.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Book(_) => ItemKind::Book,
            Item::Media(_) => ItemKind::Media,
        }
    }

    pub fn genres(&self) -> &HashSet<GenreId> {
        match self {
            Item::Book(b) => &b.genres,
            Item::Media(m) => &m.genres,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Item::Book(b) => &b.title,
            Item::Media(m) => &m.title,
        }
    }

    pub fn as_book(&self) -> Option<&BookItem> {
        match self {
            Item::Book(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaItem> {
        match self {
            Item::Media(m) => Some(m),
            _ => None,
        }
    }
}

/// A single rating event: `(user, item, value)`, unique per `(user, item)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: u8,
}

impl Rating {
    /// I1: every rating's value is an integer in [1,10].
    pub fn is_valid(&self) -> bool {
        (1..=10).contains(&self.value)
    }
}

/// A derived per-genre preference, in `[-5,5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenrePreference {
    pub genre_id: GenreId,
    pub preference: f64,
}
