//! Entities of the catalog and the columns they expose to search.

use crate::query::{Column, ColumnSource, Membership};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;

/// A borrowed view of one attribute of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Null,
    Text(&'a str),
    Integer(i64),
    Timestamp(NaiveDateTime),
    Tags(&'a [String]),
}

impl FieldValue<'_> {
    /// Total order used for sorting. `Null` sorts before any value.
    pub fn compare(&self, other: &FieldValue<'_>) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
            (FieldValue::Tags(a), FieldValue::Tags(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl<'a> From<Option<NaiveDateTime>> for FieldValue<'a> {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map(FieldValue::Timestamp).unwrap_or(FieldValue::Null)
    }
}

/// An entity that can be filtered and ordered by the search engine.
pub trait Searchable {
    /// Table (or view) the entity is read from.
    const TABLE: &'static str;

    type Column: Column;

    /// Primary key; the final tie-breaker of every ordering.
    fn id(&self) -> i64;

    fn field(&self, column: Self::Column) -> FieldValue<'_>;
}

const fn field(name: &'static str) -> ColumnSource {
    ColumnSource::Field {
        name,
        nullable: false,
    }
}

const fn nullable(name: &'static str) -> ColumnSource {
    ColumnSource::Field {
        name,
        nullable: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub rank: String,
    pub creation_time: NaiveDateTime,
    pub last_login_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Id,
    Name,
    Rank,
    CreationTime,
    LastLoginTime,
}

impl Column for UserColumn {
    fn source(self) -> ColumnSource {
        match self {
            UserColumn::Id => field("id"),
            UserColumn::Name => field("name"),
            UserColumn::Rank => field("rank"),
            UserColumn::CreationTime => field("creation_time"),
            UserColumn::LastLoginTime => nullable("last_login_time"),
        }
    }
}

impl Searchable for User {
    const TABLE: &'static str = "users";

    type Column = UserColumn;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, column: UserColumn) -> FieldValue<'_> {
        match column {
            UserColumn::Id => FieldValue::Integer(self.id),
            UserColumn::Name => FieldValue::Text(&self.name),
            UserColumn::Rank => FieldValue::Text(&self.rank),
            UserColumn::CreationTime => FieldValue::Timestamp(self.creation_time),
            UserColumn::LastLoginTime => self.last_login_time.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub safety: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub score: i64,
    pub fav_count: i64,
    pub creation_time: NaiveDateTime,
    pub last_edit_time: Option<NaiveDateTime>,
    /// Tag names. A tag listed twice counts once; storage keeps the first
    /// occurrence of each name in order.
    pub tags: Vec<String>,
}

impl Post {
    /// Number of distinct tags.
    pub fn tag_count(&self) -> usize {
        self.tags
            .iter()
            .enumerate()
            .filter(|(i, tag)| !self.tags[..*i].contains(tag))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostColumn {
    Id,
    Tag,
    Score,
    FavCount,
    TagCount,
    Safety,
    Kind,
    CreationTime,
    LastEditTime,
}

impl Column for PostColumn {
    fn source(self) -> ColumnSource {
        match self {
            PostColumn::Id => field("id"),
            PostColumn::Tag => ColumnSource::Membership(Membership {
                table: "post_tags",
                owner: "post_id",
                value: "tag_name",
            }),
            PostColumn::Score => field("score"),
            PostColumn::FavCount => field("fav_count"),
            PostColumn::TagCount => field("tag_count"),
            PostColumn::Safety => field("safety"),
            PostColumn::Kind => field("kind"),
            PostColumn::CreationTime => field("creation_time"),
            PostColumn::LastEditTime => nullable("last_edit_time"),
        }
    }
}

impl Searchable for Post {
    const TABLE: &'static str = "post_view";

    type Column = PostColumn;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, column: PostColumn) -> FieldValue<'_> {
        match column {
            PostColumn::Id => FieldValue::Integer(self.id),
            PostColumn::Tag => FieldValue::Tags(&self.tags),
            PostColumn::Score => FieldValue::Integer(self.score),
            PostColumn::FavCount => FieldValue::Integer(self.fav_count),
            PostColumn::TagCount => FieldValue::Integer(self.tag_count() as i64),
            PostColumn::Safety => FieldValue::Text(&self.safety),
            PostColumn::Kind => FieldValue::Text(&self.kind),
            PostColumn::CreationTime => FieldValue::Timestamp(self.creation_time),
            PostColumn::LastEditTime => self.last_edit_time.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub usages: i64,
    pub creation_time: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagColumn {
    Id,
    Name,
    Category,
    Usages,
    CreationTime,
}

impl Column for TagColumn {
    fn source(self) -> ColumnSource {
        match self {
            TagColumn::Id => field("id"),
            TagColumn::Name => field("name"),
            TagColumn::Category => field("category"),
            TagColumn::Usages => field("usages"),
            TagColumn::CreationTime => field("creation_time"),
        }
    }
}

impl Searchable for Tag {
    const TABLE: &'static str = "tag_view";

    type Column = TagColumn;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, column: TagColumn) -> FieldValue<'_> {
        match column {
            TagColumn::Id => FieldValue::Integer(self.id),
            TagColumn::Name => FieldValue::Text(&self.name),
            TagColumn::Category => FieldValue::Text(&self.category),
            TagColumn::Usages => FieldValue::Integer(self.usages),
            TagColumn::CreationTime => FieldValue::Timestamp(self.creation_time),
        }
    }
}
