//! # Booru Search
//!
//! This crate provides a search query engine for tag-based media catalogs. A
//! single textual query such as
//!
//! ```text
//! cat -tag:dog score:1.. creation-date:2020 order:score,desc
//! ```
//!
//! is parsed, validated against a per-entity [`SearchConfig`](config::SearchConfig),
//! compiled into a typed filter tree and executed with stable pagination,
//! either against an in-memory collection or against SQLite through
//! [`Database`](database::Database).
//!
//! ## Features
//!
//! - **Tokens**: anonymous terms, `key:value` named filters, `order:` and
//!   `special:` directives, each negatable with a leading `-`.
//! - **Values**: comma-separated alternatives, `a..b` ranges with open ends,
//!   and dates at year, month or day precision.
//! - **Configs**: users, posts and tags each declare their own keys, order
//!   columns, special filters, default ordering and page size.
//! - **Storage**: the same compiled query renders to parameterized SQL, so the
//!   database returns exactly what the in-memory executor would.
//!
//! ## Usage
//!
//! ```rust
//! use booru_search::prelude::*;
//! # use chrono::NaiveDate;
//! # let at = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
//!
//! let users = vec![
//!     User { id: 1, name: "u1".into(), rank: "regular".into(), creation_time: at(2014, 1, 1), last_login_time: None },
//!     User { id: 2, name: "u2".into(), rank: "regular".into(), creation_time: at(2015, 1, 1), last_login_time: None },
//! ];
//!
//! let result = execute(&users, &UserSearchConfig, "creation_date:2014..", 1, None).unwrap();
//!
//! assert_eq!(2, result.total_count);
//! assert_eq!("u1", result.items[0].name);
//! ```

pub mod cache;
pub mod config;
pub mod database;
mod dialect;
pub mod model;
pub mod parser;
pub mod prelude;
pub mod query;
pub mod search;
