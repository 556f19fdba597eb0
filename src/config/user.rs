use super::{NamedFilter, OrderColumn, SearchConfig, ValueKind};
use crate::model::{User, UserColumn};
use crate::parser::value::build_filter;
use crate::query::{Filter, Order};
use crate::search::SearchError;

const NAMED_FILTERS: &[NamedFilter<UserColumn>] = &[
    NamedFilter::new("name", ValueKind::Text, UserColumn::Name),
    NamedFilter::new("rank", ValueKind::Text, UserColumn::Rank),
    NamedFilter::new("creation_time", ValueKind::Date, UserColumn::CreationTime),
    NamedFilter::new("creation_date", ValueKind::Date, UserColumn::CreationTime),
    NamedFilter::new("last_login_time", ValueKind::Date, UserColumn::LastLoginTime),
    NamedFilter::new("last_login_date", ValueKind::Date, UserColumn::LastLoginTime),
];

const ORDER_COLUMNS: &[OrderColumn<UserColumn>] = &[
    OrderColumn::new("name", UserColumn::Name),
    OrderColumn::new("rank", UserColumn::Rank),
    OrderColumn::new("creation_time", UserColumn::CreationTime),
    OrderColumn::new("creation_date", UserColumn::CreationTime),
    OrderColumn::new("last_login_time", UserColumn::LastLoginTime),
    OrderColumn::new("last_login_date", UserColumn::LastLoginTime),
];

/// Search configuration for user accounts. Bare terms match the user name.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSearchConfig;

impl SearchConfig for UserSearchConfig {
    type Column = UserColumn;
    type Entity = User;

    fn anonymous_filter(&self, term: &str) -> Result<Filter<UserColumn>, SearchError> {
        build_filter(UserColumn::Name, ValueKind::Text, term)
    }

    fn named_filters(&self) -> &[NamedFilter<UserColumn>] {
        NAMED_FILTERS
    }

    fn order_columns(&self) -> &[OrderColumn<UserColumn>] {
        ORDER_COLUMNS
    }

    fn default_order(&self) -> Order<UserColumn> {
        Order::asc(UserColumn::Id)
    }
}
