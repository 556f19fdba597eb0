pub use crate::cache::{Cache, MemoryCache, NoCache};
pub use crate::config::{PostSearchConfig, SearchConfig, TagSearchConfig, UserSearchConfig};
pub use crate::database::{Database, DatabaseError};
pub use crate::model::{Post, Searchable, Tag, User};
pub use crate::query::{Direction, Filter, FilterKind, Order, SearchQuery};
pub use crate::search::{Collection, SearchError, SearchExecutor, SearchResult, execute};
