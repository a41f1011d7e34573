pub mod bookmark;
pub mod cursor;
pub mod filter;
pub mod page;
pub mod query;
pub mod stats;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sql_query;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use bookmark::*;
pub use cursor::*;
pub use filter::*;
pub use page::*;
pub use query::*;
pub use stats::*;
pub use store::*;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteBookmarkStore;
