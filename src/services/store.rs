//! Contract of the remote bookmark store.

use async_trait::async_trait;

use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::RemoteRequestError;

/// Sort order for bookmark queries, by creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Trait defining bookmark persistence. Row-level ownership is enforced by
/// the implementation: queries only return, and deletes only touch, rows of
/// the session's user.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Returns every bookmark visible to the current session. Rows with equal
    /// timestamps keep the store's insertion order.
    async fn query(&self, order: QueryOrder) -> Result<Vec<Bookmark>, RemoteRequestError>;

    async fn insert(&self, record: &NewBookmark) -> Result<(), RemoteRequestError>;

    /// Deletes by id and returns the number of rows removed.
    async fn delete(&self, id: &BookmarkId) -> Result<u64, RemoteRequestError>;
}
