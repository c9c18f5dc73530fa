//! Remote shopping list API.
//!
//! The server is an external collaborator; this module only speaks its
//! HTTP contract. Everything above it goes through [`ShoppingApi`] so the
//! synchronizer can be exercised without a network.

mod client;
mod error;
mod types;

pub use client::HttpShoppingApi;
pub use error::{ApiError, format_api_error};
pub use types::{NewItem, ShoppingListItem};

use crate::auth::Credential;
use async_trait::async_trait;

/// Remote operations on the single shopping list collection.
#[async_trait]
pub trait ShoppingApi: Send + Sync {
    /// `GET /api/items`, in server order.
    async fn list_items(&self, credential: &Credential) -> Result<Vec<ShoppingListItem>, ApiError>;
    /// `POST /api/item`.
    async fn create_item(
        &self,
        credential: &Credential,
        item: &NewItem,
    ) -> Result<ShoppingListItem, ApiError>;
    /// `DELETE /api/item/{id}`.
    async fn delete_item(&self, credential: &Credential, id: &str) -> Result<(), ApiError>;
    /// `DELETE /api/items`.
    async fn delete_all_items(&self, credential: &Credential) -> Result<(), ApiError>;
}
