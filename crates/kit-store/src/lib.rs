//! # kit-store
//!
//! Storage layer for the labkit marketplace.
//!
//! - [`PgStore`]: PostgreSQL via sqlx, with embedded migrations
//! - [`MemoryStore`]: lock-protected maps for development and tests
//!
//! Both implement [`Store`], so the API holds an `Arc<dyn Store>` and never
//! knows which backend it is talking to.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kit_store::{MemoryStore, SeedData, Store};
//!
//! let store = MemoryStore::new();
//! SeedData::from_file("config/seed.toml")?.apply(&store).await?;
//!
//! let listings = store.list_listings(&ListingFilter::default()).await?;
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod seed;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use seed::SeedData;

use async_trait::async_trait;
use kit_core::{
    AdminProduct, BlogPost, Cart, Listing, ListingFilter, Order, OrderFilter, Partner,
    PartnerProduct, PaymentTransaction, PostFilter, Profile,
};
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to a storage backend.
pub type SharedStore = Arc<dyn Store>;

/// Every persistence operation the marketplace needs.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Partners
    // =========================================================================

    /// Insert a partner. Fails with `Conflict` if the slug is taken.
    async fn insert_partner(&self, partner: &Partner) -> Result<()>;

    /// Replace a partner record.
    async fn update_partner(&self, partner: &Partner) -> Result<()>;

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>>;

    async fn get_partner_by_slug(&self, slug: &str) -> Result<Option<Partner>>;

    /// Partners ordered by name.
    async fn list_partners(&self, include_inactive: bool) -> Result<Vec<Partner>>;

    // =========================================================================
    // Admin products
    // =========================================================================

    /// Insert a catalog product. Fails with `Conflict` if the slug is taken.
    async fn insert_admin_product(&self, product: &AdminProduct) -> Result<()>;

    async fn update_admin_product(&self, product: &AdminProduct) -> Result<()>;

    async fn get_admin_product(&self, id: Uuid) -> Result<Option<AdminProduct>>;

    /// Catalog products ordered by name.
    async fn list_admin_products(&self, include_inactive: bool) -> Result<Vec<AdminProduct>>;

    /// Delete a catalog product.
    ///
    /// Fails with `Conflict` while any partner still lists it.
    async fn delete_admin_product(&self, id: Uuid) -> Result<()>;

    // =========================================================================
    // Partner products
    // =========================================================================

    /// Insert a partner listing.
    ///
    /// The partner and the catalog product must exist (`NotFound`), and a
    /// partner lists each catalog product at most once (`Conflict`).
    async fn insert_partner_product(&self, listing: &PartnerProduct) -> Result<()>;

    async fn update_partner_product(&self, listing: &PartnerProduct) -> Result<()>;

    async fn get_partner_product(&self, id: Uuid) -> Result<Option<PartnerProduct>>;

    /// All listings of one partner, active or not.
    async fn list_partner_products(&self, partner_id: Uuid) -> Result<Vec<PartnerProduct>>;

    /// Purchasable listings joined with their product and partner.
    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>>;

    /// A joined listing regardless of whether it is purchasable.
    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>>;

    /// Joined listings for a set of ids; unknown ids are skipped.
    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<Listing>> {
        let mut listings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(listing) = self.get_listing(*id).await? {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    // =========================================================================
    // Carts
    // =========================================================================

    async fn get_cart(&self, user_id: Uuid) -> Result<Option<Cart>>;

    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    async fn clear_cart(&self, user_id: Uuid) -> Result<()>;

    // =========================================================================
    // Orders and payment transactions
    // =========================================================================

    /// Persist a checkout in one unit of work.
    ///
    /// Inserts the transaction and its orders and decrements stock for every
    /// tracked listing. Nothing is written if any listing would go negative;
    /// the first shortfall is reported as `OutOfStock`.
    async fn create_checkout(&self, transaction: &PaymentTransaction, orders: &[Order])
        -> Result<()>;

    /// Record the provider's PaymentIntent id on a transaction.
    async fn attach_payment_intent(&self, transaction_id: Uuid, intent_id: &str) -> Result<()>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// Orders matching the filter, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    async fn update_order(&self, order: &Order) -> Result<()>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>>;

    async fn get_transaction_by_intent(&self, intent_id: &str)
        -> Result<Option<PaymentTransaction>>;

    async fn update_transaction(&self, transaction: &PaymentTransaction) -> Result<()>;

    /// Orders paid by one transaction, oldest first.
    async fn orders_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<Order>>;

    /// Return the reserved units of these orders to stock.
    ///
    /// Listings without stock tracking or that no longer exist are skipped.
    async fn restock(&self, orders: &[Order]) -> Result<()>;

    // =========================================================================
    // Webhooks
    // =========================================================================

    /// Remember a provider event id.
    ///
    /// Returns `false` if the event was already recorded.
    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> Result<bool>;

    /// Drop a recorded event id so a redelivery is processed again.
    async fn forget_webhook_event(&self, event_id: &str) -> Result<()>;

    // =========================================================================
    // Blog
    // =========================================================================

    /// Insert a post. Fails with `Conflict` if the slug is taken.
    async fn insert_post(&self, post: &BlogPost) -> Result<()>;

    async fn update_post(&self, post: &BlogPost) -> Result<()>;

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>>;

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>>;

    /// One page of posts matching the filter, newest first.
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPost>>;

    async fn delete_post(&self, id: Uuid) -> Result<()>;
}
