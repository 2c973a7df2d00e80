//! In-memory `Store` for development and tests.
//!
//! All state sits behind one `RwLock`, so multi-record operations such as
//! [`Store::create_checkout`] are atomic with respect to other callers.

use crate::error::{Result, StoreError};
use crate::Store;
use async_trait::async_trait;
use chrono::Utc;
use kit_core::{
    AdminProduct, BlogPost, Cart, Listing, ListingFilter, Order, OrderFilter, Partner,
    PartnerProduct, PaymentTransaction, PostFilter, Profile,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    partners: HashMap<Uuid, Partner>,
    admin_products: HashMap<Uuid, AdminProduct>,
    partner_products: HashMap<Uuid, PartnerProduct>,
    profiles: HashMap<Uuid, Profile>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    transactions: HashMap<Uuid, PaymentTransaction>,
    webhook_events: HashMap<String, String>,
    posts: HashMap<Uuid, BlogPost>,
}

impl Inner {
    fn join(&self, listing: &PartnerProduct) -> Option<Listing> {
        let product = self.admin_products.get(&listing.admin_product_id)?;
        let partner = self.partners.get(&listing.partner_id)?;
        Some(Listing {
            listing: listing.clone(),
            product: product.clone(),
            partner: partner.clone(),
        })
    }
}

/// Lock-protected maps implementing [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_partner(&self, partner: &Partner) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.partners.values().any(|p| p.slug == partner.slug) {
            return Err(StoreError::Conflict(format!(
                "partner slug already exists: {}",
                partner.slug
            )));
        }
        inner.partners.insert(partner.id, partner.clone());
        Ok(())
    }

    async fn update_partner(&self, partner: &Partner) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.partners.contains_key(&partner.id) {
            return Err(StoreError::not_found("partner", partner.id));
        }
        if inner
            .partners
            .values()
            .any(|p| p.slug == partner.slug && p.id != partner.id)
        {
            return Err(StoreError::Conflict(format!(
                "partner slug already exists: {}",
                partner.slug
            )));
        }
        inner.partners.insert(partner.id, partner.clone());
        Ok(())
    }

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>> {
        Ok(self.inner.read().await.partners.get(&id).cloned())
    }

    async fn get_partner_by_slug(&self, slug: &str) -> Result<Option<Partner>> {
        let inner = self.inner.read().await;
        Ok(inner.partners.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_partners(&self, include_inactive: bool) -> Result<Vec<Partner>> {
        let inner = self.inner.read().await;
        let mut partners: Vec<Partner> = inner
            .partners
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        partners.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(partners)
    }

    async fn insert_admin_product(&self, product: &AdminProduct) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.admin_products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::Conflict(format!(
                "product slug already exists: {}",
                product.slug
            )));
        }
        inner.admin_products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_admin_product(&self, product: &AdminProduct) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.admin_products.contains_key(&product.id) {
            return Err(StoreError::not_found("product", product.id));
        }
        if inner
            .admin_products
            .values()
            .any(|p| p.slug == product.slug && p.id != product.id)
        {
            return Err(StoreError::Conflict(format!(
                "product slug already exists: {}",
                product.slug
            )));
        }
        inner.admin_products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_admin_product(&self, id: Uuid) -> Result<Option<AdminProduct>> {
        Ok(self.inner.read().await.admin_products.get(&id).cloned())
    }

    async fn list_admin_products(&self, include_inactive: bool) -> Result<Vec<AdminProduct>> {
        let inner = self.inner.read().await;
        let mut products: Vec<AdminProduct> = inner
            .admin_products
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn delete_admin_product(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.admin_products.contains_key(&id) {
            return Err(StoreError::not_found("product", id));
        }
        if inner
            .partner_products
            .values()
            .any(|l| l.admin_product_id == id)
        {
            return Err(StoreError::Conflict(format!(
                "product {id} is still listed by a partner"
            )));
        }
        inner.admin_products.remove(&id);
        Ok(())
    }

    async fn insert_partner_product(&self, listing: &PartnerProduct) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.partners.contains_key(&listing.partner_id) {
            return Err(StoreError::not_found("partner", listing.partner_id));
        }
        if !inner.admin_products.contains_key(&listing.admin_product_id) {
            return Err(StoreError::not_found("product", listing.admin_product_id));
        }
        if inner.partner_products.values().any(|l| {
            l.partner_id == listing.partner_id && l.admin_product_id == listing.admin_product_id
        }) {
            return Err(StoreError::Conflict(format!(
                "partner already lists product {}",
                listing.admin_product_id
            )));
        }
        inner.partner_products.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_partner_product(&self, listing: &PartnerProduct) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.partner_products.get_mut(&listing.id) {
            Some(existing) => {
                *existing = listing.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("partner product", listing.id)),
        }
    }

    async fn get_partner_product(&self, id: Uuid) -> Result<Option<PartnerProduct>> {
        Ok(self.inner.read().await.partner_products.get(&id).cloned())
    }

    async fn list_partner_products(&self, partner_id: Uuid) -> Result<Vec<PartnerProduct>> {
        let inner = self.inner.read().await;
        let mut listings: Vec<PartnerProduct> = inner
            .partner_products
            .values()
            .filter(|l| l.partner_id == partner_id)
            .cloned()
            .collect();
        listings.sort_by_key(|l| l.created_at);
        Ok(listings)
    }

    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let inner = self.inner.read().await;
        let mut listings: Vec<Listing> = inner
            .partner_products
            .values()
            .filter_map(|l| inner.join(l))
            .filter(|l| l.is_purchasable() && filter.matches(l))
            .collect();
        listings.sort_by(|a, b| {
            a.product
                .name
                .cmp(&b.product.name)
                .then(a.listing.price.amount.cmp(&b.listing.price.amount))
        });
        Ok(listings)
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let inner = self.inner.read().await;
        Ok(inner.partner_products.get(&id).and_then(|l| inner.join(l)))
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }

    async fn get_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(self.inner.read().await.carts.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.carts.insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        self.inner.write().await.carts.remove(&user_id);
        Ok(())
    }

    async fn create_checkout(
        &self,
        transaction: &PaymentTransaction,
        orders: &[Order],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.transactions.contains_key(&transaction.id) {
            return Err(StoreError::Conflict(format!(
                "transaction already exists: {}",
                transaction.id
            )));
        }

        // Check every line before touching stock so a shortfall writes nothing.
        let mut reserved: HashMap<Uuid, u32> = HashMap::new();
        for item in orders.iter().flat_map(|o| o.items.iter()) {
            let units = reserved.entry(item.partner_product_id).or_default();
            *units = units.saturating_add(item.quantity);
        }
        for (id, requested) in &reserved {
            let listing = inner
                .partner_products
                .get(id)
                .ok_or_else(|| StoreError::not_found("partner product", id))?;
            if let Some(available) = listing.stock {
                if available < *requested {
                    return Err(StoreError::OutOfStock {
                        partner_product_id: *id,
                        requested: *requested,
                        available,
                    });
                }
            }
        }

        let now = Utc::now();
        for (id, requested) in reserved {
            if let Some(listing) = inner.partner_products.get_mut(&id) {
                if let Some(stock) = listing.stock.as_mut() {
                    *stock -= requested;
                    listing.updated_at = now;
                }
            }
        }
        inner.transactions.insert(transaction.id, transaction.clone());
        for order in orders {
            inner.orders.insert(order.id, order.clone());
        }
        Ok(())
    }

    async fn attach_payment_intent(&self, transaction_id: Uuid, intent_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let tx = inner
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| StoreError::not_found("transaction", transaction_id))?;
        tx.payment_intent_id = Some(intent_id.to_string());
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("order", order.id)),
        }
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn get_transaction_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentTransaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .values()
            .find(|t| t.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn update_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.transactions.get_mut(&transaction.id) {
            Some(existing) => {
                *existing = transaction.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("transaction", transaction.id)),
        }
    }

    async fn orders_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.transaction_id == transaction_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn restock(&self, orders: &[Order]) -> Result<()> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        for item in orders.iter().flat_map(|o| o.items.iter()) {
            if let Some(listing) = inner.partner_products.get_mut(&item.partner_product_id) {
                if let Some(stock) = listing.stock.as_mut() {
                    *stock = stock.saturating_add(item.quantity);
                    listing.updated_at = now;
                }
            }
        }
        Ok(())
    }

    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.webhook_events.contains_key(event_id) {
            return Ok(false);
        }
        inner
            .webhook_events
            .insert(event_id.to_string(), event_type.to_string());
        Ok(true)
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<()> {
        self.inner.write().await.webhook_events.remove(event_id);
        Ok(())
    }

    async fn insert_post(&self, post: &BlogPost) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.posts.values().any(|p| p.slug == post.slug) {
            return Err(StoreError::Conflict(format!(
                "post slug already exists: {}",
                post.slug
            )));
        }
        inner.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn update_post(&self, post: &BlogPost) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.posts.contains_key(&post.id) {
            return Err(StoreError::not_found("post", post.id));
        }
        if inner
            .posts
            .values()
            .any(|p| p.slug == post.slug && p.id != post.id)
        {
            return Err(StoreError::Conflict(format!(
                "post slug already exists: {}",
                post.slug
            )));
        }
        inner.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>> {
        Ok(self.inner.read().await.posts.get(&id).cloned())
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let inner = self.inner.read().await;
        Ok(inner.posts.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPost>> {
        let inner = self.inner.read().await;
        let mut posts: Vec<BlogPost> = inner
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            let a_key = a.published_at.unwrap_or(a.created_at);
            let b_key = b.published_at.unwrap_or(b.created_at);
            b_key.cmp(&a_key)
        });
        let (limit, offset) = filter.limit_offset();
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete_post(&self, id: Uuid) -> Result<()> {
        match self.inner.write().await.posts.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("post", id)),
        }
    }
}
