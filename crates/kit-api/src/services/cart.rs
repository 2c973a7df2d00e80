//! Cart operations and the priced cart view.

use kit_core::{
    validate_cart, Cart, CartError, Listing, MarketError, MarketResult, Money, ValidatedCart,
};
use kit_store::SharedStore;
use serde::Serialize;
use uuid::Uuid;

/// One cart line with its current listing
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub partner_product_id: Uuid,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<Listing>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<Money>,
}

/// The cart as the client sees it
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    /// Present when the whole cart can be checked out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
    /// Why the cart cannot be checked out right now
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

pub struct CartService {
    store: SharedStore,
}

impl CartService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn load(&self, user_id: Uuid) -> MarketResult<Cart> {
        Ok(self
            .store
            .get_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    /// Price the cart against live listings
    pub async fn validate(&self, cart: &Cart) -> MarketResult<ValidatedCart> {
        let listings = self.store.get_listings(&cart.product_ids()).await?;
        Ok(validate_cart(cart, &listings)?)
    }

    pub async fn view(&self, user_id: Uuid) -> MarketResult<CartView> {
        let cart = self.load(user_id).await?;
        let listings = self.store.get_listings(&cart.product_ids()).await?;

        let items = cart
            .items
            .iter()
            .map(|item| {
                let listing = listings
                    .iter()
                    .find(|l| l.listing.id == item.partner_product_id)
                    .cloned();
                let available = listing.as_ref().is_some_and(|l| {
                    l.is_purchasable() && l.listing.has_stock(item.quantity)
                });
                let line_total = listing
                    .as_ref()
                    .filter(|_| available)
                    .and_then(|l| l.listing.price.times(item.quantity).ok());
                CartLineView {
                    partner_product_id: item.partner_product_id,
                    quantity: item.quantity,
                    listing,
                    available,
                    line_total,
                }
            })
            .collect();

        let (total, issues) = if cart.is_empty() {
            (None, Vec::new())
        } else {
            match validate_cart(&cart, &listings) {
                Ok(validated) => (Some(validated.total), Vec::new()),
                Err(e) => (None, vec![e.to_string()]),
            }
        };

        Ok(CartView {
            items,
            item_count: cart.item_count(),
            total,
            issues,
        })
    }

    /// Add units of a purchasable listing
    pub async fn add_item(
        &self,
        user_id: Uuid,
        partner_product_id: Uuid,
        quantity: u32,
    ) -> MarketResult<CartView> {
        let listing = self.purchasable(partner_product_id).await?;
        let mut cart = self.load(user_id).await?;
        cart.add(partner_product_id, quantity)?;
        check_stock(&cart, &listing)?;
        self.store.save_cart(&cart).await?;
        self.view(user_id).await
    }

    /// Set a line's quantity; zero removes it
    pub async fn set_quantity(
        &self,
        user_id: Uuid,
        partner_product_id: Uuid,
        quantity: u32,
    ) -> MarketResult<CartView> {
        let mut cart = self.load(user_id).await?;
        cart.set_quantity(partner_product_id, quantity)?;
        if quantity > 0 {
            let listing = self.purchasable(partner_product_id).await?;
            check_stock(&cart, &listing)?;
        }
        self.store.save_cart(&cart).await?;
        self.view(user_id).await
    }

    pub async fn remove_item(
        &self,
        user_id: Uuid,
        partner_product_id: Uuid,
    ) -> MarketResult<CartView> {
        let mut cart = self.load(user_id).await?;
        if !cart.remove(partner_product_id) {
            return Err(CartError::UnknownProduct(partner_product_id).into());
        }
        self.store.save_cart(&cart).await?;
        self.view(user_id).await
    }

    pub async fn clear(&self, user_id: Uuid) -> MarketResult<()> {
        Ok(self.store.clear_cart(user_id).await?)
    }

    async fn purchasable(&self, partner_product_id: Uuid) -> MarketResult<Listing> {
        let listing = self
            .store
            .get_listing(partner_product_id)
            .await?
            .ok_or_else(|| MarketError::not_found("product", partner_product_id))?;
        if !listing.is_purchasable() {
            return Err(CartError::Unavailable(partner_product_id).into());
        }
        Ok(listing)
    }
}

fn check_stock(cart: &Cart, listing: &Listing) -> MarketResult<()> {
    let requested = cart
        .items
        .iter()
        .find(|i| i.partner_product_id == listing.listing.id)
        .map_or(0, |i| i.quantity);
    match listing.listing.stock {
        Some(available) if available < requested => Err(CartError::OutOfStock {
            partner_product_id: listing.listing.id,
            requested,
            available,
        }
        .into()),
        _ => Ok(()),
    }
}
