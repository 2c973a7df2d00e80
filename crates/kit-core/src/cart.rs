//! # Cart
//!
//! Server-side shopping cart and checkout-time validation. A validated cart
//! carries prices taken from the live listings, never from the client.

use crate::catalog::Listing;
use crate::error::MarketError;
use crate::money::{Currency, Money};
use crate::order::OrderItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on units of one listing in a cart
pub const MAX_LINE_QUANTITY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Cart is empty")]
    Empty,

    #[error("Quantity must be between 1 and {max}, got {quantity}")]
    InvalidQuantity { quantity: u32, max: u32 },

    #[error("Product not found: {0}")]
    UnknownProduct(Uuid),

    #[error("Product is not available: {0}")]
    Unavailable(Uuid),

    #[error("Out of stock: {partner_product_id} (requested {requested}, available {available})")]
    OutOfStock {
        partner_product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Cart mixes currencies: {expected} and {found}")]
    MixedCurrencies { expected: Currency, found: Currency },

    #[error("Cart total exceeds the supported amount")]
    AmountOverflow,
}

impl From<CartError> for MarketError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Empty => MarketError::InvalidRequest(err.to_string()),
            CartError::InvalidQuantity { .. } => MarketError::validation("quantity", err.to_string()),
            CartError::UnknownProduct(id) => MarketError::not_found("product", id),
            CartError::Unavailable(id) => MarketError::Unavailable {
                partner_product_id: id.to_string(),
            },
            CartError::OutOfStock {
                partner_product_id,
                requested,
                available,
            } => MarketError::OutOfStock {
                partner_product_id: partner_product_id.to_string(),
                requested,
                available,
            },
            CartError::MixedCurrencies { expected, found } => MarketError::CurrencyMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            },
            CartError::AmountOverflow => MarketError::validation("amount", err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub partner_product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    fn check_quantity(quantity: u32) -> Result<(), CartError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity {
                quantity,
                max: MAX_LINE_QUANTITY,
            });
        }
        Ok(())
    }

    /// Add units, merging with an existing line for the same listing
    pub fn add(&mut self, partner_product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        Self::check_quantity(quantity)?;
        match self
            .items
            .iter_mut()
            .find(|i| i.partner_product_id == partner_product_id)
        {
            Some(line) => {
                let merged = line.quantity + quantity;
                Self::check_quantity(merged)?;
                line.quantity = merged;
            }
            None => self.items.push(CartItem {
                partner_product_id,
                quantity,
            }),
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Set a line's quantity; zero removes the line
    pub fn set_quantity(&mut self, partner_product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove(partner_product_id);
            return Ok(());
        }
        Self::check_quantity(quantity)?;
        match self
            .items
            .iter_mut()
            .find(|i| i.partner_product_id == partner_product_id)
        {
            Some(line) => line.quantity = quantity,
            None => return Err(CartError::UnknownProduct(partner_product_id)),
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Remove a line; returns whether it was present
    pub fn remove(&mut self, partner_product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.partner_product_id != partner_product_id);
        self.updated_at = Utc::now();
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Ids of every listing in the cart
    pub fn product_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|i| i.partner_product_id).collect()
    }
}

/// A cart line priced against its live listing
#[derive(Debug, Clone, Serialize)]
pub struct PricedLine {
    pub listing: Listing,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl PricedLine {
    /// Freeze this line into an order item
    pub fn to_order_item(&self) -> OrderItem {
        OrderItem {
            partner_product_id: self.listing.listing.id,
            admin_product_id: self.listing.product.id,
            name: self.listing.product.name.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
            line_total: self.line_total,
        }
    }
}

/// All priced lines sold by one partner
#[derive(Debug, Clone, Serialize)]
pub struct PartnerGroup {
    pub partner_id: Uuid,
    pub partner_name: String,
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
}

/// A cart that passed validation against live listings
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedCart {
    pub groups: Vec<PartnerGroup>,
    pub currency: Currency,
    pub total: Money,
}

impl ValidatedCart {
    pub fn item_count(&self) -> u32 {
        self.groups
            .iter()
            .flat_map(|g| g.lines.iter())
            .map(|l| l.quantity)
            .sum()
    }
}

/// Price every line of `cart` against `listings` and group by partner
///
/// Each line must reference a known, purchasable listing with enough stock,
/// and all lines must share one currency. Groups are ordered by partner id
/// so repeated checkouts of the same cart produce orders in the same order.
pub fn validate_cart(cart: &Cart, listings: &[Listing]) -> Result<ValidatedCart, CartError> {
    if cart.is_empty() {
        return Err(CartError::Empty);
    }

    let mut currency: Option<Currency> = None;
    let mut groups: BTreeMap<Uuid, PartnerGroup> = BTreeMap::new();

    for item in &cart.items {
        Cart::check_quantity(item.quantity)?;
        let listing = listings
            .iter()
            .find(|l| l.listing.id == item.partner_product_id)
            .ok_or(CartError::UnknownProduct(item.partner_product_id))?;

        if !listing.is_purchasable() {
            return Err(CartError::Unavailable(item.partner_product_id));
        }
        if !listing.listing.has_stock(item.quantity) {
            return Err(CartError::OutOfStock {
                partner_product_id: item.partner_product_id,
                requested: item.quantity,
                available: listing.listing.stock.unwrap_or(0),
            });
        }

        let unit_price = listing.listing.price;
        match currency {
            None => currency = Some(unit_price.currency),
            Some(expected) if expected != unit_price.currency => {
                return Err(CartError::MixedCurrencies {
                    expected,
                    found: unit_price.currency,
                })
            }
            Some(_) => {}
        }

        let line_total = unit_price
            .times(item.quantity)
            .map_err(|_| CartError::AmountOverflow)?;
        let group = groups
            .entry(listing.partner.id)
            .or_insert_with(|| PartnerGroup {
                partner_id: listing.partner.id,
                partner_name: listing.partner.name.clone(),
                lines: Vec::new(),
                subtotal: Money::zero(unit_price.currency),
            });
        group.subtotal = group
            .subtotal
            .checked_add(&line_total)
            .map_err(|_| CartError::AmountOverflow)?;
        group.lines.push(PricedLine {
            listing: listing.clone(),
            quantity: item.quantity,
            unit_price,
            line_total,
        });
    }

    let currency = currency.unwrap_or_default();
    let groups: Vec<PartnerGroup> = groups.into_values().collect();
    let total = groups
        .iter()
        .try_fold(Money::zero(currency), |acc, g| acc.checked_add(&g.subtotal))
        .map_err(|_| CartError::AmountOverflow)?;

    Ok(ValidatedCart {
        groups,
        currency,
        total,
    })
}
