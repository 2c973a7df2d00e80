//! # Catalog Types
//!
//! The platform owns the catalog of test kits (`AdminProduct`). Partners
//! sell them through priced listings (`PartnerProduct`) that reference a
//! catalog entry. A `Listing` is the storefront view that joins all three.

use crate::error::{MarketError, MarketResult};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Test category used for storefront filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    GeneralHealth,
    Hormones,
    Fertility,
    Heart,
    Nutrition,
    Std,
    Allergy,
    #[default]
    Other,
}

impl TestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::GeneralHealth => "general_health",
            TestCategory::Hormones => "hormones",
            TestCategory::Fertility => "fertility",
            TestCategory::Heart => "heart",
            TestCategory::Nutrition => "nutrition",
            TestCategory::Std => "std",
            TestCategory::Allergy => "allergy",
            TestCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        match value {
            "general_health" => Ok(TestCategory::GeneralHealth),
            "hormones" => Ok(TestCategory::Hormones),
            "fertility" => Ok(TestCategory::Fertility),
            "heart" => Ok(TestCategory::Heart),
            "nutrition" => Ok(TestCategory::Nutrition),
            "std" => Ok(TestCategory::Std),
            "allergy" => Ok(TestCategory::Allergy),
            "other" => Ok(TestCategory::Other),
            other => Err(MarketError::validation(
                "category",
                format!("unknown category: {other}"),
            )),
        }
    }
}

/// A seller on the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier
    pub slug: String,
    pub contact_email: String,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or replacing a partner
#[derive(Debug, Clone, Deserialize)]
pub struct NewPartner {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub contact_email: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl NewPartner {
    /// Validate and build a partner with a fresh id
    pub fn into_partner(self) -> MarketResult<Partner> {
        let (name, slug) = named_slug(&self.name, self.slug.as_deref())?;
        validate_email("contact_email", &self.contact_email)?;
        Ok(Partner {
            id: Uuid::new_v4(),
            name,
            slug,
            contact_email: self.contact_email.trim().to_string(),
            description: self.description,
            logo_url: self.logo_url,
            active: self.active,
            created_at: Utc::now(),
        })
    }

    /// Apply this input over an existing partner, keeping id and creation time
    pub fn apply_to(self, existing: &Partner) -> MarketResult<Partner> {
        let mut partner = self.into_partner()?;
        partner.id = existing.id;
        partner.created_at = existing.created_at;
        Ok(partner)
    }
}

/// A catalog entry owned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminProduct {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TestCategory,
    /// e.g. "finger-prick blood", "saliva", "urine"
    #[serde(default)]
    pub sample_type: String,
    /// Markers measured by the kit
    #[serde(default)]
    pub biomarkers: Vec<String>,
    /// Lab turnaround after the sample arrives
    #[serde(default)]
    pub turnaround_days: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdminProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TestCategory,
    #[serde(default)]
    pub sample_type: String,
    #[serde(default)]
    pub biomarkers: Vec<String>,
    #[serde(default)]
    pub turnaround_days: u16,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl NewAdminProduct {
    /// Validate and build a catalog entry with a fresh id
    pub fn into_product(self) -> MarketResult<AdminProduct> {
        let (name, slug) = named_slug(&self.name, self.slug.as_deref())?;
        let now = Utc::now();
        Ok(AdminProduct {
            id: Uuid::new_v4(),
            name,
            slug,
            description: self.description,
            category: self.category,
            sample_type: self.sample_type,
            biomarkers: self
                .biomarkers
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            turnaround_days: self.turnaround_days,
            image_url: self.image_url,
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply this input over an existing entry, keeping id and creation time
    pub fn apply_to(self, existing: &AdminProduct) -> MarketResult<AdminProduct> {
        let mut product = self.into_product()?;
        product.id = existing.id;
        product.created_at = existing.created_at;
        Ok(product)
    }
}

/// A partner's priced listing of a catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProduct {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub admin_product_id: Uuid,
    pub price: Money,
    /// Units on hand; `None` means unlimited
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartnerProduct {
    /// True when the listing, its catalog entry, and its partner are all active
    pub fn is_purchasable(&self, product: &AdminProduct, partner: &Partner) -> bool {
        self.active
            && product.active
            && partner.active
            && self.admin_product_id == product.id
            && self.partner_id == partner.id
    }

    /// Check if `quantity` units can be taken from stock
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock.map_or(true, |available| available >= quantity)
    }
}

/// Highest listing price, in minor units
pub const MAX_LISTING_PRICE: i64 = 99_999_999;

/// Highest tracked stock for one listing
pub const MAX_LISTING_STOCK: u32 = 1_000_000;

fn check_price(price: &Money) -> MarketResult<()> {
    if !price.is_positive() {
        return Err(MarketError::validation("price", "must be greater than zero"));
    }
    if price.amount > MAX_LISTING_PRICE {
        return Err(MarketError::validation(
            "price",
            format!("must be at most {MAX_LISTING_PRICE} minor units"),
        ));
    }
    Ok(())
}

fn check_stock(stock: Option<u32>) -> MarketResult<()> {
    match stock {
        Some(units) if units > MAX_LISTING_STOCK => Err(MarketError::validation(
            "stock",
            format!("must be at most {MAX_LISTING_STOCK}"),
        )),
        _ => Ok(()),
    }
}

/// Input a partner sends to list a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct NewPartnerProduct {
    pub admin_product_id: Uuid,
    pub price: Money,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl NewPartnerProduct {
    pub fn validate(&self) -> MarketResult<()> {
        check_price(&self.price)?;
        check_stock(self.stock)
    }

    /// Validate and build a listing owned by `partner_id`
    pub fn into_listing(self, partner_id: Uuid) -> MarketResult<PartnerProduct> {
        self.validate()?;
        let now = Utc::now();
        Ok(PartnerProduct {
            id: Uuid::new_v4(),
            partner_id,
            admin_product_id: self.admin_product_id,
            price: self.price,
            stock: self.stock,
            sku: self.sku.filter(|s| !s.trim().is_empty()),
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a partner's own listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerProductUpdate {
    #[serde(default)]
    pub price: Option<Money>,
    /// `Some(None)` clears stock tracking
    #[serde(default, with = "double_option")]
    pub stock: Option<Option<u32>>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl PartnerProductUpdate {
    pub fn apply(self, listing: &mut PartnerProduct) -> MarketResult<()> {
        if let Some(price) = self.price {
            check_price(&price)?;
        }
        if let Some(stock) = self.stock {
            check_stock(stock)?;
        }
        if let Some(price) = self.price {
            listing.price = price;
        }
        if let Some(stock) = self.stock {
            listing.stock = stock;
        }
        if let Some(sku) = self.sku {
            listing.sku = Some(sku).filter(|s| !s.trim().is_empty());
        }
        if let Some(active) = self.active {
            listing.active = active;
        }
        listing.updated_at = Utc::now();
        Ok(())
    }
}

/// Storefront view of a purchasable listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub listing: PartnerProduct,
    pub product: AdminProduct,
    pub partner: Partner,
}

impl Listing {
    pub fn is_purchasable(&self) -> bool {
        self.listing.is_purchasable(&self.product, &self.partner)
    }
}

/// Storefront filter for listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    #[serde(default)]
    pub category: Option<TestCategory>,
    /// Partner slug
    #[serde(default)]
    pub partner: Option<String>,
    /// Case-insensitive substring over product name and biomarkers
    #[serde(default)]
    pub q: Option<String>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(category) = self.category {
            if listing.product.category != category {
                return false;
            }
        }
        if let Some(ref slug) = self.partner {
            if &listing.partner.slug != slug {
                return false;
            }
        }
        if let Some(ref q) = self.q {
            let needle = q.to_lowercase();
            let in_name = listing.product.name.to_lowercase().contains(&needle);
            let in_markers = listing
                .product
                .biomarkers
                .iter()
                .any(|b| b.to_lowercase().contains(&needle));
            if !in_name && !in_markers {
                return false;
            }
        }
        true
    }
}

/// Turn arbitrary text into a URL slug
///
/// ASCII letters and digits are lowercased and kept; every other run of
/// characters becomes a single `-`. Leading and trailing dashes are dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub(crate) fn named_slug(name: &str, slug: Option<&str>) -> MarketResult<(String, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MarketError::validation("name", "must not be empty"));
    }
    let slug = slugify(slug.unwrap_or(name));
    if slug.is_empty() {
        return Err(MarketError::validation(
            "slug",
            "must contain at least one letter or digit",
        ));
    }
    Ok((name.to_string(), slug))
}

pub(crate) fn validate_email(field: &str, email: &str) -> MarketResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(MarketError::validation(field, "must be a valid email address")),
    }
}

fn default_true() -> bool {
    true
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
