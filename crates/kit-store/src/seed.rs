//! Development seed data.
//!
//! Partners, catalog products, listings, blog posts, and bootstrap admin
//! profiles are loaded from `config/seed.toml`. Listings reference partners
//! and products by slug; applying a seed twice leaves existing records alone.

use crate::Store;
use kit_core::{
    Currency, MarketError, MarketResult, Money, NewAdminProduct, NewBlogPost, NewPartner,
    NewPartnerProduct, Profile, Role,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub partners: Vec<NewPartner>,
    #[serde(default)]
    pub products: Vec<NewAdminProduct>,
    #[serde(default)]
    pub listings: Vec<SeedListing>,
    #[serde(default)]
    pub posts: Vec<SeedPost>,
    #[serde(default)]
    pub admins: Vec<SeedAdmin>,
}

/// A partner listing keyed by slugs
#[derive(Debug, Clone, Deserialize)]
pub struct SeedListing {
    pub partner: String,
    pub product: String,
    pub price_cents: i64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPost {
    #[serde(flatten)]
    pub post: NewBlogPost,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdmin {
    pub user_id: Uuid,
    pub email: String,
}

/// Counts of records created by [`SeedData::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub partners: usize,
    pub products: usize,
    pub listings: usize,
    pub posts: usize,
    pub admins: usize,
}

impl SeedData {
    pub fn from_toml(toml_str: &str) -> MarketResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| MarketError::Configuration(format!("Invalid seed data: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> MarketResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MarketError::Configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Insert everything that does not exist yet.
    pub async fn apply(&self, store: &dyn Store) -> MarketResult<SeedSummary> {
        let mut summary = SeedSummary::default();

        for admin in &self.admins {
            if store.get_profile(admin.user_id).await?.is_some() {
                continue;
            }
            let mut profile = Profile::new_client(admin.user_id, admin.email.clone());
            profile.role = Role::Admin;
            store.upsert_profile(&profile).await?;
            summary.admins += 1;
        }

        for input in &self.partners {
            let partner = input.clone().into_partner()?;
            if store.get_partner_by_slug(&partner.slug).await?.is_some() {
                continue;
            }
            store.insert_partner(&partner).await?;
            summary.partners += 1;
        }

        let existing = store.list_admin_products(true).await?;
        for input in &self.products {
            let product = input.clone().into_product()?;
            if existing.iter().any(|p| p.slug == product.slug) {
                continue;
            }
            store.insert_admin_product(&product).await?;
            summary.products += 1;
        }

        let products = store.list_admin_products(true).await?;
        for seed in &self.listings {
            let Some(partner) = store.get_partner_by_slug(&seed.partner).await? else {
                warn!("Seed listing skipped: unknown partner {}", seed.partner);
                continue;
            };
            let Some(product) = products.iter().find(|p| p.slug == seed.product) else {
                warn!("Seed listing skipped: unknown product {}", seed.product);
                continue;
            };
            let already_listed = store
                .list_partner_products(partner.id)
                .await?
                .iter()
                .any(|l| l.admin_product_id == product.id);
            if already_listed {
                continue;
            }
            let listing = NewPartnerProduct {
                admin_product_id: product.id,
                price: Money::from_cents(seed.price_cents, seed.currency),
                stock: seed.stock,
                sku: seed.sku.clone(),
                active: true,
            }
            .into_listing(partner.id)?;
            store.insert_partner_product(&listing).await?;
            summary.listings += 1;
        }

        let author_id = self.admins.first().map(|a| a.user_id).unwrap_or_else(Uuid::nil);
        for seed in &self.posts {
            let mut post = seed.post.clone().into_post(author_id)?;
            if store.get_post_by_slug(&post.slug).await?.is_some() {
                continue;
            }
            if seed.published {
                post.publish();
            }
            store.insert_post(&post).await?;
            summary.posts += 1;
        }

        info!(
            "Seeded {} partners, {} products, {} listings, {} posts, {} admins",
            summary.partners, summary.products, summary.listings, summary.posts, summary.admins
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use kit_core::ListingFilter;

    const SEED: &str = r#"
        [[admins]]
        user_id = "00000000-0000-0000-0000-0000000000a1"
        email = "admin@labkit.test"

        [[partners]]
        name = "North Labs"
        contact_email = "ops@northlabs.test"

        [[products]]
        name = "Vitamin D Test"
        category = "nutrition"
        sample_type = "finger-prick blood"
        biomarkers = ["25-OH Vitamin D"]
        turnaround_days = 3

        [[listings]]
        partner = "north-labs"
        product = "vitamin-d-test"
        price_cents = 2900
        stock = 5

        [[listings]]
        partner = "nobody"
        product = "vitamin-d-test"
        price_cents = 100

        [[posts]]
        title = "Why Vitamin D Matters"
        body = "Most of us are low in winter."
        tags = ["Nutrition"]
        published = true
    "#;

    #[tokio::test]
    async fn test_apply_seed() {
        let store = MemoryStore::new();
        let seed = SeedData::from_toml(SEED).unwrap();

        let summary = seed.apply(&store).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                partners: 1,
                products: 1,
                listings: 1,
                posts: 1,
                admins: 1,
            }
        );

        let listings = store.list_listings(&ListingFilter::default()).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].listing.price.amount, 2900);
        assert_eq!(listings[0].listing.stock, Some(5));

        let post = store
            .get_post_by_slug("why-vitamin-d-matters")
            .await
            .unwrap()
            .unwrap();
        assert!(post.is_public());

        let admin_id = Uuid::parse_str("00000000-0000-0000-0000-0000000000a1").unwrap();
        assert!(store.get_profile(admin_id).await.unwrap().unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_apply_twice_is_noop() {
        let store = MemoryStore::new();
        let seed = SeedData::from_toml(SEED).unwrap();

        seed.apply(&store).await.unwrap();
        let second = seed.apply(&store).await.unwrap();

        assert_eq!(second, SeedSummary::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            SeedData::from_toml("[[partners]]\nname = 3"),
            Err(MarketError::Configuration(_))
        ));
    }
}
