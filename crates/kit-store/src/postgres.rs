//! PostgreSQL `Store` backed by sqlx.
//!
//! Queries are checked at runtime (`query_as` over private row structs), so
//! the crate builds without a live database. Enum columns are stored as the
//! lowercase strings their serde forms use; order items, shipping details
//! and cart lines are JSONB snapshots.

use crate::error::{Result, StoreError};
use crate::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kit_core::{
    AdminProduct, BlogPost, Cart, CartItem, Currency, Listing, ListingFilter, MarketResult,
    Money, Order, OrderFilter, OrderItem, OrderStatus, Partner, PartnerProduct, PaymentStatus,
    PaymentTransaction, PostFilter, PostStatus, Profile, Role, ShippingDetails, TestCategory,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Connected to PostgreSQL (max_connections={})", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn join_listings(&self, rows: Vec<PartnerProductRow>) -> Result<Vec<Listing>> {
        let listings: Vec<PartnerProduct> = rows
            .into_iter()
            .map(PartnerProductRow::into_domain)
            .collect::<Result<_>>()?;

        let product_ids: Vec<Uuid> = listings.iter().map(|l| l.admin_product_id).collect();
        let partner_ids: Vec<Uuid> = listings.iter().map(|l| l.partner_id).collect();

        let products: HashMap<Uuid, AdminProduct> =
            sqlx::query_as::<_, AdminProductRow>("SELECT * FROM admin_products WHERE id = ANY($1)")
                .bind(&product_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| row.into_domain().map(|p| (p.id, p)))
                .collect::<Result<_>>()?;
        let partners: HashMap<Uuid, Partner> =
            sqlx::query_as::<_, PartnerRow>("SELECT * FROM partners WHERE id = ANY($1)")
                .bind(&partner_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|row| (row.id, row.into_domain()))
                .collect();

        Ok(listings
            .into_iter()
            .filter_map(|listing| {
                let product = products.get(&listing.admin_product_id)?.clone();
                let partner = partners.get(&listing.partner_id)?.clone();
                Some(Listing {
                    listing,
                    product,
                    partner,
                })
            })
            .collect())
    }
}

fn decode<T>(result: MarketResult<T>) -> Result<T> {
    result.map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{value} does not fit an INTEGER column")))
}

fn expect_one(rows_affected: u64, entity: &'static str, id: impl ToString) -> Result<()> {
    if rows_affected == 0 {
        return Err(StoreError::not_found(entity, id));
    }
    Ok(())
}

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct PartnerRow {
    id: Uuid,
    name: String,
    slug: String,
    contact_email: String,
    description: String,
    logo_url: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl PartnerRow {
    fn into_domain(self) -> Partner {
        Partner {
            id: self.id,
            name: self.name,
            slug: self.slug,
            contact_email: self.contact_email,
            description: self.description,
            logo_url: self.logo_url,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AdminProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    category: String,
    sample_type: String,
    biomarkers: Vec<String>,
    turnaround_days: i32,
    image_url: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AdminProductRow {
    fn into_domain(self) -> Result<AdminProduct> {
        Ok(AdminProduct {
            id: self.id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            category: decode(TestCategory::parse(&self.category))?,
            sample_type: self.sample_type,
            biomarkers: self.biomarkers,
            turnaround_days: u16::try_from(self.turnaround_days).unwrap_or_default(),
            image_url: self.image_url,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PartnerProductRow {
    id: Uuid,
    partner_id: Uuid,
    admin_product_id: Uuid,
    price_cents: i64,
    currency: String,
    stock: Option<i32>,
    sku: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PartnerProductRow {
    fn into_domain(self) -> Result<PartnerProduct> {
        Ok(PartnerProduct {
            id: self.id,
            partner_id: self.partner_id,
            admin_product_id: self.admin_product_id,
            price: Money::from_cents(self.price_cents, decode(Currency::parse(&self.currency))?),
            stock: self.stock.map(to_u32),
            sku: self.sku,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    role: String,
    partner_id: Option<Uuid>,
    default_shipping: Option<Json<ShippingDetails>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn into_domain(self) -> Result<Profile> {
        Ok(Profile {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            phone: self.phone,
            role: decode(Role::parse(&self.role))?,
            partner_id: self.partner_id,
            default_shipping: self.default_shipping.map(|j| j.0),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CartRow {
    user_id: Uuid,
    items: Json<Vec<CartItem>>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    customer_id: Uuid,
    provider: String,
    payment_intent_id: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<PaymentTransaction> {
        Ok(PaymentTransaction {
            id: self.id,
            customer_id: self.customer_id,
            provider: self.provider,
            payment_intent_id: self.payment_intent_id,
            amount: Money::from_cents(self.amount_cents, decode(Currency::parse(&self.currency))?),
            status: decode(PaymentStatus::parse(&self.status))?,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    partner_id: Uuid,
    transaction_id: Uuid,
    items: Json<Vec<OrderItem>>,
    shipping: Json<ShippingDetails>,
    subtotal_cents: i64,
    shipping_fee_cents: i64,
    total_cents: i64,
    currency: String,
    status: String,
    payment_status: String,
    tracking_number: Option<String>,
    carrier: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_domain(self) -> Result<Order> {
        let currency = decode(Currency::parse(&self.currency))?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            partner_id: self.partner_id,
            transaction_id: self.transaction_id,
            items: self.items.0,
            shipping: self.shipping.0,
            subtotal: Money::from_cents(self.subtotal_cents, currency),
            shipping_fee: Money::from_cents(self.shipping_fee_cents, currency),
            total: Money::from_cents(self.total_cents, currency),
            status: decode(OrderStatus::parse(&self.status))?,
            payment_status: decode(PaymentStatus::parse(&self.payment_status))?,
            tracking_number: self.tracking_number,
            carrier: self.carrier,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(FromRow)]
struct BlogPostRow {
    id: Uuid,
    slug: String,
    title: String,
    excerpt: String,
    body: String,
    cover_image_url: Option<String>,
    tags: Vec<String>,
    author_id: Uuid,
    status: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BlogPostRow {
    fn into_domain(self) -> Result<BlogPost> {
        Ok(BlogPost {
            id: self.id,
            slug: self.slug,
            title: self.title,
            excerpt: self.excerpt,
            body: self.body,
            cover_image_url: self.cover_image_url,
            tags: self.tags,
            author_id: self.author_id,
            status: decode(PostStatus::parse(&self.status))?,
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const INSERT_ORDER: &str = "INSERT INTO orders (
        id, order_number, customer_id, partner_id, transaction_id, items, shipping,
        subtotal_cents, shipping_fee_cents, total_cents, currency, status, payment_status,
        tracking_number, carrier, notes, created_at, updated_at,
        paid_at, shipped_at, delivered_at, cancelled_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
        $19, $20, $21, $22)";

#[async_trait]
impl Store for PgStore {
    async fn insert_partner(&self, partner: &Partner) -> Result<()> {
        sqlx::query(
            "INSERT INTO partners (id, name, slug, contact_email, description, logo_url, active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(partner.id)
        .bind(&partner.name)
        .bind(&partner.slug)
        .bind(&partner.contact_email)
        .bind(&partner.description)
        .bind(&partner.logo_url)
        .bind(partner.active)
        .bind(partner.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_partner(&self, partner: &Partner) -> Result<()> {
        let result = sqlx::query(
            "UPDATE partners SET name = $2, slug = $3, contact_email = $4, description = $5,
                 logo_url = $6, active = $7
             WHERE id = $1",
        )
        .bind(partner.id)
        .bind(&partner.name)
        .bind(&partner.slug)
        .bind(&partner.contact_email)
        .bind(&partner.description)
        .bind(&partner.logo_url)
        .bind(partner.active)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "partner", partner.id)
    }

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>> {
        let row = sqlx::query_as::<_, PartnerRow>("SELECT * FROM partners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PartnerRow::into_domain))
    }

    async fn get_partner_by_slug(&self, slug: &str) -> Result<Option<Partner>> {
        let row = sqlx::query_as::<_, PartnerRow>("SELECT * FROM partners WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PartnerRow::into_domain))
    }

    async fn list_partners(&self, include_inactive: bool) -> Result<Vec<Partner>> {
        let rows = sqlx::query_as::<_, PartnerRow>(
            "SELECT * FROM partners WHERE ($1 OR active) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PartnerRow::into_domain).collect())
    }

    async fn insert_admin_product(&self, product: &AdminProduct) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_products (
                 id, name, slug, description, category, sample_type, biomarkers,
                 turnaround_days, image_url, active, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.category.as_str())
        .bind(&product.sample_type)
        .bind(&product.biomarkers)
        .bind(i32::from(product.turnaround_days))
        .bind(&product.image_url)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_admin_product(&self, product: &AdminProduct) -> Result<()> {
        let result = sqlx::query(
            "UPDATE admin_products SET name = $2, slug = $3, description = $4, category = $5,
                 sample_type = $6, biomarkers = $7, turnaround_days = $8, image_url = $9,
                 active = $10, updated_at = $11
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.category.as_str())
        .bind(&product.sample_type)
        .bind(&product.biomarkers)
        .bind(i32::from(product.turnaround_days))
        .bind(&product.image_url)
        .bind(product.active)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "product", product.id)
    }

    async fn get_admin_product(&self, id: Uuid) -> Result<Option<AdminProduct>> {
        sqlx::query_as::<_, AdminProductRow>("SELECT * FROM admin_products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AdminProductRow::into_domain)
            .transpose()
    }

    async fn list_admin_products(&self, include_inactive: bool) -> Result<Vec<AdminProduct>> {
        sqlx::query_as::<_, AdminProductRow>(
            "SELECT * FROM admin_products WHERE ($1 OR active) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AdminProductRow::into_domain)
        .collect()
    }

    async fn delete_admin_product(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM admin_products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "product", id)
    }

    async fn insert_partner_product(&self, listing: &PartnerProduct) -> Result<()> {
        // Report missing parents as NotFound rather than a foreign-key Conflict.
        if self.get_partner(listing.partner_id).await?.is_none() {
            return Err(StoreError::not_found("partner", listing.partner_id));
        }
        if self.get_admin_product(listing.admin_product_id).await?.is_none() {
            return Err(StoreError::not_found("product", listing.admin_product_id));
        }
        sqlx::query(
            "INSERT INTO partner_products (
                 id, partner_id, admin_product_id, price_cents, currency, stock, sku, active,
                 created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(listing.id)
        .bind(listing.partner_id)
        .bind(listing.admin_product_id)
        .bind(listing.price.amount)
        .bind(listing.price.currency.as_str())
        .bind(listing.stock.map(to_i32).transpose()?)
        .bind(&listing.sku)
        .bind(listing.active)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_partner_product(&self, listing: &PartnerProduct) -> Result<()> {
        let result = sqlx::query(
            "UPDATE partner_products SET price_cents = $2, currency = $3, stock = $4, sku = $5,
                 active = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(listing.id)
        .bind(listing.price.amount)
        .bind(listing.price.currency.as_str())
        .bind(listing.stock.map(to_i32).transpose()?)
        .bind(&listing.sku)
        .bind(listing.active)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "partner product", listing.id)
    }

    async fn get_partner_product(&self, id: Uuid) -> Result<Option<PartnerProduct>> {
        sqlx::query_as::<_, PartnerProductRow>("SELECT * FROM partner_products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PartnerProductRow::into_domain)
            .transpose()
    }

    async fn list_partner_products(&self, partner_id: Uuid) -> Result<Vec<PartnerProduct>> {
        sqlx::query_as::<_, PartnerProductRow>(
            "SELECT * FROM partner_products WHERE partner_id = $1 ORDER BY created_at",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PartnerProductRow::into_domain)
        .collect()
    }

    #[instrument(skip(self))]
    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, PartnerProductRow>(
            "SELECT pp.* FROM partner_products pp
             JOIN admin_products ap ON ap.id = pp.admin_product_id
             JOIN partners p ON p.id = pp.partner_id
             WHERE pp.active AND ap.active AND p.active
               AND ($1::text IS NULL OR ap.category = $1)
               AND ($2::text IS NULL OR p.slug = $2)
             ORDER BY ap.name, pp.price_cents",
        )
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.partner.as_deref())
        .fetch_all(&self.pool)
        .await?;

        let mut listings = self.join_listings(rows).await?;
        listings.retain(|l| filter.matches(l));
        Ok(listings)
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let rows = sqlx::query_as::<_, PartnerProductRow>(
            "SELECT * FROM partner_products WHERE id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.join_listings(rows).await?.into_iter().next())
    }

    async fn get_listings(&self, ids: &[Uuid]) -> Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, PartnerProductRow>(
            "SELECT * FROM partner_products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        self.join_listings(rows).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (
                 user_id, email, full_name, phone, role, partner_id, default_shipping,
                 created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (user_id) DO UPDATE SET
                 email = EXCLUDED.email,
                 full_name = EXCLUDED.full_name,
                 phone = EXCLUDED.phone,
                 role = EXCLUDED.role,
                 partner_id = EXCLUDED.partner_id,
                 default_shipping = EXCLUDED.default_shipping,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.phone)
        .bind(profile.role.as_str())
        .bind(profile.partner_id)
        .bind(profile.default_shipping.as_ref().map(Json))
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ProfileRow::into_domain)
            .transpose()
    }

    async fn get_cart(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Cart {
            user_id: row.user_id,
            items: row.items.0,
            updated_at: row.updated_at,
        }))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (user_id, items, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.user_id)
        .bind(Json(&cart.items))
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, transaction, orders), fields(transaction_id = %transaction.id))]
    async fn create_checkout(
        &self,
        transaction: &PaymentTransaction,
        orders: &[Order],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Sorted so concurrent checkouts lock listings in the same order.
        let mut reserved: BTreeMap<Uuid, u32> = BTreeMap::new();
        for item in orders.iter().flat_map(|o| o.items.iter()) {
            let units = reserved.entry(item.partner_product_id).or_default();
            *units = units.saturating_add(item.quantity);
        }
        for (id, requested) in &reserved {
            let updated: Option<(Option<i32>,)> = sqlx::query_as(
                "UPDATE partner_products SET stock = stock - $2, updated_at = NOW()
                 WHERE id = $1 AND (stock IS NULL OR stock >= $2)
                 RETURNING stock",
            )
            .bind(id)
            .bind(to_i32(*requested)?)
            .fetch_optional(&mut *tx)
            .await?;
            if updated.is_some() {
                continue;
            }

            let current: Option<(Option<i32>,)> =
                sqlx::query_as("SELECT stock FROM partner_products WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return match current {
                None => Err(StoreError::not_found("partner product", id)),
                Some((stock,)) => Err(StoreError::OutOfStock {
                    partner_product_id: *id,
                    requested: *requested,
                    available: stock.map(to_u32).unwrap_or(0),
                }),
            };
        }

        sqlx::query(
            "INSERT INTO payment_transactions (
                 id, customer_id, provider, payment_intent_id, amount_cents, currency, status,
                 failure_reason, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(transaction.id)
        .bind(transaction.customer_id)
        .bind(&transaction.provider)
        .bind(&transaction.payment_intent_id)
        .bind(transaction.amount.amount)
        .bind(transaction.amount.currency.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.failure_reason)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *tx)
        .await?;

        for order in orders {
            sqlx::query(INSERT_ORDER)
                .bind(order.id)
                .bind(&order.order_number)
                .bind(order.customer_id)
                .bind(order.partner_id)
                .bind(order.transaction_id)
                .bind(Json(&order.items))
                .bind(Json(&order.shipping))
                .bind(order.subtotal.amount)
                .bind(order.shipping_fee.amount)
                .bind(order.total.amount)
                .bind(order.currency().as_str())
                .bind(order.status.as_str())
                .bind(order.payment_status.as_str())
                .bind(&order.tracking_number)
                .bind(&order.carrier)
                .bind(&order.notes)
                .bind(order.created_at)
                .bind(order.updated_at)
                .bind(order.paid_at)
                .bind(order.shipped_at)
                .bind(order.delivered_at)
                .bind(order.cancelled_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn attach_payment_intent(&self, transaction_id: Uuid, intent_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(transaction_id)
        .bind(intent_id)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "transaction", transaction_id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(OrderRow::into_domain)
            .transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders
             WHERE ($1::uuid IS NULL OR customer_id = $1)
               AND ($2::uuid IS NULL OR partner_id = $2)
               AND ($3::text IS NULL OR status = $3)
             ORDER BY created_at DESC",
        )
        .bind(filter.customer_id)
        .bind(filter.partner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderRow::into_domain)
        .collect()
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, tracking_number = $4,
                 carrier = $5, notes = $6, updated_at = $7, paid_at = $8, shipped_at = $9,
                 delivered_at = $10, cancelled_at = $11
             WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.tracking_number)
        .bind(&order.carrier)
        .bind(&order.notes)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "order", order.id)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>> {
        sqlx::query_as::<_, TransactionRow>("SELECT * FROM payment_transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(TransactionRow::into_domain)
            .transpose()
    }

    async fn get_transaction_by_intent(
        &self,
        intent_id: &str,
    ) -> Result<Option<PaymentTransaction>> {
        sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM payment_transactions WHERE payment_intent_id = $1",
        )
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TransactionRow::into_domain)
        .transpose()
    }

    async fn update_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        let result = sqlx::query(
            "UPDATE payment_transactions SET payment_intent_id = $2, status = $3,
                 failure_reason = $4, updated_at = $5
             WHERE id = $1",
        )
        .bind(transaction.id)
        .bind(&transaction.payment_intent_id)
        .bind(transaction.status.as_str())
        .bind(&transaction.failure_reason)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "transaction", transaction.id)
    }

    async fn orders_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE transaction_id = $1 ORDER BY created_at",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderRow::into_domain)
        .collect()
    }

    async fn restock(&self, orders: &[Order]) -> Result<()> {
        let mut returned: BTreeMap<Uuid, u32> = BTreeMap::new();
        for item in orders.iter().flat_map(|o| o.items.iter()) {
            let units = returned.entry(item.partner_product_id).or_default();
            *units = units.saturating_add(item.quantity);
        }

        let mut tx = self.pool.begin().await?;
        for (id, quantity) in returned {
            sqlx::query(
                "UPDATE partner_products
                 SET stock = LEAST(stock::BIGINT + $2, 2147483647)::INTEGER, updated_at = NOW()
                 WHERE id = $1 AND stock IS NOT NULL",
            )
            .bind(id)
            .bind(to_i32(quantity)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (event_id, event_type) VALUES ($1, $2)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_post(&self, post: &BlogPost) -> Result<()> {
        sqlx::query(
            "INSERT INTO blog_posts (
                 id, slug, title, excerpt, body, cover_image_url, tags, author_id, status,
                 published_at, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(post.id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.body)
        .bind(&post.cover_image_url)
        .bind(&post.tags)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_post(&self, post: &BlogPost) -> Result<()> {
        let result = sqlx::query(
            "UPDATE blog_posts SET slug = $2, title = $3, excerpt = $4, body = $5,
                 cover_image_url = $6, tags = $7, status = $8, published_at = $9, updated_at = $10
             WHERE id = $1",
        )
        .bind(post.id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.body)
        .bind(&post.cover_image_url)
        .bind(&post.tags)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        expect_one(result.rows_affected(), "post", post.id)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<BlogPost>> {
        sqlx::query_as::<_, BlogPostRow>("SELECT * FROM blog_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(BlogPostRow::into_domain)
            .transpose()
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        sqlx::query_as::<_, BlogPostRow>("SELECT * FROM blog_posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(BlogPostRow::into_domain)
            .transpose()
    }

    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPost>> {
        let (limit, offset) = filter.limit_offset();
        sqlx::query_as::<_, BlogPostRow>(
            "SELECT * FROM blog_posts
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR $2 = ANY(tags))
             ORDER BY COALESCE(published_at, created_at) DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.tag.as_ref().map(|t| t.to_lowercase()))
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(BlogPostRow::into_domain)
        .collect()
    }

    async fn delete_post(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one(result.rows_affected(), "post", id)
    }
}
