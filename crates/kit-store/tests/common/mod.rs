//! Store contract shared by every backend.
//!
//! Each scenario takes a fresh, empty store.

#![allow(dead_code)] // Each test file uses a different subset

use chrono::{Duration, Utc};
use kit_core::{
    AdminProduct, BlogPost, Currency, Listing, ListingFilter, Money, NewAdminProduct,
    NewBlogPost, NewPartner, NewPartnerProduct, Order, OrderFilter, OrderItem, OrderStatus,
    Partner, PartnerProduct, PaymentTransaction, PostFilter, ShippingDetails, TestCategory,
};
use kit_store::{Store, StoreError};
use uuid::Uuid;

pub fn partner(name: &str) -> Partner {
    NewPartner {
        name: name.into(),
        slug: None,
        contact_email: "ops@partner.test".into(),
        description: String::new(),
        logo_url: None,
        active: true,
    }
    .into_partner()
    .unwrap()
}

pub fn product(name: &str, category: TestCategory) -> AdminProduct {
    NewAdminProduct {
        name: name.into(),
        slug: None,
        description: String::new(),
        category,
        sample_type: "blood".into(),
        biomarkers: vec!["TSH".into()],
        turnaround_days: 3,
        image_url: None,
        active: true,
    }
    .into_product()
    .unwrap()
}

pub fn listing(
    partner: &Partner,
    product: &AdminProduct,
    cents: i64,
    stock: Option<u32>,
) -> PartnerProduct {
    NewPartnerProduct {
        admin_product_id: product.id,
        price: Money::from_cents(cents, Currency::USD),
        stock,
        sku: None,
        active: true,
    }
    .into_listing(partner.id)
    .unwrap()
}

fn shipping() -> ShippingDetails {
    ShippingDetails {
        full_name: "Grace Hopper".into(),
        line1: "1 Compiler Rd".into(),
        line2: None,
        city: "Arlington".into(),
        region: Some("VA".into()),
        postal_code: "22201".into(),
        country: "US".into(),
        phone: None,
    }
}

pub fn order_for(tx: &PaymentTransaction, listing: &Listing, quantity: u32) -> Order {
    let unit_price = listing.listing.price;
    let item = OrderItem {
        partner_product_id: listing.listing.id,
        admin_product_id: listing.product.id,
        name: listing.product.name.clone(),
        unit_price,
        quantity,
        line_total: unit_price.times(quantity).unwrap(),
    };
    Order::new(
        tx.customer_id,
        listing.partner.id,
        tx.id,
        vec![item],
        shipping(),
        Money::zero(Currency::USD),
    )
    .unwrap()
}

pub fn transaction(cents: i64) -> PaymentTransaction {
    PaymentTransaction::new(Uuid::new_v4(), "stripe", Money::from_cents(cents, Currency::USD))
}

/// One partner listing one product
pub struct Catalog {
    pub partner: Partner,
    pub product: AdminProduct,
    pub listing: PartnerProduct,
}

pub async fn seed_catalog(store: &dyn Store, stock: Option<u32>) -> Catalog {
    let partner = partner("North Labs");
    let product = product("Thyroid Test", TestCategory::Hormones);
    let listing = listing(&partner, &product, 4900, stock);
    store.insert_partner(&partner).await.unwrap();
    store.insert_admin_product(&product).await.unwrap();
    store.insert_partner_product(&listing).await.unwrap();
    Catalog {
        partner,
        product,
        listing,
    }
}

pub async fn slugs_are_unique(store: &dyn Store) {
    seed_catalog(store, None).await;

    let err = store.insert_partner(&partner("North Labs")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let err = store
        .insert_admin_product(&product("Thyroid Test", TestCategory::Other))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

pub async fn partner_lists_a_product_once(store: &dyn Store) {
    let c = seed_catalog(store, None).await;

    let duplicate = listing(&c.partner, &c.product, 3900, None);
    assert!(matches!(
        store.insert_partner_product(&duplicate).await,
        Err(StoreError::Conflict(_))
    ));

    let orphan = listing(&partner("Ghost Labs"), &c.product, 3900, None);
    assert!(matches!(
        store.insert_partner_product(&orphan).await,
        Err(StoreError::NotFound { entity: "partner", .. })
    ));
}

pub async fn referenced_product_cannot_be_deleted(store: &dyn Store) {
    let c = seed_catalog(store, None).await;

    assert!(matches!(
        store.delete_admin_product(c.product.id).await,
        Err(StoreError::Conflict(_))
    ));

    let unused = product("Iron Panel", TestCategory::Nutrition);
    store.insert_admin_product(&unused).await.unwrap();
    store.delete_admin_product(unused.id).await.unwrap();
    assert!(store.get_admin_product(unused.id).await.unwrap().is_none());
}

pub async fn listings_hide_inactive_records(store: &dyn Store) {
    let c = seed_catalog(store, None).await;

    let all = store.list_listings(&ListingFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);

    let mut inactive = c.partner.clone();
    inactive.active = false;
    store.update_partner(&inactive).await.unwrap();

    assert!(store
        .list_listings(&ListingFilter::default())
        .await
        .unwrap()
        .is_empty());
    // Still reachable by id so carts can report it as unavailable.
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();
    assert!(!joined.is_purchasable());
}

pub async fn listings_filter_by_category_and_partner(store: &dyn Store) {
    let c = seed_catalog(store, None).await;
    let other = product("Cholesterol Test", TestCategory::Heart);
    store.insert_admin_product(&other).await.unwrap();
    store
        .insert_partner_product(&listing(&c.partner, &other, 2500, None))
        .await
        .unwrap();

    let heart = ListingFilter {
        category: Some(TestCategory::Heart),
        ..ListingFilter::default()
    };
    let found = store.list_listings(&heart).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].product.name, "Cholesterol Test");

    let by_partner = ListingFilter {
        partner: Some("north-labs".into()),
        ..ListingFilter::default()
    };
    assert_eq!(store.list_listings(&by_partner).await.unwrap().len(), 2);
}

pub async fn checkout_reserves_stock(store: &dyn Store) {
    let c = seed_catalog(store, Some(3)).await;
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();
    let tx = transaction(9800);
    let order = order_for(&tx, &joined, 2);

    store.create_checkout(&tx, &[order.clone()]).await.unwrap();

    let after = store.get_partner_product(c.listing.id).await.unwrap().unwrap();
    assert_eq!(after.stock, Some(1));
    let stored = store.orders_for_transaction(tx.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].order_number, order.order_number);
    assert_eq!(stored[0].items, order.items);
    assert_eq!(stored[0].shipping, order.shipping);
    assert_eq!(stored[0].total, order.total);

    store.restock(&[order]).await.unwrap();
    let restored = store.get_partner_product(c.listing.id).await.unwrap().unwrap();
    assert_eq!(restored.stock, Some(3));
}

pub async fn checkout_shortfall_writes_nothing(store: &dyn Store) {
    let c = seed_catalog(store, Some(1)).await;
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();

    // A second, untracked line that would succeed on its own.
    let other = product("Vitamin D Test", TestCategory::Nutrition);
    let unlimited = listing(&c.partner, &other, 2900, None);
    store.insert_admin_product(&other).await.unwrap();
    store.insert_partner_product(&unlimited).await.unwrap();
    let unlimited = store.get_listing(unlimited.id).await.unwrap().unwrap();

    let tx = transaction(12700);
    let orders = [order_for(&tx, &unlimited, 1), order_for(&tx, &joined, 2)];

    let err = store.create_checkout(&tx, &orders).await.unwrap_err();
    match err {
        StoreError::OutOfStock {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(store.get_transaction(tx.id).await.unwrap().is_none());
    assert!(store.orders_for_transaction(tx.id).await.unwrap().is_empty());
    let untouched = store.get_partner_product(c.listing.id).await.unwrap().unwrap();
    assert_eq!(untouched.stock, Some(1));
}

pub async fn transactions_are_found_by_intent(store: &dyn Store) {
    let c = seed_catalog(store, None).await;
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();
    let tx = transaction(4900);
    let order = order_for(&tx, &joined, 1);
    store.create_checkout(&tx, &[order]).await.unwrap();

    store.attach_payment_intent(tx.id, "pi_42").await.unwrap();

    let found = store.get_transaction_by_intent("pi_42").await.unwrap().unwrap();
    assert_eq!(found.id, tx.id);
    assert_eq!(found.amount, tx.amount);
    assert!(store.get_transaction_by_intent("pi_missing").await.unwrap().is_none());
}

pub async fn orders_filter_newest_first(store: &dyn Store) {
    let c = seed_catalog(store, None).await;
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();
    let customer = Uuid::new_v4();

    let mut created = Vec::new();
    for offset in 0..2 {
        let tx = PaymentTransaction::new(customer, "stripe", Money::from_cents(4900, Currency::USD));
        let mut order = order_for(&tx, &joined, 1);
        order.created_at = Utc::now() - Duration::minutes(10 - offset);
        store.create_checkout(&tx, &[order.clone()]).await.unwrap();
        created.push(order);
    }

    let mine = store
        .list_orders(&OrderFilter {
            customer_id: Some(customer),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, created[1].id);

    let mut paid = created[0].clone();
    paid.transition(OrderStatus::Paid).unwrap();
    store.update_order(&paid).await.unwrap();

    let only_paid = store
        .list_orders(&OrderFilter {
            status: Some(OrderStatus::Paid),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(only_paid.len(), 1);
    assert_eq!(only_paid[0].id, paid.id);
    assert!(only_paid[0].paid_at.is_some());
}

pub async fn webhook_events_are_recorded_once(store: &dyn Store) {
    assert!(store
        .record_webhook_event("evt_1", "payment_intent.succeeded")
        .await
        .unwrap());
    assert!(!store
        .record_webhook_event("evt_1", "payment_intent.succeeded")
        .await
        .unwrap());

    store.forget_webhook_event("evt_1").await.unwrap();
    assert!(store
        .record_webhook_event("evt_1", "payment_intent.succeeded")
        .await
        .unwrap());
}

fn post(title: &str, tags: &[&str]) -> BlogPost {
    NewBlogPost {
        title: title.into(),
        slug: None,
        excerpt: None,
        body: format!("{title} body"),
        cover_image_url: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
    .into_post(Uuid::new_v4())
    .unwrap()
}

pub async fn posts_paginate_and_filter(store: &dyn Store) {
    for i in 0..3 {
        let mut p = post(&format!("Post {i}"), &["news"]);
        p.publish();
        p.published_at = Some(Utc::now() - Duration::days(i));
        store.insert_post(&p).await.unwrap();
    }
    store.insert_post(&post("Draft", &["news"])).await.unwrap();

    let first_page = store
        .list_posts(&PostFilter {
            per_page: 2,
            ..PostFilter::published()
        })
        .await
        .unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].slug, "post-0");

    let second_page = store
        .list_posts(&PostFilter {
            page: 2,
            per_page: 2,
            ..PostFilter::published()
        })
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].slug, "post-2");

    let far_page = store
        .list_posts(&PostFilter {
            page: u32::MAX,
            ..PostFilter::published()
        })
        .await
        .unwrap();
    assert!(far_page.is_empty());

    let tagged = store
        .list_posts(&PostFilter {
            tag: Some("NEWS".into()),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(tagged.len(), 4);

    assert!(matches!(
        store.insert_post(&post("Draft", &[])).await,
        Err(StoreError::Conflict(_))
    ));
}
