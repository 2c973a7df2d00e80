//! Store contract tests against the in-memory backend.

mod common;

use kit_store::{MemoryStore, Store};

#[tokio::test]
async fn slugs_are_unique() {
    common::slugs_are_unique(&MemoryStore::new()).await;
}

#[tokio::test]
async fn partner_lists_a_product_once() {
    common::partner_lists_a_product_once(&MemoryStore::new()).await;
}

#[tokio::test]
async fn referenced_product_cannot_be_deleted() {
    common::referenced_product_cannot_be_deleted(&MemoryStore::new()).await;
}

#[tokio::test]
async fn listings_hide_inactive_records() {
    common::listings_hide_inactive_records(&MemoryStore::new()).await;
}

#[tokio::test]
async fn listings_filter_by_category_and_partner() {
    common::listings_filter_by_category_and_partner(&MemoryStore::new()).await;
}

#[tokio::test]
async fn checkout_reserves_stock() {
    common::checkout_reserves_stock(&MemoryStore::new()).await;
}

#[tokio::test]
async fn checkout_shortfall_writes_nothing() {
    common::checkout_shortfall_writes_nothing(&MemoryStore::new()).await;
}

#[tokio::test]
async fn transactions_are_found_by_intent() {
    common::transactions_are_found_by_intent(&MemoryStore::new()).await;
}

#[tokio::test]
async fn orders_filter_newest_first() {
    common::orders_filter_newest_first(&MemoryStore::new()).await;
}

#[tokio::test]
async fn webhook_events_are_recorded_once() {
    common::webhook_events_are_recorded_once(&MemoryStore::new()).await;
}

#[tokio::test]
async fn posts_paginate_and_filter() {
    common::posts_paginate_and_filter(&MemoryStore::new()).await;
}

#[tokio::test]
async fn restock_saturates_at_the_stock_ceiling() {
    let store = MemoryStore::new();
    let c = common::seed_catalog(&store, Some(5)).await;
    let joined = store.get_listing(c.listing.id).await.unwrap().unwrap();
    let tx = common::transaction(9800);
    let order = common::order_for(&tx, &joined, 2);

    let mut full = c.listing.clone();
    full.stock = Some(u32::MAX - 1);
    store.update_partner_product(&full).await.unwrap();

    store.restock(&[order]).await.unwrap();
    let after = store.get_partner_product(c.listing.id).await.unwrap().unwrap();
    assert_eq!(after.stock, Some(u32::MAX));
}
