//! Integration tests for catalog administration over the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::Duration as ChronoDuration;
use nexus_core::code::{CODE_ALPHABET, CODE_LENGTH};
use nexus_core::{AccountPayload, CatalogError, CodeStatus, PoolId};
use nexus_runtime::catalog::MAX_CODES_PER_BATCH;
use nexus_runtime::{CatalogService, EngineConfig, RedemptionEngine};
use nexus_testing::helpers::payload;
use nexus_testing::{InMemoryInventoryStore, InMemoryLockService, test_clock, test_time};
use std::collections::HashSet;
use std::sync::Arc;

fn service() -> (Arc<InMemoryInventoryStore>, CatalogService<InMemoryInventoryStore>) {
    let store = Arc::new(InMemoryInventoryStore::new());
    let catalog = CatalogService::new(Arc::clone(&store), Arc::new(test_clock()));
    (store, catalog)
}

#[tokio::test]
async fn test_create_pool_trims_and_validates_name() {
    let (_, catalog) = service();

    let pool = catalog.create_pool("  Premium ", Some("  ")).await.unwrap();
    assert_eq!(pool.name, "Premium");
    assert_eq!(pool.description, None);
    assert_eq!(pool.created_at, test_time());

    let blank = catalog.create_pool(" ", None).await;
    assert!(matches!(blank, Err(CatalogError::InvalidInput(_))));
}

#[tokio::test]
async fn test_add_items_skips_incomplete_payloads() {
    let (_, catalog) = service();
    let pool = catalog.create_pool("A", None).await.unwrap();

    let inserted = catalog
        .add_items(
            pool.id,
            vec![
                payload(1),
                AccountPayload::new("", "secret"),
                AccountPayload::new("user@example.com", ""),
                payload(2).with_extra_info("recovery: none"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let pools = catalog.list_pools().await.unwrap();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].available_count, 2);
    assert_eq!(pools[0].total_count, 2);
}

#[tokio::test]
async fn test_add_items_to_unknown_pool() {
    let (_, catalog) = service();
    let result = catalog.add_items(PoolId::new(), vec![payload(1)]).await;
    assert_eq!(result, Err(CatalogError::PoolNotFound));
}

#[tokio::test]
async fn test_generate_codes_shape_and_expiry() {
    let (store, catalog) = service();
    let pool = catalog.create_pool("A", None).await.unwrap();

    let codes = catalog.generate_codes(pool.id, 50, Some(7)).await.unwrap();
    assert_eq!(codes.len(), 50);

    let unique: HashSet<&str> = codes.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(unique.len(), 50);
    for code in &codes {
        assert_eq!(code.code.len(), CODE_LENGTH);
        assert!(code.code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(code.status, CodeStatus::Unused);
        assert_eq!(code.view_count, 0);
        assert_eq!(code.expires_at, Some(test_time() + ChronoDuration::days(7)));
        assert!(store.code(&code.code).is_some());
    }

    let no_expiry = catalog.generate_codes(pool.id, 1, Some(0)).await.unwrap();
    assert_eq!(no_expiry[0].expires_at, None);
}

#[tokio::test]
async fn test_generate_codes_count_bounds() {
    let (_, catalog) = service();
    let pool = catalog.create_pool("A", None).await.unwrap();

    for count in [0, MAX_CODES_PER_BATCH + 1] {
        let result = catalog.generate_codes(pool.id, count, None).await;
        assert!(matches!(result, Err(CatalogError::InvalidInput(_))), "count {count}");
    }
    assert_eq!(
        catalog.generate_codes(PoolId::new(), 1, None).await,
        Err(CatalogError::PoolNotFound)
    );
}

#[tokio::test]
async fn test_delete_pool_requires_empty_pool() {
    let (_, catalog) = service();
    let pool = catalog.create_pool("A", None).await.unwrap();
    catalog.add_items(pool.id, vec![payload(1)]).await.unwrap();
    let codes = catalog.generate_codes(pool.id, 2, None).await.unwrap();

    assert_eq!(
        catalog.delete_pool(pool.id).await,
        Err(CatalogError::PoolNotEmpty { items: 1, codes: 2 })
    );

    let pools = catalog.list_pools().await.unwrap();
    assert_eq!(pools[0].total_count, 1);
    assert!(catalog.recent_assignments(10).await.unwrap().is_empty());

    for code in codes {
        catalog.delete_code(code.id).await.unwrap();
    }
    assert!(matches!(
        catalog.delete_pool(pool.id).await,
        Err(CatalogError::PoolNotEmpty { items: 1, codes: 0 })
    ));
}

#[tokio::test]
async fn test_assigned_items_and_active_codes_are_protected() {
    let (store, catalog) = service();
    let pool = catalog.create_pool("A", None).await.unwrap();
    let item = store.seed_item(pool.id, payload(1));
    let spare = store.seed_item(pool.id, payload(2));
    let codes = catalog.generate_codes(pool.id, 2, None).await.unwrap();

    let engine = RedemptionEngine::new(
        Arc::clone(&store),
        Arc::new(InMemoryLockService::new()),
        Arc::new(test_clock()),
        EngineConfig::default(),
    );
    let redeemed = engine.redeem(&codes[0].code).await.unwrap();
    let assigned = if redeemed.account == item.payload.account { item.id } else { spare.id };
    let available = if assigned == item.id { spare.id } else { item.id };

    assert_eq!(catalog.delete_item(assigned).await, Err(CatalogError::ItemAssigned));
    assert_eq!(catalog.delete_code(codes[0].id).await, Err(CatalogError::CodeActive));

    catalog.delete_item(available).await.unwrap();
    assert_eq!(catalog.delete_item(available).await, Err(CatalogError::ItemNotFound));
    catalog.delete_code(codes[1].id).await.unwrap();
    assert_eq!(catalog.delete_code(codes[1].id).await, Err(CatalogError::CodeNotFound));

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.total_pools, 1);
    assert_eq!(stats.total_items, 1);
    assert_eq!(stats.assigned_items, 1);
    assert_eq!(stats.available_items, 0);
    assert_eq!(stats.total_codes, 1);
    assert_eq!(stats.active_codes, 1);
    assert_eq!(stats.unused_codes, 0);

    let recent = catalog.recent_assignments(5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].code, codes[0].code);
    assert_eq!(recent[0].pool_name, "A");
    assert_eq!(recent[0].account, redeemed.account);
    assert_eq!(recent[0].assigned_at, test_time());
}

#[tokio::test]
async fn test_delete_unknown_pool() {
    let (_, catalog) = service();
    assert_eq!(catalog.delete_pool(PoolId::new()).await, Err(CatalogError::PoolNotFound));
}
