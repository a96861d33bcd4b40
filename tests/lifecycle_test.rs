// ABOUTME: Integration tests for expired grant purging and the background purge task
// ABOUTME: Runs against both storage engines
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use portfolio_authz::database_plugins::factory::Database;
use portfolio_authz::database_plugins::{AuthCodeStore, ClientStore, OAuth2Store, RefreshTokenStore};
use portfolio_authz::lifecycle::{purge_expired_grants, spawn_purge_task, PurgeReport};
use portfolio_authz::models::{OAuthClient, OAuthCode, OAuthRefreshToken};
use uuid::Uuid;

fn code(name: &str, expires_in: Duration) -> OAuthCode {
    let now = Utc::now();
    OAuthCode {
        code: name.to_owned(),
        client_id: "client".to_owned(),
        user_id: Uuid::new_v4(),
        redirect_uri: common::TEST_REDIRECT_URI.to_owned(),
        code_challenge: "challenge".to_owned(),
        code_challenge_method: "S256".to_owned(),
        scope: "mcp".to_owned(),
        expires_at: now + expires_in,
        used: false,
        created_at: now,
    }
}

fn refresh(hash: &str, expires_in: Duration) -> OAuthRefreshToken {
    let now = Utc::now();
    OAuthRefreshToken {
        token_hash: hash.to_owned(),
        client_id: "client".to_owned(),
        user_id: Uuid::new_v4(),
        scope: "mcp".to_owned(),
        expires_at: now + expires_in,
        revoked: false,
        created_at: now,
        last_used_at: None,
    }
}

async fn seed(store: &dyn OAuth2Store) {
    // Grants reference their client
    store
        .store_client(&OAuthClient {
            client_id: "client".to_owned(),
            client_secret_hash: "hash".to_owned(),
            client_name: "Purge Client".to_owned(),
            redirect_uris: vec![common::TEST_REDIRECT_URI.to_owned()],
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    store
        .store_auth_code(&code("stale", Duration::minutes(-5)))
        .await
        .unwrap();
    store
        .store_auth_code(&code("fresh", Duration::minutes(5)))
        .await
        .unwrap();
    store
        .store_refresh_token(&refresh("stale-hash", Duration::days(-1)))
        .await
        .unwrap();
    store
        .store_refresh_token(&refresh("fresh-hash", Duration::days(1)))
        .await
        .unwrap();
}

async fn assert_purged(store: &dyn OAuth2Store) {
    assert!(store.get_auth_code("stale").await.unwrap().is_none());
    assert!(store.get_auth_code("fresh").await.unwrap().is_some());
    assert!(store.get_refresh_token("stale-hash").await.unwrap().is_none());
    assert!(store.get_refresh_token("fresh-hash").await.unwrap().is_some());
}

#[tokio::test]
async fn test_purge_expired_grants_memory() {
    common::init_test_logging();
    let database = Database::memory();
    seed(&database).await;

    let report = purge_expired_grants(&database, Utc::now()).await.unwrap();
    assert_eq!(
        report,
        PurgeReport {
            auth_codes: 1,
            refresh_tokens: 1
        }
    );
    assert_purged(&database).await;

    let again = purge_expired_grants(&database, Utc::now()).await.unwrap();
    assert_eq!(again, PurgeReport::default());
}

#[tokio::test]
async fn test_purge_expired_grants_sqlite() {
    common::init_test_logging();
    let database = Database::new("sqlite::memory:").await.unwrap();
    seed(&database).await;

    let report = purge_expired_grants(&database, Utc::now()).await.unwrap();
    assert_eq!(report.auth_codes, 1);
    assert_eq!(report.refresh_tokens, 1);
    assert_purged(&database).await;
}

#[tokio::test]
async fn test_purge_task_runs_immediately_and_shuts_down() {
    common::init_test_logging();
    let database = Arc::new(Database::memory());
    seed(database.as_ref()).await;

    let store: Arc<dyn OAuth2Store> = database.clone();
    let task = spawn_purge_task(store, StdDuration::from_secs(3600));

    let mut purged = false;
    for _ in 0..50 {
        if database.get_auth_code("stale").await.unwrap().is_none() {
            purged = true;
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert!(purged, "first purge pass should run without waiting a full interval");

    tokio::time::timeout(StdDuration::from_secs(5), task.shutdown())
        .await
        .expect("purge task should stop promptly");
    assert_purged(database.as_ref()).await;
}
