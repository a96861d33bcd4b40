// ABOUTME: Background maintenance for the authorization server's grant tables
// ABOUTME: Periodically purges expired authorization codes and refresh tokens with a shutdown signal
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;
use std::time::Duration;

use authz_core::errors::DatabaseError;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::database_plugins::OAuth2Store;

/// Rows removed by one purge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired authorization codes deleted
    pub auth_codes: u64,
    /// Expired refresh tokens deleted
    pub refresh_tokens: u64,
}

/// Delete every grant that expired at or before `now`
///
/// # Errors
///
/// Returns the first storage error encountered
pub async fn purge_expired_grants(
    store: &dyn OAuth2Store,
    now: DateTime<Utc>,
) -> Result<PurgeReport, DatabaseError> {
    Ok(PurgeReport {
        auth_codes: store.purge_expired_auth_codes(now).await?,
        refresh_tokens: store.purge_expired_refresh_tokens(now).await?,
    })
}

/// Handle to the running purge task
pub struct PurgeTask {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PurgeTask {
    /// Signal the task to stop and wait for it
    pub async fn shutdown(self) {
        // The task may already have exited; either way it is done after the join
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Grant purge task ended abnormally");
        }
    }
}

/// Spawn the periodic purge task. The first pass runs immediately.
#[must_use]
pub fn spawn_purge_task(store: Arc<dyn OAuth2Store>, every: Duration) -> PurgeTask {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match purge_expired_grants(store.as_ref(), Utc::now()).await {
                        Ok(report) if report != PurgeReport::default() => info!(
                            auth_codes = report.auth_codes,
                            refresh_tokens = report.refresh_tokens,
                            "Purged expired OAuth2 grants"
                        ),
                        Ok(_) => debug!("No expired OAuth2 grants to purge"),
                        Err(e) => warn!(error = %e, "Failed to purge expired OAuth2 grants"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Grant purge task received shutdown signal");
                    break;
                }
            }
        }
    });

    PurgeTask {
        shutdown_tx,
        handle,
    }
}
