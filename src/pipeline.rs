// src/pipeline.rs
//! Whole-run wiring: config -> feed -> index -> reconcile -> report.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::feed::{FeedCredentials, FeedFetcher};
use crate::locale::updated_stamp_now;
use crate::payload::FIELD_MAPPING_VERSION;
use crate::reconcile::{refresh_item, ReconcileSettings, Reconciler, SyncReport};
use crate::remote::bank::BankResolver;
use crate::remote::webflow::{ClientRetries, WebflowClient};
use crate::remote::CollectionApi;
use crate::retry::{CallClass, RetryPolicy};

impl From<&SyncConfig> for ReconcileSettings {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            collection_id: cfg.target.collection_id.clone(),
            page_size: cfg.target.page_size,
            page_delay: cfg.page_delay(),
            write_delay: cfg.write_delay(),
            abort_on_partial_index: cfg.sync.abort_on_partial_index,
        }
    }
}

/// Production run against the live feed and Webflow.
pub async fn run_sync(cfg: &SyncConfig) -> Result<SyncReport> {
    let fetcher = FeedFetcher::from_url(
        cfg.feed.url.clone(),
        FeedCredentials {
            username: cfg.feed.username.clone(),
            password: cfg.feed.password.clone(),
        },
        cfg.http_timeout(),
        cfg.retry_policy(CallClass::Feed),
    )?;

    let target = WebflowClient::new(
        cfg.target.api_base.clone(),
        cfg.target.token.clone(),
        cfg.http_timeout(),
        ClientRetries {
            read_class: CallClass::IndexPage,
            read: cfg.retry_policy(CallClass::IndexPage),
            write: cfg.retry_policy(CallClass::Write),
        },
    )?;

    let banks = WebflowClient::new(
        cfg.target.api_base.clone(),
        cfg.banks.token.clone(),
        cfg.http_timeout(),
        ClientRetries {
            read_class: CallClass::BankLookup,
            read: cfg.retry_policy(CallClass::BankLookup),
            write: RetryPolicy::none(),
        },
    )?;

    run_with(cfg, &fetcher, &target, &banks).await
}

/// One sync pass over injected collaborators. Only a feed failure (or an
/// incomplete index with `abort_on_partial_index`) is an `Err`.
pub async fn run_with(
    cfg: &SyncConfig,
    fetcher: &FeedFetcher,
    target: &dyn CollectionApi,
    banks: &dyn CollectionApi,
) -> Result<SyncReport> {
    let stamp = updated_stamp_now();

    if let Some(item_id) = cfg.sync.refresh_item_id.as_deref() {
        if let Err(e) = refresh_item(target, &cfg.target.collection_id, item_id, &stamp).await {
            warn!(target: "sync", item_id, error = ?e, "single item refresh failed");
        }
    }

    let snapshot = fetcher.fetch().await.context("fetching product feed")?;
    info!(
        target: "sync",
        entries = snapshot.total_entries(),
        average_nominal_rate = snapshot.average_nominal_rate,
        field_mapping_version = FIELD_MAPPING_VERSION,
        api = target.name(),
        "Total number of entries in XML"
    );

    let resolver = BankResolver::new(
        banks,
        cfg.banks.collection_id.clone(),
        cfg.banks.page_size,
        cfg.banks.max_pages,
    );
    let mut reconciler = Reconciler::new(target, resolver, ReconcileSettings::from(cfg));
    let report = reconciler.run(&snapshot, &stamp).await?;

    info!(
        target: "sync",
        updates = report.successful_updates,
        created = report.new_items_created,
        failed = report.failed,
        bank_misses = report.bank_misses,
        total = report.total_entries,
        index_complete = report.index_complete,
        "sync run finished"
    );
    Ok(report)
}
