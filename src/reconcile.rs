// src/reconcile.rs
//! # Reconciler
//! Per feed entry: derive metrics, assemble the payload, resolve the bank
//! reference, decide create vs update against the remote index, apply the write.
//!
//! Every entry ends either applied (counted) or failed (logged with its stable
//! id). A failure never leaks into the next entry, and a fixed delay follows
//! every apply whatever its outcome.

use anyhow::{bail, Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Duration;
use tracing::Instrument;

use crate::derive::DerivedMetrics;
use crate::feed::{FeedEntry, FeedSnapshot};
use crate::payload::{
    assemble_payload, FieldValue, Payload, RunAggregates, FIELD_BANK, FIELD_NAME, FIELD_SLUG,
    FIELD_SUPPLIER, FIELD_UPDATED,
};
use crate::remote::bank::BankResolver;
use crate::remote::index::{build_remote_index, RemoteIndex};
use crate::remote::{CollectionApi, ItemWrite};
use crate::slug::normalize_for_slug;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_entries_total", "Feed entries taken through reconciliation.");
        describe_counter!("sync_updates_total", "Existing items patched live.");
        describe_counter!("sync_creates_total", "New items created.");
        describe_counter!("sync_failures_total", "Entries that failed lookup or write.");
        describe_counter!("sync_bank_misses_total", "Entries without a resolvable bank.");
        describe_counter!("remote_index_pages_total", "Remote index pages listed.");
        describe_counter!("remote_index_errors_total", "Remote index page failures.");
        describe_gauge!("sync_last_run_ts", "Unix ts when a sync run last finished.");
    });
}

/// Create vs update for one entry. Pure function of the entry's stable id, its
/// candidate payload and the index snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncDecision {
    /// New item; payload carries `slug = stable_id`.
    Create(Payload),
    /// Existing item; payload never carries `slug`.
    Update { remote_id: String, payload: Payload },
}

pub fn decide(stable_id: &str, mut payload: Payload, index: &RemoteIndex) -> SyncDecision {
    match index.get(stable_id) {
        Some(existing) => {
            payload.remove(FIELD_SLUG);
            SyncDecision::Update {
                remote_id: existing.id.clone(),
                payload,
            }
        }
        None => {
            payload.insert(FIELD_SLUG, FieldValue::text(stable_id));
            SyncDecision::Create(payload)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total_entries: usize,
    pub successful_updates: usize,
    pub new_items_created: usize,
    pub failed: usize,
    pub bank_misses: usize,
    pub index_complete: bool,
}

impl SyncReport {
    fn record(&mut self, outcome: &Result<EntryOutcome>) {
        match outcome {
            Ok(EntryOutcome::Updated) => self.successful_updates += 1,
            Ok(EntryOutcome::Created) => self.new_items_created += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!(
                "Total successful updates: {} out of {} XML entries",
                self.successful_updates, self.total_entries
            ),
            format!("New items created: {}", self.new_items_created),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub collection_id: String,
    pub page_size: usize,
    pub page_delay: Duration,
    pub write_delay: Duration,
    pub abort_on_partial_index: bool,
}

pub struct Reconciler<'a> {
    target: &'a dyn CollectionApi,
    banks: BankResolver<'a>,
    settings: ReconcileSettings,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        target: &'a dyn CollectionApi,
        banks: BankResolver<'a>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            target,
            banks,
            settings,
        }
    }

    /// Build the remote index once, then reconcile every entry in feed order.
    /// Errors only when `abort_on_partial_index` is set and listing was cut short.
    pub async fn run(&mut self, snapshot: &FeedSnapshot, updated_stamp: &str) -> Result<SyncReport> {
        let index = build_remote_index(
            self.target,
            &self.settings.collection_id,
            self.settings.page_size,
            self.settings.page_delay,
        )
        .await;

        if !index.complete && self.settings.abort_on_partial_index {
            bail!(
                "remote index incomplete after {} page(s); aborting before any write",
                index.pages_fetched
            );
        }

        Ok(self.run_with_index(snapshot, &index, updated_stamp).await)
    }

    pub async fn run_with_index(
        &mut self,
        snapshot: &FeedSnapshot,
        index: &RemoteIndex,
        updated_stamp: &str,
    ) -> SyncReport {
        ensure_metrics_described();

        let aggregates = RunAggregates {
            total_entries: snapshot.total_entries(),
            average_nominal_rate: snapshot.average_nominal_rate,
            updated_stamp: updated_stamp.to_string(),
        };
        let mut report = SyncReport {
            total_entries: snapshot.total_entries(),
            index_complete: index.complete,
            ..SyncReport::default()
        };

        for entry in &snapshot.entries {
            counter!("sync_entries_total").increment(1);
            let span = tracing::info_span!(
                "entry",
                stable_id = %entry.stable_id,
                title_slug = %normalize_for_slug(&entry.title)
            );
            let outcome = self
                .reconcile_entry(entry, &aggregates, index, &mut report)
                .instrument(span)
                .await;

            match &outcome {
                Ok(EntryOutcome::Updated) => {
                    counter!("sync_updates_total").increment(1);
                    tracing::info!(target: "sync", stable_id = %entry.stable_id, "item updated");
                }
                Ok(EntryOutcome::Created) => {
                    counter!("sync_creates_total").increment(1);
                    tracing::info!(target: "sync", stable_id = %entry.stable_id, "item created");
                }
                Err(e) => {
                    counter!("sync_failures_total").increment(1);
                    tracing::error!(
                        target: "sync",
                        stable_id = %entry.stable_id,
                        error = ?e,
                        "entry failed, skipped"
                    );
                }
            }
            report.record(&outcome);

            tokio::time::sleep(self.settings.write_delay).await;
        }

        gauge!("sync_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        report
    }

    async fn reconcile_entry(
        &mut self,
        entry: &FeedEntry,
        aggregates: &RunAggregates,
        index: &RemoteIndex,
        report: &mut SyncReport,
    ) -> Result<EntryOutcome> {
        let metrics = DerivedMetrics::for_attributes(&entry.attributes);
        let mut payload = assemble_payload(entry, &metrics, aggregates);

        match self.banks.resolve(&entry.supplier_label).await {
            Some(bank_id) => payload.insert(FIELD_BANK, FieldValue::Text(bank_id)),
            None => {
                report.bank_misses += 1;
                counter!("sync_bank_misses_total").increment(1);
            }
        }

        let decision = decide(&entry.stable_id, payload, index);
        self.apply(decision).await
    }

    async fn apply(&self, decision: SyncDecision) -> Result<EntryOutcome> {
        let collection = self.settings.collection_id.as_str();
        match decision {
            SyncDecision::Update { remote_id, payload } => {
                self.target
                    .update_item_live(collection, &remote_id, &ItemWrite::live(payload))
                    .await
                    .with_context(|| format!("updating item {remote_id}"))?;
                Ok(EntryOutcome::Updated)
            }
            SyncDecision::Create(payload) => {
                self.target
                    .create_item(collection, &ItemWrite::live(payload))
                    .await
                    .context("creating item")?;
                Ok(EntryOutcome::Created)
            }
        }
    }
}

/// Re-stamp one known item: keep its current name and supplier, refresh the
/// "updated" text, patch it live.
pub async fn refresh_item(
    api: &dyn CollectionApi,
    collection_id: &str,
    item_id: &str,
    updated_stamp: &str,
) -> Result<()> {
    let item = api
        .get_item(collection_id, item_id)
        .await
        .with_context(|| format!("fetching item {item_id}"))?;

    let mut payload = Payload::default();
    payload.insert(FIELD_NAME, FieldValue::text(item.name().unwrap_or_default()));
    payload.insert(
        FIELD_SUPPLIER,
        FieldValue::text(item.text_field(FIELD_SUPPLIER).unwrap_or_default()),
    );
    payload.insert(FIELD_UPDATED, FieldValue::text(updated_stamp));

    api.update_item_live(collection_id, item_id, &ItemWrite::live(payload))
        .await
        .with_context(|| format!("updating item {item_id}"))?;
    tracing::info!(target: "sync", item_id, "refreshed item");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteRecord;
    use serde_json::json;

    fn index_with(slug: &str, id: &str) -> RemoteIndex {
        let mut fields = serde_json::Map::new();
        fields.insert("slug".into(), json!(slug));
        RemoteIndex::from_records(vec![RemoteRecord::new(id, fields)])
    }

    fn payload_with_slug() -> Payload {
        let mut p = Payload::default();
        p.insert(FIELD_NAME, FieldValue::text("X"));
        p.insert(FIELD_SLUG, FieldValue::text("stale"));
        p
    }

    #[test]
    fn known_slug_updates_without_slug_field() {
        let idx = index_with("46135", "wf-1");
        match decide("46135", payload_with_slug(), &idx) {
            SyncDecision::Update { remote_id, payload } => {
                assert_eq!(remote_id, "wf-1");
                assert!(!payload.contains(FIELD_SLUG));
                assert!(payload.contains(FIELD_NAME));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_slug_creates_with_stable_id_slug() {
        let idx = index_with("1", "wf-1");
        match decide("46135", Payload::default(), &idx) {
            SyncDecision::Create(payload) => {
                assert_eq!(payload.get(FIELD_SLUG), Some(&FieldValue::text("46135")));
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn summary_lines_match_report() {
        let r = SyncReport {
            total_entries: 10,
            successful_updates: 7,
            new_items_created: 2,
            failed: 1,
            ..SyncReport::default()
        };
        let [a, b] = r.summary_lines();
        assert_eq!(a, "Total successful updates: 7 out of 10 XML entries");
        assert_eq!(b, "New items created: 2");
    }
}
