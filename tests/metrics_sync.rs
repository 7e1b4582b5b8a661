// tests/metrics_sync.rs
#![cfg(feature = "strict-metrics")]
use metrics_exporter_prometheus::PrometheusBuilder;
use mortgage_feed_sync::remote::memory::InMemoryCollections;
use mortgage_feed_sync::{run_with, FeedFetcher, SyncConfig};

#[tokio::test]
async fn metrics_exposed_after_sync() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let cfg = SyncConfig::from_toml_str(
        "[target]\ncollection_id = \"loans\"\n[pacing]\nwrite_delay_ms = 0\npage_delay_ms = 0\n",
    )
    .unwrap();
    let xml = std::fs::read_to_string("tests/fixtures/boliglan.atom").expect("fixture");
    let fetcher = FeedFetcher::from_fixture_str(&xml);
    let store = InMemoryCollections::new();
    let _ = run_with(&cfg, &fetcher, &store, &store).await;

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    assert!(out.contains("feed_entries_total"));
    assert!(out.contains("feed_parse_ms"));
    assert!(out.contains("sync_entries_total"));
    assert!(out.contains("sync_creates_total"));
    assert!(out.contains("sync_bank_misses_total"));
    assert!(out.contains("remote_index_pages_total"));
}
