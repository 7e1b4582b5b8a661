// tests/feed_fixture.rs
use mortgage_feed_sync::feed::FeedFetcher;

fn fixture() -> String {
    std::fs::read_to_string("tests/fixtures/boliglan.atom").expect("fixture")
}

#[tokio::test]
async fn fixture_feed_yields_keyed_entries_in_order() {
    let snap = FeedFetcher::from_fixture_str(&fixture()).fetch().await.unwrap();

    let ids: Vec<&str> = snap.entries.iter().map(|e| e.stable_id.as_str()).collect();
    assert_eq!(ids, vec!["46135", "50001", "50002"]);
    assert_eq!(snap.total_entries(), 3);

    let first = &snap.entries[0];
    assert_eq!(first.title, "Boliglån Standard");
    assert_eq!(first.supplier_label, "Testbanken ASA");
    assert_eq!(first.attribute("rammelan"), Some("TRUE"));
    assert_eq!(first.attribute("forbehold"), Some(""));
    assert_eq!(first.attribute("maks_lopetid"), Some("30"));
}

#[tokio::test]
async fn average_rate_ignores_blank_values_and_dropped_entries() {
    let snap = FeedFetcher::from_fixture_str(&fixture()).fetch().await.unwrap();
    // 5.5 and 6.0; the blank rate and the id-less 9.9 entry do not count
    assert!((snap.average_nominal_rate - 5.75).abs() < 1e-9);
}

#[tokio::test]
async fn malformed_feed_is_a_fetch_error() {
    let bad = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><id>x</entry></feed>"#;
    let err = FeedFetcher::from_fixture_str(bad).fetch().await.unwrap_err();
    assert!(format!("{err:#}").contains("parsing product feed"));
}

#[tokio::test]
async fn empty_feed_has_zero_average() {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#;
    let snap = FeedFetcher::from_fixture_str(xml).fetch().await.unwrap();
    assert_eq!(snap.total_entries(), 0);
    assert_eq!(snap.average_nominal_rate, 0.0);
}
