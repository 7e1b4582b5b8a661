// src/remote/index.rs
//! Snapshot of the target collection keyed by slug, rebuilt once per run.

use metrics::counter;
use std::collections::HashMap;
use std::time::Duration;

use super::{CollectionApi, RemoteRecord};

#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    records: HashMap<String, RemoteRecord>,
    pub pages_fetched: usize,
    /// False when a page request failed and paging stopped early.
    pub complete: bool,
}

impl RemoteIndex {
    pub fn from_records(records: impl IntoIterator<Item = RemoteRecord>) -> Self {
        let mut index = Self {
            complete: true,
            ..Self::default()
        };
        for r in records {
            index.insert(r);
        }
        index
    }

    fn insert(&mut self, record: RemoteRecord) {
        match record.slug() {
            Some(slug) if !slug.is_empty() => {
                let slug = slug.to_string();
                self.records.insert(slug, record);
            }
            _ => tracing::debug!(target: "remote", id = %record.id, "record without slug not indexed"),
        }
    }

    pub fn get(&self, slug: &str) -> Option<&RemoteRecord> {
        self.records.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.records.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Page through `collection_id` until a page comes back shorter than
/// `page_size`. A failed page stops paging; the partial index is returned with
/// `complete == false`.
pub async fn build_remote_index(
    api: &dyn CollectionApi,
    collection_id: &str,
    page_size: usize,
    page_delay: Duration,
) -> RemoteIndex {
    let page_size = page_size.max(1);
    let mut index = RemoteIndex::default();
    let mut offset = 0usize;

    loop {
        match api.list_items(collection_id, page_size, offset).await {
            Ok(items) => {
                let n = items.len();
                index.pages_fetched += 1;
                counter!("remote_index_pages_total").increment(1);
                for item in items {
                    index.insert(item);
                }
                if n < page_size {
                    index.complete = true;
                    break;
                }
                offset += page_size;
            }
            Err(e) => {
                counter!("remote_index_errors_total").increment(1);
                tracing::warn!(
                    target: "remote",
                    collection = collection_id,
                    offset,
                    error = %e,
                    indexed = index.len(),
                    "Failed to fetch Webflow items; continuing with partial index (may create duplicates)"
                );
                index.complete = false;
                break;
            }
        }
        tokio::time::sleep(page_delay).await;
    }

    tracing::info!(
        target: "remote",
        collection = collection_id,
        items = index.len(),
        pages = index.pages_fetched,
        complete = index.complete,
        "Fetched unique items from Webflow"
    );
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, slug: Option<&str>) -> RemoteRecord {
        let mut fields = serde_json::Map::new();
        if let Some(s) = slug {
            fields.insert("slug".into(), json!(s));
        }
        RemoteRecord::new(id, fields)
    }

    #[test]
    fn records_are_keyed_by_slug_and_blank_slugs_skipped() {
        let idx = RemoteIndex::from_records(vec![
            rec("a", Some("100")),
            rec("b", Some("")),
            rec("c", None),
            rec("d", Some("200")),
        ]);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get("100").map(|r| r.id.as_str()), Some("a"));
        assert!(idx.contains("200"));
        assert!(!idx.contains(""));
    }

    #[test]
    fn later_duplicate_slug_wins() {
        let idx = RemoteIndex::from_records(vec![rec("a", Some("1")), rec("b", Some("1"))]);
        assert_eq!(idx.get("1").map(|r| r.id.as_str()), Some("b"));
    }
}
