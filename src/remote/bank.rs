// src/remote/bank.rs
//! Supplier label -> bank item id, via the bank collection's `name` field.

use std::collections::HashMap;

use super::CollectionApi;

pub struct BankResolver<'a> {
    api: &'a dyn CollectionApi,
    collection_id: String,
    page_size: usize,
    max_pages: usize,
    memo: HashMap<String, Option<String>>,
}

impl<'a> BankResolver<'a> {
    pub fn new(
        api: &'a dyn CollectionApi,
        collection_id: impl Into<String>,
        page_size: usize,
        max_pages: usize,
    ) -> Self {
        Self {
            api,
            collection_id: collection_id.into(),
            page_size: page_size.max(1),
            max_pages,
            memo: HashMap::new(),
        }
    }

    /// First bank whose name equals `label` exactly (case-sensitive), scanning at
    /// most `max_pages` pages at fixed offsets. A failed page is skipped. A miss is
    /// `None`, never an error. Outcomes of fully scanned lookups are memoised for
    /// the lifetime of the resolver.
    pub async fn resolve(&mut self, label: &str) -> Option<String> {
        if label.is_empty() {
            return None;
        }
        if let Some(hit) = self.memo.get(label) {
            return hit.clone();
        }

        let mut clean_scan = true;
        for page in 0..self.max_pages {
            let offset = page * self.page_size;
            match self
                .api
                .list_items(&self.collection_id, self.page_size, offset)
                .await
            {
                Ok(items) => {
                    let short = items.len() < self.page_size;
                    if let Some(found) = items.into_iter().find(|r| r.name() == Some(label)) {
                        tracing::debug!(target: "remote", label, bank_id = %found.id, "Found bank ID");
                        self.memo.insert(label.to_string(), Some(found.id.clone()));
                        return Some(found.id);
                    }
                    if short {
                        break;
                    }
                }
                Err(e) => {
                    clean_scan = false;
                    tracing::warn!(
                        target: "remote",
                        label,
                        offset,
                        error = %e,
                        "Failed to retrieve bank page while fetching bank ID"
                    );
                }
            }
        }

        tracing::info!(target: "remote", label, "No bank ID found");
        if clean_scan {
            self.memo.insert(label.to_string(), None);
        }
        None
    }
}
