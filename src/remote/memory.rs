// src/remote/memory.rs
//! In-process collection store implementing [`CollectionApi`].
//! Used by tests and fixture dry runs; records every call it receives.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{CollectionApi, ItemWrite, RemoteRecord, NAME_FIELD};

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    List {
        collection_id: String,
        limit: usize,
        offset: usize,
    },
    Get {
        collection_id: String,
        item_id: String,
    },
    Create {
        collection_id: String,
        body: Value,
    },
    Update {
        collection_id: String,
        item_id: String,
        body: Value,
    },
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<RemoteRecord>>,
    failing_pages: HashSet<(String, usize)>,
    failing_names: HashSet<String>,
    calls: Vec<ApiCall>,
    next_id: usize,
}

#[derive(Default)]
pub struct InMemoryCollections {
    state: Mutex<State>,
}

impl InMemoryCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with existing records.
    pub fn with_records(self, collection_id: &str, records: Vec<RemoteRecord>) -> Self {
        self.lock()
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .extend(records);
        self
    }

    /// Listing `collection_id` at `offset` fails.
    pub fn fail_page(self, collection_id: &str, offset: usize) -> Self {
        self.lock()
            .failing_pages
            .insert((collection_id.to_string(), offset));
        self
    }

    /// Any create/update whose `name` field equals `name` fails.
    pub fn fail_writes_named(self, name: &str) -> Self {
        self.lock().failing_names.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn records(&self, collection_id: &str) -> Vec<RemoteRecord> {
        self.lock()
            .collections
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn body_fields(body: &ItemWrite) -> Result<(Value, Map<String, Value>)> {
    let value = serde_json::to_value(body).context("encoding item body")?;
    let fields = value
        .get("fieldData")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Ok((value, fields))
}

fn rejected_name(state: &State, fields: &Map<String, Value>) -> Option<String> {
    let name = fields.get(NAME_FIELD).and_then(Value::as_str)?;
    state
        .failing_names
        .contains(name)
        .then(|| name.to_string())
}

#[async_trait]
impl CollectionApi for InMemoryCollections {
    async fn list_items(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteRecord>> {
        let mut state = self.lock();
        state.calls.push(ApiCall::List {
            collection_id: collection_id.to_string(),
            limit,
            offset,
        });
        if state
            .failing_pages
            .contains(&(collection_id.to_string(), offset))
        {
            return Err(anyhow!("list {collection_id} offset {offset}: status 500"));
        }
        Ok(state
            .collections
            .get(collection_id)
            .map(|items| items.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<RemoteRecord> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Get {
            collection_id: collection_id.to_string(),
            item_id: item_id.to_string(),
        });
        state
            .collections
            .get(collection_id)
            .and_then(|items| items.iter().find(|r| r.id == item_id))
            .cloned()
            .ok_or_else(|| anyhow!("get {collection_id}/{item_id}: status 404"))
    }

    async fn create_item(&self, collection_id: &str, body: &ItemWrite) -> Result<()> {
        let (value, fields) = body_fields(body)?;
        let mut state = self.lock();
        state.calls.push(ApiCall::Create {
            collection_id: collection_id.to_string(),
            body: value,
        });
        if let Some(name) = rejected_name(&state, &fields) {
            return Err(anyhow!("create '{name}': status 400"));
        }
        state.next_id += 1;
        let id = format!("item-{}", state.next_id);
        state
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .push(RemoteRecord::new(id, fields));
        Ok(())
    }

    async fn update_item_live(
        &self,
        collection_id: &str,
        item_id: &str,
        body: &ItemWrite,
    ) -> Result<()> {
        let (value, fields) = body_fields(body)?;
        let mut state = self.lock();
        state.calls.push(ApiCall::Update {
            collection_id: collection_id.to_string(),
            item_id: item_id.to_string(),
            body: value,
        });
        if let Some(name) = rejected_name(&state, &fields) {
            return Err(anyhow!("update '{name}': status 400"));
        }
        let record = state
            .collections
            .get_mut(collection_id)
            .and_then(|items| items.iter_mut().find(|r| r.id == item_id))
            .ok_or_else(|| anyhow!("update {collection_id}/{item_id}: status 404"))?;
        record.field_data.extend(fields);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
