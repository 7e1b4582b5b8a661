// src/remote/mod.rs
//! REST contract of the CMS collections (list/get/create/patch-live) and the
//! read-side helpers built on top of it.

pub mod bank;
pub mod index;
pub mod memory;
pub mod webflow;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::Payload;

pub const SLUG_FIELD: &str = "slug";
pub const NAME_FIELD: &str = "name";

/// A CMS item as listed by the collection API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    #[serde(rename = "fieldData", default)]
    pub field_data: Map<String, Value>,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>, field_data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            field_data,
        }
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.field_data.get(name).and_then(Value::as_str)
    }

    /// Slug field; expected to equal the feed entry's stable id.
    pub fn slug(&self) -> Option<&str> {
        self.text_field(SLUG_FIELD)
    }

    pub fn name(&self) -> Option<&str> {
        self.text_field(NAME_FIELD)
    }
}

/// Write body shared by create and patch-live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWrite {
    pub is_archived: bool,
    pub is_draft: bool,
    pub field_data: Payload,
}

impl ItemWrite {
    /// Published, non-archived item.
    pub fn live(field_data: Payload) -> Self {
        Self {
            is_archived: false,
            is_draft: false,
            field_data,
        }
    }
}

#[async_trait::async_trait]
pub trait CollectionApi: Send + Sync {
    /// One page of items starting at `offset`.
    async fn list_items(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteRecord>>;

    async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<RemoteRecord>;

    /// Create a new item. Non-success status is an `Err`.
    async fn create_item(&self, collection_id: &str, body: &ItemWrite) -> Result<()>;

    /// Patch an existing item directly in its live (published) state.
    async fn update_item_live(
        &self,
        collection_id: &str,
        item_id: &str,
        body: &ItemWrite,
    ) -> Result<()>;

    fn name(&self) -> &'static str;
}
