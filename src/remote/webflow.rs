// src/remote/webflow.rs
//! Webflow v2 collection items over HTTPS with a bearer token.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

use super::{CollectionApi, ItemWrite, RemoteRecord};
use crate::retry::{CallClass, RetryPolicy};

/// Retry budget for one client: reads are labelled with `read_class`
/// (index pages or bank lookups), writes with [`CallClass::Write`].
#[derive(Debug, Clone, Copy)]
pub struct ClientRetries {
    pub read_class: CallClass,
    pub read: RetryPolicy,
    pub write: RetryPolicy,
}

impl Default for ClientRetries {
    fn default() -> Self {
        Self {
            read_class: CallClass::IndexPage,
            read: RetryPolicy::none(),
            write: RetryPolicy::none(),
        }
    }
}

#[derive(Clone)]
pub struct WebflowClient {
    base: String,
    token: String,
    http: Client,
    retries: ClientRetries,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<RemoteRecord>,
}

impl WebflowClient {
    pub fn new(
        base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        retries: ClientRetries,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("mortgage-feed-sync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("building webflow http client")?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
            retries,
        })
    }

    fn items_url(&self, collection_id: &str) -> String {
        format!("{}/collections/{}/items", self.base, collection_id)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let rsp = req
            .send()
            .await
            .with_context(|| format!("webflow {what} request failed"))?;
        let status = rsp.status();
        if status.is_success() {
            return Ok(rsp);
        }
        let body = rsp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();
        Err(anyhow!(
            "webflow {what} returned status {}: {snippet}",
            status.as_u16()
        ))
    }
}

#[async_trait]
impl CollectionApi for WebflowClient {
    async fn list_items(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteRecord>> {
        let url = self.items_url(collection_id);
        let url = url.as_str();
        self.retries
            .read
            .run(self.retries.read_class, move || async move {
                let req = self
                    .authed(self.http.get(url))
                    .query(&[("limit", limit), ("offset", offset)]);
                let rsp = self.send(req, "list").await?;
                let list: ItemList = rsp.json().await.context("decoding item list")?;
                Ok(list.items)
            })
            .await
    }

    async fn get_item(&self, collection_id: &str, item_id: &str) -> Result<RemoteRecord> {
        let url = format!("{}/{}", self.items_url(collection_id), item_id);
        let url = url.as_str();
        self.retries
            .read
            .run(self.retries.read_class, move || async move {
                let rsp = self.send(self.authed(self.http.get(url)), "get").await?;
                rsp.json::<RemoteRecord>().await.context("decoding item")
            })
            .await
    }

    async fn create_item(&self, collection_id: &str, body: &ItemWrite) -> Result<()> {
        let url = self.items_url(collection_id);
        let url = url.as_str();
        self.retries
            .write
            .run(CallClass::Write, move || async move {
                let req = self.authed(self.http.post(url)).json(body);
                self.send(req, "create").await.map(|_| ())
            })
            .await
    }

    async fn update_item_live(
        &self,
        collection_id: &str,
        item_id: &str,
        body: &ItemWrite,
    ) -> Result<()> {
        let url = format!("{}/{}/live", self.items_url(collection_id), item_id);
        let url = url.as_str();
        self.retries
            .write
            .run(CallClass::Write, move || async move {
                let req = self.authed(self.http.patch(url)).json(body);
                self.send(req, "update").await.map(|_| ())
            })
            .await
    }

    fn name(&self) -> &'static str {
        "webflow"
    }
}
