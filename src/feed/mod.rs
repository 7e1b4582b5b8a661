// src/feed/mod.rs
pub mod atom;

use anyhow::{bail, Context, Result};
use metrics::{counter, histogram};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::derive::{parse_amount, ATTR_NOMINAL_RATE};
use crate::retry::{CallClass, RetryPolicy};

/// One mortgage product from the feed. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub supplier_label: String,
    pub stable_id: String,
    /// Raw `f:*` element local name -> trimmed text.
    pub attributes: BTreeMap<String, String>,
}

impl FeedEntry {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Parsed feed plus the per-run aggregates stamped into every payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub entries: Vec<FeedEntry>,
    pub average_nominal_rate: f64,
}

impl FeedSnapshot {
    pub fn from_entries(entries: Vec<FeedEntry>) -> Self {
        let average_nominal_rate = mean_nominal_rate(&entries);
        Self {
            entries,
            average_nominal_rate,
        }
    }

    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }
}

/// Mean of the nominal rate over entries that carry a parseable value.
/// Missing, blank or non-numeric rates are excluded, not counted as zero.
/// No parseable rates at all yields 0.0.
pub fn mean_nominal_rate(entries: &[FeedEntry]) -> f64 {
    let rates: Vec<f64> = entries
        .iter()
        .filter_map(|e| {
            let raw = e.attribute(ATTR_NOMINAL_RATE)?;
            if raw.trim().is_empty() {
                return None;
            }
            parse_amount(Some(raw)).ok()
        })
        .collect();
    if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

/// Parse a feed document into a snapshot, recording parse metrics.
pub fn parse_snapshot(xml: &str) -> Result<FeedSnapshot> {
    let t0 = std::time::Instant::now();
    let entries = atom::parse_entries(xml).context("parsing product feed")?;
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("feed_parse_ms").record(ms);
    counter!("feed_entries_total").increment(entries.len() as u64);
    Ok(FeedSnapshot::from_entries(entries))
}

#[derive(Debug, Clone)]
pub struct FeedCredentials {
    pub username: String,
    pub password: String,
}

pub struct FeedFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        credentials: FeedCredentials,
        client: reqwest::Client,
        retry: RetryPolicy,
    },
}

impl FeedFetcher {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(
        url: impl Into<String>,
        credentials: FeedCredentials,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mortgage-feed-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                credentials,
                client,
                retry,
            },
        })
    }

    /// One authenticated retrieval. Anything but HTTP 200 is a fetch failure.
    pub async fn fetch(&self) -> Result<FeedSnapshot> {
        match &self.mode {
            Mode::Fixture(s) => parse_snapshot(s),
            Mode::Http {
                url,
                credentials,
                client,
                retry,
            } => {
                let body = retry
                    .run(CallClass::Feed, move || async move {
                        let resp = client
                            .get(url.as_str())
                            .basic_auth(&credentials.username, Some(&credentials.password))
                            .send()
                            .await
                            .context("feed http get()")?;
                        let status = resp.status();
                        if status != reqwest::StatusCode::OK {
                            bail!("Failed to fetch XML data. Status code: {}", status.as_u16());
                        }
                        resp.text().await.context("feed http .text()")
                    })
                    .await?;
                parse_snapshot(&body)
            }
        }
    }
}
