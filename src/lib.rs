// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod derive;
pub mod feed;
pub mod locale;
pub mod payload;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod retry;
pub mod slug;

// ---- Re-exports for stable public API ----
pub use crate::config::SyncConfig;
pub use crate::feed::{FeedEntry, FeedFetcher, FeedSnapshot};
pub use crate::pipeline::{run_sync, run_with};
pub use crate::reconcile::{decide, SyncDecision, SyncReport};
pub use crate::remote::{CollectionApi, RemoteRecord};
