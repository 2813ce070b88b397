//! Reconciles the vector index against the wiki source: paginate, hash,
//! skip up-to-date pages, chunk+embed the rest, upsert, persist state.

pub mod content_hash;
pub mod rate_limiter;
pub mod state;
pub mod wiki_source;
pub mod worker;

pub use content_hash::content_hash as compute_content_hash;
pub use rate_limiter::RateLimiter;
pub use state::{IngestState, StateError, StateStore};
pub use wiki_source::{SearchQuery, SearchResponse, WikiSource, WikiSourceError};
pub use worker::{CrawlerConfig, IngestError, IngestWorker, SpaceReport, TickReport};
