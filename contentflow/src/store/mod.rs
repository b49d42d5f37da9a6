//! Job persistence and caching.
//!
//! - [`JobRepository`]: the writer of record for job state
//! - [`InMemoryJobRepository`] and [`JsonFileJobRepository`] backends
//! - [`JobCache`]: short-lived snapshots for status polling
//! - [`RateLimiter`]: per-client submission quota

mod cache;
mod file;
mod rate_limit;
mod repository;

pub use cache::{CacheProgressObserver, CacheTtls, JobCache};
pub use file::JsonFileJobRepository;
pub use rate_limit::RateLimiter;
pub use repository::{InMemoryJobRepository, JobQuery, JobRepository};
