//! Request-coalescing cache with TTL freshness.
//!
//! A [`Coalescer`] wraps an expensive, deterministic computation keyed by `K`. Results are
//! reused until they are older than the configured time-to-live, and concurrent requests for
//! the same key share a single in-flight computation. Requests for different keys never wait
//! on each other.
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use ttl_dedup::Coalescer;
//!
//! let cache = Coalescer::new(Duration::from_secs(60), |key: &String| {
//!     Ok::<_, Infallible>(key.to_uppercase())
//! });
//! assert_eq!(cache.resolve("dog".to_string()), Ok("DOG".to_string()));
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![deny(unsafe_code)]

mod cache;
mod error;
mod sync;

pub use cache::Coalescer;
pub use error::ResolveError;
