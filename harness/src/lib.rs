//! Load harness for [`ttl_dedup::Coalescer`].
//!
//! Many simulated callers are started on a thread pool, each resolving a key through one shared
//! cache whose computation is deliberately slow. Every caller reports to a reporter thread; in
//! the end the harness tells how many times the computation actually ran.

#![warn(missing_docs, missing_debug_implementations)]
#![deny(unsafe_code)]

mod config;
mod driver;
pub mod logging;
mod statistics;
mod thread_pool;
mod workload;

pub use config::{ConfigError, HarnessConfig};
pub use driver::{run, Summary};
pub use statistics::{KeyStatistics, Outcome, Report, Statistics};
pub use thread_pool::ThreadPool;
pub use workload::{Workload, WorkloadError};
