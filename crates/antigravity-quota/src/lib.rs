//! Antigravity quota resolution and aggregation
//!
//! Resolves remaining model quota for every Antigravity account in a
//! credential store and merges the results into one `QuotaReport`.
//!
//! Per-account pipeline (`Resolver::resolve`):
//! 1. Make sure the access token is usable (refresh if expired)
//! 2. Query `fetchAvailableModels` across the candidate endpoints
//! 3. On 403, infer quota from rate-limit headers of minimal `generateContent` calls
//! 4. Produce exactly one `AccountQuota`, whatever happened
//!
//! `Aggregator` runs one task per account and collects the results.

pub mod aggregator;
pub mod constants;
pub mod display;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod probe;
pub mod resolver;

pub use aggregator::Aggregator;
pub use display::display_name;
pub use endpoint::QuotaClient;
pub use error::{Error, Result};
pub use model::{AccountQuota, AccountStatus, ModelQuota, QuotaReport};
pub use probe::HeaderProbe;
pub use resolver::Resolver;
