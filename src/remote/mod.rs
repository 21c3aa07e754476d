pub mod cache;
pub mod loader;

pub use cache::{CacheEntry, TtlCache};
pub use loader::{map_options, CachePolicy, FormLoader, RetryPolicy};
