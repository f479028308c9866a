pub mod cache;
pub mod config;
pub mod model;
pub mod sql_check;
pub mod translator;

pub use cache::{CacheError, TranslationCache};
pub use model::{CacheEntry, CacheKey};
