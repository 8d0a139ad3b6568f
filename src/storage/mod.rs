//! Durable daily logs and the historical range queries built on them.

pub mod daily_log;
pub mod query;

pub use daily_log::PersistenceStore;
pub use query::{downsample, QueryEngine, RangeSelector, MAX_DOWNSAMPLED_POINTS};
