//! Domain models for pull history

mod pool;
mod record;

pub use pool::{PoolCategory, UnknownPoolCategory};
pub use record::{LocalRecord, PullRecord, RecordKey};
