pub mod error;
pub mod output;
pub mod pool;
pub mod signal;
pub mod stat;
pub mod stream;
pub mod worker;

pub use error::{CrawlPoolError, Result};
pub use pool::{Pool, PoolOutcome};
pub use signal::SignalHandler;
pub use stat::Stat;
pub use stream::{decode_line, LogEvent};
pub use worker::WorkerSpec;
