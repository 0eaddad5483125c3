pub mod config;
pub mod queue;
pub mod worker;

pub use config::{SyncConfig, MAX_RETRY_ATTEMPTS};
pub use queue::{DrainReport, SyncQueue};
pub use worker::{sync_loop, SyncController};
