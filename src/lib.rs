pub mod cli;
pub mod core;
pub mod storage;

pub use crate::core::error::DownloadError;
pub use crate::core::scheduler::Scheduler;
