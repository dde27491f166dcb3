pub mod config;
pub mod file_status;
pub mod mq;
pub mod retry;
pub mod scan;
pub mod storage;

pub use file_status::FileStatus;
pub use scan::{ScanJob, ScanReport};
pub use storage::ContentHash;
