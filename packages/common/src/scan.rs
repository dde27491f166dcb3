use serde::{Deserialize, Serialize};

use crate::file_status::FileStatus;
use crate::mq::Message;
use crate::storage::ContentHash;

/// Work item asking a scan worker to analyse one stored sample.
///
/// The payload is the content hash alone; workers fetch the bytes from the
/// samples bucket themselves. Dispatch is at-least-once, so the same hash may
/// arrive more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub sha256: ContentHash,
}

impl Message for ScanJob {
    fn message_type() -> &'static str {
        "scan"
    }

    fn message_id(&self) -> String {
        self.sha256.to_hex()
    }
}

/// Progress report published by a scan worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub sha256: ContentHash,
    pub status: FileStatus,
    /// Engine output, stored verbatim once the scan is finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
}

impl Message for ScanReport {
    fn message_type() -> &'static str {
        "scan_report"
    }

    fn message_id(&self) -> String {
        format!("{}:{}", self.sha256, self.status)
    }
}
