use std::sync::Arc;

use common::ScanReport;
use mq::{BroccoliError, BrokerMessage, Mq};
use tracing::{error, info, warn};

use crate::services::{ContentAddressStore, ServiceError};

/// What happened to one scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied,
    /// Duplicate or out-of-order report; the record was left as is.
    Ignored,
    /// No file record for the hash. The report is acknowledged and dropped.
    UnknownFile,
}

/// Consume scan reports published by the analysis workers.
pub async fn consume_scan_reports(content: ContentAddressStore, mq: Arc<Mq>, queue_name: String) {
    info!(queue = %queue_name, "Starting scan report consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<ScanReport>| {
                let content = content.clone();
                async move {
                    let report = message.payload;
                    let sha256 = report.sha256;

                    if let Err(e) = apply_scan_report(&content, report).await {
                        error!(sha256 = %sha256, error = %e, "Failed to apply scan report");
                        return Err(BroccoliError::Job(e.to_string()));
                    }
                    Ok(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Scan report consumer stopped unexpectedly");
    }
}

/// Apply one report to its file record.
pub async fn apply_scan_report(
    content: &ContentAddressStore,
    report: ScanReport,
) -> anyhow::Result<ReportOutcome> {
    let ScanReport {
        sha256,
        status,
        analysis,
    } = report;

    match content.apply_status(&sha256, status, analysis).await {
        Ok(true) => {
            info!(sha256 = %sha256, status = %status, "Scan status updated");
            Ok(ReportOutcome::Applied)
        }
        Ok(false) => {
            warn!(sha256 = %sha256, status = %status, "Ignoring duplicate or out-of-order scan report");
            Ok(ReportOutcome::Ignored)
        }
        Err(ServiceError::NotFound(_)) => {
            warn!(sha256 = %sha256, "Scan report for unknown file, dropping");
            Ok(ReportOutcome::UnknownFile)
        }
        Err(e) => Err(e.into()),
    }
}
