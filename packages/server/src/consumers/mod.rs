pub mod scan_report;

pub use scan_report::consume_scan_reports;
