//! Analysis result types as returned by the SSL Labs API.
//!
//! - [`Report`] - Full result for one host at one point in time
//! - [`Endpoint`] - One server address backing the host, with its grade
//! - [`CertChain`] - Certificate ids forming one trust path
//! - [`Certificate`] - A certificate, listed once per report
//!
//! Chains never own certificates; they reference them by id and are
//! resolved through [`Report::cert_index`].
//!
//! # Example
//!
//! ```
//! use sslcheck::model::{Report, ReportStatus};
//!
//! let report: Report =
//!     serde_json::from_str(r#"{"host":"example.com","status":"IN_PROGRESS"}"#).unwrap();
//!
//! assert_eq!(report.status, ReportStatus::InProgress);
//! assert!(report.status.is_processing());
//! ```

mod report;

pub use report::*;
