pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod platform;
pub mod scan;
pub mod service;
pub mod store;

pub use cache::ReportCache;
pub use config::Config;
pub use error::{ClientError, ScanError};
pub use model::{Certificate, Endpoint, Report, ReportStatus};
pub use scan::{ScanHandle, ScanOrchestrator, ScanPolicy};
pub use service::{QueryResponse, ScanService};
pub use store::{JsonFileStore, ReportStore};
