use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of an analysis as reported by the provider.
///
/// Anything that is neither `READY` nor `ERROR` belongs to the processing
/// family; unknown values are kept verbatim so they survive a save/load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    Dns,
    #[default]
    InProgress,
    Ready,
    Error,
    Other(String),
}

impl ReportStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReportStatus::Dns => "DNS",
            ReportStatus::InProgress => "IN_PROGRESS",
            ReportStatus::Ready => "READY",
            ReportStatus::Error => "ERROR",
            ReportStatus::Other(s) => s,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReportStatus::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReportStatus::Error)
    }

    /// True for every non-terminal status.
    pub fn is_processing(&self) -> bool {
        !self.is_ready() && !self.is_error()
    }
}

impl From<String> for ReportStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DNS" => ReportStatus::Dns,
            "IN_PROGRESS" => ReportStatus::InProgress,
            "READY" => ReportStatus::Ready,
            "ERROR" => ReportStatus::Error,
            _ => ReportStatus::Other(s),
        }
    }
}

impl From<ReportStatus> for String {
    fn from(status: ReportStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full analysis result for one host at one point in time.
///
/// Field names follow the provider's camelCase JSON. Every field has a
/// default because in-progress responses omit most of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Report {
    pub host: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds; zero until the provider finishes.
    pub test_time: i64,
    pub endpoints: Vec<Endpoint>,
    pub certs: Vec<Certificate>,
}

impl Report {
    pub fn new(host: impl Into<String>, status: ReportStatus) -> Self {
        Self {
            host: host.into(),
            status,
            ..Default::default()
        }
    }

    /// Lookup table from certificate id to certificate.
    pub fn cert_index(&self) -> HashMap<&str, &Certificate> {
        self.certs.iter().map(|c| (c.id.as_str(), c)).collect()
    }

    /// Average progress over endpoints that report one, if any.
    pub fn progress(&self) -> Option<i32> {
        let values: Vec<i64> = self
            .endpoints
            .iter()
            .map(|e| i64::from(e.progress))
            .filter(|p| *p >= 0)
            .collect();
        if values.is_empty() {
            return None;
        }
        let average = values.iter().sum::<i64>() / values.len() as i64;
        Some(i32::try_from(average).unwrap_or(i32::MAX))
    }

    /// Start time as `dd/mm/YYYY HH:MM:SS` in local time.
    pub fn formatted_start(&self) -> String {
        format_millis(self.start_time, "%d/%m/%Y %H:%M:%S")
    }

    /// Wall-clock duration of the analysis, or "in progress" while the
    /// provider has not stamped a completion time.
    pub fn duration(&self) -> String {
        if self.test_time <= self.start_time {
            return "in progress".to_string();
        }
        let secs = (self.test_time.saturating_sub(self.start_time) as f64 / 1000.0).round() as i64;
        format_secs(secs)
    }
}

/// One server instance backing a host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub ip_address: String,
    pub grade: String,
    pub server_name: String,
    /// Scan duration in milliseconds.
    pub duration: i64,
    pub progress: i32,
    pub details: EndpointDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
}

impl Endpoint {
    pub fn grade_class(&self) -> GradeClass {
        GradeClass::from_grade(&self.grade)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointDetails {
    pub cert_chains: Vec<CertChain>,
    pub protocols: Vec<Protocol>,
    pub heartbleed: bool,
    pub vuln_beast: bool,
    /// Provider bitmask; any non-zero value means some forward secrecy.
    pub forward_secrecy: i32,
}

impl EndpointDetails {
    pub fn has_forward_secrecy(&self) -> bool {
        self.forward_secrecy > 0
    }
}

/// Ordered certificate references forming one trust path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertChain {
    pub id: String,
    pub cert_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Protocol {
    pub name: String,
    pub version: String,
}

impl Protocol {
    pub fn strength(&self) -> ProtocolStrength {
        if self.name.eq_ignore_ascii_case("ssl") || self.version.to_uppercase().contains("SSL") {
            return ProtocolStrength::Insecure;
        }
        match self.version.as_str() {
            "1.3" | "1.2" => ProtocolStrength::Modern,
            "1.1" | "1.0" => ProtocolStrength::Legacy,
            _ => ProtocolStrength::Unknown,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStrength {
    Modern,
    Legacy,
    Insecure,
    Unknown,
}

impl ProtocolStrength {
    pub fn label(&self) -> &'static str {
        match self {
            ProtocolStrength::Modern => "modern",
            ProtocolStrength::Legacy => "legacy",
            ProtocolStrength::Insecure => "insecure",
            ProtocolStrength::Unknown => "unknown",
        }
    }
}

/// Certificate as listed once per report and referenced by id from chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    pub id: String,
    pub subject: String,
    pub issuer_label: String,
    pub sig_alg: String,
    pub key_alg: String,
    pub key_size: u32,
    /// Epoch milliseconds.
    pub not_before: i64,
    /// Epoch milliseconds.
    pub not_after: i64,
    pub common_names: Vec<String>,
    pub revocation_status: i32,
}

impl Certificate {
    pub fn revocation(&self) -> RevocationStatus {
        RevocationStatus::from_code(self.revocation_status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    NotChecked,
    Revoked,
    Valid,
    CheckUnavailable,
    NoInfo,
    InternalError,
    Unknown,
}

impl RevocationStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RevocationStatus::NotChecked,
            1 => RevocationStatus::Revoked,
            2 => RevocationStatus::Valid,
            3 => RevocationStatus::CheckUnavailable,
            4 => RevocationStatus::NoInfo,
            5 => RevocationStatus::InternalError,
            _ => RevocationStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RevocationStatus::NotChecked => "Not checked",
            RevocationStatus::Revoked => "REVOKED",
            RevocationStatus::Valid => "Not revoked",
            RevocationStatus::CheckUnavailable => "Check unavailable",
            RevocationStatus::NoInfo => "No revocation info",
            RevocationStatus::InternalError => "Internal error",
            RevocationStatus::Unknown => "Unknown",
        }
    }
}

/// Coarse bucket of an endpoint grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeClass {
    Good,
    Fair,
    Weak,
    Failing,
    Unknown,
}

impl GradeClass {
    pub fn from_grade(grade: &str) -> Self {
        match grade.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('A') => GradeClass::Good,
            Some('B') => GradeClass::Fair,
            Some('C') => GradeClass::Weak,
            Some('D') | Some('E') | Some('F') | Some('T') | Some('M') => GradeClass::Failing,
            _ => GradeClass::Unknown,
        }
    }
}

/// Best-effort location of an endpoint address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoLocation {
    pub country: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
}

/// Formats an epoch-millisecond value in local time, or "-" when the value
/// is unset or out of range.
pub fn format_millis(millis: i64, fmt: &str) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc.with_timezone(&Local).format(fmt).to_string(),
        None => "-".to_string(),
    }
}

fn format_secs(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
