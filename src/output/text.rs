//! Plain-text reports.
//!
//! Rendering is a pure function of its input: no clock reads, no I/O.
//! Certificates are resolved through a per-report id table; chain entries
//! pointing at unknown ids are left out.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt::Write;

use crate::cache::Snapshot;
use crate::model::{format_millis, Certificate, Endpoint, Report};

const RULE: &str = "==========================================================";
const THIN_RULE: &str = "----------------------------------------------------------";
const HASH_RULE: &str = "##########################################################";
const CERT_RULE: &str = "    --------------------------------------";

/// Renders one report as text.
pub fn render_report(report: &Report) -> String {
    render_block(&report.host, report)
}

/// Renders every cached report under a global header.
///
/// Hosts are emitted in sorted order so the same snapshot always yields the
/// same text.
pub fn render_all(snapshot: &Snapshot, generated_at: DateTime<Local>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", HASH_RULE);
    let _ = writeln!(out, "          SSL REPORT FOR ALL SITES");
    let _ = writeln!(
        out,
        "          Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "{}", HASH_RULE);
    out.push('\n');

    if snapshot.is_empty() {
        out.push_str("No scan results available.\n");
        return out;
    }

    let mut hosts: Vec<&String> = snapshot.keys().collect();
    hosts.sort();

    for host in &hosts {
        let report = &snapshot[*host];
        let name = if report.host.is_empty() {
            host.as_str()
        } else {
            report.host.as_str()
        };
        out.push_str(&render_block(name, report));
        out.push_str("\n\n");
        let _ = writeln!(out, "{}", HASH_RULE);
        out.push('\n');
    }

    let _ = writeln!(out, "Total hosts: {}", hosts.len());
    out
}

fn render_block(host: &str, report: &Report) -> String {
    let certs = report.cert_index();
    let mut out = String::new();

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "         SSL REPORT: {}", host.to_uppercase());
    let _ = writeln!(out, "{}", RULE);
    out.push('\n');

    let _ = writeln!(out, "Host:     {}", host);
    let _ = writeln!(out, "Status:   {}", report.status);
    if let Some(message) = report.status_message.as_deref().filter(|m| !m.is_empty()) {
        let _ = writeln!(out, "Message:  {}", message);
    }
    let _ = writeln!(out, "Started:  {}", report.formatted_start());
    let _ = writeln!(
        out,
        "Tested:   {}",
        format_millis(report.test_time, "%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Duration: {}", report.duration());
    let _ = writeln!(out, "{}", THIN_RULE);
    out.push('\n');

    for (i, endpoint) in report.endpoints.iter().enumerate() {
        render_endpoint(&mut out, i + 1, endpoint, &certs);
    }

    out
}

fn render_endpoint(
    out: &mut String,
    number: usize,
    endpoint: &Endpoint,
    certs: &HashMap<&str, &Certificate>,
) {
    let details = &endpoint.details;

    let _ = writeln!(out, "ENDPOINT #{}", number);
    let _ = writeln!(out, "IP:          {}", endpoint.ip_address);
    let _ = writeln!(out, "Server Name: {}", or_dash(&endpoint.server_name));
    let _ = writeln!(out, "Grade:       {}", or_dash(&endpoint.grade));
    if let Some(location) = &endpoint.location {
        let _ = writeln!(out, "Location:    {}, {}", location.city, location.country);
    }
    let _ = writeln!(
        out,
        "Forward Secrecy: {}",
        yes_no(details.has_forward_secrecy())
    );
    let _ = writeln!(out, "Heartbleed:  {}", vulnerable(details.heartbleed));
    let _ = writeln!(out, "BEAST:       {}", vulnerable(details.vuln_beast));

    if !details.protocols.is_empty() {
        let protocols: Vec<String> = details
            .protocols
            .iter()
            .map(|p| format!("{} ({})", p, p.strength().label()))
            .collect();
        let _ = writeln!(out, "Protocols:   {}", protocols.join(", "));
    }

    out.push_str("\nCERTIFICATE CHAIN:\n");
    for chain in &details.cert_chains {
        for cert in chain.cert_ids.iter().filter_map(|id| certs.get(id.as_str())) {
            render_certificate(out, cert);
        }
    }

    let _ = write!(out, "\n{}\n", RULE);
}

fn render_certificate(out: &mut String, cert: &Certificate) {
    let _ = writeln!(out, "  - Subject: {}", cert.subject);
    let _ = writeln!(
        out,
        "    Alg:    {} ({} {} bits)",
        cert.sig_alg, cert.key_alg, cert.key_size
    );
    let _ = writeln!(out, "    Expire: {}", format_millis(cert.not_after, "%Y-%m-%d"));
    let _ = writeln!(
        out,
        "    Valid:  {} to {}",
        format_millis(cert.not_before, "%Y-%m-%d"),
        format_millis(cert.not_after, "%Y-%m-%d")
    );
    if !cert.issuer_label.is_empty() {
        let _ = writeln!(out, "    Issuer: {}", cert.issuer_label);
    }
    let _ = writeln!(out, "    Revocation: {}", cert.revocation().label());
    let _ = writeln!(out, "{}", CERT_RULE);
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn vulnerable(value: bool) -> &'static str {
    if value {
        "VULNERABLE"
    } else {
        "not vulnerable"
    }
}
