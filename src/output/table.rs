use tabled::{settings::Style, Table, Tabled};

use crate::cache::Snapshot;
use crate::model::{format_millis, GradeClass, Report};

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Grades")]
    grades: String,
    #[tabled(rename = "Endpoints")]
    endpoints: usize,
    #[tabled(rename = "Tested")]
    tested: String,
}

/// One row per cached host, sorted by host.
pub fn summary_table(snapshot: &Snapshot) -> String {
    let mut hosts: Vec<&String> = snapshot.keys().collect();
    hosts.sort();

    let rows: Vec<HostRow> = hosts
        .into_iter()
        .map(|host| row(host, &snapshot[host]))
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_summary(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("No scan results cached.");
        return;
    }

    println!("{} cached hosts:", snapshot.len());
    println!();
    println!("{}", summary_table(snapshot));

    let failing = snapshot
        .values()
        .flat_map(|r| &r.endpoints)
        .filter(|e| e.grade_class() == GradeClass::Failing)
        .count();
    if failing > 0 {
        println!();
        println!("{} endpoints with a failing grade", failing);
    }
}

fn row(host: &str, report: &Report) -> HostRow {
    let grades: Vec<&str> = report
        .endpoints
        .iter()
        .map(|e| e.grade.as_str())
        .filter(|g| !g.is_empty())
        .collect();

    HostRow {
        host: truncate(host, 40),
        status: report.status.to_string(),
        grades: if grades.is_empty() {
            "-".to_string()
        } else {
            grades.join(", ")
        },
        endpoints: report.endpoints.len(),
        tested: format_millis(report.test_time, "%Y-%m-%d %H:%M"),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, ReportStatus};

    #[test]
    fn test_summary_table_lists_hosts() {
        let mut ready = Report::new("alpha.example", ReportStatus::Ready);
        ready.endpoints.push(Endpoint {
            grade: "A+".into(),
            ..Default::default()
        });
        ready.endpoints.push(Endpoint {
            grade: "B".into(),
            ..Default::default()
        });

        let mut snapshot = Snapshot::new();
        snapshot.insert("alpha.example".into(), ready);
        snapshot.insert(
            "beta.example".into(),
            Report::new("beta.example", ReportStatus::Dns),
        );

        let table = summary_table(&snapshot);
        assert!(table.contains("alpha.example"));
        assert!(table.contains("A+, B"));
        assert!(table.contains("DNS"));
        assert!(table.find("alpha.example").unwrap() < table.find("beta.example").unwrap());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-host-name", 10), "a-very-...");
    }
}
