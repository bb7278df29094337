use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Alphabet, AnalysisStatus, Workflow};

const RFC1123_WITHOUT_ZONE: &str = "%a, %d %b %Y %H:%M:%S";

fn status_not_exists() -> i32 {
    AnalysisStatus::NotExists.code()
}

fn workflow_nil() -> i32 {
    Workflow::BootstrapOnly.code()
}

/// Analysis snapshot served by `/api/analysis/{id}` and
/// `/api/analysis/{id}/{collapse}`. Every field may be absent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub id: String,
    #[serde(default = "status_not_exists")]
    pub status: i32,
    #[serde(default)]
    pub message: String,
    /// Result tree as rendered on the analysis page.
    #[serde(default)]
    pub newick: String,
    /// Result tree with low-support branches collapsed.
    #[serde(default)]
    pub collapsed: String,
    #[serde(default)]
    pub tbenormtree: String,
    #[serde(default)]
    pub tberawtree: String,
    #[serde(default)]
    pub fbptree: String,
    #[serde(default)]
    pub align: String,
    #[serde(default)]
    pub tbelogs: String,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub nbootrep: i64,
    #[serde(default)]
    pub alphabet: i32,
    #[serde(default = "workflow_nil")]
    pub workflow: i32,
    #[serde(default)]
    pub nboot: i64,
    #[serde(default)]
    pub startpending: String,
    #[serde(default)]
    pub startrunning: String,
    #[serde(default)]
    pub end: String,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            id: "none".to_string(),
            status: status_not_exists(),
            message: String::new(),
            newick: String::new(),
            collapsed: String::new(),
            tbenormtree: String::new(),
            tberawtree: String::new(),
            fbptree: String::new(),
            align: String::new(),
            tbelogs: String::new(),
            result: serde_json::Value::Null,
            nbootrep: 0,
            alphabet: 0,
            workflow: workflow_nil(),
            nboot: 0,
            startpending: String::new(),
            startrunning: String::new(),
            end: String::new(),
        }
    }
}

impl Analysis {
    pub fn status(&self) -> AnalysisStatus {
        AnalysisStatus::from_code(self.status)
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::from_code(self.workflow)
    }

    /// Only meaningful when the trees were built from an alignment.
    pub fn alphabet(&self) -> Option<Alphabet> {
        if self.align.is_empty() {
            return None;
        }
        Alphabet::from_code(self.alphabet)
    }

    /// Elapsed time since the analysis was queued, `"?"` if a date is unreadable.
    pub fn run_time(&self, now: DateTime<Utc>) -> String {
        match self.run_time_seconds(now) {
            Some(seconds) => format_run_time(seconds),
            None => "?".to_string(),
        }
    }

    pub fn run_time_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let start = parse_rfc1123(&self.startpending)?;
        let end = if self.end.is_empty() {
            now
        } else {
            parse_rfc1123(&self.end)?
        };
        let millis = (end - start).num_milliseconds();
        Some((millis as f64 / 1000.0).round() as i64)
    }
}

/// Parses `Mon, 02 Jan 2006 15:04:05 MST`. Numeric and well-known zones go
/// through RFC 2822 parsing; other abbreviations are read as UTC.
pub fn parse_rfc1123(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let (without_zone, _zone) = raw.rsplit_once(' ')?;
    NaiveDateTime::parse_from_str(without_zone, RFC1123_WITHOUT_ZONE)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats whole seconds as `1h2m3s`, `4m5s` or `6s`.
pub fn format_run_time(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{sign}{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{sign}{minutes}m{secs}s")
    } else {
        format!("{sign}{secs}s")
    }
}

/// Usage statistics served by `/api/stat/json`: one label per period and the
/// cumulated distance computed for that period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub distdays: Vec<f64>,
    #[serde(default)]
    pub months: Vec<String>,
    #[serde(default)]
    pub distmonths: Vec<f64>,
    #[serde(default)]
    pub years: Vec<String>,
    #[serde(default)]
    pub distyears: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "Status")]
    pub status: String,
}

impl ServiceStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
