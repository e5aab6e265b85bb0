//! Verdict framing written by generated harnesses and read by the validator.
//!
//! A harness ends its stdout with
//!
//! ```text
//! <actual output lines>
//! ==ARBITER-VERDICT v1==
//! PASS | FAIL: <detail> | ERROR: <message>
//! ```
//!
//! User code can print anything before the sentinel. Only the last sentinel counts,
//! so a forged verdict loses to the harness's own. A program that forges a verdict
//! and exits before the harness prints is indistinguishable from a real one.

use crate::harness::trim_print;

pub const SENTINEL_PREFIX: &str = "==ARBITER-VERDICT v";
pub const SENTINEL: &str = "==ARBITER-VERDICT v1==";
pub const PASS: &str = "PASS";
pub const FAIL_PREFIX: &str = "FAIL:";
pub const ERROR_PREFIX: &str = "ERROR:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Pass,
    Fail(String),
    Error(String),
    Missing,
}

impl Marker {
    /// Classify the text following the sentinel
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        if line == PASS {
            Marker::Pass
        } else if let Some(detail) = line.strip_prefix(FAIL_PREFIX) {
            Marker::Fail(detail.trim().to_string())
        } else if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            Marker::Error(message.trim().to_string())
        } else {
            Marker::Missing
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Marker::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub marker: Marker,
    /// Everything the program printed before the verdict, trimmed
    pub actual: String,
    /// Whether a current-version sentinel was found
    pub framed: bool,
}

/// Read the verdict from a harness's stdout
pub fn parse(stdout: &str) -> Verdict {
    let lines: Vec<&str> = stdout.lines().collect();

    let sentinel = lines
        .iter()
        .rposition(|line| line.trim_start().starts_with(SENTINEL_PREFIX));

    match sentinel {
        Some(at) if lines[at].trim() == SENTINEL => {
            // FAIL details may themselves span lines (multi-line strings)
            let tail = lines[at + 1..].join("\n");
            Verdict {
                marker: Marker::parse_line(&tail),
                actual: trim_print(&lines[..at].join("\n")).to_string(),
                framed: true,
            }
        }
        // Unknown protocol version
        Some(at) => Verdict {
            marker: Marker::Missing,
            actual: trim_print(&lines[..at].join("\n")).to_string(),
            framed: false,
        },
        None => parse_legacy(&lines),
    }
}

/// Unframed output: the last non-empty line is the marker
fn parse_legacy(lines: &[&str]) -> Verdict {
    let last = lines.iter().rposition(|line| !line.trim().is_empty());
    match last {
        Some(at) => {
            let marker = Marker::parse_line(lines[at]);
            let actual_lines = if marker == Marker::Missing { lines } else { &lines[..at] };
            Verdict {
                marker,
                actual: trim_print(&actual_lines.join("\n")).to_string(),
                framed: false,
            }
        }
        None => Verdict {
            marker: Marker::Missing,
            actual: String::new(),
            framed: false,
        },
    }
}
