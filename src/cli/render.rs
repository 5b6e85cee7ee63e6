//! Terminal output for search sessions: a live progress line on stderr,
//! and the final results as a table or JSON on stdout.

use colored::Colorize;
use compass::search::{Completion, Phase, Progress, Query, ResourceEntry, SearchOutcome, Spinner};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Longest progress line drawn, so it never wraps on a narrow terminal.
const PROGRESS_WIDTH: usize = 100;

const HEADERS: [&str; 5] = ["#", "PROJECT", "KIND", "NAME", "LOCATION"];

/// Redraws a single status line in place while a session runs.
pub struct ProgressLine {
    spinner: Spinner,
    enabled: bool,
    drawn: bool,
}

impl ProgressLine {
    /// Only draws when stderr is a terminal.
    pub fn new(enabled: bool) -> Self {
        Self {
            spinner: Spinner::new(),
            enabled: enabled && io::stderr().is_terminal(),
            drawn: false,
        }
    }

    pub fn update(&mut self, progress: &Progress) {
        if !self.enabled {
            return;
        }
        let frame = self.spinner.tick();
        let line = truncate(&progress_text(frame, progress), PROGRESS_WIDTH);
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K{}", line.dimmed());
        let _ = err.flush();
        self.drawn = true;
    }

    pub fn clear(&mut self) {
        if self.drawn {
            let mut err = io::stderr().lock();
            let _ = write!(err, "\r\x1b[2K");
            let _ = err.flush();
            self.drawn = false;
        }
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        self.clear();
    }
}

fn progress_text(frame: &str, progress: &Progress) -> String {
    let phase = match progress.phase {
        Phase::Preferred => "likely projects",
        Phase::Fallback => "all projects",
    };
    let mut text = format!(
        "{} searching {}: {}/{}, {} results",
        frame, phase, progress.completed, progress.total, progress.results_so_far
    );
    if !progress.current_target.is_empty() {
        text.push_str(&format!(" ({})", progress.current_target));
    }
    text
}

/// Cut `text` to at most `max` display columns.
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max.saturating_sub(1) {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

/// Aligned, numbered result table. Numbers are what `--select` refers to.
pub fn table(entries: &[ResourceEntry]) -> String {
    let rows: Vec<[String; 5]> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            [
                (i + 1).to_string(),
                e.target.clone(),
                e.kind.clone(),
                e.name.clone(),
                e.location.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: [&str; 5]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad(cell, width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_line(HEADERS);
    for row in &rows {
        push_line(row.each_ref().map(String::as_str));
    }
    out
}

#[derive(Serialize)]
struct JsonWarning<'a> {
    provider_kind: &'a str,
    target: &'a str,
    cause: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: &'a Query,
    completion: Completion,
    fallback_used: bool,
    targets_searched: usize,
    results: &'a [ResourceEntry],
    warnings: Vec<JsonWarning<'a>>,
}

/// Machine-readable report of a finished session.
pub fn json(outcome: &SearchOutcome, results: &[ResourceEntry]) -> serde_json::Result<String> {
    let report = JsonReport {
        query: &outcome.query,
        completion: outcome.completion,
        fallback_used: outcome.fallback_used,
        targets_searched: outcome.targets_searched,
        results,
        warnings: outcome
            .warnings
            .iter()
            .map(|w| JsonWarning {
                provider_kind: &w.provider_kind,
                target: &w.target,
                cause: format!("{:#}", w.cause),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&report)
}

/// Status lines printed to stderr after the results.
pub fn summary(outcome: &SearchOutcome, shown: usize) -> Vec<String> {
    let mut lines = Vec::new();

    if !outcome.warnings.is_empty() {
        lines.push(format!(
            "{} {} of {} projects failed",
            "warning:".yellow().bold(),
            outcome.warnings.len(),
            outcome.targets_searched
        ));
        for warning in &outcome.warnings {
            lines.push(format!("  - {}", warning));
        }
    }

    if outcome.completion == Completion::Cancelled {
        lines.push(format!(
            "{} search interrupted, results are incomplete",
            "note:".cyan().bold()
        ));
    }

    if shown == 0 {
        lines.push(format!("{}", "no matching resources".dimmed()));
    } else if shown < outcome.results.len() {
        lines.push(format!(
            "{}",
            format!("{} of {} results shown after filtering", shown, outcome.results.len()).dimmed()
        ));
    }
    lines
}
