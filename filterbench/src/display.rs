//! Colored terminal display for summaries and suite reports.
//!
//! Output goes to stderr with ANSI colors when stderr is a terminal and
//! `NO_COLOR` is unset; otherwise the same layout is written without escapes.

use std::io::{IsTerminal, Write};
use std::time::Duration;

use crate::aggregate::SummaryRow;
use crate::suite::SuiteReport;

#[derive(Debug, Clone, Copy)]
enum Style {
    Heading,
    Label,
    Muted,
    Warn,
    Pass,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Style::Heading => "\x1b[1;36m",
            Style::Label => "\x1b[1m",
            Style::Muted => "\x1b[2m",
            Style::Warn => "\x1b[33m",
            Style::Pass => "\x1b[1;32m",
        }
    }
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}{text}\x1b[0m", style.code())
    } else {
        text.to_string()
    }
}

fn stderr_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// `1234567` as `1,234,567`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Step wall time: milliseconds with one decimal below a second.
fn step_time(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.1}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.2}s")
    } else {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

/// Title line underlined to its own width.
fn heading(w: &mut impl Write, title: &str, color: bool) {
    let underline = "─".repeat(title.chars().count());
    let _ = writeln!(w, "\n{}", paint(title, Style::Heading, color));
    let _ = writeln!(w, "{}", paint(&underline, Style::Heading, color));
}

/// Render summary rows as a plain-text block.
pub fn summary_table(rows: &[SummaryRow]) -> String {
    let mut out = Vec::new();
    write_summary(&mut out, rows, false);
    String::from_utf8_lossy(&out).into_owned()
}

/// Print summary rows to stderr.
pub fn eprint_summary(rows: &[SummaryRow]) {
    let color = stderr_color();
    let mut w = std::io::stderr().lock();
    write_summary(&mut w, rows, color);
}

fn write_summary(w: &mut impl Write, rows: &[SummaryRow], color: bool) {
    heading(w, "Benchmark Summary", color);
    if rows.is_empty() {
        let _ = writeln!(w, "  {}", paint("no reports found", Style::Muted, color));
        return;
    }

    for row in rows {
        let _ = writeln!(w);
        let _ = writeln!(w, "  {}", paint(&row.label, Style::Label, color));
        let _ = writeln!(w, "    Ingest       {}", row.ingest);
        if let Some(index) = &row.index {
            let _ = writeln!(w, "    Index        {index}");
        }
        if let Some(filter) = &row.filter {
            let _ = writeln!(w, "    Filter       {filter}");
        }
        if let Some(chain) = &row.filter_chain {
            let _ = writeln!(w, "    Filters      {chain}");
        }
        if let Some(clear) = &row.clear {
            let _ = writeln!(w, "    Clear        {clear}");
        }
        if let Some(chain) = &row.clear_chain {
            let _ = writeln!(w, "    Clears       {chain}");
        }
        if let (Some(flushes), Some(shard_rows)) = (row.shard_flushes, row.shard_rows) {
            let shard = format!(
                "{} flushes, {} rows",
                group_thousands(flushes),
                group_thousands(shard_rows)
            );
            let shard = if flushes == 0 {
                paint(&shard, Style::Warn, color)
            } else {
                shard
            };
            let _ = writeln!(w, "    Shards       {shard}");
        }
        let _ = writeln!(w, "    {}", paint(&row.report, Style::Muted, color));
    }
    let _ = writeln!(w);
}

/// Print a suite report to stderr.
pub fn eprint_suite_report(report: &SuiteReport) {
    let color = stderr_color();
    let mut w = std::io::stderr().lock();
    heading(&mut w, "Suite", color);
    for record in &report.steps {
        let _ = writeln!(
            w,
            "  {}  {:<28} {:>10}  {}",
            paint("✓", Style::Pass, color),
            record.step,
            step_time(record.elapsed),
            paint(&record.artifact, Style::Muted, color),
        );
    }
    let _ = writeln!(
        w,
        "\n  {} steps in {}",
        report.steps.len(),
        step_time(report.total)
    );
}
