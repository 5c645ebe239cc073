//! Writing results to stdout.

use crate::harvest_cmd::Report;
use anyhow::{Context, Result};
use std::io::Write;

/// Write the joined CSS, newline-terminated.
pub fn write_css<W: Write>(out: &mut W, css_text: &str) -> Result<()> {
    out.write_all(css_text.as_bytes())?;
    if !css_text.is_empty() && !css_text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Write the report as pretty-printed JSON.
pub fn write_json<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Print the report the way the flags ask for.
pub fn print_report(report: &Report, json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        write_json(&mut out, report)?;
    } else {
        write_css(&mut out, &report.css_text)?;
    }
    out.flush()?;
    Ok(())
}
