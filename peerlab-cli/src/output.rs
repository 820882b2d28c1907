//! Text and JSON rendering of command reports.
//!
//! Every report is `Serialize` for `--output json` and [`Render`] for the
//! terminal. The helpers below keep the text form uniform across commands:
//! a colored verdict word, two-space indented detail lines and aligned
//! name/description columns.

use std::fmt::Display;
use std::io::Write;

use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes reports in the format picked by `--output`.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Writes `report` to stdout.
    pub fn render<T: Render + Serialize>(&self, report: &T) -> Result<(), CliError> {
        self.render_to(report, &mut std::io::stdout().lock())
    }

    pub fn render_to<T: Render + Serialize>(
        &self,
        report: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        if let OutputFormat::Json = self.format {
            serde_json::to_writer_pretty(&mut *w, report)?;
            writeln!(w)?;
        } else {
            report.render_text(w)?;
        }
        Ok(())
    }
}

/// Terminal form of a report.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

// ─── Text helpers ────────────────────────────────────────────────────

/// `good` in bold green when `ok`, `bad` in bold red otherwise.
pub fn verdict(ok: bool, good: &str, bad: &str) -> ColoredString {
    if ok {
        good.green().bold()
    } else {
        bad.red().bold()
    }
}

/// Writes each line of `text` indented by two spaces.
///
/// Multi-line errors (a failed assertion with its tail of nested causes)
/// stay readable under their heading.
pub fn write_detail(w: &mut dyn Write, text: impl Display) -> std::io::Result<()> {
    for line in text.to_string().lines() {
        writeln!(w, "  {line}")?;
    }
    Ok(())
}

/// Writes `(name, description)` rows with the names padded to one column.
pub fn write_columns<'a>(
    w: &mut dyn Write,
    rows: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> std::io::Result<()> {
    let rows: Vec<_> = rows.into_iter().collect();
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description) in rows {
        // pad before coloring; escape codes would count toward the width
        let padded = format!("{name:<width$}");
        writeln!(w, "  {}  {description}", padded.cyan())?;
    }
    Ok(())
}
