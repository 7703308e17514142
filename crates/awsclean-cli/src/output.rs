//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: aligned tables for humans, tab-separated rows for pipes, or
//! stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` key of the user config file
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use awsclean_core::api::{Image, LogGroup, Volume};
use awsclean_core::config::ConfigError;
use awsclean_core::report::ReportEntry;
use awsclean_core::{CleanError, DeletionReport, ErrorCode, SecurityGroup};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Aligned tables with a header rule.
    Pretty,
    /// Tab-separated rows for pipes and scripts.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "pretty" | "table" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    config_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    // Unknown values fall through to the next source.
    if let Some(mode) = format_env.and_then(OutputMode::from_name) {
        return mode;
    }
    if let Some(mode) = config_output.and_then(OutputMode::from_name) {
        return mode;
    }

    if is_tty { OutputMode::Pretty } else { OutputMode::Text }
}

/// Resolve the output mode from CLI flags, environment, config and TTY defaults.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    config_output: Option<&str>,
) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref(), config_output, is_tty)
}

/// Trait implemented by any CLI result type that can be rendered in all modes.
pub trait Renderable {
    /// Render a single item for human consumption.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as one self-contained JSON value.
    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Table cells, in the same order as [`Renderable::table_headers`].
    fn table_cells(&self) -> Vec<String>;

    /// Render as a single text row.
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}", self.table_cells().join("\t"))
    }

    /// Column headers for table output.
    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

impl<R: Renderable> Renderable for &R {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        (**self).render_human(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        (**self).render_json(w)
    }

    fn table_cells(&self) -> Vec<String> {
        (**self).table_cells()
    }

    fn table_headers() -> &'static [&'static str] {
        R::table_headers()
    }
}

/// Render a single [`Renderable`] item to stdout using the given output mode.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Pretty => item.render_human(&mut out),
        OutputMode::Text => item.render_table(&mut out),
        OutputMode::Json => {
            item.render_json(&mut out)?;
            writeln!(out)
        }
    }
}

/// Render a list of [`Renderable`] items to stdout.
pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_list(&mut out, items, mode)
}

fn write_list<R: Renderable>(out: &mut dyn Write, items: &[R], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => {
            let rows: Vec<Vec<String>> = items.iter().map(R::table_cells).collect();
            write_aligned(out, R::table_headers(), &rows)
        }
        OutputMode::Text => {
            for item in items {
                item.render_table(out)?;
            }
            Ok(())
        }
        OutputMode::Json => {
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, ",")?;
                }
                writeln!(out)?;
                let mut buf = Vec::new();
                item.render_json(&mut buf)?;
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                out.write_all(&buf)?;
            }
            writeln!(out, "\n]")
        }
    }
}

/// Left-aligned columns sized to the widest cell.
fn write_aligned(out: &mut dyn Write, headers: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    writeln!(out, "{}", aligned_line(headers.iter().copied(), &widths))?;
    pretty_rule(out)?;
    for row in rows {
        writeln!(out, "{}", aligned_line(row.iter().map(String::as_str), &widths))?;
    }
    Ok(())
}

fn aligned_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    padded.join("  ").trim_end().to_string()
}

fn json_line<T: Serialize>(w: &mut dyn Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *w, value)?;
    Ok(())
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)).unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────────────
// Resource rows
// ────────────────────────────────────────────────────────────────────────────

impl Renderable for SecurityGroup {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}", self.group_id().unwrap_or("-"), self.display_name())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        #[derive(Serialize)]
        struct Row<'a> {
            group_id: Option<&'a str>,
            #[serde(flatten)]
            record: &'a SecurityGroup,
        }
        json_line(
            w,
            &Row {
                group_id: self.group_id(),
                record: self,
            },
        )
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.group_id().unwrap_or_default().to_string(),
            self.display_name().to_string(),
            self.creation_time.to_string(),
            self.creator.clone(),
            self.is_used.to_string(),
        ]
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "NAME", "CREATED", "CREATED BY", "USED"]
    }
}

impl Renderable for Image {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}", self.image_id, self.name)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_line(w, self)
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.image_id.clone(),
            self.name.clone(),
            self.creation_date.clone(),
            self.owner_id.clone().unwrap_or_default(),
        ]
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "NAME", "CREATED", "OWNER"]
    }
}

impl Renderable for Volume {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}", self.volume_id, self.state)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_line(w, self)
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.volume_id.clone(),
            self.state.clone(),
            timestamp(self.create_time),
            self.size_gib.map(|size| size.to_string()).unwrap_or_default(),
        ]
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATE", "CREATED", "SIZE (GiB)"]
    }
}

impl Renderable for LogGroup {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}", self.name)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        json_line(w, self)
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            timestamp(self.creation_time),
            self.retention_days.map(|days| days.to_string()).unwrap_or_default(),
        ]
    }

    fn table_headers() -> &'static [&'static str] {
        &["NAME", "CREATED", "RETENTION (DAYS)"]
    }
}

fn report_rows<'a>(report: &'a DeletionReport) -> impl Iterator<Item = (&'static str, &'a ReportEntry)> {
    let deleted = report.deleted.iter().map(|entry| ("deleted", entry));
    let skipped = report.skipped.iter().map(|entry| ("skipped", entry));
    let failed = report.failed.iter().map(|entry| ("failed", entry));
    deleted.chain(skipped).chain(failed)
}

impl Renderable for DeletionReport {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let sections = [("Deleted", &self.deleted), ("Skipped", &self.skipped), ("Failed", &self.failed)];
        for (heading, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            pretty_section(w, &format!("{heading} ({})", entries.len()))?;
            for entry in entries {
                match &entry.reason {
                    Some(reason) => writeln!(w, "{:<24} {}  ({reason})", entry.id, entry.name)?,
                    None => writeln!(w, "{:<24} {}", entry.id, entry.name)?,
                }
            }
            writeln!(w)?;
        }
        writeln!(w, "{}", self.summary())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self)?;
        Ok(())
    }

    fn table_cells(&self) -> Vec<String> {
        vec![self.summary()]
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        for (outcome, entry) in report_rows(self) {
            writeln!(
                w,
                "{outcome}\t{}\t{}\t{}",
                entry.id,
                entry.name,
                entry.reason.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E3001").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    fn coded(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// Map an error chain to a [`CliError`], keeping the code of the first
    /// known library error.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        for cause in err.chain() {
            if let Some(clean) = cause.downcast_ref::<CleanError>() {
                return Self::coded(message, clean.code());
            }
            if let Some(config) = cause.downcast_ref::<ConfigError>() {
                return Self::coded(message, config.code());
            }
        }
        Self::new(message)
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}
