//! Text renderers for process lists, groups, kill results and the memory
//! summary: table, JSON, CSV and Markdown.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::Table;
use procsweep::actions::{KillBatchResult, KillPlan};
use procsweep::pipeline::{Column, ColumnValue, ProjectedRow};
use procsweep::{MemorySummary, ProcessGroup};
use serde_json::json;
use std::fmt::Write as _;

use crate::cli::OutputFormat;

pub type RenderResult = Result<String, Box<dyn std::error::Error>>;

/// Side to clip when truncating text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipSide {
    /// Keep the right portion
    Left,
    /// Keep the left portion
    Right,
}

/// Clips `text` to `max_len` characters, marking the cut with `...`.
pub fn clip(text: &str, max_len: usize, side: ClipSide) -> String {
    let len = text.chars().count();
    if len <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(3);
    match side {
        ClipSide::Left => {
            let tail: String = text.chars().skip(len - keep).collect();
            format!("...{}", tail)
        }
        ClipSide::Right => {
            let head: String = text.chars().take(keep).collect();
            format!("{}...", head)
        }
    }
}

/// Display width limit of a column in table and Markdown output.
fn column_limit(column: Column) -> Option<(usize, ClipSide)> {
    match column {
        Column::Name => Some((25, ClipSide::Right)),
        Column::Cwd => Some((35, ClipSide::Left)),
        Column::ParentName => Some((20, ClipSide::Right)),
        Column::Status => Some((40, ClipSide::Right)),
        Column::Cmdline => Some((60, ClipSide::Right)),
        Column::Username => Some((15, ClipSide::Right)),
        _ => None,
    }
}

fn display_cell(column: Column, value: &ColumnValue) -> String {
    let text = value.to_string();
    match column_limit(column) {
        Some((max, side)) => clip(&text, max, side),
        None => text,
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_markdown(cell: &str) -> String {
    cell.replace('|', "\\|")
}

/// Bordered terminal table with rounded corners.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.to_vec());
    for row in rows {
        table.add_row(row.clone());
    }
    format!("{}\n", table)
}

fn render_markdown(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_header(headers.iter().map(|h| escape_markdown(h)).collect::<Vec<_>>());
    for row in rows {
        table.add_row(row.iter().map(|c| escape_markdown(c)).collect::<Vec<_>>());
    }
    format!("{}\n", table)
}

fn render_csv(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let escaped: Vec<String> = headers.iter().map(|h| escape_csv(h)).collect();
    let _ = writeln!(out, "{}", escaped.join(","));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| escape_csv(c)).collect();
        let _ = writeln!(out, "{}", cells.join(","));
    }
    out
}

/// Renders projected process rows. Table and Markdown clip long cells; JSON
/// and CSV carry full values.
pub fn format_records(rows: &[ProjectedRow<'_>], columns: &[Column], format: OutputFormat) -> RenderResult {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(rows)?);
    }

    if format == OutputFormat::Csv {
        let headers: Vec<String> = columns.iter().map(|c| c.key().to_string()).collect();
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.values().iter().map(ToString::to_string).collect())
            .collect();
        return Ok(render_csv(&headers, &cells));
    }

    let headers: Vec<String> = columns.iter().map(|c| c.header().to_string()).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .zip(r.values())
                .map(|(c, v)| display_cell(*c, &v))
                .collect()
        })
        .collect();

    Ok(match format {
        OutputFormat::Markdown => render_markdown(&headers, &cells),
        _ => render_table(&headers, &cells),
    })
}

pub fn format_groups(groups: &[ProcessGroup], format: OutputFormat) -> RenderResult {
    let pid_list = |g: &ProcessGroup| {
        g.pids()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(groups)?),
        OutputFormat::Csv | OutputFormat::Markdown => {
            let headers: Vec<String> = ["key", "count", "total_rss_mb", "pids"]
                .iter()
                .map(|h| h.to_string())
                .collect();
            let rows: Vec<Vec<String>> = groups
                .iter()
                .map(|g| {
                    vec![
                        g.key.clone(),
                        g.count.to_string(),
                        format!("{:.1}", g.total_rss_mb),
                        pid_list(g),
                    ]
                })
                .collect();
            if format == OutputFormat::Csv {
                Ok(render_csv(&headers, &rows))
            } else {
                Ok(render_markdown(&headers, &rows))
            }
        }
        OutputFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "\n{} process groups found\n", groups.len());
            for g in groups {
                let _ = writeln!(
                    out,
                    "  {} ({} processes, {:.1} MB total)",
                    clip(&g.key, 60, ClipSide::Right),
                    g.count,
                    g.total_rss_mb
                );
                for m in &g.members {
                    let _ = writeln!(out, "    PID {} - {:.1} MB", m.pid, m.rss_mb);
                }
                let _ = writeln!(out);
            }
            Ok(out)
        }
    }
}

/// Preview of a kill plan: at most `limit` rows, then a remainder line, the
/// requested pids missing from the snapshot, and the projected memory to be
/// freed.
pub fn format_preview(
    plan: &KillPlan,
    rows: &[ProjectedRow<'_>],
    columns: &[Column],
    format: OutputFormat,
    limit: usize,
) -> RenderResult {
    let unmatched = plan.unmatched_pids();

    if format == OutputFormat::Json {
        let shown: Vec<&ProjectedRow<'_>> = rows.iter().take(limit).collect();
        return Ok(serde_json::to_string_pretty(&json!({
            "would_kill": plan.len(),
            "pids": plan.pids(),
            "not_in_snapshot": unmatched,
            "projected_free_mb": plan.projected_free_mb(),
            "processes": shown,
        }))?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Would kill {} process(es):\n", plan.len());
    let shown = &rows[..rows.len().min(limit)];
    if !shown.is_empty() {
        out.push_str(&format_records(shown, columns, format)?);
    }
    if rows.len() > shown.len() {
        let _ = writeln!(out, "\n... and {} more", rows.len() - shown.len());
    }
    for pid in &unmatched {
        let _ = writeln!(out, "pid {}: not in snapshot", pid);
    }
    let _ = write!(out, "\nWould free ~{:.1} MB", plan.projected_free_mb());
    Ok(out)
}

pub fn format_kill_results(result: &KillBatchResult, format: OutputFormat) -> RenderResult {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv | OutputFormat::Markdown => {
            let headers: Vec<String> = ["pid", "succeeded", "message"]
                .iter()
                .map(|h| h.to_string())
                .collect();
            let rows: Vec<Vec<String>> = result
                .iter()
                .map(|o| vec![o.pid.to_string(), o.succeeded.to_string(), o.message.clone()])
                .collect();
            if format == OutputFormat::Csv {
                Ok(render_csv(&headers, &rows))
            } else {
                Ok(render_markdown(&headers, &rows))
            }
        }
        OutputFormat::Table => {
            let mut out = String::new();
            for outcome in result.iter() {
                let mark = if outcome.succeeded { "✓" } else { "✗" };
                let _ = writeln!(out, "{} {}", mark, outcome);
            }
            let _ = write!(
                out,
                "\nKilled {} of {} processes",
                result.succeeded_count(),
                result.len()
            );
            Ok(out)
        }
    }
}

pub fn format_memory(summary: &MemorySummary, format: OutputFormat) -> RenderResult {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Csv | OutputFormat::Markdown => {
            let headers: Vec<String> = [
                "total_gb",
                "used_gb",
                "free_gb",
                "percent",
                "swap_total_gb",
                "swap_used_gb",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect();
            let row = vec![[
                summary.total_gb,
                summary.used_gb,
                summary.free_gb,
                summary.percent,
                summary.swap_total_gb,
                summary.swap_used_gb,
            ]
            .iter()
            .map(|v| format!("{:.2}", v))
            .collect::<Vec<_>>()];
            if format == OutputFormat::Csv {
                Ok(render_csv(&headers, &row))
            } else {
                Ok(render_markdown(&headers, &row))
            }
        }
        OutputFormat::Table => {
            let mut out = String::from("\nMemory Summary:\n");
            let _ = writeln!(out, "  Total:      {:.2} GB", summary.total_gb);
            let _ = writeln!(
                out,
                "  Used:       {:.2} GB ({:.1}%)",
                summary.used_gb, summary.percent
            );
            let _ = writeln!(out, "  Free:       {:.2} GB", summary.free_gb);
            let _ = writeln!(out, "  Swap Total: {:.2} GB", summary.swap_total_gb);
            let _ = write!(out, "  Swap Used:  {:.2} GB", summary.swap_used_gb);
            Ok(out)
        }
    }
}
