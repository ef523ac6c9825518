// ===============================
// src/dashboard.rs
// ===============================
use chrono::{TimeZone, Utc};
use std::fmt::Write;

use crate::orchestrator::PassReport;

const NOTE_WIDTH: usize = 48;

pub fn render(report: &PassReport) -> String {
    let ts = Utc
        .timestamp_millis_opt(report.ts_ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "=== pass #{} | {} | realized pnl {:.6} ===", report.pass, ts, report.realized_profit);
    let _ = writeln!(
        out,
        "{:<14} {:<8} {:>12} {:>12} {:>12} {:<20} {}",
        "SYMBOL", "PHASE", "BID", "ASK", "INVENTORY", "ORDER", "NOTE"
    );
    for row in &report.rows {
        let _ = writeln!(
            out,
            "{:<14} {:<8} {:>12} {:>12} {:>12} {:<20} {}",
            row.label(),
            row.phase.as_str(),
            fmt_px(row.best_bid),
            fmt_px(row.best_ask),
            row.inventory,
            row.active_order.as_deref().unwrap_or("-"),
            truncate(&row.note, NOTE_WIDTH),
        );
    }
    out
}

fn fmt_px(px: f64) -> String {
    if px > 0.0 { format!("{px}") } else { "-".to_string() }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
    t.push('…');
    t
}
