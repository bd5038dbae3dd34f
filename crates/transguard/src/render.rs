//! Plain-text tables for the terminal.
//!
//! A [`TextTable`] has a title, a header row, data rows and an optional
//! totals row. Columns are sized by display width, text is left-aligned and
//! numbers right-aligned.

use guard_core::formatting::{
    format_count, format_currency, format_currency_whole, format_rate,
};
use guard_core::models::LoadReport;
use guard_runtime::views::{Kpis, Report};
use unicode_width::UnicodeWidthStr;

pub const NO_DATA: &str = "No data for the selected filters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct TextTable {
    title: String,
    headers: Vec<(&'static str, Align)>,
    rows: Vec<Vec<String>>,
    totals: Option<Vec<String>>,
}

impl TextTable {
    pub fn new(title: impl Into<String>, headers: &[(&'static str, Align)]) -> Self {
        Self {
            title: title.into(),
            headers: headers.to_vec(),
            rows: Vec::new(),
            totals: None,
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn totals(&mut self, row: Vec<String>) {
        self.totals = Some(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table; an empty table renders its title and [`NO_DATA`].
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.title);
        if self.rows.is_empty() {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }

        let mut widths: Vec<usize> = self.headers.iter().map(|(h, _)| h.width()).collect();
        for row in self.rows.iter().chain(self.totals.iter()) {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let header: Vec<String> = self.headers.iter().map(|(h, _)| h.to_string()).collect();
        out.push_str(&self.line(&header, &widths));
        out.push_str(&self.rule(&widths));
        for row in &self.rows {
            out.push_str(&self.line(row, &widths));
        }
        if let Some(totals) = &self.totals {
            out.push_str(&self.rule(&widths));
            out.push_str(&self.line(totals, &widths));
        }
        out
    }

    fn line(&self, cells: &[String], widths: &[usize]) -> String {
        let padded: Vec<String> = widths
            .iter()
            .zip(&self.headers)
            .enumerate()
            .map(|(i, (&width, (_, align)))| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                let pad = " ".repeat(width.saturating_sub(cell.width()));
                match align {
                    Align::Left => format!("{cell}{pad}"),
                    Align::Right => format!("{pad}{cell}"),
                }
            })
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    }

    fn rule(&self, widths: &[usize]) -> String {
        let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        format!("{}\n", dashes.join("  "))
    }
}

// ── Report views ───────────────────────────────────────────────────────────────

fn kpi_table(kpis: &Kpis) -> TextTable {
    let mut table = TextTable::new(
        "Summary",
        &[
            ("Transactions", Align::Right),
            ("Total Amount", Align::Right),
            ("Errors", Align::Right),
            ("Error Rate", Align::Right),
        ],
    );
    if !kpis.is_empty() {
        table.push(vec![
            format_count(kpis.txn_count),
            format_currency(kpis.total_amount),
            format_count(kpis.error_count),
            format_rate(Some(kpis.error_rate())),
        ]);
    }
    table
}

/// All four report tables, separated by blank lines.
pub fn render_report(report: &Report) -> String {
    let filter = &report.filter;
    let states = if filter.states().is_empty() {
        "all states".to_string()
    } else {
        filter.states().join(", ")
    };
    let mut sections = vec![format!(
        "Transactions {} to {} ({})\n",
        filter.start(),
        filter.end(),
        states
    )];

    sections.push(kpi_table(&report.kpis).render());

    let mut daily = TextTable::new(
        "Daily Trends",
        &[
            ("Date", Align::Left),
            ("Transactions", Align::Right),
            ("Amount", Align::Right),
            ("Errors", Align::Right),
            ("Error Rate", Align::Right),
        ],
    );
    for point in &report.timeseries {
        daily.push(vec![
            point.date.to_string(),
            format_count(point.txn_count),
            format_currency(point.total_amount),
            format_count(point.error_count),
            format_rate(point.error_rate),
        ]);
    }
    sections.push(daily.render());

    let mut merchants = TextTable::new(
        format!(
            "Merchant Risk Leaderboard (min {} txns, top {})",
            report.leaderboard_params.min_txns, report.leaderboard_params.limit
        ),
        &[
            ("Merchant", Align::Right),
            ("State", Align::Left),
            ("Transactions", Align::Right),
            ("Total Spent", Align::Right),
            ("Avg Amount", Align::Right),
            ("Errors", Align::Right),
            ("Error Rate", Align::Right),
        ],
    );
    for row in &report.leaderboard {
        merchants.push(vec![
            row.merchant_id.map(|id| id.to_string()).unwrap_or_default(),
            row.merchant_state.clone().unwrap_or_default(),
            format_count(row.txn_count),
            format_currency_whole(row.total_spent),
            format_currency(row.avg_amount),
            format_count(row.error_count),
            format_rate(row.error_rate),
        ]);
    }
    sections.push(merchants.render());

    let mut states = TextTable::new(
        "State Summary",
        &[
            ("State", Align::Left),
            ("Transactions", Align::Right),
            ("Total Spent", Align::Right),
            ("Errors", Align::Right),
            ("Error Rate", Align::Right),
        ],
    );
    for row in &report.states {
        states.push(vec![
            row.merchant_state.clone().unwrap_or_else(|| "(none)".to_string()),
            format_count(row.txn_count),
            format_currency_whole(row.total_spent),
            format_count(row.error_count),
            format_rate(row.error_rate),
        ]);
    }
    sections.push(states.render());

    sections.join("\n")
}

/// Per-table load counts with a totals row.
pub fn render_load_reports(reports: &[LoadReport], dry_run: bool) -> String {
    let title = if dry_run { "Load Summary (dry run)" } else { "Load Summary" };
    let mut table = TextTable::new(
        title,
        &[
            ("Table", Align::Left),
            ("Windows", Align::Right),
            ("Read", Align::Right),
            ("Appended", Align::Right),
            ("Skipped", Align::Right),
            ("Absent Values", Align::Right),
        ],
    );

    let mut totals = LoadReport::new("TOTAL");
    for report in reports {
        table.push(vec![
            report.table.clone(),
            report.windows.to_string(),
            format_count(report.rows_read),
            format_count(report.rows_appended),
            format_count(report.rows_skipped),
            format_count(report.values_absent),
        ]);
        totals.windows += report.windows;
        totals.rows_read += report.rows_read;
        totals.rows_appended += report.rows_appended;
        totals.rows_skipped += report.rows_skipped;
        totals.values_absent += report.values_absent;
    }
    if !table.is_empty() {
        table.totals(vec![
            totals.table,
            totals.windows.to_string(),
            format_count(totals.rows_read),
            format_count(totals.rows_appended),
            format_count(totals.rows_skipped),
            format_count(totals.values_absent),
        ]);
    }
    table.render()
}

/// One state code per line.
pub fn render_states(states: &[String]) -> String {
    let mut table = TextTable::new("Merchant States", &[("State", Align::Left)]);
    for state in states {
        table.push(vec![state.clone()]);
    }
    table.render()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
