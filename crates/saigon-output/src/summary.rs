//! Console and Markdown summaries of the analysis results.

use crate::export::{CapmRow, PortfolioMetricsRow};
use std::fmt;

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Pad on the right.
    Left,
    /// Pad on the left.
    Right,
}

/// Titled table of preformatted cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTable {
    /// Title printed above the table.
    pub title: String,
    /// Column headers.
    pub headers: Vec<String>,
    /// Alignment per column.
    pub align: Vec<Align>,
    /// Rows of cells; short rows are padded with blanks.
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    /// Create an empty table. The first column is left-aligned, the others
    /// right-aligned.
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        let align = (0..headers.len())
            .map(|i| if i == 0 { Align::Left } else { Align::Right })
            .collect();
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            align,
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(j, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(j))
                    .map(|cell| cell.chars().count())
                    .chain([header.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn line(&self, cells: &[String], widths: &[usize]) -> String {
        widths
            .iter()
            .enumerate()
            .map(|(j, width)| {
                let cell = cells.get(j).map_or("", String::as_str);
                let pad = width.saturating_sub(cell.chars().count());
                match self.align.get(j).copied().unwrap_or(Align::Right) {
                    Align::Left => format!("{cell}{}", " ".repeat(pad)),
                    Align::Right => format!("{}{cell}", " ".repeat(pad)),
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let widths = self.widths();
        let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", self.title));
        output.push_str(&"=".repeat(total));
        output.push('\n');
        output.push_str(&self.line(&self.headers, &widths));
        output.push('\n');
        output.push_str(&"-".repeat(total));
        output.push('\n');
        for row in &self.rows {
            output.push_str(&self.line(row, &widths));
            output.push('\n');
        }
        output.push_str(&"=".repeat(total));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = format!("## {}\n\n", self.title);
        output.push_str(&format!("| {} |\n", self.headers.join(" | ")));
        let rule: Vec<&str> = self
            .align
            .iter()
            .map(|a| match a {
                Align::Left => ":---",
                Align::Right => "---:",
            })
            .collect();
        output.push_str(&format!("| {} |\n", rule.join(" | ")));
        for row in &self.rows {
            output.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        output
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ascii_table())
    }
}

fn pct(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}%", value * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn num(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

/// CAPM regressions, one line per ticker.
pub fn capm_table(rows: &[CapmRow]) -> TextTable {
    let mut table = TextTable::new(
        "CAPM Regression (monthly excess returns)",
        &["Ticker", "Alpha", "Beta", "t(Alpha)", "t(Beta)", "p(Beta)", "R2", "N"],
    );
    for row in rows {
        table.push_row(vec![
            row.ticker.clone(),
            pct(row.alpha),
            num(row.beta, 3),
            num(row.alpha_tstat, 2),
            num(row.beta_tstat, 2),
            num(row.beta_pvalue, 4),
            num(row.r2, 3),
            row.nobs.to_string(),
        ]);
    }
    table
}

/// Portfolio performance, one line per portfolio.
pub fn portfolio_table(rows: &[PortfolioMetricsRow]) -> TextTable {
    let mut table = TextTable::new(
        "Beta-Sorted Portfolios",
        &["Portfolio", "N", "Ann. Return", "Volatility", "Sharpe", "Total Return", "Max DD"],
    );
    for row in rows {
        table.push_row(vec![
            row.portfolio.clone(),
            row.members.to_string(),
            pct(row.annualized_return),
            pct(row.volatility),
            num(row.sharpe_ratio, 3),
            pct(row.total_return),
            pct(row.max_drawdown),
        ]);
    }
    table
}
