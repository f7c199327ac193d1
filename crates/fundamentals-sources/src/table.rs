use async_trait::async_trait;
use fscore_core::{Metric, PartialFundamentals, PartialPair, SchemaHint, SourceError, StructuredExtractor};

use crate::html;

/// Tables must mention one of these to be considered a financial statement
const STATEMENT_KEYWORDS: &[&str] = &["revenue", "income", "assets", "liabilities"];

/// Rows whose label contains any of these are ratios or headers, not figures
const SKIPPED_ROWS: &[&str] = &["period ending", "growth", "margin", "rate"];

const NON_ANNUAL_COLUMNS: &[&str] = &["ttm", "trailing", "quarterly", "q1", "q2", "q3", "q4"];

/// Row-label keywords per metric, most specific first
fn keywords(metric: Metric) -> &'static [&'static str] {
    match metric {
        Metric::Revenue => &["revenue", "net sales", "turnover"],
        Metric::NetIncome => &["net income", "profit", "result", "earnings"],
        Metric::CashFlowFromOps => &["operating cash flow", "cash flow from operations", "cfo"],
        Metric::TotalAssets => &["total assets", "assets"],
        Metric::LongTermDebt => &["long term debt", "long-term debt", "total debt"],
        Metric::CurrentAssets => &["total current assets", "current assets"],
        Metric::CurrentLiabilities => &["total current liabilities", "current liabilities"],
        Metric::CostOfGoodsSold => &["cost of revenue", "cost of goods sold", "cogs"],
        Metric::SharesOutstanding => &["shares outstanding", "outstanding shares"],
    }
}

/// Parse a figure as printed in statements: thousands separators, unicode
/// minus and parenthesised negatives. Placeholders ("-", "n/a", "Upgrade") are absent.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "").replace('\u{2212}', "-");
    let lower = cleaned.to_lowercase();
    if cleaned.is_empty() || cleaned == "-" || lower.contains("upgrade") || lower.contains("n/a") {
        return None;
    }

    let negated = cleaned.starts_with('(') && cleaned.ends_with(')');
    let bytes = cleaned.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    let value: f64 = cleaned[start..end].trim_end_matches('.').parse().ok()?;
    let minus = start > 0 && bytes[start - 1] == b'-';
    Some(if minus || negated { -value } else { value })
}

/// First standalone `20xx` year in a header, e.g. "FY 2024" -> 2024
pub fn find_year(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(3)).find_map(|i| {
        let window = &bytes[i..i + 4];
        let bounded_left = i == 0 || !bytes[i - 1].is_ascii_digit();
        let bounded_right = i + 4 == bytes.len() || !bytes[i + 4].is_ascii_digit();
        if bounded_left
            && bounded_right
            && window.starts_with(b"20")
            && window.iter().all(u8::is_ascii_digit)
        {
            text[i..i + 4].parse().ok()
        } else {
            None
        }
    })
}

/// Indices of annual columns, most recent first. Column 0 holds row labels.
fn fiscal_year_columns(headers: &[String]) -> Vec<usize> {
    let mut columns: Vec<usize> = headers
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, header)| {
            let lower = header.to_lowercase();
            if NON_ANNUAL_COLUMNS.iter().any(|term| lower.contains(term)) {
                return false;
            }
            lower.starts_with("fy") || lower.contains("fiscal") || find_year(header).is_some()
        })
        .map(|(i, _)| i)
        .collect();

    columns.sort_by_key(|&i| std::cmp::Reverse(find_year(&headers[i]).unwrap_or(0)));
    columns
}

#[derive(Debug, Clone, PartialEq)]
struct LabeledRow {
    label: String,
    current: f64,
    previous: f64,
}

#[derive(Debug, Default)]
struct ParsedStatements {
    rows: Vec<LabeledRow>,
    period: Option<String>,
}

impl ParsedStatements {
    fn find(&self, metric: Metric) -> Option<&LabeledRow> {
        let words = keywords(metric);
        words
            .iter()
            .find_map(|kw| self.rows.iter().find(|row| row.label == *kw))
            .or_else(|| {
                words
                    .iter()
                    .find_map(|kw| self.rows.iter().find(|row| row.label.contains(kw)))
            })
    }
}

/// Deterministic extractor for statement tables on scraped HTML pages
#[derive(Debug, Clone, Default)]
pub struct TableExtractor;

impl TableExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse_statements(&self, page: &str) -> ParsedStatements {
        let mut parsed = ParsedStatements::default();

        for table in html::tables(page) {
            let mentions_statement = table.iter().flatten().any(|cell| {
                let lower = cell.to_lowercase();
                STATEMENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
            });
            let Some(headers) = table.first() else { continue };
            if !mentions_statement {
                continue;
            }

            let columns = fiscal_year_columns(headers);
            if columns.len() < 2 {
                tracing::debug!("Skipping table with {} fiscal year columns", columns.len());
                continue;
            }
            let (cur_col, prev_col) = (columns[0], columns[1]);

            if parsed.period.is_none() {
                parsed.period = Some(
                    find_year(&headers[cur_col])
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| headers[cur_col].clone()),
                );
            }

            for row in table.iter().skip(1) {
                if row.len() <= cur_col.max(prev_col) {
                    continue;
                }
                let label = row[0].to_lowercase();
                if SKIPPED_ROWS.iter().any(|term| label.contains(term)) {
                    continue;
                }
                if let (Some(current), Some(previous)) =
                    (parse_number(&row[cur_col]), parse_number(&row[prev_col]))
                {
                    parsed.rows.push(LabeledRow { label, current, previous });
                }
            }
        }

        parsed
    }

    pub fn extract_html(&self, page: &str) -> Option<PartialFundamentals> {
        let statements = self.parse_statements(page);
        if statements.rows.is_empty() {
            return None;
        }

        let mut partial = PartialFundamentals {
            report_period: statements.period.clone(),
            ..Default::default()
        };
        for metric in Metric::ALL {
            if let Some(row) = statements.find(metric) {
                *partial.get_mut(metric) = PartialPair {
                    current: Some(row.current),
                    previous: Some(row.previous),
                };
            }
        }
        Some(partial)
    }
}

#[async_trait]
impl StructuredExtractor for TableExtractor {
    async fn extract(
        &self,
        text: &str,
        hint: &SchemaHint<'_>,
    ) -> Result<Option<PartialFundamentals>, SourceError> {
        let partial = self.extract_html(text);
        if let Some(p) = &partial {
            tracing::debug!(
                "Parsed {} figures for {} from {}",
                p.reported_count(),
                hint.company.name,
                hint.locator
            );
        }
        Ok(partial)
    }
}
