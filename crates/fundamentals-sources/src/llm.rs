use async_trait::async_trait;
use fscore_core::{
    Metric, PartialFundamentals, ReportKind, SchemaHint, SourceError, StructuredExtractor,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::http::HttpFetcher;
use crate::table::parse_number;

/// Text-completion backend used for report extraction
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SourceError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpFetcher,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: HttpFetcher, api_key: String, model: String, base_url: String) -> Self {
        Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, SourceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: 2000,
            temperature: 0.1,
        };

        let builder = self
            .http
            .client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request);
        let response = self.http.send(builder).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SourceError::Malformed("completion has no content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extracts fundamentals from report text by asking a language model for JSON
pub struct LlmExtractor {
    model: Arc<dyn LanguageModel>,
    max_chars: usize,
}

impl LlmExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_chars: 60_000,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn prompt(&self, text: &str, hint: &SchemaHint<'_>) -> String {
        let excerpt: String = statement_section(text).chars().take(self.max_chars).collect();
        let (period, comparison) = match hint.report_kind {
            ReportKind::Annual => (
                "annual report",
                "If the text turns out to be a quarterly or interim report, say so in \"notes\" and use the full-year comparatives where present.",
            ),
            ReportKind::Quarterly => (
                "interim report",
                "This is an interim report: use the interim statements and compare the current period with the same period of the previous year.",
            ),
        };
        let fields = Metric::ALL
            .iter()
            .map(|m| {
                format!(
                    "    \"{p}_cur\": <number or null>,\n    \"{p}_prev\": <number or null>,",
                    p = m.field_prefix()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a financial analyst extracting data from {company}'s {period}.

Below is the extracted text of the financial statements section:

{excerpt}

Identify the TWO MOST RECENT FISCAL YEARS present in the text and extract, for both years:
- Revenue / Net sales / Turnover
- Net income / Profit for the year
- Cash flow from operating activities (consolidated statement of cash flows, not summaries)
- Total assets
- Long-term debt / Non-current liabilities
- Current assets
- Current liabilities
- Cost of goods sold / Cost of revenue
- Shares outstanding

Rules:
1. Use consolidated, audited statements, not segments or preliminary figures.
2. Report actual amounts, not percentages or ratios, in the units the report uses.
3. {comparison}
4. If a figure is not in the text, use null. Never guess and never use 0 for missing data.

Return ONLY a JSON object with this structure:
{{
{fields}
    "units": "<millions/thousands/actual>",
    "fiscal_years": {{ "current": "<year>", "previous": "<year>" }},
    "confidence": "<high/medium/low>",
    "notes": "<observations>"
}}"#,
            company = hint.company.name,
        )
    }
}

/// Headings that mark financial-statement pages in report text
const STATEMENT_HEADINGS: &[&str] = &[
    "consolidated statement of cash flows",
    "statement of cash flows",
    "consolidated cash flow",
    "cash flow from operating activities",
    "income statement",
    "consolidated income",
    "profit and loss",
    "balance sheet",
    "consolidated balance",
    "statement of financial position",
];

/// Size of the blocks report text is cut into when it has no page breaks
const PSEUDO_PAGE_CHARS: usize = 3_000;

fn pages(text: &str) -> Vec<&str> {
    if text.contains('\u{c}') {
        return text.split('\u{c}').collect();
    }

    let mut pages = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices('\n') {
        if idx - start >= PSEUDO_PAGE_CHARS {
            pages.push(&text[start..=idx]);
            start = idx + 1;
        }
    }
    if start < text.len() {
        pages.push(&text[start..]);
    }
    pages
}

/// Narrow report text to the statement pages, each with the page before and
/// the two after. Pages are form-feed separated as PDF text extractors write
/// them; text without any matching page is returned whole.
pub fn statement_section(text: &str) -> String {
    let pages = pages(text);
    let mut keep = vec![false; pages.len()];
    for (i, page) in pages.iter().enumerate() {
        let lower = page.to_lowercase();
        if STATEMENT_HEADINGS.iter().any(|h| lower.contains(h)) {
            let last = (i + 2).min(pages.len() - 1);
            keep[i.saturating_sub(1)..=last].iter_mut().for_each(|k| *k = true);
        }
    }

    if !keep.contains(&true) {
        return text.to_string();
    }
    let selected: Vec<&str> = pages
        .iter()
        .zip(&keep)
        .filter(|(_, kept)| **kept)
        .map(|(page, _)| *page)
        .collect();
    tracing::debug!("Kept {} of {} report pages with statement headings", selected.len(), pages.len());
    selected.join("\n")
}

/// Pulls the JSON object out of a reply that may be wrapped in prose or code fences
pub fn parse_reply(reply: &str) -> Result<PartialFundamentals, SourceError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(SourceError::Malformed("no JSON object in model reply".to_string())),
    };
    let object: Map<String, Value> = serde_json::from_str(json)?;

    let mut partial = PartialFundamentals::default();
    for metric in Metric::ALL {
        let pair = partial.get_mut(metric);
        pair.current = object.get(&format!("{}_cur", metric.field_prefix())).and_then(number);
        pair.previous = object.get(&format!("{}_prev", metric.field_prefix())).and_then(number);
    }
    partial.report_period = object
        .get("fiscal_years")
        .and_then(|years| years.get("current"))
        .and_then(|year| match year {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    if let Some(confidence) = object.get("confidence").and_then(Value::as_str) {
        let units = object.get("units").and_then(Value::as_str).unwrap_or("unknown");
        tracing::debug!("Model reported {} confidence, units {}", confidence, units);
    }
    Ok(partial)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

#[async_trait]
impl StructuredExtractor for LlmExtractor {
    async fn extract(
        &self,
        text: &str,
        hint: &SchemaHint<'_>,
    ) -> Result<Option<PartialFundamentals>, SourceError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        tracing::info!(
            "Asking {} to extract figures for {} from {}",
            self.model.model_name(),
            hint.company.name,
            hint.locator
        );
        let reply = self.model.complete(&self.prompt(text, hint)).await?;
        parse_reply(&reply).map(Some)
    }
}
