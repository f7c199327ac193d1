//! Just enough HTML scanning to pull tables and links out of financial pages.
//! Tags are matched case-insensitively; script and style bodies are skipped.

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open { name: String, attrs: &'a str },
    Close(String),
    Text(&'a str),
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let lt = pos + offset;
        if lt > pos {
            tokens.push(Token::Text(&html[pos..lt]));
        }

        if lower[lt..].starts_with("<!--") {
            pos = lower[lt..].find("-->").map_or(html.len(), |end| lt + end + 3);
            continue;
        }

        let Some(gt) = html[lt..].find('>').map(|end| lt + end) else {
            pos = html.len();
            break;
        };
        let inner = &html[lt + 1..gt];
        pos = gt + 1;

        if let Some(rest) = inner.strip_prefix('/') {
            tokens.push(Token::Close(tag_name(rest)));
            continue;
        }
        if inner.starts_with('!') || inner.starts_with('?') {
            continue;
        }

        let name = tag_name(inner);
        let trimmed = inner.trim_start();
        let attrs = trimmed[name.len()..].trim_end_matches('/');
        if name == "script" || name == "style" {
            let closing = format!("</{}", name);
            pos = lower[pos..].find(&closing).map_or(html.len(), |end| pos + end);
            continue;
        }
        tokens.push(Token::Open { name, attrs });
    }

    if pos < html.len() {
        tokens.push(Token::Text(&html[pos..]));
    }
    tokens
}

fn tag_name(inner: &str) -> String {
    inner
        .trim_start()
        .split(|c: char| c.is_ascii_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn attribute(attrs: &str, wanted: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let mut search = 0;
    while let Some(found) = lower[search..].find(wanted) {
        let start = search + found;
        search = start + wanted.len();

        let boundary = start == 0 || lower.as_bytes()[start - 1].is_ascii_whitespace();
        let rest = attrs[search..].trim_start();
        if !boundary || !rest.starts_with('=') {
            continue;
        }

        let value = rest[1..].trim_start();
        let raw = match value.chars().next() {
            Some(quote @ ('"' | '\'')) => value[1..].split(quote).next().unwrap_or(""),
            _ => value.split(|c: char| c.is_ascii_whitespace()).next().unwrap_or(""),
        };
        return Some(decode_entities(raw));
    }
    None
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&minus;", "\u{2212}")
        .replace("&#8722;", "\u{2212}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rows of cell texts; the first row is usually the header
pub type Table = Vec<Vec<String>>;

#[derive(Default)]
struct TableBuilder {
    rows: Table,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl TableBuilder {
    fn finish_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.row.get_or_insert_with(Vec::new).push(collapse_whitespace(&cell));
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.row.take() {
            if !row.is_empty() {
                self.rows.push(row);
            }
        }
    }

    fn finish(mut self) -> Table {
        self.finish_row();
        self.rows
    }
}

/// All tables in document order. Nested tables are returned separately.
pub fn tables(html: &str) -> Vec<Table> {
    let mut stack: Vec<TableBuilder> = Vec::new();
    let mut done = Vec::new();

    for token in tokenize(html) {
        match token {
            Token::Open { name, .. } => match name.as_str() {
                "table" => stack.push(TableBuilder::default()),
                "tr" => {
                    if let Some(top) = stack.last_mut() {
                        top.finish_row();
                        top.row = Some(Vec::new());
                    }
                }
                "td" | "th" => {
                    if let Some(top) = stack.last_mut() {
                        top.finish_cell();
                        top.cell = Some(String::new());
                    }
                }
                "br" => {
                    if let Some(cell) = stack.last_mut().and_then(|t| t.cell.as_mut()) {
                        cell.push(' ');
                    }
                }
                _ => {}
            },
            Token::Close(name) => match name.as_str() {
                "table" => {
                    if let Some(top) = stack.pop() {
                        done.push(top.finish());
                    }
                }
                "tr" => {
                    if let Some(top) = stack.last_mut() {
                        top.finish_row();
                    }
                }
                "td" | "th" => {
                    if let Some(top) = stack.last_mut() {
                        top.finish_cell();
                    }
                }
                _ => {}
            },
            Token::Text(text) => {
                if let Some(cell) = stack.last_mut().and_then(|t| t.cell.as_mut()) {
                    cell.push_str(&decode_entities(text));
                    cell.push(' ');
                }
            }
        }
    }

    // Unclosed tables still count
    while let Some(top) = stack.pop() {
        done.push(top.finish());
    }
    done
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// Anchors with an href, with their visible text
pub fn links(html: &str) -> Vec<Link> {
    let mut found = Vec::new();
    let mut current: Option<Link> = None;

    for token in tokenize(html) {
        match token {
            Token::Open { name, attrs } if name == "a" => {
                if let Some(link) = current.take() {
                    found.push(link);
                }
                current = attribute(attrs, "href").map(|href| Link {
                    href,
                    text: String::new(),
                });
            }
            Token::Close(name) if name == "a" => {
                if let Some(mut link) = current.take() {
                    link.text = collapse_whitespace(&link.text);
                    found.push(link);
                }
            }
            Token::Text(text) => {
                if let Some(link) = current.as_mut() {
                    link.text.push_str(&decode_entities(text));
                    link.text.push(' ');
                }
            }
            _ => {}
        }
    }

    if let Some(mut link) = current {
        link.text = collapse_whitespace(&link.text);
        found.push(link);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_extracts_cells_in_order() {
        let html = r#"
            <html><head><style>td { color: red; }</style></head><body>
            <TABLE class="fin">
              <tr><th>Fiscal Year</th><th>FY 2024</th><th>FY 2023</th></tr>
              <tr><td>Revenue</td><td>63,751</td><td>51,609</td></tr>
              <tr><td>Net&nbsp;Income</td><td><span>4,210</span></td><td>3,443
            </TABLE>
            </body></html>"#;

        let tables = tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][0], vec!["Fiscal Year", "FY 2024", "FY 2023"]);
        assert_eq!(tables[0][1], vec!["Revenue", "63,751", "51,609"]);
        assert_eq!(tables[0][2], vec!["Net Income", "4,210", "3,443"]);
    }

    #[test]
    fn test_script_bodies_are_ignored() {
        let html = "<table><tr><td>a</td></tr></table><script>var s = '<table><tr><td>x</td></tr></table>';</script>";
        let tables = tables(html);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0], vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_nested_tables_are_separate() {
        let html = "<table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>";
        let tables = tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], vec![vec!["inner".to_string()]]);
        assert_eq!(tables[1], vec![vec!["outer".to_string()]]);
    }

    #[test]
    fn test_links_with_quoted_and_bare_hrefs() {
        let html = r#"<p><a class="x" href="/reports/ar-2024.pdf">Annual <b>Report</b> 2024</a>
            <A HREF='q3.html'>Q3</A><a href=plain.html>Plain</a><a name="anchor">No href</a></p>"#;

        let links = links(html);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].href, "/reports/ar-2024.pdf");
        assert_eq!(links[0].text, "Annual Report 2024");
        assert_eq!(links[1].href, "q3.html");
        assert_eq!(links[2].href, "plain.html");
    }

    #[test]
    fn test_data_href_is_not_href() {
        assert_eq!(attribute(r#" data-href="nope" href="yes""#, "href").as_deref(), Some("yes"));
    }
}
