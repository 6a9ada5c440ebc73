//! Maps source-specific raw records into [`PaperRecord`]s.
//!
//! Every mapping is total: a field with an unexpected shape becomes `None`
//! instead of failing the whole record.

use serde_json::Value;

use crate::record::{is_placeholder, parse_count, PaperRecord};

const DOI_RESOLVER: &str = "https://doi.org/";
const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Where a raw record came from. Decides which field mapping applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    OpenAlex,
    SemanticScholar,
    Arxiv,
    Crossref,
    /// Flat records produced by a browser agent (Springer, MDPI, Google Scholar).
    Agent(String),
}

impl SourceKind {
    /// Provenance tag stored in the record's `source` field.
    pub fn label(&self) -> &str {
        match self {
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::SemanticScholar => "Semantic Scholar",
            SourceKind::Arxiv => "arXiv",
            SourceKind::Crossref => "Crossref",
            SourceKind::Agent(label) => label,
        }
    }
}

/// Normalize one raw record from `source`.
pub fn normalize(source: &SourceKind, raw: &Value) -> PaperRecord {
    let mut record = match source {
        SourceKind::OpenAlex => from_openalex(raw),
        SourceKind::SemanticScholar => from_semantic_scholar(raw),
        SourceKind::Arxiv => from_arxiv(raw),
        SourceKind::Crossref => from_crossref(raw),
        SourceKind::Agent(_) => from_agent(raw),
    };
    if record.link.is_none() {
        record.link = record.doi.as_deref().map(doi_link);
    }
    record.source = source.label().to_string();
    record
}

/// Normalize a whole batch from one source, keeping arrival order.
pub fn normalize_all(source: &SourceKind, raws: &[Value]) -> Vec<PaperRecord> {
    raws.iter().map(|raw| normalize(source, raw)).collect()
}

fn from_openalex(raw: &Value) -> PaperRecord {
    let authors = raw
        .get("authorships")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|a| a.pointer("/author/display_name"))
        .filter_map(Value::as_str);

    PaperRecord {
        title: raw.get("title").and_then(clean_text),
        abstract_text: raw.get("abstract_inverted_index").and_then(decode_inverted_index),
        authors: join_authors(authors),
        link: raw.pointer("/primary_location/landing_page_url").and_then(plain_text),
        doi: raw.get("doi").and_then(Value::as_str).and_then(bare_doi),
        citations: Some(count(raw.get("cited_by_count")).unwrap_or(0)),
        status: raw.pointer("/open_access/status").and_then(plain_text),
        pub_date: raw.get("publication_date").and_then(plain_text),
        ..Default::default()
    }
}

fn from_crossref(raw: &Value) -> PaperRecord {
    let authors = raw
        .get("author")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|a| {
            let given = a.get("given").and_then(Value::as_str).unwrap_or("");
            let family = a.get("family").and_then(Value::as_str).unwrap_or("");
            format!("{} {}", given, family).trim().to_string()
        });

    PaperRecord {
        title: raw.get("title").and_then(first_text),
        abstract_text: raw.get("abstract").and_then(clean_text),
        authors: join_authors(authors),
        link: None,
        doi: raw.get("DOI").and_then(Value::as_str).and_then(bare_doi),
        citations: Some(count(raw.get("is-referenced-by-count")).unwrap_or(0)),
        status: raw.get("publisher").and_then(plain_text),
        pub_date: raw.pointer("/issued/date-parts/0").and_then(date_parts),
        ..Default::default()
    }
}

fn from_arxiv(raw: &Value) -> PaperRecord {
    let authors = raw
        .get("authors")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);

    PaperRecord {
        title: raw.get("title").and_then(clean_text),
        abstract_text: raw.get("summary").and_then(clean_text),
        authors: join_authors(authors),
        link: raw.get("id").and_then(plain_text),
        doi: raw.get("doi").and_then(Value::as_str).and_then(bare_doi),
        citations: None,
        status: Some("Open Access".to_string()),
        pub_date: raw
            .get("published")
            .and_then(plain_text)
            .map(|p| p.chars().take(10).collect()),
        ..Default::default()
    }
}

fn from_semantic_scholar(raw: &Value) -> PaperRecord {
    let authors = raw
        .get("authors")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|a| a.get("name"))
        .filter_map(Value::as_str);

    PaperRecord {
        title: raw.get("title").and_then(clean_text),
        abstract_text: raw.get("abstract").and_then(clean_text),
        authors: join_authors(authors),
        link: raw.get("url").and_then(plain_text),
        doi: raw
            .pointer("/externalIds/DOI")
            .and_then(Value::as_str)
            .and_then(bare_doi),
        citations: Some(count(raw.get("citationCount")).unwrap_or(0)),
        status: None,
        pub_date: raw.get("year").and_then(plain_text),
        ..Default::default()
    }
}

fn from_agent(raw: &Value) -> PaperRecord {
    let authors = match raw.get("authors") {
        Some(Value::Array(list)) => join_authors(list.iter().filter_map(Value::as_str)),
        Some(other) => plain_text(other),
        None => None,
    };

    PaperRecord {
        title: raw.get("title").and_then(clean_text),
        abstract_text: raw.get("abstract").and_then(clean_text),
        authors,
        link: raw.get("link").and_then(plain_text),
        doi: raw.get("doi").and_then(Value::as_str).and_then(bare_doi),
        citations: count(raw.get("citations")),
        status: raw.get("status").and_then(plain_text),
        pub_date: raw.get("pub_date").and_then(plain_text),
        ..Default::default()
    }
}

/// `https://doi.org/<doi>` for records that carry a DOI but no URL.
pub fn doi_link(doi: &str) -> String {
    format!("{}{}", DOI_RESOLVER, doi)
}

/// Strip resolver prefixes so `https://doi.org/10.1/x` and `10.1/x` key alike.
fn bare_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let bare = DOI_PREFIXES
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map(|prefix| &trimmed[prefix.len()..])
        .unwrap_or(trimmed)
        .trim();
    (!is_placeholder(bare)).then(|| bare.to_string())
}

/// Collapse newlines and runs of whitespace into single spaces.
fn clean_text(value: &Value) -> Option<String> {
    let text = value.as_str()?;
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!is_placeholder(&collapsed)).then_some(collapsed)
}

/// Strings are trimmed, numbers stringified, anything else is absent.
fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !is_placeholder(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(clean_text),
        other => clean_text(other),
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

fn join_authors<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

/// Rebuild an OpenAlex abstract from its `word -> [positions]` index.
fn decode_inverted_index(value: &Value) -> Option<String> {
    let index = value.as_object()?;
    let mut words: Vec<(u64, &str)> = index
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .map(move |pos| (pos, word.as_str()))
        })
        .collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|(pos, _)| *pos);
    let text = words.iter().map(|(_, w)| *w).collect::<Vec<_>>().join(" ");
    clean_text(&Value::String(text))
}

/// Crossref `[year, month, day]` parts as an ISO-style date, shorter when partial.
fn date_parts(value: &Value) -> Option<String> {
    let parts: Vec<u64> = value
        .as_array()?
        .iter()
        .map_while(Value::as_u64)
        .collect();
    match parts.as_slice() {
        [] => None,
        [year] => Some(format!("{:04}", year)),
        [year, month] => Some(format!("{:04}-{:02}", year, month)),
        [year, month, day, ..] => Some(format!("{:04}-{:02}-{:02}", year, month, day)),
    }
}
