use std::time::Duration;

use super::{http_client, PaperSource, RawRecord, SourceError, USER_AGENT};
use crate::normalize::SourceKind;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::json;

const BASE_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: reqwest::Client,
}

impl ArxivClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(USER_AGENT, timeout)?,
        })
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    async fn search(&self, query: &str, rows: u32) -> Result<Vec<RawRecord>, SourceError> {
        let search_query = format!("all:{}", query);
        let max_results = rows.to_string();
        let body = self
            .client
            .get(BASE_URL)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_atom_feed(&body)
    }
}

/// Fields collected for one `<entry>`.
#[derive(Default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    doi: String,
    authors: Vec<String>,
}

impl Entry {
    fn into_raw(self) -> RawRecord {
        let opt = |s: String| {
            let t = s.trim().to_string();
            (!t.is_empty()).then_some(t)
        };
        json!({
            "id": opt(self.id),
            "title": opt(self.title),
            "summary": opt(self.summary),
            "published": opt(self.published),
            "doi": opt(self.doi),
            "authors": self.authors,
        })
    }
}

/// Turn an arXiv Atom feed into raw records keyed by Atom element names.
fn parse_atom_feed(xml: &str) -> Result<Vec<RawRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut entry: Option<Entry> = None;
    let mut current_tag = String::new();
    let mut in_author = false;
    let mut author_name = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "entry" {
                    entry = Some(Entry::default());
                } else if entry.is_some() {
                    if tag == "author" {
                        in_author = true;
                        author_name.clear();
                    }
                    current_tag = tag;
                }
            }
            Ok(Event::Text(e)) => {
                let Some(entry) = entry.as_mut() else { continue };
                let text = e
                    .unescape()
                    .map_err(|e| SourceError::Parse(format!("XML text error: {}", e)))?;
                match current_tag.as_str() {
                    "id" => entry.id.push_str(&text),
                    "title" => entry.title.push_str(&text),
                    "summary" => entry.summary.push_str(&text),
                    "published" => entry.published.push_str(&text),
                    "doi" => entry.doi.push_str(&text),
                    "name" if in_author => author_name.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "entry" {
                    if let Some(done) = entry.take() {
                        records.push(done.into_raw());
                    }
                } else if tag == "author" && in_author {
                    in_author = false;
                    if let Some(entry) = entry.as_mut() {
                        let name = author_name.trim();
                        if !name.is_empty() {
                            entry.authors.push(name.to_string());
                        }
                    }
                }
                if tag == current_tag {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
    }
    Ok(records)
}
