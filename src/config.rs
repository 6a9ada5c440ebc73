use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::apis::{self, PaperSource, SourceError};

/// API sources in the order their results are merged.
pub const API_SOURCES: [&str; 4] = ["openalex", "semantic_scholar", "arxiv", "crossref"];

const DEFAULT_ROWS: u32 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub enabled_source_names: Vec<String>,
    pub rows_per_source: u32,
    pub request_timeout: Duration,
    pub openalex_email: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("PAPER_HARVEST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_or_default().join(".paper-harvest"));

        let enabled_source_names = std::env::var("PAPER_HARVEST_SOURCES")
            .map(|s| parse_source_list(&s))
            .unwrap_or_default();

        let rows_per_source = parse_env("PAPER_HARVEST_ROWS").unwrap_or(DEFAULT_ROWS);
        let request_timeout =
            Duration::from_secs(parse_env("PAPER_HARVEST_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS));
        let openalex_email = std::env::var("OPENALEX_EMAIL").ok();

        Self {
            data_dir,
            enabled_source_names,
            rows_per_source,
            request_timeout,
            openalex_email,
        }
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.enabled_source_names.is_empty()
            || self.enabled_source_names.iter().any(|n| n == name)
    }

    /// Build the list of enabled paper sources, in merge order.
    pub fn build_sources(&self) -> Vec<Arc<dyn PaperSource>> {
        let mut sources: Vec<Arc<dyn PaperSource>> = Vec::new();
        for name in API_SOURCES.iter().filter(|n| self.is_enabled(n)) {
            match self.build_source(name) {
                Ok(source) => sources.push(source),
                Err(e) => tracing::warn!("Source {} disabled: {}", name, e),
            }
        }
        sources
    }

    fn build_source(&self, name: &str) -> Result<Arc<dyn PaperSource>, SourceError> {
        let timeout = self.request_timeout;
        Ok(match name {
            "openalex" => Arc::new(apis::openalex::OpenAlexClient::new(
                self.openalex_email.clone(),
                timeout,
            )?),
            "semantic_scholar" => Arc::new(apis::semantic_scholar::SemanticScholarClient::new(timeout)?),
            "arxiv" => Arc::new(apis::arxiv::ArxivClient::new(timeout)?),
            "crossref" => Arc::new(apis::crossref::CrossRefClient::new(timeout)?),
            other => return Err(SourceError::UnknownSource(other.to_string())),
        })
    }

    /// Return a list of source status descriptions.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        API_SOURCES
            .iter()
            .map(|name| {
                let enabled = self.is_enabled(name);
                let note = if !enabled {
                    "Disabled by PAPER_HARVEST_SOURCES filter".to_string()
                } else if *name == "openalex" && self.openalex_email.is_some() {
                    "Polite pool email set".to_string()
                } else {
                    "No API key required".to_string()
                };
                SourceStatus {
                    name: name.to_string(),
                    enabled,
                    note,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub enabled: bool,
    pub note: String,
}

fn parse_source_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

fn dirs_or_default() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sources: &[&str]) -> Config {
        Config {
            data_dir: PathBuf::from("/tmp/paper-harvest"),
            enabled_source_names: sources.iter().map(|s| s.to_string()).collect(),
            rows_per_source: DEFAULT_ROWS,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            openalex_email: None,
        }
    }

    #[test]
    fn test_parse_source_list() {
        assert_eq!(parse_source_list(" OpenAlex, ,arxiv "), vec!["openalex", "arxiv"]);
    }

    #[test]
    fn test_empty_filter_enables_everything() {
        let statuses = config(&[]).source_status();
        assert_eq!(statuses.len(), 4);
        assert!(statuses.iter().all(|s| s.enabled));
    }

    #[test]
    fn test_filter_keeps_merge_order() {
        let cfg = config(&["crossref", "openalex"]);
        let names: Vec<_> = cfg.build_sources().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["openalex", "crossref"]);
        let disabled: Vec<_> = cfg
            .source_status()
            .into_iter()
            .filter(|s| !s.enabled)
            .map(|s| s.name)
            .collect();
        assert_eq!(disabled, vec!["semantic_scholar", "arxiv"]);
    }

    #[test]
    fn test_unknown_source_name_is_rejected() {
        let cfg = config(&[]);
        assert!(matches!(
            cfg.build_source("bogus"),
            Err(SourceError::UnknownSource(name)) if name == "bogus"
        ));
        let crossref = cfg.build_source("crossref").map(|s| s.name().to_string());
        assert_eq!(crossref.ok().as_deref(), Some("crossref"));
    }
}
