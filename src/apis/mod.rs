pub mod arxiv;
pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::normalize::SourceKind;

/// One record as the source returned it, before normalization.
pub type RawRecord = serde_json::Value;

pub(crate) const USER_AGENT: &str = "paper-harvest/0.1";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Configuration name, e.g. `openalex`.
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;
    /// Fetch up to `rows` raw records for `query`, newest first where the API allows.
    async fn search(&self, query: &str, rows: u32) -> Result<Vec<RawRecord>, SourceError>;
}

pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}
