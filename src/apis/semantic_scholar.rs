use std::time::Duration;

use super::{http_client, PaperSource, RawRecord, SourceError, USER_AGENT};
use crate::normalize::SourceKind;
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "title,abstract,authors,year,url,citationCount,externalIds";

pub struct SemanticScholarClient {
    client: reqwest::Client,
}

impl SemanticScholarClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(USER_AGENT, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<RawRecord>,
}

#[async_trait]
impl PaperSource for SemanticScholarClient {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    async fn search(&self, query: &str, rows: u32) -> Result<Vec<RawRecord>, SourceError> {
        let limit = rows.min(100).to_string();
        let resp: S2SearchResponse = self
            .client
            .get(format!("{}/paper/search", BASE_URL))
            .query(&[("query", query), ("limit", limit.as_str()), ("fields", FIELDS)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.data)
    }
}
