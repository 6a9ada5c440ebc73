use std::time::Duration;

use super::{http_client, PaperSource, RawRecord, SourceError, USER_AGENT};
use crate::normalize::SourceKind;
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.openalex.org";

pub struct OpenAlexClient {
    client: reqwest::Client,
}

impl OpenAlexClient {
    pub fn new(email: Option<String>, timeout: Duration) -> Result<Self, SourceError> {
        let ua = match email {
            Some(ref e) => format!("{} (mailto:{})", USER_AGENT, e),
            None => USER_AGENT.to_string(),
        };
        Ok(Self {
            client: http_client(&ua, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct OAResponse {
    #[serde(default)]
    results: Vec<RawRecord>,
}

#[async_trait]
impl PaperSource for OpenAlexClient {
    fn name(&self) -> &str {
        "openalex"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::OpenAlex
    }

    async fn search(&self, query: &str, rows: u32) -> Result<Vec<RawRecord>, SourceError> {
        let per_page = rows.min(200).to_string();
        let resp: OAResponse = self
            .client
            .get(format!("{}/works", BASE_URL))
            .query(&[
                ("search", query),
                ("per_page", per_page.as_str()),
                ("sort", "publication_date:desc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.results)
    }
}
