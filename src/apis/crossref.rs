use std::time::Duration;

use super::{http_client, PaperSource, RawRecord, SourceError, USER_AGENT};
use crate::normalize::SourceKind;
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.crossref.org/works";

pub struct CrossRefClient {
    client: reqwest::Client,
}

impl CrossRefClient {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(USER_AGENT, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<RawRecord>,
}

#[async_trait]
impl PaperSource for CrossRefClient {
    fn name(&self) -> &str {
        "crossref"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Crossref
    }

    async fn search(&self, query: &str, rows: u32) -> Result<Vec<RawRecord>, SourceError> {
        let rows = rows.min(100).to_string();
        let resp: CRResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("query", query),
                ("rows", rows.as_str()),
                ("sort", "published"),
                ("order", "desc"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.message.items)
    }
}
