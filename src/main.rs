use std::sync::Arc;

use chrono::NaiveDate;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters,
    model::*, tool, tool_handler, tool_router,
    transport::stdio, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod apis;
mod config;
mod dedup;
mod harvest;
mod identity;
mod normalize;
mod record;
mod search;
mod store;

use apis::PaperSource;
use config::Config;
use harvest::Harvester;
use normalize::{normalize_all, SourceKind};
use record::PaperRecord;
use store::{JsonFileStore, PaperStore, QueryContext};

const API_CONTEXT: &str = "allapi_scholar";
const AGENT_CONTEXT: &str = "springer_mdpi";

// ── Parameter structs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
struct HarvestParams {
    #[schemars(description = "Keyword passed verbatim to every source")]
    keyword: String,
    #[schemars(description = "Restrict to specific sources (e.g. [\"openalex\", \"arxiv\"])")]
    sources: Option<Vec<String>>,
    #[schemars(description = "Records requested per source (default from PAPER_HARVEST_ROWS, max 100)")]
    rows: Option<u32>,
    #[schemars(description = "Archive series label (default \"allapi_scholar\")")]
    context: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AgentBatch {
    #[schemars(description = "Provenance label of the agent, e.g. \"Springer\", \"MDPI\", \"Google Scholar\"")]
    source: String,
    #[schemars(description = "Flat records with title, abstract, authors, link, doi, citations, status, pub_date")]
    records: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct IngestParams {
    #[schemars(description = "Keyword the agents searched for")]
    keyword: String,
    #[schemars(description = "Archive series label (default \"springer_mdpi\")")]
    context: Option<String>,
    #[schemars(description = "One batch per agent, merged in the given order")]
    batches: Vec<AgentBatch>,
}

// ── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct FilterResponse {
    candidates: usize,
    new_papers: Vec<PaperRecord>,
}

#[derive(Debug, Serialize)]
struct DatabaseStats {
    path: String,
    entries: usize,
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PaperHarvestServer {
    tool_router: ToolRouter<Self>,
    config: Arc<Config>,
    sources: Arc<Vec<Arc<dyn PaperSource>>>,
    harvester: Arc<Mutex<Harvester<JsonFileStore>>>,
}

#[tool_router]
impl PaperHarvestServer {
    pub fn create() -> Self {
        let config = Config::from_env();
        let sources = config.build_sources();
        let harvester = Harvester::new(JsonFileStore::new(&config.data_dir));

        tracing::info!(
            "Initialized {} paper sources, results={}, database={}",
            sources.len(),
            harvester.store().results_dir().display(),
            harvester.store().database_path().display()
        );

        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            sources: Arc::new(sources),
            harvester: Arc::new(Mutex::new(harvester)),
        }
    }

    #[tool(description = "List available API sources and their status")]
    async fn list_sources(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.config.source_status())
    }

    #[tool(description = "Query the API sources for a keyword, drop papers seen in earlier runs, and archive the new ones")]
    async fn harvest(
        &self,
        Parameters(params): Parameters<HarvestParams>,
    ) -> Result<CallToolResult, McpError> {
        let rows = params.rows.unwrap_or(self.config.rows_per_source).min(100);
        let batches = search::fetch_batches(
            &self.sources,
            &params.keyword,
            rows,
            params.sources.as_deref(),
        )
        .await;

        let context = QueryContext::new(params.context.as_deref().unwrap_or(API_CONTEXT), &params.keyword);
        let outcome = with_harvester(&self.harvester, move |h| h.run(&context, batches, today()))
            .await?
            .map_err(|e| McpError::internal_error(format!("Persisting results failed: {}", e), None))?;
        json_result(&outcome)
    }

    #[tool(description = "Ingest records scraped by browser agents (Springer, MDPI, Google Scholar), drop known papers, and archive the new ones")]
    async fn ingest_records(
        &self,
        Parameters(params): Parameters<IngestParams>,
    ) -> Result<CallToolResult, McpError> {
        let context = QueryContext::new(params.context.as_deref().unwrap_or(AGENT_CONTEXT), &params.keyword);
        let batches = normalize_batches(&params.batches)?;

        let outcome = with_harvester(&self.harvester, move |h| h.run(&context, batches, today()))
            .await?
            .map_err(|e| McpError::internal_error(format!("Persisting results failed: {}", e), None))?;
        json_result(&outcome)
    }

    #[tool(description = "Dry run: report which agent records would be new for a keyword without writing anything")]
    async fn filter_records(
        &self,
        Parameters(params): Parameters<IngestParams>,
    ) -> Result<CallToolResult, McpError> {
        let context = QueryContext::new(params.context.as_deref().unwrap_or(AGENT_CONTEXT), &params.keyword);
        let merged = dedup::merge_batches(normalize_batches(&params.batches)?);
        let candidates = merged.len();

        let new_papers =
            with_harvester(&self.harvester, move |h| h.filter_candidates(&context, merged, today())).await?;
        json_result(&FilterResponse { candidates, new_papers })
    }

    #[tool(description = "Report the size and location of the cumulative paper database")]
    async fn database_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = with_harvester(&self.harvester, |h| {
            let store = h.store();
            store.load_database().map(|entries| DatabaseStats {
                path: store.database_path().display().to_string(),
                entries: entries.map_or(0, |entries| entries.len()),
            })
        })
        .await?
        .map_err(|e| McpError::internal_error(format!("Could not read database: {}", e), None))?;
        json_result(&stats)
    }
}

/// Run store work on the blocking pool while holding the harvester, so file
/// I/O and the cross-process lock never stall a runtime worker.
async fn with_harvester<H, T, F>(harvester: &Arc<Mutex<H>>, f: F) -> Result<T, McpError>
where
    H: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&H) -> T + Send + 'static,
{
    let guard = Arc::clone(harvester).lock_owned().await;
    tokio::task::spawn_blocking(move || f(&guard))
        .await
        .map_err(|e| McpError::internal_error(format!("Store task failed: {}", e), None))
}

fn normalize_batches(batches: &[AgentBatch]) -> Result<Vec<Vec<PaperRecord>>, McpError> {
    batches
        .iter()
        .map(|batch| {
            let label = batch.source.trim();
            if label.is_empty() {
                return Err(McpError::invalid_params("Batch source label is empty".to_string(), None));
            }
            Ok(normalize_all(&SourceKind::Agent(label.to_string()), &batch.records))
        })
        .collect()
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[tool_handler]
impl ServerHandler for PaperHarvestServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Harvest paper metadata from OpenAlex, Semantic Scholar, arXiv and Crossref, \
                 or ingest records scraped by browser agents. Each run keeps only papers not \
                 seen before (by DOI, then link, then title) and appends them to a dated \
                 archive and a cumulative database."
                    .into(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting paper-harvest MCP server");

    let server = PaperHarvestServer::create();
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
