use std::sync::Arc;

use crate::apis::PaperSource;
use crate::normalize::normalize_all;
use crate::record::PaperRecord;

/// Query every selected source in parallel and normalize each result set.
///
/// Returns one batch per source in source order, so the in-run merge keeps the
/// configured precedence. A failed source contributes an empty batch.
pub async fn fetch_batches(
    sources: &[Arc<dyn PaperSource>],
    query: &str,
    rows: u32,
    source_filter: Option<&[String]>,
) -> Vec<Vec<PaperRecord>> {
    let handles: Vec<_> = select_sources(sources, source_filter)
        .into_iter()
        .map(|source| {
            let query = query.to_string();
            tokio::spawn(async move {
                let result = source.search(&query, rows).await;
                (source, result)
            })
        })
        .collect();

    let mut batches = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((source, Ok(raws))) => {
                tracing::info!("{} returned {} records", source.name(), raws.len());
                batches.push(normalize_all(&source.kind(), &raws));
            }
            Ok((source, Err(e))) => {
                tracing::warn!("Source {} failed: {}", source.name(), e);
                batches.push(Vec::new());
            }
            Err(e) => {
                tracing::warn!("Source task panicked: {}", e);
                batches.push(Vec::new());
            }
        }
    }
    batches
}

fn select_sources(
    sources: &[Arc<dyn PaperSource>],
    source_filter: Option<&[String]>,
) -> Vec<Arc<dyn PaperSource>> {
    sources
        .iter()
        .filter(|s| {
            source_filter
                .map(|f| f.iter().any(|name| name.eq_ignore_ascii_case(s.name())))
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}
