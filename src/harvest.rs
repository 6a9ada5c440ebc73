use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dedup::{merge_batches, publication_dates, retain_unseen, select_policy, FilterPolicy};
use crate::identity::key_set;
use crate::record::PaperRecord;
use crate::store::{PaperStore, QueryContext, StoreError};

/// What a commit wrote.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitReport {
    pub archive: Option<PathBuf>,
    pub archived: usize,
    pub database_added: usize,
}

/// Result of a full harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestOutcome {
    pub new_papers: Vec<PaperRecord>,
    pub report: CommitReport,
}

/// Decides which fetched records are new and folds them into the store.
pub struct Harvester<S> {
    store: S,
}

impl<S: PaperStore> Harvester<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drop candidates already known to the history of `context`.
    ///
    /// Never fails: unreadable history is logged and treated as absent, so the
    /// worst case is a duplicate rather than a lost paper.
    pub fn filter_candidates(
        &self,
        context: &QueryContext,
        candidates: Vec<PaperRecord>,
        today: NaiveDate,
    ) -> Vec<PaperRecord> {
        let latest = match self.store.latest_archive(context) {
            Ok(Some(path)) => path,
            Ok(None) => {
                tracing::debug!("No archive for {}; nothing to filter against", context.suffix());
                return candidates;
            }
            Err(e) => {
                tracing::warn!("Could not list archives for {}: {}", context.suffix(), e);
                return candidates;
            }
        };

        let archived = match self.store.load_archive(&latest) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not read archive {}: {}", latest.display(), e);
                return candidates;
            }
        };

        let dates = publication_dates(&archived);
        let policy = select_policy(Some(&dates), today);
        tracing::debug!("Filter policy {:?} from {}", policy, latest.display());

        let total = candidates.len();
        let (kept, against) = match policy {
            FilterPolicy::NoFilter => {
                tracing::info!("Latest archive is current for today; not filtering");
                return candidates;
            }
            FilterPolicy::DiffAgainstArchive => {
                (retain_unseen(candidates, &key_set(&archived)), "yesterday's archive")
            }
            FilterPolicy::DiffAgainstDatabase => match self.store.load_database() {
                Ok(Some(entries)) => (retain_unseen(candidates, &key_set(&entries)), "database"),
                Ok(None) => {
                    tracing::warn!("No database found; keeping all candidates");
                    return candidates;
                }
                Err(e) => {
                    tracing::warn!("Could not read database: {}", e);
                    return candidates;
                }
            },
        };
        tracing::info!("Removed {} papers already in {}", total - kept.len(), against);
        kept
    }

    /// Append `records` to today's archive and merge the archive into the database.
    ///
    /// An empty list is the normal "nothing new" case and touches no file.
    pub fn commit(
        &self,
        context: &QueryContext,
        records: &[PaperRecord],
        today: NaiveDate,
    ) -> Result<CommitReport, StoreError> {
        if records.is_empty() {
            tracing::info!("No new papers to add for {}", context.suffix());
            return Ok(CommitReport::default());
        }

        let result = self.store.exclusive(|store| {
            let update = store.append_to_archive(context, today, records)?;
            let database_added = store.merge_into_database(&update.contents)?;
            Ok(CommitReport {
                archive: Some(update.path),
                archived: update.appended,
                database_added,
            })
        });
        if let Err(ref e) = result {
            tracing::error!("Persisting results for {} failed: {}", context.suffix(), e);
        }
        result
    }

    /// In-run merge, cross-run filter and commit in one go.
    pub fn run<I, B>(
        &self,
        context: &QueryContext,
        batches: I,
        today: NaiveDate,
    ) -> Result<HarvestOutcome, StoreError>
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator<Item = PaperRecord>,
    {
        let merged = merge_batches(batches);
        let new_papers = self.filter_candidates(context, merged, today);
        let report = self.commit(context, &new_papers, today)?;
        Ok(HarvestOutcome { new_papers, report })
    }
}
