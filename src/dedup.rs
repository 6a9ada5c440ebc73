use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::identity::{resolve, IdentityKey};
use crate::record::PaperRecord;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How a candidate list is checked against history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPolicy {
    /// History is already current for today, or there is no history.
    NoFilter,
    /// Latest archive is from yesterday: diff against its records.
    DiffAgainstArchive,
    /// Latest archive is stale: diff against the cumulative database.
    DiffAgainstDatabase,
}

/// Combine per-source batches into one list, keeping the first record per title.
///
/// Titles are compared trimmed and lower-cased. Records without a title are
/// dropped. This intentionally ignores doi/link: the cross-run filter is the
/// place where identity keys apply.
pub fn merge_batches<I, B>(batches: I) -> Vec<PaperRecord>
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = PaperRecord>,
{
    let mut seen_titles = HashSet::new();
    let mut merged = Vec::new();
    for record in batches.into_iter().flatten() {
        let Some(title) = record
            .title
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
        else {
            continue;
        };
        if seen_titles.insert(title) {
            merged.push(record);
        }
    }
    merged
}

/// Pick the filter policy from the latest archive's publication dates.
///
/// `archive_dates` is `None` when no archive exists for the context.
pub fn select_policy(archive_dates: Option<&BTreeSet<String>>, today: NaiveDate) -> FilterPolicy {
    let Some(dates) = archive_dates else {
        return FilterPolicy::NoFilter;
    };
    if dates.contains(&today.format(DATE_FORMAT).to_string()) {
        return FilterPolicy::NoFilter;
    }
    let yesterday = today.pred_opt().map(|d| d.format(DATE_FORMAT).to_string());
    match yesterday {
        Some(y) if dates.contains(&y) => FilterPolicy::DiffAgainstArchive,
        _ => FilterPolicy::DiffAgainstDatabase,
    }
}

/// Set of `pub_date` values present in an archive.
pub fn publication_dates(records: &[PaperRecord]) -> BTreeSet<String> {
    records.iter().filter_map(|r| r.pub_date.clone()).collect()
}

/// Drop candidates whose identity key is already known. Unkeyable candidates
/// are always kept; relative order is preserved.
pub fn retain_unseen(candidates: Vec<PaperRecord>, seen: &HashSet<IdentityKey>) -> Vec<PaperRecord> {
    candidates
        .into_iter()
        .filter(|c| match resolve(c) {
            Some(key) if seen.contains(&key) => {
                tracing::debug!("Dropping known paper {}", key);
                false
            }
            _ => true,
        })
        .collect()
}
