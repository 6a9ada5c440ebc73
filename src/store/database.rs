//! Cumulative database of every paper ever archived, as `{title, doi}` summaries.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{read_json, StoreError};
use crate::identity::{same_paper, Identified};
use crate::record::{is_placeholder, PaperRecord};

const UNTITLED: &str = "Untitled";

/// Minimal summary kept per paper. `doi` holds the DOI, or the link when the
/// paper has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub doi: String,
}

impl DatabaseEntry {
    pub fn summarize(record: &PaperRecord) -> Self {
        let entry = Self {
            title: record.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
            doi: [&record.doi, &record.link]
                .into_iter()
                .flatten()
                .find(|value| !is_placeholder(value))
                .cloned()
                .unwrap_or_default(),
        };
        debug_assert!(record.identity_key().is_none() || same_paper(&entry, record));
        entry
    }
}

impl Identified for DatabaseEntry {
    fn identity_fields(&self) -> [Option<&str>; 3] {
        // Legacy files store "Not Available" in `doi`; normalization drops it.
        [Some(self.doi.as_str()), None, Some(self.title.as_str())]
    }
}

pub fn load(path: &Path) -> Result<Option<Vec<DatabaseEntry>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Fold records into the database. Existing entries are kept untouched, even
/// unkeyable ones or key twins; a record colliding with a stored key is
/// dropped, never used to update it. Unkeyable records are skipped. Returns
/// the merged list and how many were added.
pub fn merge(existing: Vec<DatabaseEntry>, records: &[PaperRecord]) -> (Vec<DatabaseEntry>, usize) {
    let mut seen: HashSet<_> = existing.iter().filter_map(Identified::identity_key).collect();
    let mut merged = existing;

    let mut added = 0;
    for record in records {
        let Some(key) = record.identity_key() else {
            continue;
        };
        if seen.insert(key) {
            merged.push(DatabaseEntry::summarize(record));
            added += 1;
        }
    }
    (merged, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve;

    fn paper(title: Option<&str>, doi: Option<&str>, link: Option<&str>) -> PaperRecord {
        PaperRecord {
            title: title.map(str::to_string),
            doi: doi.map(str::to_string),
            link: link.map(str::to_string),
            ..PaperRecord::from_source("test")
        }
    }

    fn entry(title: &str, doi: &str) -> DatabaseEntry {
        DatabaseEntry {
            title: title.into(),
            doi: doi.into(),
        }
    }

    #[test]
    fn test_existing_key_wins() {
        let existing = vec![entry("Original Title", "10.1/X")];
        let records = [paper(Some("Replacement"), Some("10.1/x"), None)];
        let (merged, added) = merge(existing, &records);
        assert_eq!(added, 0);
        assert_eq!(merged, vec![entry("Original Title", "10.1/X")]);
    }

    #[test]
    fn test_summary_falls_back_to_link() {
        let record = paper(None, None, Some("https://www.mdpi.com/1424-8220/24/1/1"));
        let summary = DatabaseEntry::summarize(&record);
        assert_eq!(summary.title, "Untitled");
        assert_eq!(summary.doi, "https://www.mdpi.com/1424-8220/24/1/1");
        assert!(same_paper(&summary, &record));
    }

    #[test]
    fn test_summary_skips_blank_doi() {
        let record = paper(Some("T"), Some("  "), Some("https://link.springer.com/x"));
        let summary = DatabaseEntry::summarize(&record);
        assert_eq!(summary.doi, "https://link.springer.com/x");
        assert!(same_paper(&summary, &record));
    }

    #[test]
    fn test_entry_keys_by_title_without_doi() {
        let record = paper(Some("Only A Title"), None, None);
        let summary = DatabaseEntry::summarize(&record);
        assert_eq!(summary.doi, "");
        assert!(same_paper(&summary, &record));
    }

    #[test]
    fn test_merge_appends_new_and_skips_unkeyable() {
        let existing = vec![entry("A", "10.1/a"), entry("", "")];
        let records = [
            paper(Some("B"), Some("10.1/b"), None),
            paper(None, None, None),
            paper(Some("B dup"), Some("10.1/B"), None),
        ];
        let (merged, added) = merge(existing, &records);
        assert_eq!(added, 1);
        assert_eq!(
            merged,
            vec![entry("A", "10.1/a"), entry("", ""), entry("B", "10.1/b")]
        );
    }

    #[test]
    fn test_merge_never_removes_stored_entries() {
        let existing = vec![
            entry("Kept", "10.1/a"),
            entry("Case twin", "10.1/A"),
            entry("", ""),
            entry("Legacy one", "Not Available"),
            entry("Legacy two", "Not Available"),
        ];
        let (merged, added) = merge(existing.clone(), &[]);
        assert_eq!(added, 0);
        assert_eq!(merged, existing);
    }

    #[test]
    fn test_placeholder_doi_falls_back_to_title() {
        let legacy = entry("Legacy one", "Not Available");
        assert!(same_paper(&legacy, &paper(Some("legacy one"), None, None)));
        assert_eq!(resolve(&entry("Not Available", "")), None);

        let existing = vec![legacy, entry("Legacy two", "not available")];
        let records = [
            paper(Some("Legacy two"), None, None),
            paper(Some("Legacy three"), None, None),
        ];
        let (merged, added) = merge(existing, &records);
        assert_eq!(added, 1);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].title, "Legacy three");
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load(&tmp.path().join("papers_db.json")).unwrap().is_none());
    }
}
