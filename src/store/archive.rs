//! Dated result archives: one JSON array of records per (day, query context).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::{read_json, write_json_atomic, StoreError};
use crate::identity::{key_set, Identified};
use crate::record::PaperRecord;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Names a series of archives: which source set ran, for which keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    label: String,
    keyword: String,
}

impl QueryContext {
    pub fn new(label: &str, keyword: &str) -> Self {
        Self {
            label: label.trim().to_string(),
            keyword: keyword.trim().to_string(),
        }
    }

    /// File-name suffix, e.g. `allapi_scholar__ndt`. Label and keyword are
    /// joined by `__`, which `slug` never emits, so distinct contexts never
    /// share a file.
    pub fn suffix(&self) -> String {
        format!("{}__{}", slug(&self.label), slug(&self.keyword))
    }

    pub fn file_name(&self, day: NaiveDate) -> String {
        format!("{}_{}.json", day.format(DATE_FORMAT), self.suffix())
    }

    /// Date prefix of `file_name` if it belongs to this context.
    pub fn date_of(&self, file_name: &str) -> Option<NaiveDate> {
        let prefix = file_name.strip_suffix(&format!("_{}.json", self.suffix()))?;
        NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()
    }
}

/// Keep file names portable: runs of whitespace, separators and underscores
/// become a single underscore, never leading or trailing.
fn slug(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '.' | '_'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Outcome of appending to a day's archive.
#[derive(Debug, Clone)]
pub struct ArchiveUpdate {
    pub path: PathBuf,
    /// Records actually written; zero means nothing was new.
    pub appended: usize,
    /// Whether this call created the day's file.
    pub created: bool,
    /// Full archive contents after the update.
    pub contents: Vec<PaperRecord>,
}

/// Latest archive of `context` in `dir`. Ties on date fall back to the larger file name.
pub fn find_latest(dir: &Path, context: &QueryContext) -> io::Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut latest: Option<(NaiveDate, String)> = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(date) = context.date_of(&name) else {
            continue;
        };
        if latest.as_ref().map_or(true, |best| (date, &name) > (best.0, &best.1)) {
            latest = Some((date, name));
        }
    }
    Ok(latest.map(|(_, name)| dir.join(name)))
}

/// Append `records` to the `day` archive of `context`.
///
/// An existing file is loaded and extended with records whose identity key it
/// does not hold yet (unkeyable records are always appended). Nothing is
/// written when no record is new. A file that exists but does not parse is
/// reported rather than replaced.
pub fn append(
    dir: &Path,
    context: &QueryContext,
    day: NaiveDate,
    records: &[PaperRecord],
) -> Result<ArchiveUpdate, StoreError> {
    let path = dir.join(context.file_name(day));
    let created = !path.exists();
    let mut contents: Vec<PaperRecord> = if created { Vec::new() } else { read_json(&path)? };

    let mut known = key_set(&contents);
    let mut appended = 0;
    for record in records {
        if let Some(key) = record.identity_key() {
            if !known.insert(key) {
                continue;
            }
        }
        contents.push(record.clone());
        appended += 1;
    }

    if appended == 0 {
        tracing::info!("No new papers for {}", path.display());
        return Ok(ArchiveUpdate {
            path,
            appended,
            created: false,
            contents,
        });
    }

    write_json_atomic(&path, &contents)?;
    tracing::info!(
        "Archive {}: {} (+{} papers)",
        if created { "created" } else { "updated" },
        path.display(),
        appended
    );
    Ok(ArchiveUpdate {
        path,
        appended,
        created,
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn paper(title: &str, doi: Option<&str>) -> PaperRecord {
        PaperRecord {
            title: Some(title.to_string()),
            doi: doi.map(str::to_string),
            ..PaperRecord::from_source("test")
        }
    }

    #[test]
    fn test_context_file_names() {
        let ctx = QueryContext::new("allapi_scholar", "Non Destructive  Testing");
        assert_eq!(ctx.suffix(), "allapi_scholar__Non_Destructive_Testing");
        assert_eq!(
            ctx.file_name(day("2025-01-07")),
            "2025-01-07_allapi_scholar__Non_Destructive_Testing.json"
        );
        assert_eq!(
            ctx.date_of("2025-01-07_allapi_scholar__Non_Destructive_Testing.json"),
            Some(day("2025-01-07"))
        );
        assert_eq!(ctx.date_of("latest_allapi_scholar__Non_Destructive_Testing.json"), None);
        assert_eq!(QueryContext::new("x", "../etc").suffix(), "x__etc");
        assert_eq!(QueryContext::new("x", "__a__b_").suffix(), "x__a_b");
    }

    #[test]
    fn test_context_does_not_match_longer_label() {
        let short = QueryContext::new("scholar", "ndt");
        assert_eq!(short.date_of("2025-01-07_allapi_scholar__ndt.json"), None);
    }

    #[test]
    fn test_distinct_contexts_get_distinct_files() {
        let suffixes = [
            QueryContext::new("allapi", "scholar ndt").suffix(),
            QueryContext::new("allapi_scholar", "ndt").suffix(),
            QueryContext::new("allapi_scholar", "..").suffix(),
            QueryContext::new("allapi_scholar", "").suffix(),
            QueryContext::new("", "allapi_scholar").suffix(),
        ];
        assert_eq!(suffixes[2], suffixes[3]);
        let distinct: std::collections::HashSet<_> = suffixes.iter().collect();
        assert_eq!(distinct.len(), 4);
        assert_ne!(suffixes[2], "allapi_scholar");
    }

    #[test]
    fn test_find_latest_by_date_prefix() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        for name in [
            "2024-12-30_allapi_scholar__ndt.json",
            "2025-01-02_allapi_scholar__ndt.json",
            "2025-01-01_allapi_scholar__ndt.json",
            "2025-02-01_springer_mdpi__ndt.json",
            "notes.txt",
        ] {
            std::fs::write(tmp.path().join(name), "[]").unwrap();
        }
        let latest = find_latest(tmp.path(), &ctx).unwrap().unwrap();
        assert_eq!(latest, tmp.path().join("2025-01-02_allapi_scholar__ndt.json"));
    }

    #[test]
    fn test_find_latest_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        assert_eq!(find_latest(&tmp.path().join("absent"), &ctx).unwrap(), None);
    }

    #[test]
    fn test_same_day_append_extends_archive() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        let today = day("2025-05-05");

        let first = append(tmp.path(), &ctx, today, &[paper("A", Some("10.1/a"))]).unwrap();
        assert!(first.created);
        assert_eq!(first.appended, 1);

        let second = append(
            tmp.path(),
            &ctx,
            today,
            &[paper("A again", Some("10.1/A")), paper("B", None), paper("B", None)],
        )
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.appended, 1);

        let stored: Vec<PaperRecord> = read_json(&second.path).unwrap();
        let titles: Vec<_> = stored.iter().map(|p| p.title.as_deref().unwrap()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_append_nothing_new_skips_write() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        let today = day("2025-05-05");
        append(tmp.path(), &ctx, today, &[paper("A", Some("10.1/a"))]).unwrap();
        let update = append(tmp.path(), &ctx, today, &[paper("A", Some("10.1/a"))]).unwrap();
        assert_eq!(update.appended, 0);
        assert_eq!(update.contents.len(), 1);
    }

    #[test]
    fn test_unkeyable_records_always_appended() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("springer_mdpi", "ndt");
        let today = day("2025-05-05");
        let blank = PaperRecord::from_source("Springer");
        append(tmp.path(), &ctx, today, &[blank.clone()]).unwrap();
        let update = append(tmp.path(), &ctx, today, &[blank.clone(), blank]).unwrap();
        assert_eq!(update.appended, 2);
        assert_eq!(update.contents.len(), 3);
    }

    #[test]
    fn test_new_day_creates_new_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        append(tmp.path(), &ctx, day("2025-05-05"), &[paper("A", None)]).unwrap();
        let update = append(tmp.path(), &ctx, day("2025-05-06"), &[paper("A", None)]).unwrap();
        assert!(update.created);
        assert!(tmp.path().join("2025-05-05_allapi_scholar__ndt.json").exists());
        assert!(tmp.path().join("2025-05-06_allapi_scholar__ndt.json").exists());
    }

    #[test]
    fn test_corrupt_archive_is_not_replaced() {
        let tmp = TempDir::new().unwrap();
        let ctx = QueryContext::new("allapi_scholar", "ndt");
        let today = day("2025-05-05");
        let path = tmp.path().join(ctx.file_name(today));
        std::fs::write(&path, "[{").unwrap();
        assert!(append(tmp.path(), &ctx, today, &[paper("A", None)]).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{");
    }
}
