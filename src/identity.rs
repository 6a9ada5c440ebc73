use std::collections::HashSet;
use std::fmt;

use crate::record::{is_placeholder, PaperRecord};

/// Normalized string used to decide whether two records describe the same paper.
///
/// Unkeyable records (no doi, link or title) have no key at all, so they can
/// never collide with anything, including each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can be keyed by the doi > link > title fallback.
pub trait Identified {
    /// Candidate key fields, highest priority first.
    fn identity_fields(&self) -> [Option<&str>; 3];

    fn identity_key(&self) -> Option<IdentityKey> {
        self.identity_fields()
            .into_iter()
            .find_map(normalize)
            .map(IdentityKey)
    }
}

impl Identified for PaperRecord {
    fn identity_fields(&self) -> [Option<&str>; 3] {
        [self.doi.as_deref(), self.link.as_deref(), self.title.as_deref()]
    }
}

/// Resolve the identity key of a record, `None` if it is unkeyable.
pub fn resolve<T: Identified + ?Sized>(item: &T) -> Option<IdentityKey> {
    item.identity_key()
}

/// Whether `a` and `b` describe the same paper. Unkeyable items match nothing,
/// not even themselves.
pub fn same_paper<A, B>(a: &A, b: &B) -> bool
where
    A: Identified + ?Sized,
    B: Identified + ?Sized,
{
    matches!((a.identity_key(), b.identity_key()), (Some(x), Some(y)) if x == y)
}

/// Keys of every keyable item; unkeyable items are skipped.
pub fn key_set<'a, T, I>(items: I) -> HashSet<IdentityKey>
where
    T: Identified + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items.into_iter().filter_map(Identified::identity_key).collect()
}

/// Blank and `"Not Available"` fields carry no identity.
fn normalize(field: Option<&str>) -> Option<String> {
    let field = field.filter(|f| !is_placeholder(f))?;
    Some(field.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doi: Option<&str>, link: Option<&str>, title: Option<&str>) -> PaperRecord {
        PaperRecord {
            doi: doi.map(str::to_string),
            link: link.map(str::to_string),
            title: title.map(str::to_string),
            ..PaperRecord::from_source("test")
        }
    }

    #[test]
    fn test_doi_takes_priority() {
        let r = record(Some(" 10.1000/ABC "), Some("https://x.org/1"), Some("Title"));
        assert_eq!(resolve(&r).unwrap().to_string(), "10.1000/abc");
    }

    #[test]
    fn test_equal_doi_ignores_case_and_whitespace() {
        let a = record(Some("10.1/X"), Some("https://a.org"), Some("A"));
        let b = record(Some("  10.1/x\n"), None, Some("Completely different"));
        assert_eq!(resolve(&a), resolve(&b));
        assert!(same_paper(&a, &b));
    }

    #[test]
    fn test_link_then_title_fallback() {
        let by_link = record(Some("   "), Some("HTTPS://Example.org/Paper"), Some("T"));
        assert_eq!(resolve(&by_link).unwrap().to_string(), "https://example.org/paper");

        let a = record(None, None, Some("Phased Array Ultrasonics"));
        let b = record(Some(""), Some(""), Some("  phased array ultrasonics "));
        assert_eq!(resolve(&a), resolve(&b));
        assert!(resolve(&a).is_some());
    }

    #[test]
    fn test_unkeyable_records_never_match() {
        let a = record(None, None, None);
        let b = record(Some(" "), Some(""), Some("\t"));
        assert_eq!(resolve(&a), None);
        assert_eq!(resolve(&b), None);
        assert!(!same_paper(&a, &b));
        assert!(!same_paper(&a, &a));
        assert!(key_set([&a, &b]).is_empty());
    }

    #[test]
    fn test_placeholder_fields_are_skipped() {
        let r = record(Some("Not Available"), Some(" not available "), Some("Guided Waves"));
        assert_eq!(resolve(&r).unwrap().to_string(), "guided waves");
        assert_eq!(resolve(&record(None, None, Some("NOT AVAILABLE"))), None);
    }

    #[test]
    fn test_same_paper_needs_both_keys() {
        let keyed = record(None, None, Some("Eddy Current Testing"));
        let blank = record(None, None, None);
        assert!(same_paper(&keyed, &keyed));
        assert!(!same_paper(&keyed, &blank));
        assert!(!same_paper(&blank, &keyed));

        // Keys come from the highest-priority field, so a shared title alone is not enough.
        let with_doi = record(Some("10.1/e"), None, Some("Eddy Current Testing"));
        assert!(!same_paper(&keyed, &with_doi));
    }
}
