use serde::{Deserialize, Serialize};

/// Display sentinel written in place of missing data.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Canonical paper record shared by every source.
///
/// Missing data is `None` in memory. The `"Not Available"` sentinel only
/// exists in serialized form: it is written for absent fields and read back
/// as absence, so archives stay readable by tools expecting all nine keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(default, with = "sentinel")]
    pub title: Option<String>,
    #[serde(rename = "abstract", default, with = "sentinel")]
    pub abstract_text: Option<String>,
    #[serde(default, with = "sentinel")]
    pub authors: Option<String>,
    #[serde(default, with = "sentinel")]
    pub link: Option<String>,
    #[serde(default, with = "sentinel")]
    pub doi: Option<String>,
    #[serde(default, with = "citation_count")]
    pub citations: Option<u64>,
    #[serde(default, with = "sentinel")]
    pub status: Option<String>,
    #[serde(default, with = "sentinel")]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl PaperRecord {
    /// Empty record tagged with its provenance.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }
}

/// True for values that carry no information: blank or the display sentinel.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
}

/// Parse a citation count as scrapers report it ("12", "1,204", "Cited by 7").
pub fn parse_count(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("Cited by")
        .unwrap_or(trimmed)
        .trim()
        .replace(',', "");
    digits.parse().ok()
}

mod sentinel {
    use super::{is_placeholder, NOT_AVAILABLE};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(NOT_AVAILABLE))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) if !is_placeholder(&s) => Some(s),
            // Some sources report years as bare numbers.
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

mod citation_count {
    use super::{parse_count, NOT_AVAILABLE};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => s.serialize_u64(*n),
            None => s.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => parse_count(&s),
            _ => None,
        })
    }
}
