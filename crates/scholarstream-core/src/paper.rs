use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One search result at its current state of enrichment.
///
/// Only `paper_id` is guaranteed. Everything else arrives progressively:
/// metadata with the discovery event, then `relevance`, then `summary`.
/// Fields the client does not model are kept in `extra` so the record can be
/// posted back to the backend unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        rename = "abstract",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub abstract_text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaperRecord {
    pub fn new(paper_id: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            ..Self::default()
        }
    }

    /// Decode one entry of a `papers` payload.
    ///
    /// Only a missing or blank `paper_id` (or a non-object entry) rejects the
    /// entry. Every other field is decoded on its own: a value of the wrong
    /// type becomes `None` and the rest of the record is kept.
    pub fn from_value(v: Value) -> Option<Self> {
        let Value::Object(mut m) = v else {
            return None;
        };
        let paper_id = match m.remove("paper_id")? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if paper_id.trim().is_empty() {
            return None;
        }
        let mut rec = PaperRecord::new(paper_id);
        rec.title = m.remove("title").and_then(text);
        rec.url = m.remove("url").and_then(text);
        rec.pdf_url = m.remove("pdf_url").and_then(text);
        rec.authors = m.remove("authors").and_then(authors);
        rec.publication_date = m.remove("publication_date").and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            other => text(other),
        });
        rec.citation_count = m.remove("citation_count").and_then(count);
        rec.relevance = m.remove("relevance").and_then(number);
        rec.summary = m.remove("summary").and_then(text);
        rec.abstract_text = m.remove("abstract").and_then(text);
        rec.extra = m;
        Some(rec)
    }

    /// Field-level upsert: every field present in `other` replaces ours,
    /// absent (or JSON null) fields leave what we already know alone.
    pub fn merge_from(&mut self, other: PaperRecord) {
        fn keep<T>(dst: &mut Option<T>, src: Option<T>) {
            if src.is_some() {
                *dst = src;
            }
        }
        keep(&mut self.title, other.title);
        keep(&mut self.url, other.url);
        keep(&mut self.pdf_url, other.pdf_url);
        keep(&mut self.authors, other.authors);
        keep(&mut self.publication_date, other.publication_date);
        keep(&mut self.citation_count, other.citation_count);
        keep(&mut self.relevance, other.relevance);
        keep(&mut self.summary, other.summary);
        keep(&mut self.abstract_text, other.abstract_text);
        for (k, v) in other.extra {
            if !v.is_null() {
                self.extra.insert(k, v);
            }
        }
    }

    pub fn citations(&self) -> u64 {
        self.citation_count.unwrap_or(0)
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance.unwrap_or(0.0)
    }

    pub fn authors(&self) -> &[String] {
        self.authors.as_deref().unwrap_or(&[])
    }

    /// Landing page link, if the backend sent a non-empty one.
    pub fn paper_link(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }

    /// Open-access PDF link. The backend sends `""` when there is none.
    pub fn pdf_link(&self) -> Option<&str> {
        non_empty(self.pdf_url.as_deref())
    }
}

fn text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        _ => None,
    }
}

// Null or non-string names are dropped; the list itself survives.
fn authors(v: Value) -> Option<Vec<String>> {
    match v {
        Value::Array(items) => Some(items.into_iter().filter_map(text).collect()),
        Value::String(s) => Some(vec![s]),
        _ => None,
    }
}

fn number(v: Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

// `12.0` and `"12"` both count; negatives and fractions do not.
fn count(v: Value) -> Option<u64> {
    if let Value::Number(n) = &v {
        if let Some(u) = n.as_u64() {
            return Some(u);
        }
    }
    number(v)
        .filter(|x| *x >= 0.0 && x.fract() == 0.0 && *x <= u64::MAX as f64)
        .map(|x| x as u64)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
