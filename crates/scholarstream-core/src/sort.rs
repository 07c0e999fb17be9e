use crate::date::PartialDate;
use crate::reducer::ResultSet;
use crate::{Error, PaperRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Citations,
    Year,
    #[default]
    Relevance,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Citations, SortKey::Year, SortKey::Relevance];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Citations => "citations",
            Self::Year => "year",
            Self::Relevance => "relevance",
        }
    }

    /// Base comparator: descending by the key, missing values last.
    pub fn compare(self, a: &PaperRecord, b: &PaperRecord) -> Ordering {
        match self {
            Self::Citations => b.citations().cmp(&a.citations()),
            Self::Year => date_of(b).cmp(&date_of(a)),
            Self::Relevance => b.relevance_score().total_cmp(&a.relevance_score()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citations" | "citation_count" => Ok(Self::Citations),
            "year" | "date" | "publication_date" => Ok(Self::Year),
            "relevance" => Ok(Self::Relevance),
            other => Err(Error::InvalidInput(format!(
                "unknown sort key {other:?} (allowed: citations, year, relevance)"
            ))),
        }
    }
}

// A record without a usable date compares below every dated record.
fn date_of(p: &PaperRecord) -> Option<PartialDate> {
    p.publication_date.as_deref().and_then(PartialDate::parse)
}

/// The display order of the current records.
///
/// Recomputed from scratch on every call; ties keep discovery order.
pub fn sorted(results: &ResultSet, key: SortKey, ascending: bool) -> Vec<&PaperRecord> {
    let mut out: Vec<&PaperRecord> = results.iter().collect();
    out.sort_by(|a, b| {
        let c = key.compare(a, b);
        if ascending {
            c.reverse()
        } else {
            c
        }
    });
    out
}
