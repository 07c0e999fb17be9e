//! The search backend's streaming protocol.
//!
//! Each line of the response body is a standalone JSON object
//! `{"type": <string>, "data": <payload>}`. Four types are meaningful; any
//! other type decodes to [`StreamEvent::Unknown`] and is ignored downstream.

use crate::{Error, PaperRecord, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The backend's rewrite of the user's query; display only.
    RefinedQuery(Vec<String>),
    /// Discovery of one batch of papers (partial records).
    Papers(Vec<PaperRecord>),
    Relevance { paper_id: String, relevance: f64 },
    Summary { paper_id: String, summary: String },
    Unknown { kind: String },
}

impl StreamEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::RefinedQuery(_) => "refined_query",
            Self::Papers(_) => "papers",
            Self::Relevance { .. } => "relevance",
            Self::Summary { .. } => "summary",
            Self::Unknown { kind } => kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RelevanceData {
    paper_id: String,
    relevance: f64,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    paper_id: String,
    summary: String,
}

/// One decoded line, plus the `papers` entries that had to be dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub event: Option<StreamEvent>,
    /// Compact JSON of each rejected `papers` entry.
    pub rejected: Vec<String>,
}

/// Decode one line of the stream.
///
/// - blank line: `Ok(None)`
/// - not JSON, or a known type with a malformed payload: `Err(Error::Decode)`
/// - unknown type: `Ok(Some(StreamEvent::Unknown { .. }))`
pub fn parse_line(line: &str) -> Result<Option<StreamEvent>> {
    decode_line(line).map(|d| d.event)
}

/// Like [`parse_line`], but also reports `papers` entries without a usable
/// `paper_id` instead of dropping them silently.
pub fn decode_line(line: &str) -> Result<Decoded> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Decoded::default());
    }
    let env: Envelope = serde_json::from_str(line).map_err(|e| Error::Decode(e.to_string()))?;
    let mut rejected = Vec::new();
    let ev = match env.kind.as_str() {
        "refined_query" => StreamEvent::RefinedQuery(payload(env.data, "refined_query")?),
        "papers" => {
            let Value::Array(items) = env.data else {
                return Err(Error::Decode("papers: data is not an array".to_string()));
            };
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let raw = item.to_string();
                match PaperRecord::from_value(item) {
                    Some(rec) => records.push(rec),
                    None => rejected.push(raw),
                }
            }
            StreamEvent::Papers(records)
        }
        "relevance" => {
            let d: RelevanceData = payload(env.data, "relevance")?;
            StreamEvent::Relevance {
                paper_id: d.paper_id,
                relevance: d.relevance,
            }
        }
        "summary" => {
            let d: SummaryData = payload(env.data, "summary")?;
            StreamEvent::Summary {
                paper_id: d.paper_id,
                summary: d.summary,
            }
        }
        _ => StreamEvent::Unknown { kind: env.kind },
    };
    Ok(Decoded {
        event: Some(ev),
        rejected,
    })
}

fn payload<T: serde::de::DeserializeOwned>(data: Value, kind: &str) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::Decode(format!("{kind}: {e}")))
}
