//! Presentation projection of a record: the strings a front end shows.

use crate::date::format_date;
use crate::PaperRecord;
use serde::Serialize;

pub const SUMMARY_PLACEHOLDER: &str = "Generating summary...";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperCard {
    pub paper_id: String,
    pub title: String,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    /// `Relevance: 87% • A, B • Mar 2023 • 12 citations`
    pub metadata: String,
    pub summary: String,
    /// True while the summary is still the placeholder.
    pub summary_pending: bool,
    /// A PDF is available, so the paper can be loaded into a chat.
    pub can_chat: bool,
}

impl PaperCard {
    pub fn from_record(p: &PaperRecord) -> Self {
        let title = p
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string();
        let (summary, summary_pending) = match p.summary.as_deref() {
            Some(s) => (s.to_string(), false),
            None => (SUMMARY_PLACEHOLDER.to_string(), true),
        };
        Self {
            paper_id: p.paper_id.clone(),
            title,
            url: p.paper_link().map(str::to_string),
            pdf_url: p.pdf_link().map(str::to_string),
            metadata: metadata_line(p),
            summary,
            summary_pending,
            can_chat: p.pdf_link().is_some(),
        }
    }
}

pub fn metadata_line(p: &PaperRecord) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(r) = p.relevance.filter(|r| *r != 0.0) {
        parts.push(format!("Relevance: {}%", r.round() as i64));
    }
    parts.push(p.authors().join(", "));
    parts.push(format_date(p.publication_date.as_deref()));
    parts.push(format!("{} citations", p.citations()));
    parts.join(" \u{2022} ")
}
