//! Folding the search event stream into a [`ResultSet`].
//!
//! Events are applied strictly in arrival order, one at a time. A `papers`
//! event upserts records; `relevance` and `summary` enrich a record that a
//! previous `papers` event introduced. Enrichment for an id we have not seen
//! yet is parked and replayed once that id is discovered, so a backend that
//! reorders events across papers still converges on the same records.

use crate::event::{decode_line, Decoded, StreamEvent};
use crate::lines::LineBuffer;
use crate::PaperRecord;
use serde::Serialize;
use std::collections::HashMap;

/// What applying one event did, in the terms a front end reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    RefinedQuery(Vec<String>),
    /// First sighting of this id: render a new card.
    PaperAdded(String),
    /// Known id, fields merged: the card's metadata may have changed.
    PaperMerged(String),
    /// A relevance score landed: the visible order must be recomputed.
    Resort,
    /// Update the card's summary in place, no re-sort.
    SummaryUpdated(String),
    /// Enrichment for an unknown id was parked.
    Deferred(String),
}

/// Anything that can absorb stream events.
pub trait EventSink {
    fn apply(&mut self, event: StreamEvent) -> Vec<Change>;
}

#[derive(Debug, Clone, Default)]
struct Pending {
    relevance: Option<f64>,
    summary: Option<String>,
}

// The fields any sort key reads; a merge that changes one moves the card.
#[derive(Debug, PartialEq)]
struct SortFields {
    citation_count: Option<u64>,
    relevance: Option<f64>,
    publication_date: Option<String>,
}

impl SortFields {
    fn of(p: &PaperRecord) -> Self {
        Self {
            citation_count: p.citation_count,
            relevance: p.relevance,
            publication_date: p.publication_date.clone(),
        }
    }
}

/// All papers discovered in the current search session, keyed by
/// `paper_id`, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Vec<PaperRecord>,
    index: HashMap<String, usize>,
    pending: HashMap<String, Pending>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, paper_id: &str) -> Option<&PaperRecord> {
        self.index.get(paper_id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, paper_id: &str) -> bool {
        self.index.contains_key(paper_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &PaperRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    /// Number of ids with parked enrichment.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        self.pending.clear();
    }

    /// Insert or merge one partial record. Returns true when the id is new.
    pub fn upsert(&mut self, rec: PaperRecord) -> bool {
        match self.index.get(&rec.paper_id) {
            Some(&i) => {
                self.records[i].merge_from(rec);
                false
            }
            None => {
                self.index.insert(rec.paper_id.clone(), self.records.len());
                self.records.push(rec);
                true
            }
        }
    }

    fn get_mut(&mut self, paper_id: &str) -> Option<&mut PaperRecord> {
        let i = *self.index.get(paper_id)?;
        Some(&mut self.records[i])
    }

    fn set_relevance(&mut self, paper_id: String, relevance: f64) -> Change {
        match self.get_mut(&paper_id) {
            Some(rec) => {
                rec.relevance = Some(relevance);
                Change::Resort
            }
            None => {
                self.pending.entry(paper_id.clone()).or_default().relevance = Some(relevance);
                Change::Deferred(paper_id)
            }
        }
    }

    fn set_summary(&mut self, paper_id: String, summary: String) -> Change {
        match self.get_mut(&paper_id) {
            Some(rec) => {
                rec.summary = Some(summary);
                Change::SummaryUpdated(paper_id)
            }
            None => {
                self.pending.entry(paper_id.clone()).or_default().summary = Some(summary);
                Change::Deferred(paper_id)
            }
        }
    }
}

impl EventSink for ResultSet {
    fn apply(&mut self, event: StreamEvent) -> Vec<Change> {
        match event {
            StreamEvent::RefinedQuery(q) => vec![Change::RefinedQuery(q)],
            StreamEvent::Papers(batch) => {
                let mut out = Vec::with_capacity(batch.len());
                let mut resort = false;
                for rec in batch {
                    let id = rec.paper_id.clone();
                    let before = self.get(&id).map(SortFields::of);
                    if !self.upsert(rec) {
                        resort |= before != self.get(&id).map(SortFields::of);
                        out.push(Change::PaperMerged(id));
                        continue;
                    }
                    out.push(Change::PaperAdded(id.clone()));
                    if let Some(p) = self.pending.remove(&id) {
                        if let Some(r) = p.relevance {
                            out.push(self.set_relevance(id.clone(), r));
                        }
                        if let Some(s) = p.summary {
                            out.push(self.set_summary(id, s));
                        }
                    }
                }
                if resort {
                    out.push(Change::Resort);
                }
                out
            }
            StreamEvent::Relevance {
                paper_id,
                relevance,
            } => vec![self.set_relevance(paper_id, relevance)],
            StreamEvent::Summary { paper_id, summary } => {
                vec![self.set_summary(paper_id, summary)]
            }
            StreamEvent::Unknown { .. } => Vec::new(),
        }
    }
}

/// One processed line, as seen by whoever drives the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Changed(Change),
    Skipped { line: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub bytes: u64,
    pub lines: u64,
    pub applied: u64,
    pub skipped: u64,
    pub ignored: u64,
    /// `papers` entries dropped for lack of a usable `paper_id`.
    pub rejected: u64,
}

/// Byte chunks in, applied events out.
#[derive(Debug, Default)]
pub struct Ingestor {
    buffer: LineBuffer,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn feed<S: EventSink>(&mut self, chunk: &[u8], sink: &mut S) -> Vec<Step> {
        self.stats.bytes += chunk.len() as u64;
        let lines = self.buffer.push(chunk);
        let mut out = Vec::new();
        for line in lines {
            self.line(line, sink, &mut out);
        }
        out
    }

    /// End of stream: apply a final record that lacked its newline.
    pub fn finish<S: EventSink>(&mut self, sink: &mut S) -> Vec<Step> {
        let mut out = Vec::new();
        if let Some(line) = self.buffer.finish() {
            self.line(line, sink, &mut out);
        }
        out
    }

    fn line<S: EventSink>(&mut self, line: String, sink: &mut S, out: &mut Vec<Step>) {
        if line.trim().is_empty() {
            return;
        }
        self.stats.lines += 1;
        let decoded = decode_line(&line).map(|Decoded { event, rejected }| {
            for entry in rejected {
                self.stats.rejected += 1;
                out.push(Step::Skipped {
                    line: entry,
                    reason: "papers entry without a usable paper_id".to_string(),
                });
            }
            event
        });
        match decoded {
            Ok(Some(StreamEvent::Unknown { .. })) | Ok(None) => self.stats.ignored += 1,
            Ok(Some(ev)) => {
                self.stats.applied += 1;
                out.extend(sink.apply(ev).into_iter().map(Step::Changed));
            }
            Err(e) => {
                self.stats.skipped += 1;
                out.push(Step::Skipped {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }
}
