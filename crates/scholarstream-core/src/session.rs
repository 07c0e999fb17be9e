//! Per-window front-end state with an explicit lifecycle.
//!
//! A session lives as long as the front end. Each search resets the result
//! set at `begin_search` and releases the in-flight guard at `finish_search`.
//! Chat state (active chat id, transcript) survives across searches.

use crate::card::PaperCard;
use crate::chat::{self, ChatOutcome, ChatReply, ChatRequest, ProcessPdfReply};
use crate::event::StreamEvent;
use crate::reducer::{Change, EventSink, ResultSet};
use crate::sort::{sorted, SortKey};
use crate::transcript::Transcript;
use crate::{Error, PaperRecord, Result};

#[derive(Debug, Default)]
pub struct SearchSession {
    results: ResultSet,
    sort_key: SortKey,
    ascending: bool,
    query: Option<String>,
    refined: Vec<String>,
    in_flight: bool,
    chat_id: Option<String>,
    transcript: Transcript,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, key: SortKey, ascending: bool) -> Self {
        self.sort_key = key;
        self.ascending = ascending;
        self
    }

    /// Start a new search: discards every record from the previous one.
    pub fn begin_search(&mut self, query: &str) -> Result<String> {
        let q = query.trim();
        if q.is_empty() {
            return Err(Error::InvalidInput("Please enter a search query".to_string()));
        }
        if self.in_flight {
            return Err(Error::SearchInFlight);
        }
        self.in_flight = true;
        self.results.clear();
        self.refined.clear();
        self.query = Some(q.to_string());
        Ok(q.to_string())
    }

    pub fn finish_search(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn refined_queries(&self) -> &[String] {
        &self.refined
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort_key = key;
    }

    /// Flip the sort direction; returns the new `ascending` value.
    pub fn toggle_order(&mut self) -> bool {
        self.ascending = !self.ascending;
        self.ascending
    }

    pub fn sorted(&self) -> Vec<&PaperRecord> {
        sorted(&self.results, self.sort_key, self.ascending)
    }

    /// The visible list: sorted cards for every record.
    pub fn view(&self) -> Vec<PaperCard> {
        self.sorted().into_iter().map(PaperCard::from_record).collect()
    }

    pub fn card(&self, paper_id: &str) -> Option<PaperCard> {
        self.results.get(paper_id).map(PaperCard::from_record)
    }

    /// Records posted to the analysis endpoints (timeline, future work).
    pub fn papers_for_analysis(&self, what: &str) -> Result<Vec<PaperRecord>> {
        if self.results.is_empty() {
            return Err(Error::InvalidInput(format!(
                "No papers available to generate {what}"
            )));
        }
        Ok(self.results.records().to_vec())
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn set_chat_id(&mut self, id: Option<String>) {
        self.chat_id = id;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Record the user's message and build the request for it.
    pub fn prepare_chat(&mut self, message: &str) -> Result<ChatRequest> {
        let m = message.trim();
        if m.is_empty() {
            return Err(Error::InvalidInput(
                "Please enter a question or topic".to_string(),
            ));
        }
        self.transcript.push_user(m);
        Ok(ChatRequest {
            message: m.to_string(),
            chat_id: self.chat_id.clone(),
        })
    }

    /// Fold a chat reply into the session. On [`ChatOutcome::Search`] the
    /// caller runs the search and then calls [`Self::record_searched_for`].
    pub fn absorb_chat_reply(&mut self, reply: &ChatReply) -> ChatOutcome {
        let outcome = reply.outcome();
        if matches!(outcome, ChatOutcome::Failed(_)) {
            return outcome;
        }
        if let Some(id) = reply.chat_id.as_deref().filter(|s| !s.is_empty()) {
            self.chat_id = Some(id.to_string());
        }
        match &outcome {
            ChatOutcome::Search(_) => self.transcript.push_assistant(chat::SEARCH_HANDOFF),
            ChatOutcome::Reply(text) => self.transcript.push_assistant(text.as_str()),
            ChatOutcome::Failed(_) | ChatOutcome::Nothing => {}
        }
        outcome
    }

    pub fn record_searched_for(&mut self, query: &str) {
        self.transcript.push_assistant(chat::searched_for(query));
    }

    /// A paper's PDF was loaded into a fresh backend chat.
    pub fn absorb_pdf_reply(&mut self, title: Option<&str>, reply: &ProcessPdfReply) -> Result<()> {
        if let Some(e) = reply.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Err(Error::Backend(format!("Error processing PDF: {e}")));
        }
        let Some(id) = reply.chat_id.as_deref().filter(|s| !s.is_empty()) else {
            return Err(Error::Backend("Failed to process PDF.".to_string()));
        };
        self.chat_id = Some(id.to_string());
        self.transcript.push_assistant(chat::paper_loaded(title));
        Ok(())
    }
}

impl EventSink for SearchSession {
    fn apply(&mut self, event: StreamEvent) -> Vec<Change> {
        let changes = self.results.apply(event);
        for c in &changes {
            if let Change::RefinedQuery(q) = c {
                self.refined = q.clone();
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Role;

    fn discover(s: &mut SearchSession, ids: &[&str]) {
        s.apply(StreamEvent::Papers(
            ids.iter().map(|id| PaperRecord::new(*id)).collect(),
        ));
    }

    #[test]
    fn new_search_clears_previous_records() {
        let mut s = SearchSession::new();
        s.begin_search("first").unwrap();
        discover(&mut s, &["A", "B"]);
        s.apply(StreamEvent::RefinedQuery(vec!["first refined".into()]));
        s.finish_search();

        s.begin_search("second").unwrap();
        assert!(s.results().is_empty());
        assert!(s.refined_queries().is_empty());
        discover(&mut s, &["C"]);
        assert!(s.results().get("A").is_none());
        assert!(s.results().get("B").is_none());
        assert_eq!(s.results().len(), 1);
        assert_eq!(s.query(), Some("second"));
    }

    #[test]
    fn second_search_while_in_flight_is_refused() {
        let mut s = SearchSession::new();
        s.begin_search("q").unwrap();
        assert!(matches!(s.begin_search("q2"), Err(Error::SearchInFlight)));
        s.finish_search();
        assert!(s.begin_search("q2").is_ok());
    }

    #[test]
    fn blank_inputs_are_rejected() {
        let mut s = SearchSession::new();
        assert!(matches!(s.begin_search("  "), Err(Error::InvalidInput(_))));
        assert!(matches!(s.prepare_chat(""), Err(Error::InvalidInput(_))));
        assert!(s.transcript().is_empty());
        assert!(s.papers_for_analysis("timeline").is_err());
    }

    #[test]
    fn chat_reply_updates_chat_id_and_transcript() {
        let mut s = SearchSession::new();
        let req = s.prepare_chat(" hello ").unwrap();
        assert_eq!(req.message, "hello");
        assert_eq!(req.chat_id, None);

        let reply = ChatReply {
            chat_id: Some("c1".into()),
            ready_to_search: Some(false),
            most_recent_response: Some("What field?".into()),
            ..ChatReply::default()
        };
        assert_eq!(
            s.absorb_chat_reply(&reply),
            ChatOutcome::Reply("What field?".into())
        );
        assert_eq!(s.chat_id(), Some("c1"));
        let roles: Vec<Role> = s.transcript().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);

        let req = s.prepare_chat("biology").unwrap();
        assert_eq!(req.chat_id.as_deref(), Some("c1"));
    }

    #[test]
    fn search_handoff_is_recorded_around_the_search() {
        let mut s = SearchSession::new();
        s.prepare_chat("find me papers").unwrap();
        let reply = ChatReply {
            chat_id: Some("c1".into()),
            ready_to_search: Some(true),
            summary: Some("protein folding".into()),
            ..ChatReply::default()
        };
        let ChatOutcome::Search(q) = s.absorb_chat_reply(&reply) else {
            panic!("expected search");
        };
        s.begin_search(&q).unwrap();
        s.finish_search();
        s.record_searched_for(&q);
        let texts: Vec<&str> = s.transcript().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "find me papers",
                chat::SEARCH_HANDOFF,
                "Searched for: \"protein folding\""
            ]
        );
    }

    #[test]
    fn pdf_reply_switches_chat() {
        let mut s = SearchSession::new();
        s.set_chat_id(Some("old".into()));
        let ok = ProcessPdfReply {
            message: Some("PDF processed successfully".into()),
            chat_id: Some("1700000000.5".into()),
            error: None,
        };
        s.absorb_pdf_reply(Some("GNNs"), &ok).unwrap();
        assert_eq!(s.chat_id(), Some("1700000000.5"));

        let bad = ProcessPdfReply {
            error: Some("No text found in the PDF".into()),
            ..ProcessPdfReply::default()
        };
        assert!(s.absorb_pdf_reply(None, &bad).is_err());
        assert_eq!(s.chat_id(), Some("1700000000.5"));
    }

    #[test]
    fn view_follows_sort_settings() {
        let mut s = SearchSession::new().with_sort(SortKey::Citations, false);
        let mut a = PaperRecord::new("A");
        a.citation_count = Some(1);
        let mut b = PaperRecord::new("B");
        b.citation_count = Some(9);
        s.apply(StreamEvent::Papers(vec![a, b]));
        let ids: Vec<String> = s.view().into_iter().map(|c| c.paper_id).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert!(s.toggle_order());
        let ids: Vec<String> = s.view().into_iter().map(|c| c.paper_id).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
