//! Chat relay types. The backend owns the conversation; the client only
//! forwards the message and the active chat id and reacts to the reply.

use serde::{Deserialize, Serialize};

pub const SEARCH_HANDOFF: &str =
    "Got it! I am putting a search query into the box below, and will begin looking now.";

pub fn searched_for(summary: &str) -> String {
    format!("Searched for: \"{summary}\"")
}

pub fn paper_loaded(title: Option<&str>) -> String {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("The paper");
    format!("\"{title}\" has been successfully loaded. You can now ask questions about its content.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub ready_to_search: Option<bool>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub most_recent_response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the front end should do with a chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Failed(String),
    /// The assistant has enough to search; run this query.
    Search(String),
    Reply(String),
    Nothing,
}

impl ChatReply {
    pub fn outcome(&self) -> ChatOutcome {
        if let Some(e) = self.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return ChatOutcome::Failed(e.to_string());
        }
        if self.ready_to_search.unwrap_or(false) {
            if let Some(q) = self.summary.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
                return ChatOutcome::Search(q.to_string());
            }
        }
        match self.most_recent_response.as_deref() {
            Some(r) if !r.is_empty() => ChatOutcome::Reply(r.to_string()),
            _ => ChatOutcome::Nothing,
        }
    }
}

/// Reply of the "load this PDF into a chat" request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPdfReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
