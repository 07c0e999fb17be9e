//! IO-free building blocks for the scholarstream client.
//!
//! Everything here is pure data transformation: the backend's NDJSON event
//! protocol, the result-set reducer that folds those events into paper
//! records, sorting, and the projections the front end renders. Network and
//! file IO live in `scholarstream-local`.

pub mod card;
pub mod chat;
pub mod date;
pub mod event;
pub mod lines;
pub mod paper;
pub mod reducer;
pub mod session;
pub mod sort;
pub mod status;
pub mod transcript;

pub use card::PaperCard;
pub use chat::{ChatOutcome, ChatReply, ChatRequest, ProcessPdfReply};
pub use event::{decode_line, parse_line, Decoded, StreamEvent};
pub use lines::LineBuffer;
pub use paper::PaperRecord;
pub use reducer::{Change, EventSink, IngestStats, Ingestor, ResultSet, Step};
pub use session::SearchSession;
pub use sort::{sorted, SortKey};
pub use status::{SseBuffer, StatusUpdate};
pub use transcript::{Role, Transcript, TranscriptEntry};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a search is already in progress")]
    SearchInFlight,
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
