//! Drives a byte stream (usually a streaming HTTP body) through the reducer.
//!
//! The body is consumed strictly in order; each chunk is fed to an
//! [`Ingestor`] and every resulting step is reported before the next chunk is
//! read. A malformed line is logged and skipped. A transport error ends the
//! loop with [`Error::Transport`]; whatever was merged before it stays in the
//! sink.

use futures_util::{Stream, StreamExt};
use scholarstream_core::{Error, EventSink, IngestStats, Ingestor, Result, Step};
use std::fmt::Display;

pub async fn drive<S, B, E, T, F>(stream: S, sink: &mut T, mut on_step: F) -> Result<IngestStats>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    T: EventSink,
    F: FnMut(&Step, &T),
{
    let mut stream = std::pin::pin!(stream);
    let mut ingestor = Ingestor::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let st = ingestor.stats();
                tracing::error!(error = %e, applied = st.applied, "search stream failed");
                return Err(Error::Transport(e.to_string()));
            }
        };
        for step in ingestor.feed(chunk.as_ref(), sink) {
            trace_step(&step);
            on_step(&step, sink);
        }
    }
    for step in ingestor.finish(sink) {
        trace_step(&step);
        on_step(&step, sink);
    }

    let st = ingestor.stats();
    tracing::debug!(
        bytes = st.bytes,
        lines = st.lines,
        applied = st.applied,
        skipped = st.skipped,
        ignored = st.ignored,
        rejected = st.rejected,
        "search stream finished"
    );
    Ok(st)
}

fn trace_step(step: &Step) {
    match step {
        Step::Skipped { line, reason } => {
            let preview: String = line.chars().take(120).collect();
            tracing::warn!(%reason, line = %preview, "skipping undecodable stream input");
        }
        Step::Changed(c) => tracing::trace!(change = ?c, "applied"),
    }
}
