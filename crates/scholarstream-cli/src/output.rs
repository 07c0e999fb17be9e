//! Terminal rendering. Progress goes to stderr, results to stdout.

use scholarstream_core::{Change, PaperCard, SearchSession, Step};
use std::io::Write;

pub(crate) fn card_text(rank: usize, c: &PaperCard) -> String {
    let mut out = format!("{rank:>2}. {}\n", c.title);
    if !c.metadata.is_empty() {
        out.push_str(&format!("    {}\n", c.metadata));
    }
    out.push_str(&format!("    id: {}\n", c.paper_id));
    if let Some(u) = &c.url {
        out.push_str(&format!("    paper: {u}\n"));
    }
    if let Some(u) = &c.pdf_url {
        out.push_str(&format!("    pdf: {u}\n"));
    }
    for line in c.summary.lines() {
        out.push_str(&format!("    {line}\n"));
    }
    out
}

pub(crate) fn list_text(cards: &[PaperCard]) -> String {
    if cards.is_empty() {
        return "No papers.\n".to_string();
    }
    cards
        .iter()
        .enumerate()
        .map(|(i, c)| card_text(i + 1, c))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn print_list(session: &SearchSession) {
    let header = format!(
        "{} papers, sorted by {} ({})\n",
        session.results().len(),
        session.sort_key(),
        if session.ascending() { "ascending" } else { "descending" }
    );
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{header}\n{}", list_text(&session.view()));
    let _ = stdout.flush();
}

/// Streams a one-line note per step to stderr.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    pub quiet: bool,
}

impl Progress {
    pub(crate) fn step(&self, step: &Step, session: &SearchSession) {
        if self.quiet {
            return;
        }
        let line = match step {
            Step::Changed(Change::RefinedQuery(q)) => {
                format!("refined queries: {}", q.join(" | "))
            }
            Step::Changed(Change::PaperAdded(id)) => {
                let title = session
                    .card(id)
                    .map(|c| c.title)
                    .unwrap_or_else(|| id.clone());
                format!("+ {title}")
            }
            Step::Changed(Change::SummaryUpdated(id)) => {
                let title = session
                    .card(id)
                    .map(|c| c.title)
                    .unwrap_or_else(|| id.clone());
                format!("summary ready: {title}")
            }
            Step::Changed(Change::Resort) => {
                let top: Vec<String> = session
                    .view()
                    .into_iter()
                    .take(3)
                    .map(|c| c.title)
                    .collect();
                format!("re-sorted by {}; top: {}", session.sort_key(), top.join("; "))
            }
            Step::Changed(Change::PaperMerged(_) | Change::Deferred(_)) => return,
            Step::Skipped { reason, .. } => format!("skipped: {reason}"),
        };
        eprintln!("{line}");
    }
}
