//! `scholarstream session`: one long-lived `SearchSession` driven by stdin.
//!
//! Plain lines go to the chat; slash commands act on the results.

use crate::output::{self, Progress};
use crate::{chat_turn, run_search};
use scholarstream_core::{Error, Result, SearchSession, SortKey};
use scholarstream_local::{export_transcript, BackendClient, ExportFormat, ExportOptions, FontSource};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  <text>                  chat with the assistant
  /search <query>         run a search
  /sort <key>             citations | year | relevance
  /order                  toggle ascending / descending
  /list                   show the current results
  /paper <id>             load a result's PDF into a new chat
  /timeline               generate a timeline from the results
  /future-work            generate future-work ideas from the results
  /export <format> <path> save the chat (markdown | text | pdf)
  /quit";

#[derive(Debug, PartialEq)]
enum Line {
    Chat(String),
    Search(String),
    Sort(SortKey),
    Order,
    List,
    Paper(String),
    Timeline,
    FutureWork,
    Export(ExportFormat, PathBuf),
    Help,
    Quit,
    Empty,
}

fn parse_line(raw: &str) -> Result<Line> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(Line::Empty);
    }
    let Some(cmd) = s.strip_prefix('/') else {
        return Ok(Line::Chat(s.to_string()));
    };
    let (name, rest) = match cmd.split_once(char::is_whitespace) {
        Some((n, r)) => (n, r.trim()),
        None => (cmd, ""),
    };
    let need = |what: &str| -> Result<String> {
        if rest.is_empty() {
            Err(Error::InvalidInput(format!("usage: /{name} <{what}>")))
        } else {
            Ok(rest.to_string())
        }
    };
    Ok(match name {
        "search" => Line::Search(need("query")?),
        "sort" => Line::Sort(need("key")?.parse()?),
        "order" => Line::Order,
        "list" => Line::List,
        "paper" => Line::Paper(need("paper id")?),
        "timeline" => Line::Timeline,
        "future-work" | "future_work" => Line::FutureWork,
        "export" => {
            let args = need("format> <path")?;
            let Some((fmt, path)) = args.split_once(char::is_whitespace) else {
                return Err(Error::InvalidInput(
                    "usage: /export <format> <path>".to_string(),
                ));
            };
            Line::Export(fmt.parse()?, PathBuf::from(path.trim()))
        }
        "help" | "?" => Line::Help,
        "quit" | "exit" | "q" => Line::Quit,
        other => {
            return Err(Error::InvalidInput(format!(
                "unknown command /{other} (try /help)"
            )))
        }
    })
}

struct Repl<'a> {
    client: &'a BackendClient,
    session: SearchSession,
    year_filter: Option<&'a str>,
    progress: Progress,
}

impl Repl<'_> {
    fn print_new_assistant_lines(&self, from: usize) {
        for e in self.session.transcript().iter().skip(from) {
            if e.role == scholarstream_core::Role::Assistant {
                println!("{} {}", e.role.label(), e.text);
            }
        }
    }

    async fn handle(&mut self, line: Line) -> Result<bool> {
        match line {
            Line::Empty => {}
            Line::Quit => return Ok(false),
            Line::Help => println!("{HELP}"),
            Line::Chat(msg) => {
                let before = self.session.transcript().len();
                let res = chat_turn(
                    self.client,
                    &mut self.session,
                    &msg,
                    self.year_filter,
                    &self.progress,
                )
                .await;
                self.print_new_assistant_lines(before);
                let searched = match &res {
                    Ok(q) => q.is_some(),
                    Err(_) => !self.session.results().is_empty(),
                };
                if searched {
                    output::print_list(&self.session);
                }
                res?;
            }
            Line::Search(q) => {
                let res = run_search(
                    self.client,
                    &mut self.session,
                    &q,
                    self.year_filter,
                    &self.progress,
                )
                .await;
                if res.is_ok() || !self.session.results().is_empty() {
                    output::print_list(&self.session);
                }
                res?;
            }
            Line::Sort(key) => {
                self.session.set_sort_key(key);
                output::print_list(&self.session);
            }
            Line::Order => {
                self.session.toggle_order();
                output::print_list(&self.session);
            }
            Line::List => output::print_list(&self.session),
            Line::Paper(id) => self.load_paper(&id).await?,
            Line::Timeline => {
                let papers = self.session.papers_for_analysis("timeline")?;
                println!("{}", self.client.generate_timeline(&papers).await?);
            }
            Line::FutureWork => {
                let papers = self.session.papers_for_analysis("future work ideas")?;
                println!("{}", self.client.generate_future_work(&papers).await?);
            }
            Line::Export(format, path) => {
                let opts = ExportOptions {
                    fonts: FontSource::from_env(),
                    ..ExportOptions::default()
                };
                export_transcript(self.session.transcript(), format, &path, &opts)?;
                println!("saved {}", path.display());
            }
        }
        Ok(true)
    }

    async fn load_paper(&mut self, id: &str) -> Result<()> {
        let rec = match self.session.results().get(id) {
            Some(r) => r.clone(),
            None => self
                .client
                .paper(id)
                .await?
                .ok_or_else(|| Error::InvalidInput(format!("unknown paper id {id:?}")))?,
        };
        let Some(pdf) = rec.pdf_link() else {
            return Err(Error::InvalidInput(format!(
                "paper {id:?} has no PDF to chat about"
            )));
        };
        let reply = self.client.process_pdf(pdf).await?;
        let before = self.session.transcript().len();
        self.session.absorb_pdf_reply(rec.title.as_deref(), &reply)?;
        self.print_new_assistant_lines(before);
        Ok(())
    }
}

pub(crate) async fn run(
    client: &BackendClient,
    session: SearchSession,
    year_filter: Option<&str>,
) -> anyhow::Result<()> {
    let mut repl = Repl {
        client,
        session,
        year_filter,
        progress: Progress::default(),
    };
    eprintln!("scholarstream session ({}); /help for commands", client.config().base_url);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(raw) = lines.next_line().await? {
        let outcome = match parse_line(&raw) {
            Ok(line) => repl.handle(line).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            parse_line("  what about GNNs? ").unwrap(),
            Line::Chat("what about GNNs?".into())
        );
        assert_eq!(parse_line("   ").unwrap(), Line::Empty);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(
            parse_line("/search graph networks").unwrap(),
            Line::Search("graph networks".into())
        );
        assert_eq!(parse_line("/sort year").unwrap(), Line::Sort(SortKey::Year));
        assert_eq!(parse_line("/order").unwrap(), Line::Order);
        assert_eq!(parse_line("/future-work").unwrap(), Line::FutureWork);
        assert_eq!(
            parse_line("/export md out/chat.md").unwrap(),
            Line::Export(ExportFormat::Markdown, PathBuf::from("out/chat.md"))
        );
        assert_eq!(parse_line("/quit").unwrap(), Line::Quit);
    }

    #[test]
    fn bad_commands_are_input_errors() {
        for s in ["/search", "/sort stars", "/export pdf", "/frobnicate", "/paper"] {
            assert!(
                matches!(parse_line(s), Err(Error::InvalidInput(_))),
                "{s}"
            );
        }
    }
}
