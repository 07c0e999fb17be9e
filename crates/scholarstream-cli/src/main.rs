use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scholarstream_core::{
    ChatOutcome, EventSink, IngestStats, Ingestor, PaperRecord, SearchSession, SortKey,
    StatusUpdate, Step, StreamEvent, Transcript, TranscriptEntry,
};
use scholarstream_local::{
    export_transcript, BackendClient, BackendConfig, ExportFormat, ExportOptions, FontSource,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod envelope;
mod output;
mod repl;

use envelope::Reported;
use output::Progress;

#[derive(Parser, Debug)]
#[command(name = "scholarstream")]
#[command(about = "Streaming research-paper search and chat client", long_about = None)]
struct Cli {
    /// Backend base URL.
    #[arg(long, global = true, env = "SCHOLARSTREAM_BASE_URL")]
    base_url: Option<String>,
    /// Timeout for request/response calls (streams are not bounded).
    #[arg(long, global = true, env = "SCHOLARSTREAM_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    /// Print a JSON envelope on stdout instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a streaming search and print the sorted results.
    Search(SearchCmd),
    /// Feed a captured NDJSON search stream through the reducer, offline.
    Replay(ReplayCmd),
    /// Send one chat message. A reply that is ready to search runs the search.
    Chat(ChatCmd),
    /// Load a paper's PDF into a new backend chat.
    Paper(PaperCmd),
    /// Look up one paper record by id.
    Lookup(LookupCmd),
    /// Generate a research timeline from saved records.
    Timeline(AnalysisCmd),
    /// Generate future-work ideas from saved records.
    FutureWork(AnalysisCmd),
    /// Follow the backend's status channel.
    Status(StatusCmd),
    /// Interactive chat + search loop over stdin.
    Session(SessionCmd),
    /// Export a saved chat transcript (markdown, text, pdf).
    Export(ExportCmd),
    /// Print resolved configuration (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

impl Commands {
    fn kind(&self) -> &'static str {
        match self {
            Self::Search(_) => "search",
            Self::Replay(_) => "replay",
            Self::Chat(_) => "chat",
            Self::Paper(_) => "paper",
            Self::Lookup(_) => "lookup",
            Self::Timeline(_) => "timeline",
            Self::FutureWork(_) => "future_work",
            Self::Status(_) => "status",
            Self::Session(_) => "session",
            Self::Export(_) => "export",
            Self::Doctor => "doctor",
            Self::Version => "version",
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct SortArgs {
    /// Sort key. Allowed: citations, year, relevance
    #[arg(long, default_value = "relevance")]
    sort: SortKey,
    /// Sort ascending instead of descending.
    #[arg(long)]
    ascending: bool,
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// Search query (words are joined with spaces).
    #[arg(required = true)]
    query: Vec<String>,
    /// Year filter passed to the backend, e.g. "2020-" or "2018-2022".
    #[arg(long, env = "SCHOLARSTREAM_YEAR_FILTER")]
    year_filter: Option<String>,
    #[command(flatten)]
    sort: SortArgs,
    /// Suppress per-event progress on stderr.
    #[arg(long)]
    quiet: bool,
    /// Write the final records as a JSON array.
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ReplayCmd {
    /// NDJSON capture, or `-` for stdin.
    input: PathBuf,
    #[command(flatten)]
    sort: SortArgs,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ChatCmd {
    #[arg(required = true)]
    message: Vec<String>,
    /// Continue an existing backend chat.
    #[arg(long)]
    chat_id: Option<String>,
    #[arg(long, env = "SCHOLARSTREAM_YEAR_FILTER")]
    year_filter: Option<String>,
    #[command(flatten)]
    sort: SortArgs,
    #[arg(long)]
    quiet: bool,
}

#[derive(clap::Args, Debug)]
struct PaperCmd {
    pdf_url: String,
    /// Title used in the confirmation line.
    #[arg(long)]
    title: Option<String>,
}

#[derive(clap::Args, Debug)]
struct LookupCmd {
    paper_id: String,
}

#[derive(clap::Args, Debug)]
struct AnalysisCmd {
    /// JSON file with records: an array, or an object with a `papers` array.
    #[arg(long)]
    papers: PathBuf,
}

#[derive(clap::Args, Debug)]
struct StatusCmd {
    /// Stop after this many status messages (heartbeats do not count).
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct SessionCmd {
    #[arg(long, env = "SCHOLARSTREAM_YEAR_FILTER")]
    year_filter: Option<String>,
    #[command(flatten)]
    sort: SortArgs,
}

#[derive(clap::Args, Debug)]
struct ExportCmd {
    /// Transcript JSON: `{"entries":[{"role":"user","text":"..."}]}` or a bare array.
    #[arg(long)]
    transcript: PathBuf,
    /// Allowed: markdown, text, pdf (default: from the output extension)
    #[arg(long)]
    format: Option<ExportFormat>,
    #[arg(long)]
    out: PathBuf,
    /// Wrap width for text exports.
    #[arg(long, default_value_t = scholarstream_local::export::DEFAULT_TEXT_WIDTH)]
    width: usize,
}

fn load_env_file() {
    // Opt-in only; never overrides the process environment and never logs values.
    let Ok(p) = std::env::var("SCHOLARSTREAM_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SCHOLARSTREAM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn backend_config(cli: &Cli) -> Result<BackendConfig> {
    let mut cfg = BackendConfig::resolve(cli.base_url.as_deref())?;
    if let Some(ms) = cli.timeout_ms {
        cfg = cfg.with_timeout_ms(ms);
    }
    Ok(cfg)
}

fn client(cli: &Cli) -> Result<BackendClient> {
    Ok(BackendClient::new(backend_config(cli)?)?)
}

fn print_json(mut v: serde_json::Value, kind: &str, t0: std::time::Instant) {
    envelope::add_envelope_fields(&mut v, kind, t0.elapsed().as_millis());
    println!("{v}");
}

/// Run one search through `session`. The in-flight guard is released even
/// when the stream fails; whatever arrived before the failure stays.
pub(crate) async fn run_search(
    client: &BackendClient,
    session: &mut SearchSession,
    query: &str,
    year_filter: Option<&str>,
    progress: &Progress,
) -> scholarstream_core::Result<IngestStats> {
    let q = session.begin_search(query)?;
    let req = client.search_request(&q, year_filter);
    if !progress.quiet {
        eprintln!("searching: {} ({})", req.query, req.year_filter);
    }
    let res = client
        .stream_search(&req, session, |step, s| progress.step(step, s))
        .await;
    session.finish_search();
    res
}

/// One chat turn. Returns the query when the reply handed off to a search
/// (which has then already run).
pub(crate) async fn chat_turn(
    client: &BackendClient,
    session: &mut SearchSession,
    message: &str,
    year_filter: Option<&str>,
    progress: &Progress,
) -> scholarstream_core::Result<Option<String>> {
    let req = session.prepare_chat(message)?;
    let reply = client.chat(&req).await?;
    let outcome = session.absorb_chat_reply(&reply);
    tracing::debug!(chat_id = ?session.chat_id(), outcome = ?outcome, "chat reply");
    match outcome {
        ChatOutcome::Failed(e) => Err(scholarstream_core::Error::Backend(e)),
        ChatOutcome::Search(q) => {
            let res = run_search(client, session, &q, year_filter, progress).await;
            session.record_searched_for(&q);
            res.map(|_| Some(q))
        }
        ChatOutcome::Reply(_) | ChatOutcome::Nothing => Ok(None),
    }
}

fn results_json(session: &SearchSession, stats: Option<IngestStats>) -> serde_json::Value {
    serde_json::json!({
        "query": session.query(),
        "refined_queries": session.refined_queries(),
        "sort": session.sort_key(),
        "ascending": session.ascending(),
        "stats": stats,
        "papers": session.view(),
    })
}

fn save_records(path: &Path, session: &SearchSession) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(session.results().records())?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn read_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(std::io::stdin()));
    }
    let f = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(Box::new(f))
}

fn replay<S: EventSink>(
    mut input: impl Read,
    sink: &mut S,
    mut on_step: impl FnMut(&Step, &S),
) -> Result<IngestStats> {
    let mut ingestor = Ingestor::new();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for step in ingestor.feed(&buf[..n], sink) {
            on_step(&step, sink);
        }
    }
    for step in ingestor.finish(sink) {
        on_step(&step, sink);
    }
    Ok(ingestor.stats())
}

fn load_papers(path: &Path) -> Result<Vec<PaperRecord>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let v: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    let items = match v {
        serde_json::Value::Array(a) => a,
        serde_json::Value::Object(mut m) => match m.remove("papers") {
            Some(serde_json::Value::Array(a)) => a,
            _ => anyhow::bail!("{}: expected a `papers` array", path.display()),
        },
        _ => anyhow::bail!("{}: expected a JSON array of records", path.display()),
    };
    Ok(items.into_iter().filter_map(PaperRecord::from_value).collect())
}

fn load_transcript(path: &Path) -> Result<Transcript> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let entries: Vec<TranscriptEntry> = match serde_json::from_str::<Transcript>(&raw) {
        Ok(t) => t.entries,
        Err(_) => serde_json::from_str(&raw)
            .with_context(|| format!("parse transcript {}", path.display()))?,
    };
    let mut t = Transcript::new();
    for e in entries {
        t.push(e.role, e.text);
    }
    Ok(t)
}

async fn analysis(cli: &Cli, args: &AnalysisCmd, future_work: bool) -> Result<String> {
    let mut session = SearchSession::new();
    session.apply(StreamEvent::Papers(load_papers(&args.papers)?));
    let what = if future_work { "future work ideas" } else { "timeline" };
    let papers = session.papers_for_analysis(what)?;
    let client = client(cli)?;
    let text = if future_work {
        client.generate_future_work(&papers).await?
    } else {
        client.generate_timeline(&papers).await?
    };
    Ok(text)
}

async fn run(cli: Cli, t0: std::time::Instant) -> Result<()> {
    let kind = cli.command.kind();
    match &cli.command {
        Commands::Search(args) => {
            let client = client(&cli)?;
            let mut session = SearchSession::new().with_sort(args.sort.sort, args.sort.ascending);
            let progress = Progress {
                quiet: args.quiet || cli.json,
            };
            let res = run_search(
                &client,
                &mut session,
                &args.query.join(" "),
                args.year_filter.as_deref(),
                &progress,
            )
            .await;
            if let Some(p) = &args.save {
                save_records(p, &session)?;
            }
            match res {
                Ok(stats) => {
                    if cli.json {
                        print_json(results_json(&session, Some(stats)), kind, t0);
                    } else {
                        output::print_list(&session);
                    }
                }
                Err(e) if !session.results().is_empty() => {
                    // Partial results are still worth showing.
                    let e = anyhow::Error::new(e);
                    if cli.json {
                        let mut v = results_json(&session, None);
                        v["ok"] = serde_json::json!(false);
                        v["error"] = envelope::error_obj(
                            envelope::ErrorCode::of_any(&e),
                            format!("{e:#}"),
                        );
                        print_json(v, kind, t0);
                    } else {
                        output::print_list(&session);
                        eprintln!("error: {e:#}");
                    }
                    return Err(Reported(format!("{e:#}")).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Replay(args) => {
            let mut session = SearchSession::new().with_sort(args.sort.sort, args.sort.ascending);
            let progress = Progress {
                quiet: args.quiet || cli.json,
            };
            let stats = replay(read_input(&args.input)?, &mut session, |s, sess| {
                progress.step(s, sess)
            })?;
            if let Some(p) = &args.save {
                save_records(p, &session)?;
            }
            if cli.json {
                print_json(results_json(&session, Some(stats)), kind, t0);
            } else {
                output::print_list(&session);
                if stats.skipped > 0 {
                    eprintln!("{} malformed line(s) skipped", stats.skipped);
                }
                if stats.rejected > 0 {
                    eprintln!("{} paper(s) without an id dropped", stats.rejected);
                }
            }
        }
        Commands::Chat(args) => {
            let client = client(&cli)?;
            let mut session = SearchSession::new().with_sort(args.sort.sort, args.sort.ascending);
            session.set_chat_id(args.chat_id.clone());
            let progress = Progress {
                quiet: args.quiet || cli.json,
            };
            let res = chat_turn(
                &client,
                &mut session,
                &args.message.join(" "),
                args.year_filter.as_deref(),
                &progress,
            )
            .await;
            // A search that fails midway still shows what it found.
            let (searched, failure) = match res {
                Ok(q) => (q, None),
                Err(e) if !session.results().is_empty() => {
                    let q = session.query().map(str::to_string);
                    (q, Some(anyhow::Error::new(e)))
                }
                Err(e) => return Err(e.into()),
            };
            if cli.json {
                let mut v = serde_json::json!({
                    "chat_id": session.chat_id(),
                    "transcript": session.transcript(),
                    "search_query": searched,
                });
                if searched.is_some() {
                    v["results"] = results_json(&session, None);
                }
                if let Some(e) = &failure {
                    v["ok"] = serde_json::json!(false);
                    v["error"] =
                        envelope::error_obj(envelope::ErrorCode::of_any(e), format!("{e:#}"));
                }
                print_json(v, kind, t0);
            } else {
                // The user's own line is the first entry.
                for e in session.transcript().iter().skip(1) {
                    println!("{}\n{}\n", e.role.label(), e.text);
                }
                if searched.is_some() {
                    output::print_list(&session);
                }
                if let Some(id) = session.chat_id() {
                    eprintln!("chat id: {id}");
                }
                if let Some(e) = &failure {
                    eprintln!("error: {e:#}");
                }
            }
            if let Some(e) = failure {
                return Err(Reported(format!("{e:#}")).into());
            }
        }
        Commands::Paper(args) => {
            let client = client(&cli)?;
            let mut session = SearchSession::new();
            let reply = client.process_pdf(&args.pdf_url).await?;
            session.absorb_pdf_reply(args.title.as_deref(), &reply)?;
            let line = session
                .transcript()
                .last()
                .map(|e| e.text.clone())
                .unwrap_or_default();
            if cli.json {
                print_json(
                    serde_json::json!({"chat_id": session.chat_id(), "message": line}),
                    kind,
                    t0,
                );
            } else {
                println!("{line}");
                if let Some(id) = session.chat_id() {
                    println!("chat id: {id}");
                }
            }
        }
        Commands::Lookup(args) => {
            let client = client(&cli)?;
            let rec = client.paper(&args.paper_id).await?;
            let Some(rec) = rec else {
                anyhow::bail!(scholarstream_core::Error::InvalidInput(format!(
                    "unknown paper id {:?}",
                    args.paper_id
                )));
            };
            if cli.json {
                print_json(serde_json::json!({"paper": rec}), kind, t0);
            } else {
                print!(
                    "{}",
                    output::card_text(1, &scholarstream_core::PaperCard::from_record(&rec))
                );
            }
        }
        Commands::Timeline(args) | Commands::FutureWork(args) => {
            let future_work = matches!(cli.command, Commands::FutureWork(_));
            let text = analysis(&cli, args, future_work).await?;
            if cli.json {
                let field = if future_work { "future_work" } else { "timeline" };
                print_json(serde_json::json!({ field: text }), kind, t0);
            } else {
                println!("{text}");
            }
        }
        Commands::Status(args) => {
            let client = client(&cli)?;
            let json = cli.json;
            client
                .follow_status(args.limit, |u| {
                    if let StatusUpdate::Status(s) = u {
                        if json {
                            println!("{}", serde_json::json!({ "status": s }));
                        } else {
                            println!("{s}");
                        }
                    }
                })
                .await?;
        }
        Commands::Session(args) => {
            let client = client(&cli)?;
            let session = SearchSession::new().with_sort(args.sort.sort, args.sort.ascending);
            repl::run(&client, session, args.year_filter.as_deref()).await?;
        }
        Commands::Export(args) => {
            let format = match args.format {
                Some(f) => f,
                None => ExportFormat::from_path(&args.out).ok_or_else(|| {
                    scholarstream_core::Error::InvalidInput(format!(
                        "cannot infer export format from {}; pass --format",
                        args.out.display()
                    ))
                })?,
            };
            let t = load_transcript(&args.transcript)?;
            let opts = ExportOptions {
                text_width: args.width,
                fonts: FontSource::from_env(),
            };
            export_transcript(&t, format, &args.out, &opts)?;
            if cli.json {
                print_json(
                    serde_json::json!({
                        "path": args.out,
                        "format": format.as_str(),
                        "entries": t.len(),
                    }),
                    kind,
                    t0,
                );
            } else {
                println!("{}", args.out.display());
            }
        }
        Commands::Doctor => {
            let cfg = backend_config(&cli)?;
            let fonts = FontSource::from_env();
            let v = serde_json::json!({
                "name": "scholarstream",
                "version": env!("CARGO_PKG_VERSION"),
                "base_url": cfg.base_url.as_str(),
                "timeout_ms": cfg.timeout_ms,
                "year_filter": cfg.year_filter,
                "log_filter_set": std::env::var_os("SCHOLARSTREAM_LOG").is_some(),
                "env_file_set": std::env::var_os("SCHOLARSTREAM_ENV_FILE").is_some(),
                "pdf_font": {
                    "name": fonts.name,
                    "search_dirs": fonts.candidates(),
                },
            });
            print_json(v, kind, t0);
        }
        Commands::Version => {
            if cli.json {
                print_json(
                    serde_json::json!({
                        "name": "scholarstream",
                        "version": env!("CARGO_PKG_VERSION"),
                    }),
                    kind,
                    t0,
                );
            } else {
                println!("scholarstream {}", env!("CARGO_PKG_VERSION"));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    load_env_file();
    let cli = Cli::parse();
    init_tracing();

    let t0 = std::time::Instant::now();
    let json = cli.json;
    let kind = cli.command.kind();
    match run(cli, t0).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<Reported>().is_none() {
                if json {
                    println!("{}", envelope::failure(kind, t0.elapsed().as_millis(), &e));
                } else {
                    eprintln!("error: {e:#}");
                    let hint = envelope::ErrorCode::of_any(&e).hint();
                    if !hint.is_empty() {
                        eprintln!("hint: {hint}");
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}
