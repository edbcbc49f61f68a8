use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use chatblocks::browser::HeadlessBrowser;
use chatblocks::config::Config;
use chatblocks::debounce::NavigationEvent;
use chatblocks::document::{Document, FileDocument, MemoryDocument};
use chatblocks::output::{self, OutputFormat};
use chatblocks::session::{NavigationOutcome, ThreadSession, ThreadStatus};

use crate::args::{BlockArgs, FormatArgs};
use crate::cmd;

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Navigation events as JSON lines: {"url": "...", "at_ms": 1200}
    events: PathBuf,

    /// Browser console log to scan for conversation lists
    #[arg(long, value_name = "FILE")]
    console: Option<PathBuf>,

    /// Debounce window override in milliseconds
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Replay against an in-memory copy and print the resulting file
    #[arg(long)]
    dry_run: bool,

    /// Run the Codex "Load diffs" helper on the final page
    #[arg(long)]
    load_diffs: bool,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Serialize)]
struct ReplayStep {
    /// None for the end-of-stream flush
    #[serde(skip_serializing_if = "Option::is_none")]
    at_ms: Option<u64>,
    outcome: NavigationOutcome,
    current_url: String,
}

#[derive(Serialize)]
struct ReplayReport {
    platform: String,
    initial_link: String,
    steps: Vec<ReplayStep>,
    status: ThreadStatus,
    history: Vec<String>,
    notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diffs_loaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
}

/// Drive a session with recorded navigation events, as the embedded browser would.
pub fn run(args: ReplayArgs, config: &Config) -> Result<(), String> {
    let format = args.format.resolve();
    let events = parse_events(&cmd::read_input(&args.events)?)?;
    let console = match &args.console {
        Some(path) => Some(cmd::read_input(path)?),
        None => None,
    };

    let debounce = args.debounce_ms.map(Duration::from_millis);

    let report = if args.dry_run {
        let text = cmd::read_input(&args.block.file)?;
        let session =
            cmd::open_session_with(&args.block, MemoryDocument::new(text), config, debounce)?;
        let mut report = replay(session, &events, console.as_deref(), args.load_diffs);
        report.0.document = Some(report.1.text().to_string());
        report.0
    } else {
        let session = cmd::open_session_with(
            &args.block,
            FileDocument::new(&args.block.file),
            config,
            debounce,
        )?;
        replay(session, &events, console.as_deref(), args.load_diffs).0
    };

    match format {
        OutputFormat::Pretty => output_pretty(&report),
        OutputFormat::Plain => output_plain(&report),
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&report, format)?,
    }
    Ok(())
}

fn parse_events(text: &str) -> Result<Vec<NavigationEvent>, String> {
    let mut events: Vec<NavigationEvent> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: NavigationEvent = serde_json::from_str(line)
            .map_err(|e| format!("events line {}: {}", i + 1, e))?;
        events.push(event);
    }
    events.sort_by_key(|e| e.at_ms);
    Ok(events)
}

fn replay<D: Document>(
    mut session: ThreadSession<D, HeadlessBrowser>,
    events: &[NavigationEvent],
    console: Option<&str>,
    load_diffs: bool,
) -> (ReplayReport, D) {
    let detected = console.map(|log| {
        if !session.install_network_logger() {
            return 0;
        }
        log.lines()
            .map(|line| session.ingest_console_message(line.trim()))
            .sum::<usize>()
    });

    let mut steps = Vec::new();
    for event in events {
        if let Some(outcome) = session.tick(event.at_ms) {
            steps.push(ReplayStep {
                at_ms: Some(event.at_ms),
                outcome,
                current_url: session.current_url().to_string(),
            });
        }
        session.push_event(event.clone());
    }
    if let Some(outcome) = session.flush_pending() {
        steps.push(ReplayStep {
            at_ms: None,
            outcome,
            current_url: session.current_url().to_string(),
        });
    }

    let diffs_loaded = load_diffs.then(|| session.load_codex_diffs());

    let report = ReplayReport {
        platform: session.platform().to_string(),
        initial_link: session.initial_link().to_string(),
        steps,
        status: session.status(),
        history: session.browser().history().to_vec(),
        notices: session.take_notices(),
        detected,
        diffs_loaded,
        document: None,
    };
    let (document, _) = session.into_parts();
    (report, document)
}

fn describe(outcome: &NavigationOutcome) -> String {
    match outcome {
        NavigationOutcome::Ignored => "ignored".to_string(),
        NavigationOutcome::Unchanged => "unchanged".to_string(),
        NavigationOutcome::NotThread => "not a thread".to_string(),
        NavigationOutcome::AlreadySaved => "already saved".to_string(),
        NavigationOutcome::Saved(url) => format!("saved {}", url),
        NavigationOutcome::SaveFailed => "save failed".to_string(),
    }
}

fn output_pretty(report: &ReplayReport) {
    println!(
        "{} {} {}",
        report.platform.bold(),
        "opened".dimmed(),
        output::style_url(&report.initial_link)
    );
    for step in &report.steps {
        let outcome = describe(&step.outcome);
        let outcome = match step.outcome {
            NavigationOutcome::Saved(_) => outcome.green(),
            NavigationOutcome::SaveFailed => outcome.red(),
            _ => outcome.dimmed(),
        };
        println!("  {} {}", step.current_url, outcome);
    }
    for notice in &report.notices {
        println!("{}", notice.dimmed());
    }
    if let Some(detected) = report.detected {
        println!("{} conversations detected", detected.to_string().bold());
    }
    match report.diffs_loaded {
        Some(true) => println!("{}", "Diff loader started".green()),
        Some(false) => println!("{}", "Load diffs not available on this page".dimmed()),
        None => {}
    }
    println!(
        "{} {}",
        output::style_state(report.status.state.key()),
        report.status.status_text
    );
    if let Some(document) = &report.document {
        println!();
        print!("{}", document);
    }
}

fn output_plain(report: &ReplayReport) {
    println!("Platform: {}", report.platform);
    println!("Initial link: {}", report.initial_link);
    println!();
    println!("AT_MS | OUTCOME | URL");
    for step in &report.steps {
        let at = step.at_ms.map(|t| t.to_string()).unwrap_or_else(|| "end".to_string());
        println!("{} | {} | {}", at, describe(&step.outcome), step.current_url);
    }
    println!();
    for notice in &report.notices {
        println!("Notice: {}", notice);
    }
    if let Some(detected) = report.detected {
        println!("Detected: {}", detected);
    }
    if let Some(loaded) = report.diffs_loaded {
        println!("Diffs loaded: {}", loaded);
    }
    println!("Status: {}", report.status.status_text);
    if let Some(document) = &report.document {
        println!();
        print!("{}", document);
    }
}
