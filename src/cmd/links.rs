use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use chatblocks::classify;
use chatblocks::codec;
use chatblocks::config::{Config, is_quiet};
use chatblocks::document::MemoryDocument;
use chatblocks::fence::CodeblockRegion;
use chatblocks::output::{self, OutputFormat};
use chatblocks::session::{DropdownOption, ThreadStatus};

use crate::args::{BlockArgs, FormatArgs};
use crate::cmd;

#[derive(Args)]
pub struct LinksArgs {
    #[command(flatten)]
    block: BlockArgs,

    /// Report the status of this URL instead of the one the block opens with
    #[arg(long)]
    url: Option<String>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Serialize)]
struct LinkInfo {
    key: String,
    url: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_at: Option<i64>,
    label: String,
}

#[derive(Serialize)]
struct LinksReport {
    platform: String,
    region: CodeblockRegion,
    initial_link: String,
    status: ThreadStatus,
    links: Vec<LinkInfo>,
    options: Vec<DropdownOption>,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "SAVED")]
    saved: String,
    #[tabled(rename = "LABEL")]
    label: String,
    #[tabled(rename = "URL")]
    url: String,
}

/// Read-only: the block is parsed from an in-memory copy, so legacy lines
/// are shown upgraded without touching the file.
pub fn run(args: LinksArgs, config: &Config) -> Result<(), String> {
    let format = args.format.resolve();
    let text = cmd::read_input(&args.block.file)?;
    let session = cmd::open_session(&args.block, MemoryDocument::new(text), config)?;

    let status = match &args.url {
        Some(url) => session.status_for(url),
        None => session.status(),
    };
    let options = session.dropdown_options();
    let now = chrono::Utc::now().timestamp();

    let links: Vec<LinkInfo> = session
        .links()
        .iter()
        .map(|link| {
            let meta = codec::thread_meta(session.source(), &link.url);
            LinkInfo {
                key: classify::thread_record_key(&link.url),
                url: link.url.clone(),
                state: if link.done { "done" } else { "active" },
                saved_at: meta.and_then(|m| m.timestamp),
                label: options
                    .iter()
                    .find(|o| o.url == link.url)
                    .map(|o| o.label.trim_start_matches("✓ ").to_string())
                    .unwrap_or_default(),
            }
        })
        .collect();

    let report = LinksReport {
        platform: session.platform().to_string(),
        region: session.region(),
        initial_link: session.initial_link().to_string(),
        status,
        links,
        options,
    };

    match format {
        OutputFormat::Pretty => output_pretty(&report, now, config),
        OutputFormat::Plain => output_plain(&report, now),
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&report, format),
    }
}

fn output_pretty(report: &LinksReport, now: i64, config: &Config) -> Result<(), String> {
    println!(
        "{} {}",
        report.platform.bold(),
        format!("(lines {}-{})", report.region.start, report.region.end).dimmed()
    );
    println!(
        "{} {}",
        output::style_state(report.status.state.key()),
        report.status.status_text.dimmed()
    );
    println!();

    if report.links.is_empty() {
        if !is_quiet(config) {
            println!(
                "{}",
                "Hint: navigate to a thread with 'chatblocks replay' or save one with 'chatblocks add'"
                    .dimmed()
            );
        }
        return Ok(());
    }

    let url_max = output::terminal_width().saturating_sub(50).max(30);
    let rows: Vec<TableRow> = report
        .links
        .iter()
        .map(|l| TableRow {
            state: output::style_state(l.state).to_string(),
            saved: l
                .saved_at
                .map(|ts| output::format_relative_seconds(ts, now))
                .unwrap_or_default(),
            label: l.label.clone(),
            url: output::style_url(&output::truncate_back(&l.url, url_max)).to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    Ok(())
}

fn output_plain(report: &LinksReport, now: i64) -> Result<(), String> {
    println!("Platform: {}", report.platform);
    println!("Block: lines {}-{}", report.region.start, report.region.end);
    println!("Initial link: {}", report.initial_link);
    println!("Status: {}", report.status.status_text);
    println!();

    println!("KEY | STATE | SAVED | URL");
    for l in &report.links {
        let saved = l
            .saved_at
            .map(|ts| output::format_relative_seconds(ts, now))
            .unwrap_or_default();
        println!("{} | {} | {} | {}", l.key, l.state, saved, l.url);
    }
    Ok(())
}
