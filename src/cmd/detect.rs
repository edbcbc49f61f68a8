use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use chatblocks::config::{Config, is_quiet};
use chatblocks::conversations::{self, ConversationItem};
use chatblocks::output::{self, OutputFormat};

use crate::args::FormatArgs;
use crate::cmd;

#[derive(Args)]
pub struct DetectArgs {
    /// Browser console log, one message per line ("-" for stdin)
    log: PathBuf,

    /// Fuzzy filter over conversation titles
    #[arg(short = 'q', long)]
    query: Option<String>,

    #[command(flatten)]
    format: FormatArgs,
}

/// Conversations found in `[SC_NET]` console lines.
pub fn run(args: DetectArgs, config: &Config) -> Result<(), String> {
    let format = args.format.resolve();
    let text = cmd::read_input(&args.log)?;

    let mut detected: Vec<ConversationItem> = Vec::new();
    let mut responses = 0;
    for line in text.lines() {
        let Some(entry) = conversations::parse_console_message(line.trim()) else {
            continue;
        };
        if let Some(items) = conversations::conversation_items(&entry) {
            responses += 1;
            detected = conversations::merge(&detected, &items);
        }
    }
    tracing::debug!(responses, conversations = detected.len(), "console log scanned");

    let query = args.query.as_deref().unwrap_or("");
    let shown = conversations::filter_suggestions(query, &detected);
    print_conversations(&shown, &config.platforms.chatgpt_base_url, format, config)
}

#[derive(Serialize)]
struct DetectedThread<'a> {
    #[serde(flatten)]
    item: &'a ConversationItem,
    label: String,
    url: String,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "UPDATED")]
    updated: String,
    #[tabled(rename = "TITLE")]
    title: String,
    #[tabled(rename = "URL")]
    url: String,
}

/// Shared by `detect` and `merge`.
pub fn print_conversations(
    items: &[&ConversationItem],
    base_url: &str,
    format: OutputFormat,
    config: &Config,
) -> Result<(), String> {
    let threads: Vec<DetectedThread> = items
        .iter()
        .map(|&item| DetectedThread {
            item,
            label: conversations::suggestion_label(item),
            url: conversations::build_thread_url(item, base_url),
        })
        .collect();

    match format {
        OutputFormat::Pretty => {
            println!("{} conversations", threads.len().to_string().bold());
            if threads.is_empty() {
                if !is_quiet(config) {
                    println!(
                        "{}",
                        "Hint: capture console output after installing the network logger".dimmed()
                    );
                }
                return Ok(());
            }
            println!();
            let now_ms = chrono::Utc::now().timestamp_millis();
            let title_max = output::terminal_width().saturating_sub(70).max(20);
            let rows: Vec<TableRow> = threads
                .iter()
                .map(|t| TableRow {
                    updated: relative_ms(t.item.sort_key_ms(), now_ms),
                    title: output::truncate_back(&t.label, title_max),
                    url: output::style_url(&t.url).to_string(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Plain => {
            println!("ID | UPDATED | TITLE | URL");
            for t in &threads {
                println!(
                    "{} | {} | {} | {}",
                    t.item.id,
                    t.item.update_time.as_deref().unwrap_or(""),
                    t.label,
                    t.url
                );
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&threads, format)?,
    }
    Ok(())
}

fn relative_ms(ms: i64, now_ms: i64) -> String {
    if ms <= 0 {
        return String::new();
    }
    output::format_relative_seconds(ms / 1000, now_ms / 1000)
}
