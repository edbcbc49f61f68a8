use clap::Args;
use colored::Colorize;
use serde::Serialize;

use chatblocks::Platform;
use chatblocks::classify;
use chatblocks::normalize::normalize_url;
use chatblocks::output::{self, OutputFormat};
use chatblocks::platform::platform_for_url;

use crate::args::FormatArgs;

#[derive(Args)]
pub struct ClassifyArgs {
    /// URLs to classify
    #[arg(required = true)]
    urls: Vec<String>,

    /// Classify against this platform instead of detecting it from the host
    #[arg(short = 'p', long)]
    platform: Option<Platform>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Serialize)]
struct Classification {
    url: String,
    normalized: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<Platform>,
    /// Display name of the service, known or guessed from the host
    service: String,
    is_thread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_key: Option<String>,
    key: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    codex_task: bool,
}

fn classify_one(url: &str, platform: Option<Platform>) -> Classification {
    let platform = platform.or_else(|| platform_for_url(url));
    let is_thread = platform.is_some_and(|p| classify::is_thread_link(url, p));
    Classification {
        url: url.to_string(),
        normalized: normalize_url(url),
        platform,
        service: output::platform_label_from_url(url),
        is_thread,
        context_key: platform.and_then(|p| classify::thread_context_key(url, p)),
        key: classify::thread_record_key(url),
        codex_task: classify::is_codex_task_url(url),
    }
}

pub fn run(args: ClassifyArgs) -> Result<(), String> {
    let format = args.format.resolve();
    let results: Vec<Classification> = args
        .urls
        .iter()
        .map(|url| classify_one(url.trim(), args.platform))
        .collect();

    match format {
        OutputFormat::Pretty => {
            for c in &results {
                let platform = c
                    .platform
                    .map(|p| p.label().to_string())
                    .unwrap_or_else(|| c.service.clone());
                let verdict = if c.is_thread {
                    "thread".green()
                } else {
                    "not a thread".dimmed()
                };
                println!("{} {} {}", output::style_url(&c.url), platform.bold(), verdict);
                if c.normalized != c.url {
                    println!("  {} {}", "normalized:".dimmed(), c.normalized);
                }
                if let Some(key) = &c.context_key {
                    println!("  {} {}", "context:".dimmed(), key);
                }
                if c.codex_task {
                    println!("  {}", "codex task (diffs available)".dimmed());
                }
            }
        }
        OutputFormat::Plain => {
            println!("URL | PLATFORM | THREAD | KEY | NORMALIZED");
            for c in &results {
                println!(
                    "{} | {} | {} | {} | {}",
                    c.url,
                    c.platform.map(|p| p.to_string()).unwrap_or_default(),
                    if c.is_thread { "yes" } else { "no" },
                    c.key,
                    c.normalized
                );
            }
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_structured(&results, format)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_one() {
        let c = classify_one("https://claude.ai/chat/abc?x=1", None);
        assert_eq!(c.platform, Some(Platform::Claude));
        assert!(c.is_thread);
        assert_eq!(c.normalized, "https://claude.ai/chat/abc");
        assert_eq!(c.context_key.as_deref(), Some("claude.ai:abc"));
        assert_eq!(c.service, "Claude");

        let c = classify_one("http://localhost:3000/c/42", None);
        assert_eq!(c.platform, None);
        assert_eq!(c.service, "Localhost");
        assert!(!c.is_thread);

        let c = classify_one("http://localhost:3000/c/42", Some(Platform::Openwebui));
        assert!(c.is_thread);

        let c = classify_one("https://chatgpt.com/codex/tasks/task_e_1", None);
        assert!(c.codex_task);
        assert!(c.is_thread);
    }
}
