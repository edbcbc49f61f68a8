//! Output formatting utilities with TTY auto-detection and semantic styling.
//!
//! Also home to the human-facing strings the session produces: dropdown labels
//! and relative timestamps.

use std::io::IsTerminal;
use std::sync::LazyLock;

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use regex::Regex;
use url::Url;

/// Output format for commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-optimized: colors, tables, relative dates
    #[default]
    Pretty,
    /// LLM-optimized: no colors, pipe-delimited, full URLs
    Plain,
    /// Machine-readable JSON
    Json,
    /// Machine-readable YAML
    Yaml,
}

impl OutputFormat {
    /// Resolve the output format, applying TTY auto-detection.
    ///
    /// If format is Pretty but stdout is not a TTY, returns Plain.
    pub fn resolve(self) -> Self {
        match self {
            OutputFormat::Pretty if !std::io::stdout().is_terminal() => OutputFormat::Plain,
            other => other,
        }
    }
}

/// Print a serializable value as JSON or YAML.
pub fn print_structured<T: serde::Serialize>(value: &T, format: OutputFormat) -> Result<(), String> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string())?,
        _ => serde_json::to_string_pretty(value).map_err(|e| e.to_string())?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

// ============================================================================
// Semantic Styling
// ============================================================================

/// Thread state colors.
/// - Green: active thread
/// - Yellow: a thread the block does not know about yet
/// - Dimmed: done, or nothing to track
pub fn style_state(state: &str) -> ColoredString {
    match state {
        "active" => state.green(),
        "unsaved" => state.yellow(),
        "done" | "no_link" | "not_thread" => state.dimmed(),
        _ => state.normal(),
    }
}

pub fn style_url(url: &str) -> ColoredString {
    url.underline()
}

// ============================================================================
// Terminal utilities
// ============================================================================

/// Get terminal width, defaulting to 80 if unavailable.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Truncate a string from the back, showing "prefix…".
pub fn truncate_back(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else if max_chars <= 1 {
        "…".to_string()
    } else {
        let truncated: String = s.chars().take(max_chars - 1).collect();
        format!("{}…", truncated)
    }
}

// ============================================================================
// Relative time
// ============================================================================

/// "just now", "42s ago", "5m ago", ... for a unix timestamp.
///
/// Empty for missing or non-positive timestamps.
pub fn format_relative_seconds(timestamp: i64, now: i64) -> String {
    if timestamp <= 0 {
        return String::new();
    }
    let diff = now - timestamp;
    if diff < 0 {
        return "in the future".to_string();
    }
    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if diff < 10 {
        "just now".to_string()
    } else if diff < 60 {
        format!("{}s ago", diff)
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 30 {
        format!("{}d ago", days)
    } else if days / 30 < 12 {
        format!("{}mo ago", days / 30)
    } else {
        format!("{}y ago", days / 365)
    }
}

// ============================================================================
// Dropdown labels
// ============================================================================

const HOST_LABELS: &[(&str, &str)] = &[
    ("chatgpt.com", "ChatGPT"),
    ("chat.openai.com", "ChatGPT"),
    ("claude.ai", "Claude"),
    ("gemini.google.com", "Gemini"),
    ("aistudio.google.com", "AI Studio"),
    ("chat.deepseek.com", "DeepSeek"),
    ("perplexity.ai", "Perplexity"),
    ("www.perplexity.ai", "Perplexity"),
    ("grok.com", "Grok"),
    ("www.grok.com", "Grok"),
    ("kimi.com", "Kimi"),
    ("www.kimi.com", "Kimi"),
    ("sora.com", "Sora"),
    ("sora.chatgpt.com", "Sora"),
];

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Label for a well-known chat host.
pub fn known_host_label(url: &str) -> Option<&'static str> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    HOST_LABELS
        .iter()
        .find(|(h, _)| *h == host)
        .map(|(_, label)| *label)
}

fn prettify_hostname(host: &str) -> String {
    let base = host.split('.').find(|p| !p.is_empty()).unwrap_or(host);
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Link".to_string(),
    }
}

/// Known host label, else the capitalised first host label, else "Link".
pub fn platform_label_from_url(url: &str) -> String {
    if let Some(label) = known_host_label(url) {
        return label.to_string();
    }
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(prettify_hostname))
        .unwrap_or_else(|| "Link".to_string())
}

/// Shorten long ids: first 8, "...", then the last 4 (UUIDs) or 6 characters.
pub fn shorten_id_segment(segment: &str) -> String {
    let s = segment.trim();
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 14 {
        return s.to_string();
    }
    let tail_len = if UUID_RE.is_match(s) { 4 } else { 6 };
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{}...{}", head, tail)
}

fn last_path_segment(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path()
                .split('/')
                .filter(|s| !s.is_empty())
                .next_back()
                .map(String::from)
        })
        .unwrap_or_default()
}

/// `"<label> • <short id>"`, or just the label when the URL has no path.
pub fn format_dropdown_label(url: &str, label: &str) -> String {
    let short = shorten_id_segment(&last_path_segment(url));
    if short.is_empty() {
        label.to_string()
    } else {
        format!("{} • {}", label, short)
    }
}
