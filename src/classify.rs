//! Thread-link classification.
//!
//! Each chat service switches to a thread-specific path once a message has been
//! sent; these predicates encode exactly that grammar per service. All of them
//! are total: anything that fails to parse is not a thread.

use std::sync::LazyLock;

use md5::{Digest, Md5};
use regex::Regex;
use url::Url;

use crate::normalize::normalize_url;
use crate::platform::Platform;

// ============================================================================
// ChatGPT
// ============================================================================

const CHATGPT_HOSTS: &[&str] = &[
    "chatgpt.com",
    "sora.com",
    "sora.chatgpt.com",
    "operator.chatgpt.com",
];

static CHATGPT_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^/c/[a-f0-9-]+/?$",
        r"(?i)^/g/[^/]+/c/[a-f0-9-]+/?$",
        r"(?i)^/codex/tasks/[a-z0-9\-_]+/?$",
        // Sora drafts and published posts
        r"(?i)^/d/[a-z0-9\-_]+/?$",
        r"(?i)^/p/s_[a-f0-9]+/?$",
        // Legacy Sora task pages
        r"(?i)^/t/[a-f0-9-]+/?$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CODEX_TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/codex/tasks/[a-z0-9\-_]+/?$").unwrap());

pub fn is_chatgpt_thread_link(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    if !host_in(&parsed, CHATGPT_HOSTS) {
        return false;
    }
    let path = parsed.path();
    CHATGPT_PATHS.iter().any(|re| re.is_match(path))
}

/// True for Codex task pages, which carry a diff view.
pub fn is_codex_task_url(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    host_in(&parsed, &["chatgpt.com", "chat.openai.com"]) && CODEX_TASK_RE.is_match(parsed.path())
}

// ============================================================================
// Prefix-based services
// ============================================================================

pub fn is_claude_thread_link(url: &str) -> bool {
    url.starts_with("https://claude.ai/chat/") && !url.ends_with("/new")
}

pub fn is_gemini_thread_link(url: &str) -> bool {
    has_nonempty_rest(url, "https://gemini.google.com/app/")
}

pub fn is_deepseek_thread_link(url: &str) -> bool {
    has_nonempty_rest(url, "https://chat.deepseek.com/a/chat/s/")
}

pub fn is_aistudio_thread_link(url: &str) -> bool {
    url.starts_with("https://aistudio.google.com/prompts/") && !url.ends_with("/new_chat")
}

pub fn is_perplexity_thread_link(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    parsed.host_str() == Some("www.perplexity.ai")
        && parsed.path().starts_with("/search/")
        && !parsed.path().ends_with("/new")
}

fn has_nonempty_rest(url: &str, prefix: &str) -> bool {
    url.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty())
}

// ============================================================================
// Segment-based services
// ============================================================================

/// `/c/<id>` or `/chat/<id>` on grok.com.
pub fn is_grok_thread_link(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    if !host_in(&parsed, &["grok.com", "www.grok.com"]) {
        return false;
    }
    let segments = lower_segments(&parsed);
    match segments.as_slice() {
        [prefix, _id, ..] => prefix == "c" || prefix == "chat",
        _ => false,
    }
}

/// A `chat` segment, an optional two-letter locale, then an id.
pub fn is_kimi_thread_link(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    if !host_in(&parsed, &["kimi.com", "www.kimi.com"]) {
        return false;
    }
    let segments = path_segments(&parsed);
    let Some(chat_at) = segments.iter().position(|s| s.eq_ignore_ascii_case("chat")) else {
        return false;
    };
    let mut id_at = chat_at + 1;
    match segments.get(id_at) {
        None => return false,
        Some(next) if next.len() == 2 => id_at += 1,
        Some(_) => {}
    }
    segments.get(id_at).is_some_and(|id| !id.is_empty())
}

/// Self-hosted, possibly under a subpath: any `/c/<id>` pair except `/c/new`.
pub fn is_openwebui_thread_link(url: &str) -> bool {
    let Some(parsed) = parse_web_url(url) else {
        return false;
    };
    let segments = lower_segments(&parsed);
    let Some(c_at) = segments.iter().position(|s| s == "c") else {
        return false;
    };
    match segments.get(c_at + 1) {
        Some(id) => id != "new",
        None => false,
    }
}

// ============================================================================
// Dispatch and keys
// ============================================================================

pub fn is_thread_link(url: &str, platform: Platform) -> bool {
    (platform.descriptor().is_thread_link)(url)
}

/// `host:last_segment` of a thread URL, used to key per-thread context.
pub fn thread_context_key(url: &str, platform: Platform) -> Option<String> {
    if !is_thread_link(url, platform) {
        return None;
    }
    let parsed = Url::parse(&normalize_url(url)).ok()?;
    let host = parsed.host_str()?.to_string();
    let last = path_segments(&parsed).pop()?;
    Some(format!("{}:{}", host, last))
}

/// Stable record key for a thread URL.
pub fn thread_record_key(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(normalize_url(url).as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("ext-chat-{}", hex)
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_web_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(parsed)
}

fn host_in(url: &Url, hosts: &[&str]) -> bool {
    url.host_str().is_some_and(|h| hosts.contains(&h))
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn lower_segments(url: &Url) -> Vec<String> {
    path_segments(url)
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect()
}
