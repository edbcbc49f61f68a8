//! The thread-line protocol stored inside a fenced block.
//!
//! ```text
//! chat-active:: <unix_seconds> <url>
//! chat-done:: <unix_seconds> <url>
//! ```
//!
//! Any other line holding a raw `http(s)://` URL is legacy input and gets
//! upgraded to `chat-active::` by [`prefix_missing_lines`].
//!
//! Line-range arguments (`start`, `end`) are the fence lines themselves; only
//! the lines strictly between them are inspected or rewritten.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::normalize::normalize_url;

pub const ACTIVE_PREFIX: &str = "chat-active:: ";
pub const DONE_PREFIX: &str = "chat-done:: ";

static RAW_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static MARKDOWN_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((https?://[^)\s]+)\)").unwrap());
static TRAILING_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[)\].,>;:"']+$"#).unwrap());
static LEADING_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[<(]+").unwrap());

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Done,
}

impl LinkStatus {
    pub fn prefix(self) -> &'static str {
        match self {
            LinkStatus::Active => ACTIVE_PREFIX,
            LinkStatus::Done => DONE_PREFIX,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Active => write!(f, "active"),
            LinkStatus::Done => write!(f, "done"),
        }
    }
}

/// One link found in block text. The line itself is the only durable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadLinkRecord {
    pub url: String,
    pub done: bool,
}

/// A parsed line of block text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadLine {
    Directive {
        status: LinkStatus,
        timestamp: Option<i64>,
        url: String,
    },
    Bare {
        urls: Vec<String>,
    },
}

impl ThreadLine {
    /// Parse a single line. Returns `None` for lines that carry no URL.
    ///
    /// A directive line is never re-scanned for additional URLs; its URL is
    /// the first one found after the prefix.
    pub fn parse(line: &str) -> Option<ThreadLine> {
        let trimmed = line.trim();
        if let Some((status, rest)) = split_directive(trimmed) {
            let timestamp = rest
                .split_whitespace()
                .next()
                .and_then(|t| t.parse::<i64>().ok());
            let url = extract_urls_from_line(rest).into_iter().next()?;
            return Some(ThreadLine::Directive {
                status,
                timestamp,
                url,
            });
        }

        let urls = extract_urls_from_line(line);
        if urls.is_empty() {
            None
        } else {
            Some(ThreadLine::Bare { urls })
        }
    }

    pub fn records(&self) -> Vec<ThreadLinkRecord> {
        match self {
            ThreadLine::Directive { status, url, .. } => vec![ThreadLinkRecord {
                url: url.clone(),
                done: *status == LinkStatus::Done,
            }],
            ThreadLine::Bare { urls } => urls
                .iter()
                .map(|url| ThreadLinkRecord {
                    url: url.clone(),
                    done: false,
                })
                .collect(),
        }
    }
}

impl fmt::Display for ThreadLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadLine::Directive {
                status,
                timestamp,
                url,
            } => match timestamp {
                Some(ts) => write!(f, "{}", format_directive(*status, *ts, url)),
                None => write!(f, "{}{}", status.prefix(), url),
            },
            ThreadLine::Bare { urls } => write!(f, "{}", urls.join(" ")),
        }
    }
}

pub fn format_directive(status: LinkStatus, timestamp: i64, url: &str) -> String {
    format!("{}{} {}", status.prefix(), timestamp, url)
}

fn split_directive(trimmed: &str) -> Option<(LinkStatus, &str)> {
    if let Some(rest) = trimmed.strip_prefix(DONE_PREFIX) {
        Some((LinkStatus::Done, rest))
    } else {
        trimmed
            .strip_prefix(ACTIVE_PREFIX)
            .map(|rest| (LinkStatus::Active, rest))
    }
}

fn is_directive(line: &str) -> bool {
    split_directive(line.trim()).is_some()
}

// ============================================================================
// URL extraction
// ============================================================================

fn strip_wrapping_chars(url: &str) -> &str {
    let end = TRAILING_PUNCT_RE.find(url).map_or(url.len(), |m| m.start());
    let url = &url[..end];
    let start = LEADING_PUNCT_RE.find(url).map_or(0, |m| m.end());
    &url[start..]
}

/// Every URL on a line: markdown `(url)` targets first, then raw matches with
/// wrapping punctuation stripped. De-duplicated, first occurrence wins.
pub fn extract_urls_from_line(line: &str) -> Vec<String> {
    let markdown = MARKDOWN_URL_RE
        .captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());
    let raw = RAW_URL_RE
        .find_iter(line)
        .map(|m| strip_wrapping_chars(m.as_str()));

    let mut urls: Vec<String> = Vec::new();
    for url in markdown.chain(raw) {
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Whether any URL on `line` refers to `target`, tolerating query strings and
/// trailing slashes on either side.
pub fn line_refers_to(line: &str, target: &str) -> bool {
    if line.is_empty() || target.is_empty() {
        return false;
    }
    let normalized_target = normalize_url(target);
    extract_urls_from_line(line).iter().any(|candidate| {
        candidate == target
            || *candidate == normalized_target
            || normalize_url(candidate) == normalized_target
    })
}

// ============================================================================
// Whole-source parsing
// ============================================================================

/// All links in document order.
pub fn extract_links(source: &str) -> Vec<ThreadLinkRecord> {
    source
        .split('\n')
        .filter_map(ThreadLine::parse)
        .flat_map(|line| line.records())
        .collect()
}

/// Status and timestamp recorded for `url`, if a directive for it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadMeta {
    pub done: bool,
    pub timestamp: Option<i64>,
}

pub fn thread_meta(source: &str, url: &str) -> Option<ThreadMeta> {
    if url.is_empty() {
        return None;
    }
    let target = normalize_url(url);
    source
        .split('\n')
        .filter_map(ThreadLine::parse)
        .find_map(|line| match line {
            ThreadLine::Directive {
                status,
                timestamp,
                url,
            } if normalize_url(&url) == target => Some(ThreadMeta {
                done: status == LinkStatus::Done,
                timestamp,
            }),
            _ => None,
        })
}

/// First not-done link, else the home URL when set, else the fallback.
pub fn resolve_initial_link(
    links: &[ThreadLinkRecord],
    home_url: Option<&str>,
    fallback_url: &str,
) -> String {
    links
        .iter()
        .find(|l| !l.done && !l.url.is_empty())
        .map(|l| l.url.clone())
        .or_else(|| home_url.filter(|h| !h.is_empty()).map(String::from))
        .unwrap_or_else(|| fallback_url.to_string())
}

// ============================================================================
// Line mutations
// ============================================================================

fn inner(lines: &[String], start: usize, end: usize) -> Range<usize> {
    let lo = start.saturating_add(1).min(lines.len());
    let hi = end.min(lines.len()).max(lo);
    lo..hi
}

/// Upgrade bare-link lines to `chat-active::` directives. Returns whether any
/// line changed.
pub fn prefix_missing_lines(lines: &mut [String], start: usize, end: usize, now: i64) -> bool {
    let mut changed = false;
    for i in inner(lines, start, end) {
        let line = &lines[i];
        if is_directive(line) || !RAW_URL_RE.is_match(line) {
            continue;
        }
        let upgraded = format!("{}{} {}", ACTIVE_PREFIX, now, line.trim());
        lines[i] = upgraded;
        changed = true;
    }
    changed
}

fn find_directive(
    lines: &[String],
    range: Range<usize>,
    status: LinkStatus,
    target: &str,
) -> Option<usize> {
    range.into_iter().find(|&i| {
        let trimmed = lines[i].trim();
        trimmed.starts_with(status.prefix()) && line_refers_to(trimmed, target)
    })
}

fn swap_status(line: &str, from: LinkStatus, to: LinkStatus) -> String {
    line.replacen(from.prefix(), to.prefix(), 1)
}

/// Flip the first matching active line to done, keeping its timestamp and URL.
pub fn mark_done(lines: &mut [String], start: usize, end: usize, target: &str) -> Option<usize> {
    let range = inner(lines, start, end);
    let at = find_directive(lines, range, LinkStatus::Active, target)?;
    lines[at] = swap_status(&lines[at], LinkStatus::Active, LinkStatus::Done);
    Some(at)
}

/// Flip the first matching done line back to active.
pub fn mark_active(lines: &mut [String], start: usize, end: usize, target: &str) -> Option<usize> {
    let range = inner(lines, start, end);
    let at = find_directive(lines, range, LinkStatus::Done, target)?;
    lines[at] = swap_status(&lines[at], LinkStatus::Done, LinkStatus::Active);
    Some(at)
}

/// URL of the first active directive after `after`, before `end`.
pub fn find_next_undone(lines: &[String], start: usize, end: usize, after: usize) -> Option<String> {
    let range = inner(lines, start, end);
    let from = after.saturating_add(1).max(range.start);
    (from..range.end).find_map(|i| match ThreadLine::parse(&lines[i]) {
        Some(ThreadLine::Directive {
            status: LinkStatus::Active,
            url,
            ..
        }) => Some(url),
        _ => None,
    })
}

/// Insert a fresh active directive right after the fence-open line.
pub fn insert_active_line(lines: &mut Vec<String>, fence_start: usize, url: &str, now: i64) {
    let at = fence_start.saturating_add(1).min(lines.len());
    lines.insert(at, format_directive(LinkStatus::Active, now, url));
}

/// Any line in the block mentions `url`.
pub fn is_saved(lines: &[String], start: usize, end: usize, url: &str) -> bool {
    inner(lines, start, end).any(|i| line_refers_to(&lines[i], url))
}

/// A done directive in the block refers to `url`.
pub fn is_done(lines: &[String], start: usize, end: usize, url: &str) -> bool {
    let range = inner(lines, start, end);
    find_directive(lines, range, LinkStatus::Done, url).is_some()
}
