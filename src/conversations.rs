//! Conversation lists harvested from intercepted network traffic.
//!
//! An injected script logs every fetch/XHR response to the console behind the
//! `[SC_NET]` marker. Responses from the conversations endpoint carry an
//! `items` array that is merged into one de-duplicated, recency-sorted list.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::fuzzy;

pub const NET_LOG_MARKER: &str = "[SC_NET]";
pub const CONVERSATIONS_PATH: &str = "backend-api/conversations";
pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com";

/// Installs fetch and XHR hooks that log responses as `[SC_NET] <json>`.
/// Safe to run more than once per page.
pub const NETWORK_LOGGER_SCRIPT: &str = r#"(() => {
  if (window.__sc_net_installed) return { ok: true, already_installed: true };
  window.__sc_net_installed = true;
  const log = (entry) => {
    try { console.log('[SC_NET]', JSON.stringify(entry)); } catch (_) {}
  };
  const original_fetch = window.fetch;
  if (typeof original_fetch === 'function') {
    window.fetch = async (...args) => {
      const [input, init] = args;
      const url = typeof input === 'string' ? input : input?.url;
      const method = init?.method || 'GET';
      const res = await original_fetch(...args);
      res.clone().text()
        .then((body) => log({ kind: 'fetch', url, method, status: res.status, response_body: body }))
        .catch(() => {});
      return res;
    };
  }
  const original_open = XMLHttpRequest.prototype.open;
  const original_send = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.open = function (method, url, ...rest) {
    this.__sc_method = method;
    this.__sc_url = url;
    return original_open.call(this, method, url, ...rest);
  };
  XMLHttpRequest.prototype.send = function (body) {
    this.addEventListener('load', function () {
      log({ kind: 'xhr', url: this.__sc_url, method: this.__sc_method, status: this.status, response_body: this.responseText });
    });
    return original_send.call(this, body);
  };
  return { ok: true, installed: true };
})();"#;

// ============================================================================
// Types
// ============================================================================

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of the conversations endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gizmo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl ConversationItem {
    fn trimmed_id(&self) -> &str {
        self.id.trim()
    }

    fn trimmed_title(&self) -> &str {
        self.title.as_deref().unwrap_or("").trim()
    }

    fn title_lower(&self) -> String {
        self.title.as_deref().unwrap_or("").to_lowercase()
    }

    /// Milliseconds of `update_time`, else `create_time`, else 0.
    pub fn sort_key_ms(&self) -> i64 {
        let update = parse_time_ms(self.update_time.as_deref());
        if update != 0 {
            update
        } else {
            parse_time_ms(self.create_time.as_deref())
        }
    }
}

fn parse_time_ms(value: Option<&str>) -> i64 {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

/// A `[SC_NET]` console line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkLogEntry {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub response_body: Option<String>,
}

// ============================================================================
// Parsing
// ============================================================================

pub fn parse_console_message(message: &str) -> Option<NetworkLogEntry> {
    let json = message.strip_prefix(NET_LOG_MARKER)?.trim();
    match serde_json::from_str(json) {
        Ok(entry) => Some(entry),
        Err(err) => {
            debug!(%err, "unparsable network log entry");
            None
        }
    }
}

/// Conversation items from a conversations-list response, `None` for any
/// other request. Malformed bodies and items are skipped.
pub fn conversation_items(entry: &NetworkLogEntry) -> Option<Vec<ConversationItem>> {
    if !entry.url.contains(CONVERSATIONS_PATH) {
        return None;
    }
    let body = entry.response_body.as_deref().unwrap_or("");
    let value: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let items = match value.get("items") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };
    Some(items)
}

// ============================================================================
// Merge
// ============================================================================

fn newest_first(a: &ConversationItem, b: &ConversationItem) -> Ordering {
    b.sort_key_ms()
        .cmp(&a.sort_key_ms())
        .then_with(|| a.title_lower().cmp(&b.title_lower()))
}

/// De-duplicate by id, keeping the most recent copy (or the titled one on a
/// tie), sorted newest first and then by title.
pub fn merge(existing: &[ConversationItem], incoming: &[ConversationItem]) -> Vec<ConversationItem> {
    let mut merged: Vec<ConversationItem> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for item in existing.iter().chain(incoming) {
        let id = item.trimmed_id();
        if id.is_empty() {
            continue;
        }
        let Some(&at) = by_id.get(id) else {
            by_id.insert(id.to_string(), merged.len());
            merged.push(item.clone());
            continue;
        };

        let current = &merged[at];
        let (cur_key, next_key) = (current.sort_key_ms(), item.sort_key_ms());
        let replace = next_key > cur_key
            || (next_key == cur_key
                && current.trimmed_title().is_empty()
                && !item.trimmed_title().is_empty());
        if replace {
            merged[at] = item.clone();
        }
    }

    merged.sort_by(newest_first);
    merged
}

/// `{base}/g/{gizmo}/c/{id}` or `{base}/c/{id}`; empty when the id is missing.
pub fn build_thread_url(item: &ConversationItem, base_url: &str) -> String {
    let base = if base_url.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base_url.trim_end_matches('/')
    };
    let id = item.trimmed_id();
    if id.is_empty() {
        return String::new();
    }
    match item.gizmo_id.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(gizmo) => format!("{}/g/{}/c/{}", base, gizmo, id),
        None => format!("{}/c/{}", base, id),
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// First 8 and last 4 characters of long ids.
pub fn shorten_thread_id(id: &str) -> String {
    let id = id.trim();
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 14 {
        return id.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

pub fn suggestion_label(item: &ConversationItem) -> String {
    let title = item.trimmed_title();
    if !title.is_empty() {
        return title.to_string();
    }
    let short = shorten_thread_id(&item.id);
    if short.is_empty() {
        "Untitled".to_string()
    } else {
        format!("Untitled ({})", short)
    }
}

pub fn filter_suggestions<'a>(query: &str, items: &'a [ConversationItem]) -> Vec<&'a ConversationItem> {
    fuzzy::rank(query, items, suggestion_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: Option<&str>, update_time: Option<&str>) -> ConversationItem {
        ConversationItem {
            id: id.to_string(),
            title: title.map(String::from),
            update_time: update_time.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_keeps_newer_copy() {
        let existing = vec![item("a", Some("Old"), Some("2026-01-01T00:00:00Z"))];
        let incoming = vec![item("a", Some("New"), Some("2026-01-02T00:00:00Z"))];
        let merged = merge(&existing, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title.as_deref(), Some("New"));

        // an older copy never wins
        let merged = merge(&incoming, &existing);
        assert_eq!(merged[0].title.as_deref(), Some("New"));
    }

    #[test]
    fn test_merge_tie_prefers_title() {
        let t = Some("2026-01-01T00:00:00Z");
        let merged = merge(&[item("a", None, t)], &[item("a", Some("Named"), t)]);
        assert_eq!(merged[0].title.as_deref(), Some("Named"));

        let merged = merge(&[item("a", Some("First"), t)], &[item("a", Some("Second"), t)]);
        assert_eq!(merged[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn test_merge_sorts_newest_first_then_title() {
        let merged = merge(
            &[
                item("1", Some("beta"), Some("2026-01-01T00:00:00Z")),
                item("2", Some("Alpha"), Some("2026-01-01T00:00:00Z")),
                item("3", Some("zulu"), Some("2026-03-01T00:00:00Z")),
                item("4", Some("none"), None),
            ],
            &[],
        );
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1", "4"]);
    }

    #[test]
    fn test_merge_falls_back_to_create_time() {
        let mut created = item("b", Some("created"), None);
        created.create_time = Some("2026-02-01T00:00:00Z".into());
        let updated = item("a", Some("updated"), Some("2026-01-01T00:00:00Z"));
        let merged = merge(&[updated], &[created]);
        assert_eq!(merged[0].id, "b");
    }

    #[test]
    fn test_merge_is_idempotent_and_skips_blank_ids() {
        let a = vec![
            item("x", Some("X"), Some("2026-01-01T00:00:00Z")),
            item("  ", Some("blank"), None),
        ];
        let b = vec![
            item("y", Some("Y"), Some("2026-01-03T00:00:00Z")),
            item("x", Some("X2"), Some("2026-01-02T00:00:00Z")),
        ];
        let once = merge(&a, &b);
        assert_eq!(once.len(), 2);
        assert_eq!(merge(&once, &b), once);
        assert_eq!(merge(&b, &a), once);
    }

    #[test]
    fn test_build_thread_url() {
        let mut gpt = item("abc", None, None);
        assert_eq!(build_thread_url(&gpt, "https://chatgpt.com/"), "https://chatgpt.com/c/abc");
        gpt.gizmo_id = Some("g-123".into());
        assert_eq!(
            build_thread_url(&gpt, "https://chatgpt.com"),
            "https://chatgpt.com/g/g-123/c/abc"
        );
        assert_eq!(build_thread_url(&item(" ", None, None), "https://chatgpt.com"), "");
        assert_eq!(build_thread_url(&item("z", None, None), ""), "https://chatgpt.com/c/z");
    }

    #[test]
    fn test_parse_console_message() {
        let msg = r#"[SC_NET] {"kind":"fetch","url":"https://chatgpt.com/backend-api/conversations?offset=0","method":"GET","status":200,"response_body":"{\"items\":[{\"id\":\"697a\",\"title\":\"Hi\",\"gizmo_id\":null,\"pinned_time\":null}]}"}"#;
        let entry = parse_console_message(msg).unwrap();
        assert_eq!(entry.status, Some(200));
        let items = conversation_items(&entry).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "697a");
        assert_eq!(items[0].gizmo_id, None);

        assert!(parse_console_message("hello world").is_none());
        assert!(parse_console_message("[SC_NET] {not json").is_none());
    }

    #[test]
    fn test_conversation_items_other_urls_and_bad_bodies() {
        let other = NetworkLogEntry {
            url: "https://chatgpt.com/backend-api/me".into(),
            response_body: Some(r#"{"items":[{"id":"a"}]}"#.into()),
            ..Default::default()
        };
        assert_eq!(conversation_items(&other), None);

        let broken = NetworkLogEntry {
            url: "https://chatgpt.com/backend-api/conversations".into(),
            response_body: Some("<html>".into()),
            ..Default::default()
        };
        assert_eq!(conversation_items(&broken), Some(vec![]));
    }

    #[test]
    fn test_suggestion_label() {
        let cases = vec![
            (item("id", Some("  Rust tips "), None), "Rust tips"),
            (
                item("697a20f3-d2d8-8332-a096-a41f8d6585dd", None, None),
                "Untitled (697a20f3...85dd)",
            ),
            (item("short-id", Some(""), None), "Untitled (short-id)"),
            (item("", None, None), "Untitled"),
        ];
        for (it, want) in cases {
            let got = suggestion_label(&it);
            assert_eq!(got, want, "suggestion_label({:?}) = {:?}, want {:?}", it, got, want);
        }
    }

    #[test]
    fn test_filter_suggestions() {
        let items = vec![
            item("1", Some("Intercepting Network Requests"), None),
            item("2", Some("Rust lifetimes"), None),
        ];
        let got = filter_suggestions("rust", &items);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "2");
        assert_eq!(filter_suggestions("", &items).len(), 2);
    }
}
