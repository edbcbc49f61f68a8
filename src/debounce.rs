//! Collapsing bursts of navigation events into settled URLs.
//!
//! Every new event cancels the pending one and restarts the quiet period; only
//! the last URL of a burst is reported. [`Debouncer`] is the incremental form
//! driven by a clock, [`settle`] the batch form over a recorded stream.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    #[default]
    Navigated,
    NavigatedInPage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub url: String,
    pub at_ms: u64,
    #[serde(default)]
    pub kind: NavigationKind,
}

impl NavigationEvent {
    pub fn new(url: impl Into<String>, at_ms: u64) -> Self {
        Self {
            url: url.into(),
            at_ms,
            kind: NavigationKind::Navigated,
        }
    }
}

/// A URL that stayed put for a full debounce window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettledUrl {
    pub url: String,
    /// When the quiet period elapsed
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    pending: Option<NavigationEvent>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Replace any pending event. Events without a URL are dropped.
    pub fn push(&mut self, event: NavigationEvent) {
        if event.url.is_empty() {
            return;
        }
        if let Some(prev) = &self.pending {
            trace!(superseded = %prev.url, by = %event.url, "navigation superseded");
        }
        self.pending = Some(event);
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|e| e.at_ms.saturating_add(self.window_ms))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Emit the pending URL once its quiet period has elapsed at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> Option<SettledUrl> {
        let deadline = self.deadline_ms()?;
        if now_ms < deadline {
            return None;
        }
        self.flush()
    }

    /// Emit the pending URL immediately, as if its timer had fired.
    pub fn flush(&mut self) -> Option<SettledUrl> {
        let deadline = self.deadline_ms()?;
        self.pending.take().map(|e| SettledUrl {
            url: e.url,
            at_ms: deadline,
        })
    }
}

/// Batch debounce over a time-ordered event stream.
pub fn settle(events: &[NavigationEvent], window: Duration) -> Vec<SettledUrl> {
    let mut debouncer = Debouncer::new(window);
    let mut settled = Vec::new();
    for event in events {
        settled.extend(debouncer.poll(event.at_ms));
        debouncer.push(event.clone());
    }
    settled.extend(debouncer.flush());
    settled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(url: &str, at_ms: u64) -> NavigationEvent {
        NavigationEvent::new(url, at_ms)
    }

    fn urls(settled: &[SettledUrl]) -> Vec<&str> {
        settled.iter().map(|s| s.url.as_str()).collect()
    }

    #[test]
    fn test_burst_collapses_to_last() {
        let events = vec![ev("https://a/1", 0), ev("https://a/2", 100), ev("https://a/3", 250)];
        let got = settle(&events, Duration::from_millis(300));
        assert_eq!(
            got,
            vec![SettledUrl {
                url: "https://a/3".into(),
                at_ms: 550
            }]
        );
    }

    #[test]
    fn test_quiet_gaps_split_bursts() {
        let events = vec![
            ev("https://a/1", 0),
            ev("https://a/2", 400),
            ev("https://a/3", 500),
            ev("https://a/4", 2000),
        ];
        let got = settle(&events, Duration::from_millis(300));
        assert_eq!(urls(&got), vec!["https://a/1", "https://a/3", "https://a/4"]);
    }

    #[test]
    fn test_slow_window() {
        let events = vec![ev("https://a/1", 0), ev("https://a/2", 1500)];
        let got = settle(&events, Duration::from_millis(2000));
        assert_eq!(urls(&got), vec!["https://a/2"]);
    }

    #[test]
    fn test_empty_urls_dropped() {
        let events = vec![ev("https://a/1", 0), ev("", 100)];
        let got = settle(&events, Duration::from_millis(300));
        assert_eq!(urls(&got), vec!["https://a/1"]);
        assert!(settle(&[], Duration::from_millis(300)).is_empty());
    }

    #[test]
    fn test_poll_waits_for_window() {
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.push(ev("https://a/1", 1000));
        assert_eq!(d.deadline_ms(), Some(1300));
        assert_eq!(d.poll(1299), None);
        assert!(d.is_pending());
        let got = d.poll(1300).unwrap();
        assert_eq!(got.url, "https://a/1");
        assert!(!d.is_pending());
        assert_eq!(d.poll(5000), None);
    }

    #[test]
    fn test_push_restarts_timer() {
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.push(ev("https://a/1", 0));
        d.push(ev("https://a/2", 200));
        assert_eq!(d.poll(300), None);
        assert_eq!(d.poll(500).map(|s| s.url), Some("https://a/2".to_string()));
    }

    #[test]
    fn test_event_kind_defaults_when_missing() {
        let parsed: NavigationEvent =
            serde_json::from_str(r#"{"url":"https://a/1","at_ms":5}"#).unwrap();
        assert_eq!(parsed.kind, NavigationKind::Navigated);
        let parsed: NavigationEvent =
            serde_json::from_str(r#"{"url":"https://a/1","at_ms":5,"kind":"navigated_in_page"}"#)
                .unwrap();
        assert_eq!(parsed.kind, NavigationKind::NavigatedInPage);
    }
}
