//! The per-block thread lifecycle.
//!
//! A [`ThreadSession`] owns one rendered block: it tracks the URL shown in the
//! embedded browser, auto-saves new thread links into the block, and flips
//! links between active and done. The block text in the document is the only
//! durable state; every mutation is a fresh read, a re-resolution of the block
//! boundaries, and a single write.
//!
//! Collaborator failures never propagate. They are logged, recorded as a
//! one-line notice (see [`ThreadSession::take_notices`]) and the in-memory
//! state is left as it was.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::classify;
use crate::codex;
use crate::codec::{self, ThreadLinkRecord};
use crate::conversations::{self, ConversationItem};
use crate::debounce::{Debouncer, NavigationEvent};
use crate::document::Document;
use crate::error::ChatblockError;
use crate::fence::{self, CodeblockRegion};
use crate::normalize::{normalize_url, same_url};
use crate::output;
use crate::platform::{Platform, PlatformDescriptor};

/// Unix seconds.
pub type Clock = fn() -> i64;

pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Options and reported state
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Where the block was when the session was created; re-resolved on every read
    pub region: CodeblockRegion,
    /// Overrides the platform's debounce window
    pub debounce: Option<Duration>,
    /// Overrides the platform's "New chat" target
    pub fallback_url: Option<String>,
    /// Start page used when no unfinished thread exists
    pub home_url: Option<String>,
    /// Base for thread URLs built from detected conversations
    pub base_url: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            region: CodeblockRegion::new(0, 0),
            debounce: None,
            fallback_url: None,
            home_url: None,
            base_url: conversations::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    NoLink,
    NotThread,
    Unsaved,
    Active,
    Done,
}

impl ThreadState {
    pub fn label(self) -> &'static str {
        match self {
            ThreadState::NoLink => "No link",
            ThreadState::NotThread => "Not a thread",
            ThreadState::Unsaved => "Unsaved",
            ThreadState::Active => "Active",
            ThreadState::Done => "Done",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ThreadState::NoLink => "no_link",
            ThreadState::NotThread => "not_thread",
            ThreadState::Unsaved => "unsaved",
            ThreadState::Active => "active",
            ThreadState::Done => "done",
        }
    }
}

/// What the status chip and the mark done/active button should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadStatus {
    pub url: String,
    pub state: ThreadState,
    pub timestamp: Option<i64>,
    pub label: String,
    pub status_text: String,
    pub can_mark_done: bool,
    pub can_mark_active: bool,
    /// Codex task page with a working "Load diffs" helper
    pub can_load_diffs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownOption {
    pub label: String,
    pub url: String,
    pub selected: bool,
}

/// Result of one settled navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "url", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// Embedded frame, not a page change
    Ignored,
    /// Same URL as the last one seen, after normalization
    Unchanged,
    NotThread,
    AlreadySaved,
    Saved(String),
    /// The document could not be updated; see notices
    SaveFailed,
}

// ============================================================================
// Session
// ============================================================================

pub struct ThreadSession<D, B> {
    descriptor: &'static PlatformDescriptor,
    document: D,
    browser: B,
    region: CodeblockRegion,
    source: String,
    links: Vec<ThreadLinkRecord>,
    initial_link: String,
    current_url: String,
    last_detected_url: String,
    fallback_url: String,
    home_url: Option<String>,
    base_url: String,
    debouncer: Debouncer,
    detected: Vec<ConversationItem>,
    detection_enabled: bool,
    diffs_enabled: bool,
    notices: Vec<String>,
    clock: Clock,
}

impl<D: Document, B: Browser> ThreadSession<D, B> {
    pub fn new(platform: Platform, document: D, browser: B, options: SessionOptions) -> Self {
        let descriptor = platform.descriptor();
        let window = options.debounce.unwrap_or(descriptor.debounce);
        let home_url = options
            .home_url
            .filter(|h| !h.is_empty())
            .or_else(|| descriptor.home_url.map(String::from));
        Self {
            descriptor,
            document,
            browser,
            region: options.region,
            source: String::new(),
            links: Vec::new(),
            initial_link: String::new(),
            current_url: String::new(),
            last_detected_url: String::new(),
            fallback_url: options
                .fallback_url
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| descriptor.fallback_url.to_string()),
            home_url,
            base_url: options.base_url,
            debouncer: Debouncer::new(window),
            detected: Vec::new(),
            detection_enabled: true,
            diffs_enabled: true,
            notices: Vec::new(),
            clock: system_clock,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn platform(&self) -> Platform {
        self.descriptor.platform
    }

    pub fn region(&self) -> CodeblockRegion {
        self.region
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn links(&self) -> &[ThreadLinkRecord] {
        &self.links
    }

    pub fn initial_link(&self) -> &str {
        &self.initial_link
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn last_detected_url(&self) -> &str {
        &self.last_detected_url
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn into_parts(self) -> (D, B) {
        (self.document, self.browser)
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    pub fn diffs_enabled(&self) -> bool {
        self.diffs_enabled
    }

    pub fn detected_threads(&self) -> &[ConversationItem] {
        &self.detected
    }

    /// Drain the user-facing notices collected since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// `host:id` key for the thread on screen, if it is one.
    pub fn context_key(&self) -> Option<String> {
        classify::thread_context_key(&self.current_url, self.platform())
    }

    fn is_thread_link(&self, url: &str) -> bool {
        (self.descriptor.is_thread_link)(url)
    }

    fn initial_fallback(&self) -> &str {
        self.home_url.as_deref().unwrap_or(&self.fallback_url)
    }

    // ------------------------------------------------------------------------
    // Document plumbing
    // ------------------------------------------------------------------------

    fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(platform = %self.platform(), "{}", message);
        self.notices.push(message);
    }

    fn fail(&mut self, action: &str, err: &ChatblockError) {
        warn!(
            platform = %self.platform(),
            document = %self.document.describe(),
            %err,
            "could not {}",
            action
        );
        self.notices.push(format!("Could not {}: {}", action, err));
    }

    /// Take in freshly read document text.
    fn adopt(&mut self, text: &str) {
        self.region = fence::find_boundaries(text, self.descriptor.fence_tag, self.region);
        self.source = fence::block_source(text, self.region);
        self.links = codec::extract_links(&self.source);
    }

    /// Re-read the document. On failure the stale state is kept.
    pub fn refresh(&mut self) -> bool {
        match self.document.read() {
            Ok(text) => {
                self.adopt(&text);
                true
            }
            Err(err) => {
                self.fail("read the document", &err);
                false
            }
        }
    }

    /// Read, resolve the block, let `edit` mutate its lines, and write back
    /// when it reports a change. `None` when the block could not be edited.
    fn edit_block<R>(
        &mut self,
        action: &str,
        edit: impl FnOnce(&mut Vec<String>, CodeblockRegion) -> (R, bool),
    ) -> Option<R> {
        let text = match self.document.read() {
            Ok(text) => text,
            Err(err) => {
                self.fail(action, &err);
                return None;
            }
        };

        let region = fence::find_boundaries(&text, self.descriptor.fence_tag, self.region);
        if !region.is_valid() {
            let err = ChatblockError::BlockNotFound(self.descriptor.fence_tag.to_string());
            self.fail(action, &err);
            return None;
        }

        let mut lines: Vec<String> = text.split('\n').map(String::from).collect();
        let (result, changed) = edit(&mut lines, region);
        if !changed {
            self.adopt(&text);
            return Some(result);
        }

        let updated = lines.join("\n");
        if let Err(err) = self.document.modify(&updated) {
            self.fail(action, &err);
            return None;
        }
        self.adopt(&updated);
        Some(result)
    }

    fn navigate(&mut self, url: &str) {
        self.current_url = url.to_string();
        if let Err(err) = self.browser.navigate(url) {
            self.fail("navigate", &err);
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Upgrade bare links, parse the block, and open the first unfinished
    /// thread (or the start page).
    pub fn build(&mut self) {
        let now = (self.clock)();
        let upgraded = self.edit_block("prefix bare links", |lines, region| {
            let changed = codec::prefix_missing_lines(lines, region.start, region.end, now);
            (changed, changed)
        });
        if upgraded == Some(true) {
            debug!(platform = %self.platform(), "upgraded bare links");
        }

        self.initial_link =
            codec::resolve_initial_link(&self.links, self.home_url.as_deref(), &self.fallback_url);
        self.last_detected_url = self.initial_link.clone();
        let initial = self.initial_link.clone();
        self.navigate(&initial);
    }

    /// React to a settled URL from the embedded browser.
    pub fn handle_navigation(&mut self, url: &str) -> NavigationOutcome {
        if self.descriptor.is_ignored_url(url) {
            debug!(url, "ignoring embedded frame navigation");
            return NavigationOutcome::Ignored;
        }
        if same_url(url, &self.last_detected_url) {
            return NavigationOutcome::Unchanged;
        }

        self.last_detected_url = url.to_string();
        self.current_url = url.to_string();

        if !self.is_thread_link(url) {
            debug!(url, "not a thread link");
            return NavigationOutcome::NotThread;
        }

        let link = normalize_url(url);
        let now = (self.clock)();
        let saved = self.edit_block("save thread link", |lines, region| {
            if codec::is_saved(lines, region.start, region.end, &link) {
                (false, false)
            } else {
                codec::insert_active_line(lines, region.start, &link, now);
                (true, true)
            }
        });

        match saved {
            Some(true) => {
                let label = self.descriptor.label;
                self.notify(format!("Auto-saved new {} thread link.", label));
                NavigationOutcome::Saved(link)
            }
            Some(false) => NavigationOutcome::AlreadySaved,
            None => NavigationOutcome::SaveFailed,
        }
    }

    /// Queue a raw navigation event; it is handled once it settles.
    pub fn push_event(&mut self, event: NavigationEvent) {
        self.debouncer.push(event);
    }

    /// Advance the debounce clock, handling a URL that settled by `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Option<NavigationOutcome> {
        let settled = self.debouncer.poll(now_ms)?;
        Some(self.handle_navigation(&settled.url))
    }

    /// Handle the pending URL without waiting for its quiet period.
    pub fn flush_pending(&mut self) -> Option<NavigationOutcome> {
        let settled = self.debouncer.flush()?;
        Some(self.handle_navigation(&settled.url))
    }

    /// Mark the thread on screen as done and move on to the next unfinished
    /// thread below it, or to the "New chat" page. Returns the new URL, or
    /// `None` when nothing changed.
    pub fn mark_done(&mut self) -> Option<String> {
        if !self.status().can_mark_done {
            return None;
        }
        let target = normalize_url(&self.current_url);
        let next = self.edit_block("mark thread done", |lines, region| {
            match codec::mark_done(lines, region.start, region.end, &target) {
                Some(at) => (
                    Some(codec::find_next_undone(lines, region.start, region.end, at)),
                    true,
                ),
                None => (None, false),
            }
        })??;

        self.notify("Marked thread as done.");
        let destination = next.unwrap_or_else(|| self.fallback_url.clone());
        self.navigate(&destination);
        Some(destination)
    }

    /// Undo a done mark. Does not navigate.
    pub fn mark_active(&mut self) -> bool {
        if !self.status().can_mark_active {
            return false;
        }
        let target = normalize_url(&self.current_url);
        let flipped = self.edit_block("mark thread active", |lines, region| {
            let at = codec::mark_active(lines, region.start, region.end, &target);
            (at.is_some(), at.is_some())
        });
        if flipped == Some(true) {
            self.notify("Marked thread as active.");
            true
        } else {
            false
        }
    }

    /// Jump to any URL, typically a dropdown entry.
    pub fn select(&mut self, url: &str) -> ThreadStatus {
        self.navigate(url);
        self.refresh();
        self.status()
    }

    /// Save `url` if the block does not mention it yet, then show it.
    /// Returns whether a line was written.
    pub fn add_thread(&mut self, url: &str) -> bool {
        let url = url.trim();
        if !url.starts_with("http") {
            self.notify("No valid link to add.");
            return false;
        }
        let link = normalize_url(url);
        let now = (self.clock)();
        let added = self.edit_block("add thread link", |lines, region| {
            if codec::is_saved(lines, region.start, region.end, &link) {
                (false, false)
            } else {
                codec::insert_active_line(lines, region.start, &link, now);
                (true, true)
            }
        });

        match added {
            Some(true) => self.notify("Added thread link."),
            Some(false) => self.notify("Thread already saved."),
            None => {}
        }
        self.last_detected_url = link.clone();
        self.navigate(&link);
        added == Some(true)
    }

    /// Add one of the detected conversations.
    pub fn add_detected_thread(&mut self, item: &ConversationItem) -> bool {
        let url = conversations::build_thread_url(item, &self.base_url);
        if url.is_empty() {
            return false;
        }
        self.add_thread(&url)
    }

    pub fn reload(&mut self) {
        match self.browser.reload() {
            Ok(()) => self.notify("Webview reloaded."),
            Err(err) => self.fail("reload", &err),
        }
    }

    // ------------------------------------------------------------------------
    // Thread detection
    // ------------------------------------------------------------------------

    /// Inject the network logger. A failure turns detection off for this
    /// session only.
    pub fn install_network_logger(&mut self) -> bool {
        match self.browser.execute_script(conversations::NETWORK_LOGGER_SCRIPT) {
            Ok(result) => {
                debug!(%result, "network logger installed");
                self.detection_enabled = true;
                true
            }
            Err(err) => {
                self.fail("install thread detection", &err);
                self.detection_enabled = false;
                false
            }
        }
    }

    /// Feed one console line from the browser. Returns how many new
    /// conversations became known.
    pub fn ingest_console_message(&mut self, message: &str) -> usize {
        if !self.detection_enabled {
            return 0;
        }
        let Some(entry) = conversations::parse_console_message(message) else {
            return 0;
        };
        let Some(items) = conversations::conversation_items(&entry) else {
            return 0;
        };
        let before = self.detected.len();
        self.detected = conversations::merge(&self.detected, &items);
        let added = self.detected.len() - before;
        debug!(request = %entry.url, received = items.len(), added, "conversation list merged");
        added
    }

    // ------------------------------------------------------------------------
    // Codex diffs
    // ------------------------------------------------------------------------

    fn can_load_diffs_for(&self, url: &str) -> bool {
        self.diffs_enabled && classify::is_codex_task_url(&normalize_url(url))
    }

    /// Expand the diff view of the Codex task on screen. Only offered on task
    /// pages; a failed injection turns the helper off for this session.
    pub fn load_codex_diffs(&mut self) -> bool {
        let url = if self.current_url.is_empty() {
            self.last_detected_url.clone()
        } else {
            self.current_url.clone()
        };
        if !self.can_load_diffs_for(&url) {
            debug!(%url, "load diffs not offered here");
            return false;
        }
        let expected = normalize_url(&url);
        match self.browser.execute_script(&codex::diff_loader_script(&expected)) {
            Ok(result) => {
                debug!(%result, url = %expected, "diff loader started");
                true
            }
            Err(err) => {
                self.fail("load diffs", &err);
                self.diffs_enabled = false;
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------------

    pub fn status(&self) -> ThreadStatus {
        self.status_for(&self.current_url)
    }

    pub fn status_for(&self, url: &str) -> ThreadStatus {
        let (state, timestamp, status_text) = if !url.starts_with("http") {
            (ThreadState::NoLink, None, "No valid link to save.".to_string())
        } else if !self.is_thread_link(url) {
            let text = format!("Not a recognized {} thread link.", self.descriptor.label);
            (ThreadState::NotThread, None, text)
        } else {
            match codec::thread_meta(&self.source, url) {
                None => (ThreadState::Unsaved, None, ThreadState::Unsaved.label().to_string()),
                Some(meta) => {
                    let state = if meta.done {
                        ThreadState::Done
                    } else {
                        ThreadState::Active
                    };
                    let rel = meta
                        .timestamp
                        .map(|ts| output::format_relative_seconds(ts, (self.clock)()))
                        .unwrap_or_default();
                    let text = if rel.is_empty() {
                        state.label().to_string()
                    } else {
                        format!("{} • {}", state.label(), rel)
                    };
                    (state, meta.timestamp, text)
                }
            }
        };

        ThreadStatus {
            url: url.to_string(),
            state,
            timestamp,
            label: state.label().to_string(),
            status_text,
            can_mark_done: state == ThreadState::Active,
            can_mark_active: state == ThreadState::Done,
            can_load_diffs: self.can_load_diffs_for(url),
        }
    }

    fn link_label(&self, url: &str) -> String {
        let platform_label = output::known_host_label(url).unwrap_or(self.descriptor.label);
        output::format_dropdown_label(url, platform_label)
    }

    /// New chat, Home, platform extras, then every known link.
    pub fn dropdown_options(&self) -> Vec<DropdownOption> {
        let mut entries: Vec<(String, String)> =
            vec![("New chat".to_string(), self.fallback_url.clone())];

        let home = self.initial_fallback();
        if home != self.fallback_url {
            entries.push(("Home".to_string(), home.to_string()));
        }
        for (label, url) in self.descriptor.extra_options {
            entries.push((label.to_string(), url.to_string()));
        }
        for link in &self.links {
            let label = self.link_label(&link.url);
            let label = if link.done {
                format!("✓ {}", label)
            } else {
                label
            };
            entries.push((label, link.url.clone()));
        }

        let current = normalize_url(&self.current_url);
        let mut selected_any = false;
        entries
            .into_iter()
            .map(|(label, url)| {
                let selected = !selected_any && normalize_url(&url) == current;
                selected_any |= selected;
                DropdownOption {
                    label,
                    url,
                    selected,
                }
            })
            .collect()
    }
}
