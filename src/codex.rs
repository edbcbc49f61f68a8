//! The "Load diffs" helper for Codex task pages.
//!
//! A task page renders each changed file as a collapsed section, and large
//! diffs behind a "Load diff" button. The loader waits until the page at the
//! expected route shows that UI, then expands every section that has no diff
//! yet and clicks the buttons until nothing new appears for a while.

use serde_json::json;

const POLL_MS: u64 = 100;
const TIMEOUT_MS: u64 = 30_000;

const DIFF_LOADER_TEMPLATE: &str = r#"(async (opts) => {
  const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
  const route = (href) => {
    try { const u = new URL(String(href || '')); return u.hostname + u.pathname; }
    catch (_) { return String(href || ''); }
  };
  const expected = route(opts.expected_url);
  const on_route = () => !opts.expected_url || route(window.location.href) === expected;
  const is_load_button = (btn) =>
    (btn.innerText || btn.textContent || '').trim().toLowerCase() === 'load diff';
  const visible = (el) => {
    if (!el || !el.getClientRects().length) return false;
    const cs = getComputedStyle(el);
    return cs.visibility !== 'hidden' && cs.display !== 'none';
  };
  const has_diff_ui = () =>
    !!document.querySelector('[data-diff-header]') ||
    Array.from(document.querySelectorAll('button')).some(is_load_button);

  const load = () => new Promise((done) => {
    const seen = new WeakSet();
    const started = performance.now();
    let progress = started;
    const touch = (el) => {
      if (seen.has(el) || !visible(el)) return;
      seen.add(el);
      el.click();
      progress = performance.now();
    };
    const sweep = () => {
      for (const section of document.querySelectorAll('[data-diff-header]')) {
        if (section.querySelector('[data-state="diff"]')) { seen.add(section); continue; }
        if (seen.has(section)) continue;
        const header = section.querySelector(':scope > [role="button"]') || section.querySelector('[role="button"]');
        if (header && visible(header)) { seen.add(section); touch(header); }
      }
      for (const btn of document.querySelectorAll('button')) {
        if (is_load_button(btn)) touch(btn);
      }
      const now = performance.now();
      if (now - started >= opts.timeout_ms || now - progress >= 500) {
        clearInterval(timer);
        observer.disconnect();
        done(now - started < opts.timeout_ms);
      }
    };
    const observer = new MutationObserver(sweep);
    observer.observe(document.documentElement, { childList: true, subtree: true });
    const timer = setInterval(sweep, 25);
    sweep();
  });

  const start = Date.now();
  while (Date.now() - start < opts.timeout_ms) {
    if (!on_route()) return { ok: false, reason: 'navigated_away' };
    const ready = ['complete', 'interactive'].includes(String(document.readyState).toLowerCase());
    if (ready && has_diff_ui()) return { ok: await load(), reason: 'ready' };
    await sleep(opts.poll_ms);
  }
  if (!on_route()) return { ok: false, reason: 'navigated_away' };
  await load();
  return { ok: false, reason: 'timeout' };
})(__OPTS__);"#;

/// The loader script, bound to the task page it may run on.
pub fn diff_loader_script(expected_url: &str) -> String {
    let opts = json!({
        "expected_url": expected_url,
        "poll_ms": POLL_MS,
        "timeout_ms": TIMEOUT_MS,
    });
    DIFF_LOADER_TEMPLATE.replace("__OPTS__", &opts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_bound_to_url() {
        let script = diff_loader_script("https://chatgpt.com/codex/tasks/task_e_1");
        assert!(script.ends_with(
            r#"})({"expected_url":"https://chatgpt.com/codex/tasks/task_e_1","poll_ms":100,"timeout_ms":30000});"#
        ));
        assert!(!script.contains("__OPTS__"));
    }

    #[test]
    fn test_url_is_json_escaped() {
        let script = diff_loader_script(r#"https://chatgpt.com/codex/tasks/a"b"#);
        assert!(script.contains(r#""expected_url":"https://chatgpt.com/codex/tasks/a\"b""#));
    }
}
