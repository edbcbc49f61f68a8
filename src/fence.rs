//! Locating the fenced block an instance owns.
//!
//! Line numbers drift while the surrounding document is edited, so regions are
//! recomputed from the full text on every read instead of being cached.

use serde::Serialize;

use crate::platform::Platform;

const FENCE: &str = "```";

/// Line indices of a block's opening and closing fence lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeblockRegion {
    pub start: usize,
    pub end: usize,
}

impl CodeblockRegion {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-height hint at `line`, used when only a cursor position is known.
    pub fn at_line(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn encloses(&self, other: &CodeblockRegion) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }
}

/// Every closed block opened by ```` ```<fence_tag> ````, in document order.
pub fn find_blocks(text: &str, fence_tag: &str) -> Vec<CodeblockRegion> {
    let opener = format!("{}{}", FENCE, fence_tag);
    let mut blocks = Vec::new();
    let mut open: Option<usize> = None;

    for (i, line) in text.split('\n').enumerate() {
        let trimmed = line.trim();
        match open {
            None if trimmed.starts_with(&opener) => open = Some(i),
            Some(start) if trimmed.starts_with(FENCE) => {
                blocks.push(CodeblockRegion::new(start, i));
                open = None;
            }
            _ => {}
        }
    }
    blocks
}

/// Resolve the block this instance owns.
///
/// A single block of the tag always wins. With several, the one enclosing
/// `fallback` wins. Otherwise (no blocks, none enclosing, empty text) the
/// fallback coordinates are returned as given.
pub fn find_boundaries(text: &str, fence_tag: &str, fallback: CodeblockRegion) -> CodeblockRegion {
    if text.is_empty() {
        return fallback;
    }
    let blocks = find_blocks(text, fence_tag);
    match blocks.as_slice() {
        [] => fallback,
        [only] => *only,
        many => many
            .iter()
            .find(|b| b.encloses(&fallback))
            .copied()
            .unwrap_or(fallback),
    }
}

/// Lines strictly between the fences, joined with `\n`.
pub fn block_source(text: &str, region: CodeblockRegion) -> String {
    if !region.is_valid() {
        return String::new();
    }
    text.split('\n')
        .skip(region.start + 1)
        .take(region.end - region.start - 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Platforms of all known fence tags in the text, in order of first appearance.
pub fn detect_platforms(text: &str) -> Vec<Platform> {
    let mut found = Vec::new();
    for line in text.split('\n') {
        let Some(tag) = line.trim().strip_prefix(FENCE) else {
            continue;
        };
        let tag = tag.split_whitespace().next().unwrap_or("");
        match Platform::from_fence_tag(tag) {
            Some(platform) if !found.contains(&platform) => found.push(platform),
            _ => {}
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Notes
```smart-claude
chat-active:: 1 https://claude.ai/chat/a
```
text
```python
print(1)
```
```smart-claude
chat-done:: 2 https://claude.ai/chat/b
```";

    #[test]
    fn test_find_blocks() {
        let got = find_blocks(DOC, "smart-claude");
        assert_eq!(got, vec![CodeblockRegion::new(1, 3), CodeblockRegion::new(8, 10)]);
        assert!(find_blocks(DOC, "smart-grok").is_empty());
    }

    #[test]
    fn test_unclosed_block_is_ignored() {
        let text = "```smart-grok\nhttps://grok.com/c/a\n";
        assert!(find_blocks(text, "smart-grok").is_empty());
    }

    #[test]
    fn test_find_boundaries() {
        let cases = vec![
            // several blocks: the enclosing one wins
            ("smart-claude", CodeblockRegion::new(8, 10), CodeblockRegion::new(8, 10)),
            ("smart-claude", CodeblockRegion::at_line(9), CodeblockRegion::new(8, 10)),
            ("smart-claude", CodeblockRegion::at_line(2), CodeblockRegion::new(1, 3)),
            // several blocks, none enclosing: stale coordinates are kept
            ("smart-claude", CodeblockRegion::new(4, 7), CodeblockRegion::new(4, 7)),
            // single block wins regardless of the hint
            ("python", CodeblockRegion::new(0, 0), CodeblockRegion::new(5, 7)),
            // no block at all
            ("smart-kimi", CodeblockRegion::new(3, 9), CodeblockRegion::new(3, 9)),
        ];
        for (tag, fallback, want) in cases {
            let got = find_boundaries(DOC, tag, fallback);
            assert_eq!(
                got, want,
                "find_boundaries({:?}, {:?}) = {:?}, want {:?}",
                tag, fallback, got, want
            );
        }
    }

    #[test]
    fn test_find_boundaries_empty_text() {
        let fallback = CodeblockRegion::new(2, 5);
        assert_eq!(find_boundaries("", "smart-claude", fallback), fallback);
    }

    #[test]
    fn test_find_boundaries_follows_drift() {
        let shifted = format!("new line\nanother\n{}", DOC);
        let got = find_boundaries(&shifted, "smart-claude", CodeblockRegion::at_line(11));
        assert_eq!(got, CodeblockRegion::new(10, 12));
    }

    #[test]
    fn test_block_source() {
        assert_eq!(
            block_source(DOC, CodeblockRegion::new(1, 3)),
            "chat-active:: 1 https://claude.ai/chat/a"
        );
        assert_eq!(block_source(DOC, CodeblockRegion::new(3, 3)), "");
        assert_eq!(block_source("```a\n```", CodeblockRegion::new(0, 1)), "");
    }

    #[test]
    fn test_detect_platforms() {
        let text = "```python\n```\n```smart-grok\n```\n```smart-claude\n```\n```smart-grok\n```";
        assert_eq!(detect_platforms(text), vec![Platform::Grok, Platform::Claude]);
        assert!(detect_platforms(DOC).contains(&Platform::Claude));
    }
}
