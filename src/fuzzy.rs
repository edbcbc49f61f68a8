//! Subsequence matching for the thread picker.
//!
//! A query matches a label when its characters appear in order. Matches are
//! taken greedily left to right; runs of adjacent characters and characters
//! right after a word separator score higher, skipped characters cost a point.

const SCORE_MATCH: i64 = 8;
const BONUS_RUN: i64 = 12;
const BONUS_WORD_START: i64 = 10;
const PENALTY_SKIP: i64 = 1;

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '/' | '-' | '_' | '.' | ':' | '(' | ')')
}

/// Score `query` against `text`, or `None` if it is not a subsequence.
///
/// Case-insensitive. An empty query matches everything with score 0.
pub fn score(query: &str, text: &str) -> Option<i64> {
    let query: Vec<char> = query.trim().chars().flat_map(char::to_lowercase).collect();
    if query.is_empty() {
        return Some(0);
    }
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    let mut total = 0i64;
    let mut last_hit: Option<usize> = None;
    let mut pos = 0usize;

    for want in query {
        let offset = text[pos..].iter().position(|&c| c == want)?;
        let at = pos + offset;

        total += SCORE_MATCH - PENALTY_SKIP * offset as i64;
        if last_hit.is_some_and(|l| l + 1 == at) {
            total += BONUS_RUN;
        }
        if at == 0 || is_separator(text[at - 1]) {
            total += BONUS_WORD_START;
        }

        last_hit = Some(at);
        pos = at + 1;
    }
    Some(total)
}

/// Filter and rank `items` by a whitespace-separated AND query over their
/// labels. Ties keep input order.
pub fn rank<'a, T>(query: &str, items: &'a [T], label: impl Fn(&T) -> String) -> Vec<&'a T> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut scored: Vec<(i64, usize, &T)> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let text = label(item);
            let total = tokens
                .iter()
                .try_fold(0i64, |acc, tok| score(tok, &text).map(|s| acc + s))?;
            Some((total, i, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, item)| item).collect()
}
